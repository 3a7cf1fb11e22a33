//! Session identification for operator-facing routes
//!
//! A session is named by the `session_id` cookie or, for API clients, the
//! `X-Session-Id` header. Requests without a usable id get a fresh random
//! one, which is handed back in a `Set-Cookie` header.

use crate::utils::random_token;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{HeaderValue, header, request::Parts};
use axum::response::Response;
use std::convert::Infallible;

/// Cookie carrying the session id
pub const SESSION_COOKIE: &str = "session_id";

/// Header carrying the session id for non-browser clients
pub const SESSION_HEADER: &str = "x-session-id";

const MAX_SESSION_ID_LEN: usize = 128;

/// The caller's session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    /// Session id
    pub id: String,
    /// Whether the id was generated for this request
    pub is_new: bool,
}

impl Session {
    /// A brand new session
    pub fn generate() -> Self {
        Self {
            id: random_token(16),
            is_new: true,
        }
    }

    /// Add the session cookie to `response` when the session is new
    pub fn attach(&self, mut response: Response) -> Response {
        if !self.is_new {
            return response;
        }
        let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, self.id);
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        response
    }
}

fn valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn from_cookies(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
}

fn from_header(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let existing = from_cookies(parts)
            .filter(|id| valid_session_id(id))
            .or_else(|| from_header(parts).filter(|id| valid_session_id(id)));

        Ok(match existing {
            Some(id) => Session { id, is_new: false },
            None => Session::generate(),
        })
    }
}
