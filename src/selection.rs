//! Selection store and bulk-action trigger
//!
//! A bulk action records which records were selected in the operator's
//! session; the download endpoint later reads that selection back. Notices
//! for the operator are queued in the same session store.

use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::{Notice, RecordId, SelectionRecord};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use utoipa::ToSchema;

/// Session key holding the selected record ids
pub const SELECTED_ENTITY_KEY: &str = "selected_entity";

/// Session key holding the view the selection was made from
pub const SELECTED_VIEW_KEY: &str = "selected_view";

/// Session key holding queued notices
pub const MESSAGES_KEY: &str = "messages";

/// Typed view of one session's key/value store
///
/// Values are stored as JSON. Nothing here is visible to other sessions.
#[derive(Clone, Copy)]
pub struct SessionStore<'a> {
    db: &'a Database,
    session_id: &'a str,
}

impl<'a> SessionStore<'a> {
    /// Open the store of one session
    pub fn new(db: &'a Database, session_id: &'a str) -> Self {
        Self { db, session_id }
    }

    /// Session this store belongs to
    pub fn session_id(&self) -> &str {
        self.session_id
    }

    /// Store `value` under `key`, replacing any previous value
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.db.session_set(self.session_id, key, &raw).await
    }

    /// Read the value under `key`
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.db.session_get(self.session_id, key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Remove the value under `key`
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.db.session_delete(self.session_id, key).await
    }

    /// Drop everything stored for this session
    pub async fn clear(&self) -> Result<u64> {
        let removed = self.db.session_clear(self.session_id).await?;
        debug!(session_id = self.session_id, removed, "cleared session store");
        Ok(removed)
    }

    /// The stored selection; empty when nothing was selected yet
    pub async fn selection(&self) -> Result<SelectionRecord> {
        Ok(SelectionRecord {
            record_ids: self
                .get::<Vec<RecordId>>(SELECTED_ENTITY_KEY)
                .await?
                .unwrap_or_default(),
            origin_view: self.get::<String>(SELECTED_VIEW_KEY).await?,
        })
    }

    /// Queue notices for the operator's next page view
    pub async fn push_notices(&self, notices: impl IntoIterator<Item = Notice>) -> Result<()> {
        let notices: Vec<Notice> = notices.into_iter().collect();
        if notices.is_empty() {
            return Ok(());
        }
        self.db
            .session_update(self.session_id, MESSAGES_KEY, |current| {
                let mut queued: Vec<Notice> = match current {
                    Some(raw) => serde_json::from_str(raw)?,
                    None => Vec::new(),
                };
                queued.extend(notices);
                Ok(Some(serde_json::to_string(&queued)?))
            })
            .await
    }

    /// Queue one notice
    pub async fn push_notice(&self, notice: Notice) -> Result<()> {
        self.push_notices([notice]).await
    }

    /// Remove and return all queued notices
    pub async fn take_notices(&self) -> Result<Vec<Notice>> {
        match self.db.session_take(self.session_id, MESSAGES_KEY).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }
}

/// What the operator sees once a bulk action completes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct BulkActionOutcome {
    /// Record ids that were stored, in selection order
    pub record_ids: Vec<RecordId>,
    /// Notice pointing at the download endpoint
    pub notice: Notice,
    /// Where the operator is sent next
    pub redirect: String,
}

/// Records a bulk selection and produces the follow-up redirect
pub struct SelectionTrigger<'a> {
    store: SessionStore<'a>,
    config: &'a Config,
}

impl<'a> SelectionTrigger<'a> {
    /// Create a trigger writing to `store`
    pub fn new(store: SessionStore<'a>, config: &'a Config) -> Self {
        Self { store, config }
    }

    /// Replace the session's selection with `record_ids`
    ///
    /// The previous selection is deleted first so a failed write never
    /// leaves a stale selection behind. Returns the ids as stored.
    pub async fn on_bulk_action(&self, record_ids: Vec<RecordId>) -> Result<Vec<RecordId>> {
        self.store.delete(SELECTED_ENTITY_KEY).await?;
        self.store.set(SELECTED_ENTITY_KEY, &record_ids).await?;

        let view = self.config.selection_view();
        self.store.set(SELECTED_VIEW_KEY, &view).await?;

        info!(
            session_id = self.store.session_id(),
            records = record_ids.len(),
            view = %view,
            "stored bulk selection"
        );

        Ok(record_ids)
    }

    /// Queue the download notice and work out the redirect
    ///
    /// The redirect always targets the view of the first mapping row.
    pub async fn finished(&self) -> Result<(Notice, String)> {
        let download_url = self.config.download.download_route.clone();
        let notice = Notice::status(
            "Download will start automatically. If you face a problem click here to download",
        )
        .with_link(download_url);
        self.store.push_notice(notice.clone()).await?;

        let view = self
            .config
            .redirect_view()
            .ok_or(Error::MissingViewConfiguration)?;

        Ok((notice, self.config.download.view_route(view)))
    }

    /// [`on_bulk_action`](Self::on_bulk_action) followed by
    /// [`finished`](Self::finished)
    pub async fn run(&self, record_ids: Vec<RecordId>) -> Result<BulkActionOutcome> {
        let record_ids = self.on_bulk_action(record_ids).await?;
        let (notice, redirect) = self.finished().await?;
        Ok(BulkActionOutcome {
            record_ids,
            notice,
            redirect,
        })
    }
}
