use super::test_helpers::*;
use super::*;
use crate::config::MappingRow;
use crate::types::{NoticeLevel, RecordId, WarningReason};
