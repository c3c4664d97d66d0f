use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::ids::{JobId, MediaItemId};
use crate::kind::{JobKind, MediaKind};

/// A deferred unit of work tied to one media item.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub item_id: MediaItemId,
    pub run_at: DateTime<Utc>,
    pub attempts: u32,
    pub locked_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl Job {
    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }
}

/// A job joined with the item fields the worker needs to act on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyJob {
    pub id: JobId,
    pub item_id: MediaItemId,
    pub attempts: u32,
    pub path: PathBuf,
    pub kind: MediaKind,
}
