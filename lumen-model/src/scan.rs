use chrono::{DateTime, Utc};

use crate::ids::{LibraryId, ScanRunId};

/// One execution of the scanner against a library.
///
/// `started_at` doubles as the presence watermark: any item of the library
/// whose `last_seen_at` is older than it was not observed by this run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanRun {
    pub id: ScanRunId,
    pub library_id: LibraryId,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ScanRun {
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}
