use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::ids::{LibraryId, MediaItemId};
use crate::kind::MediaKind;

/// One indexed file. The absolute `path` is the natural key.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MediaItem {
    pub id: MediaItemId,
    pub library_id: LibraryId,
    pub path: PathBuf,
    pub rel_path: String,
    pub kind: MediaKind,
    pub present: bool,
    pub missing_since: Option<DateTime<Utc>>,
    pub size_bytes: u64,
    pub mtime: Option<DateTime<Utc>>,
    /// Start time of the last scan run that observed this file.
    pub last_seen_at: DateTime<Utc>,
    pub thumb_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaItem {
    /// An item is only streamable while the catalog believes it is on disk.
    pub fn is_available(&self) -> bool {
        self.present
    }
}

/// Everything the scanner knows about a file it just observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedFile {
    pub library_id: LibraryId,
    pub path: PathBuf,
    pub rel_path: String,
    pub kind: MediaKind,
    pub size_bytes: u64,
    pub mtime: Option<DateTime<Utc>>,
}
