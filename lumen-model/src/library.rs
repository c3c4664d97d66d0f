use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::ids::LibraryId;

/// A named collection of filesystem roots.
///
/// Roots are stored as given; nothing checks that they exist until a scan
/// walks them.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Library {
    pub id: LibraryId,
    pub name: String,
    pub roots: Vec<PathBuf>,
    pub created_at: DateTime<Utc>,
}

impl Library {
    pub fn new(name: impl Into<String>, roots: Vec<PathBuf>) -> Self {
        Self {
            id: LibraryId::new(),
            name: name.into(),
            roots,
            created_at: Utc::now(),
        }
    }

    /// The first configured root, used for display.
    pub fn primary_root(&self) -> Option<&PathBuf> {
        self.roots.first()
    }
}

/// Aggregate counts over the present items of one library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LibraryStats {
    pub total_items: u64,
    pub video_count: u64,
    pub photo_count: u64,
    pub audio_count: u64,
    pub other_count: u64,
    pub total_size: u64,
    /// Present photos and videos that already have a thumbnail.
    pub thumb_count: u64,
    /// Present photos and videos still waiting for one.
    pub missing_thumbs: u64,
}
