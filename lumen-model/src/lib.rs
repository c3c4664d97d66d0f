//! Catalog data model shared across Lumen crates.

pub mod error;
pub mod ids;
pub mod item;
pub mod job;
pub mod kind;
pub mod library;
pub mod scan;

pub use error::{ModelError, Result as ModelResult};
pub use ids::{JobId, LibraryId, MediaItemId, ScanRunId};
pub use item::{MediaItem, ObservedFile};
pub use job::{Job, ReadyJob};
pub use kind::{JobKind, MediaKind};
pub use library::{Library, LibraryStats};
pub use scan::ScanRun;
