//! Scanning, cataloguing, thumbnailing and streaming for a local media
//! collection.
//!
//! The [`catalog::CatalogStore`] trait is the single point of shared state.
//! [`scan::Scanner`] reconciles the filesystem into it,
//! [`thumbnail::ThumbnailWorker`] drains its job queue and
//! [`stream::StreamGateway`] serves items back out.

pub mod catalog;
pub mod error;
pub mod scan;
pub mod stream;
pub mod thumbnail;

pub use catalog::{
    CatalogStore, FolderListing, InMemoryCatalog, ItemPage, ItemQuery, ItemSort,
    NamePattern, PostgresCatalog, PostgresDatabase, ThumbnailScope, UpsertAction,
    UpsertOutcome, folder_prefix,
};
pub use error::{MediaError, Result};
pub use scan::{KindClassifier, RescanJobPolicy, ScanSummary, Scanner, ScannerSettings};
pub use stream::{OpenedMedia, RangeRequest, StreamGateway};
pub use thumbnail::{
    CommandThumbnailer, ThumbnailError, ThumbnailGenerator, ThumbnailWorker,
    ToolPaths, WorkerConfig,
};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
