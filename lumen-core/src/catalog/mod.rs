//! Durable catalog state: libraries, indexed items, scan runs and the job
//! queue. Every other component reads and writes through [`CatalogStore`].

pub mod browse;
pub mod memory;
pub mod postgres;

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lumen_model::{
    Job, JobId, JobKind, Library, LibraryId, LibraryStats, MediaItem,
    MediaItemId, ObservedFile, ReadyJob, ScanRun, ScanRunId,
};

use crate::{MediaError, Result};

pub use browse::{
    FolderListing, ItemPage, ItemQuery, ItemSort, NamePattern, folder_prefix,
};
pub use memory::InMemoryCatalog;
pub use postgres::{PostgresCatalog, PostgresDatabase};

/// Whether an upsert created the row or refreshed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub item_id: MediaItemId,
    pub action: UpsertAction,
    /// Size or mtime differ from what was stored. Always true on insert.
    pub content_changed: bool,
}

impl UpsertOutcome {
    pub fn is_insert(&self) -> bool {
        self.action == UpsertAction::Inserted
    }
}

/// Selection of items affected by a thumbnail regeneration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThumbnailScope {
    #[default]
    PhotosAndVideos,
    VideosOnly,
}

/// Paths are stored as text. One that is not valid UTF-8 has no faithful
/// text form and is rejected rather than lossily converted.
pub(crate) fn path_str(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| {
        MediaError::InvalidMedia(format!(
            "path is not valid UTF-8: {}",
            path.display()
        ))
    })
}

/// Query/command interface over the catalog tables.
///
/// Timestamps are always supplied by the caller so that the watermark a scan
/// writes and the watermark it later compares against come from one clock.
#[async_trait]
pub trait CatalogStore: Send + Sync + fmt::Debug {
    async fn create_library(
        &self,
        name: &str,
        roots: &[PathBuf],
    ) -> Result<Library>;

    async fn get_library(&self, id: LibraryId) -> Result<Option<Library>>;

    async fn list_libraries(&self) -> Result<Vec<Library>>;

    /// Remove a library and, by cascade, its items, their jobs and its
    /// scan runs. Returns false if it did not exist.
    async fn delete_library(&self, id: LibraryId) -> Result<bool>;

    async fn begin_scan_run(
        &self,
        library_id: LibraryId,
        started_at: DateTime<Utc>,
    ) -> Result<ScanRun>;

    async fn finish_scan_run(
        &self,
        run_id: ScanRunId,
        finished_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn list_scan_runs(&self, library_id: LibraryId)
    -> Result<Vec<ScanRun>>;

    /// Insert or refresh an item keyed by absolute path. The row ends up
    /// present, with `missing_since` cleared and `last_seen_at = seen_at`.
    async fn upsert_item(
        &self,
        file: &ObservedFile,
        seen_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome>;

    /// Flip every present item of the library last seen before `watermark`
    /// to absent. `missing_since` is set to `watermark` only when it was
    /// null. Returns the number of rows flipped.
    async fn mark_absent_before(
        &self,
        library_id: LibraryId,
        watermark: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64>;

    /// Flip a single item to absent after its file could not be opened.
    async fn mark_item_missing(
        &self,
        id: MediaItemId,
        now: DateTime<Utc>,
    ) -> Result<()>;

    async fn get_item(&self, id: MediaItemId) -> Result<Option<MediaItem>>;

    async fn get_item_by_path(&self, path: &Path) -> Result<Option<MediaItem>>;

    async fn list_items(&self, library_id: LibraryId) -> Result<Vec<MediaItem>>;

    /// One page of present items matching `query`, plus the total match count.
    async fn query_items(&self, query: &ItemQuery) -> Result<ItemPage>;

    /// Subfolders and direct children of a folder among the library's
    /// present items. `prefix` is a [`folder_prefix`].
    async fn list_folder(
        &self,
        library_id: LibraryId,
        prefix: &str,
    ) -> Result<FolderListing>;

    /// Returns false when a job of this kind already exists for the item.
    async fn enqueue_job(
        &self,
        kind: JobKind,
        item_id: MediaItemId,
        run_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Claimable jobs of `kind` ordered by `run_at`. A job is claimable when
    /// unlocked, or when `reclaim_before` is set and its lock is older.
    async fn ready_jobs(
        &self,
        kind: JobKind,
        limit: usize,
        reclaim_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<ReadyJob>>;

    /// Conditionally lock a job. Returns false if another worker got it.
    async fn try_lock_job(
        &self,
        id: JobId,
        now: DateTime<Utc>,
        reclaim_before: Option<DateTime<Utc>>,
    ) -> Result<bool>;

    /// Record the generated thumbnail on the item and drop the job.
    async fn complete_thumb_job(
        &self,
        job_id: JobId,
        item_id: MediaItemId,
        thumb_path: &Path,
    ) -> Result<()>;

    /// Unlock a failed job, storing its new attempt count and error.
    async fn release_job(
        &self,
        id: JobId,
        attempts: u32,
        error: &str,
    ) -> Result<()>;

    async fn delete_job(&self, id: JobId) -> Result<()>;

    async fn jobs_for_item(&self, item_id: MediaItemId) -> Result<Vec<Job>>;

    async fn count_unlocked_jobs(&self, kind: JobKind) -> Result<u64>;

    async fn library_stats(&self, library_id: LibraryId) -> Result<LibraryStats>;

    /// Clear `thumb_path` on present items in scope and enqueue thumbnail
    /// jobs for them. Returns the number of items reset.
    async fn reset_thumbnails(
        &self,
        library_id: LibraryId,
        scope: ThumbnailScope,
        now: DateTime<Utc>,
    ) -> Result<u64>;
}
