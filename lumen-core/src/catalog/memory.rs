use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lumen_model::{
    Job, JobId, JobKind, Library, LibraryId, LibraryStats, MediaItem,
    MediaItemId, MediaKind, ObservedFile, ReadyJob, ScanRun, ScanRunId,
};
use parking_lot::Mutex;

use super::browse::{
    FOLDER_ITEM_LIMIT, FOLDER_LIMIT, FolderEntry, FolderListing, ItemPage,
    ItemQuery, ItemSort, classify_in_folder,
};
use super::{
    CatalogStore, ThumbnailScope, UpsertAction, UpsertOutcome, path_str,
};
use crate::{MediaError, Result};

/// Catalog held entirely in process memory.
///
/// Mirrors the relational semantics of [`super::PostgresCatalog`], including
/// the cascades and the `(kind, item)` uniqueness of jobs.
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    libraries: HashMap<LibraryId, Library>,
    items: HashMap<MediaItemId, MediaItem>,
    paths: HashMap<PathBuf, MediaItemId>,
    runs: HashMap<ScanRunId, ScanRun>,
    jobs: HashMap<JobId, Job>,
}

impl State {
    fn drop_item(&mut self, id: MediaItemId) {
        if let Some(item) = self.items.remove(&id) {
            self.paths.remove(&item.path);
        }
        self.jobs.retain(|_, job| job.item_id != id);
    }
}

impl fmt::Debug for InMemoryCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InMemoryCatalog")
            .field("libraries", &state.libraries.len())
            .field("items", &state.items.len())
            .field("jobs", &state.jobs.len())
            .finish()
    }
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

fn claimable(job: &Job, reclaim_before: Option<DateTime<Utc>>) -> bool {
    match (job.locked_at, reclaim_before) {
        (None, _) => true,
        (Some(locked_at), Some(cutoff)) => locked_at < cutoff,
        (Some(_), None) => false,
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn create_library(
        &self,
        name: &str,
        roots: &[PathBuf],
    ) -> Result<Library> {
        for root in roots {
            path_str(root)?;
        }
        let library = Library::new(name, roots.to_vec());
        self.state
            .lock()
            .libraries
            .insert(library.id, library.clone());
        Ok(library)
    }

    async fn get_library(&self, id: LibraryId) -> Result<Option<Library>> {
        Ok(self.state.lock().libraries.get(&id).cloned())
    }

    async fn list_libraries(&self) -> Result<Vec<Library>> {
        let mut libraries: Vec<Library> =
            self.state.lock().libraries.values().cloned().collect();
        libraries.sort_by(|a, b| {
            a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))
        });
        Ok(libraries)
    }

    async fn delete_library(&self, id: LibraryId) -> Result<bool> {
        let mut state = self.state.lock();
        if state.libraries.remove(&id).is_none() {
            return Ok(false);
        }
        let doomed: Vec<MediaItemId> = state
            .items
            .values()
            .filter(|item| item.library_id == id)
            .map(|item| item.id)
            .collect();
        for item_id in doomed {
            state.drop_item(item_id);
        }
        state.runs.retain(|_, run| run.library_id != id);
        Ok(true)
    }

    async fn begin_scan_run(
        &self,
        library_id: LibraryId,
        started_at: DateTime<Utc>,
    ) -> Result<ScanRun> {
        let mut state = self.state.lock();
        if !state.libraries.contains_key(&library_id) {
            return Err(MediaError::NotFound(format!("library {library_id}")));
        }
        let run = ScanRun {
            id: ScanRunId::new(),
            library_id,
            started_at,
            finished_at: None,
        };
        state.runs.insert(run.id, run.clone());
        Ok(run)
    }

    async fn finish_scan_run(
        &self,
        run_id: ScanRunId,
        finished_at: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(run) = self.state.lock().runs.get_mut(&run_id) {
            run.finished_at = Some(finished_at);
        }
        Ok(())
    }

    async fn list_scan_runs(
        &self,
        library_id: LibraryId,
    ) -> Result<Vec<ScanRun>> {
        let mut runs: Vec<ScanRun> = self
            .state
            .lock()
            .runs
            .values()
            .filter(|run| run.library_id == library_id)
            .cloned()
            .collect();
        runs.sort_by_key(|run| std::cmp::Reverse(run.started_at));
        Ok(runs)
    }

    async fn upsert_item(
        &self,
        file: &ObservedFile,
        seen_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        path_str(&file.path)?;
        let mut state = self.state.lock();
        if !state.libraries.contains_key(&file.library_id) {
            return Err(MediaError::Database(format!(
                "media_item references unknown library {}",
                file.library_id
            )));
        }

        if let Some(id) = state.paths.get(&file.path).copied()
            && let Some(item) = state.items.get_mut(&id)
        {
            let content_changed =
                item.size_bytes != file.size_bytes || item.mtime != file.mtime;
            item.library_id = file.library_id;
            item.rel_path = file.rel_path.clone();
            item.kind = file.kind;
            item.present = true;
            item.missing_since = None;
            item.size_bytes = file.size_bytes;
            item.mtime = file.mtime;
            item.last_seen_at = seen_at;
            item.updated_at = now;
            return Ok(UpsertOutcome {
                item_id: id,
                action: UpsertAction::Updated,
                content_changed,
            });
        }

        let item = MediaItem {
            id: MediaItemId::new(),
            library_id: file.library_id,
            path: file.path.clone(),
            rel_path: file.rel_path.clone(),
            kind: file.kind,
            present: true,
            missing_since: None,
            size_bytes: file.size_bytes,
            mtime: file.mtime,
            last_seen_at: seen_at,
            thumb_path: None,
            created_at: now,
            updated_at: now,
        };
        let id = item.id;
        state.paths.insert(item.path.clone(), id);
        state.items.insert(id, item);
        Ok(UpsertOutcome {
            item_id: id,
            action: UpsertAction::Inserted,
            content_changed: true,
        })
    }

    async fn mark_absent_before(
        &self,
        library_id: LibraryId,
        watermark: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let mut flipped = 0;
        for item in self.state.lock().items.values_mut() {
            if item.library_id == library_id
                && item.present
                && item.last_seen_at < watermark
            {
                item.present = false;
                item.missing_since.get_or_insert(watermark);
                item.updated_at = now;
                flipped += 1;
            }
        }
        Ok(flipped)
    }

    async fn mark_item_missing(
        &self,
        id: MediaItemId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(item) = self.state.lock().items.get_mut(&id) {
            item.present = false;
            item.missing_since.get_or_insert(now);
            item.updated_at = now;
        }
        Ok(())
    }

    async fn get_item(&self, id: MediaItemId) -> Result<Option<MediaItem>> {
        Ok(self.state.lock().items.get(&id).cloned())
    }

    async fn get_item_by_path(&self, path: &Path) -> Result<Option<MediaItem>> {
        let state = self.state.lock();
        Ok(state
            .paths
            .get(path)
            .and_then(|id| state.items.get(id))
            .cloned())
    }

    async fn list_items(&self, library_id: LibraryId) -> Result<Vec<MediaItem>> {
        let mut items: Vec<MediaItem> = self
            .state
            .lock()
            .items
            .values()
            .filter(|item| item.library_id == library_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(items)
    }

    async fn query_items(&self, query: &ItemQuery) -> Result<ItemPage> {
        let mut matched: Vec<MediaItem> = self
            .state
            .lock()
            .items
            .values()
            .filter(|item| {
                item.present
                    && query.library_id.is_none_or(|id| item.library_id == id)
                    && query.kind.is_none_or(|kind| item.kind == kind)
                    && query
                        .name
                        .as_ref()
                        .is_none_or(|name| name.matches(&item.rel_path))
            })
            .cloned()
            .collect();

        match query.sort {
            ItemSort::LastSeen => matched.sort_by(|a, b| {
                b.last_seen_at
                    .cmp(&a.last_seen_at)
                    .then_with(|| a.path.cmp(&b.path))
            }),
            ItemSort::Name => matched.sort_by(|a, b| {
                a.rel_path.cmp(&b.rel_path).then_with(|| a.path.cmp(&b.path))
            }),
            ItemSort::Newest => matched.sort_by(|a, b| {
                b.created_at
                    .cmp(&a.created_at)
                    .then_with(|| a.path.cmp(&b.path))
            }),
        }

        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(usize::try_from(query.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(query.limit).unwrap_or(usize::MAX))
            .collect();
        Ok(ItemPage { total, items })
    }

    async fn list_folder(
        &self,
        library_id: LibraryId,
        prefix: &str,
    ) -> Result<FolderListing> {
        let state = self.state.lock();
        let mut folders = std::collections::BTreeSet::new();
        let mut items = Vec::new();
        for item in state
            .items
            .values()
            .filter(|item| item.present && item.library_id == library_id)
        {
            match classify_in_folder(&item.rel_path, prefix) {
                Some(FolderEntry::File) => items.push(item.clone()),
                Some(FolderEntry::Subfolder(name)) => {
                    folders.insert(name.to_string());
                }
                None => {}
            }
        }
        drop(state);

        items.sort_by(|a: &MediaItem, b: &MediaItem| a.rel_path.cmp(&b.rel_path));
        items.truncate(FOLDER_ITEM_LIMIT as usize);
        Ok(FolderListing {
            folders: folders.into_iter().take(FOLDER_LIMIT as usize).collect(),
            items,
        })
    }

    async fn enqueue_job(
        &self,
        kind: JobKind,
        item_id: MediaItemId,
        run_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.state.lock();
        if !state.items.contains_key(&item_id) {
            return Err(MediaError::Database(format!(
                "job references unknown item {item_id}"
            )));
        }
        if state
            .jobs
            .values()
            .any(|job| job.kind == kind && job.item_id == item_id)
        {
            return Ok(false);
        }
        let job = Job {
            id: JobId::new(),
            kind,
            item_id,
            run_at,
            attempts: 0,
            locked_at: None,
            last_error: None,
        };
        state.jobs.insert(job.id, job);
        Ok(true)
    }

    async fn ready_jobs(
        &self,
        kind: JobKind,
        limit: usize,
        reclaim_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<ReadyJob>> {
        let state = self.state.lock();
        let mut candidates: Vec<&Job> = state
            .jobs
            .values()
            .filter(|job| job.kind == kind && claimable(job, reclaim_before))
            .collect();
        candidates.sort_by(|a, b| a.run_at.cmp(&b.run_at).then(a.id.cmp(&b.id)));

        Ok(candidates
            .into_iter()
            .filter_map(|job| {
                state.items.get(&job.item_id).map(|item| ReadyJob {
                    id: job.id,
                    item_id: item.id,
                    attempts: job.attempts,
                    path: item.path.clone(),
                    kind: item.kind,
                })
            })
            .take(limit)
            .collect())
    }

    async fn try_lock_job(
        &self,
        id: JobId,
        now: DateTime<Utc>,
        reclaim_before: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        match self.state.lock().jobs.get_mut(&id) {
            Some(job) if claimable(job, reclaim_before) => {
                job.locked_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete_thumb_job(
        &self,
        job_id: JobId,
        item_id: MediaItemId,
        thumb_path: &Path,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(item) = state.items.get_mut(&item_id) {
            item.thumb_path = Some(thumb_path.to_path_buf());
        }
        state.jobs.remove(&job_id);
        Ok(())
    }

    async fn release_job(
        &self,
        id: JobId,
        attempts: u32,
        error: &str,
    ) -> Result<()> {
        if let Some(job) = self.state.lock().jobs.get_mut(&id) {
            job.locked_at = None;
            job.attempts = attempts;
            job.last_error = Some(error.to_string());
        }
        Ok(())
    }

    async fn delete_job(&self, id: JobId) -> Result<()> {
        self.state.lock().jobs.remove(&id);
        Ok(())
    }

    async fn jobs_for_item(&self, item_id: MediaItemId) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .state
            .lock()
            .jobs
            .values()
            .filter(|job| job.item_id == item_id)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.kind.as_str());
        Ok(jobs)
    }

    async fn count_unlocked_jobs(&self, kind: JobKind) -> Result<u64> {
        Ok(self
            .state
            .lock()
            .jobs
            .values()
            .filter(|job| job.kind == kind && job.locked_at.is_none())
            .count() as u64)
    }

    async fn library_stats(&self, library_id: LibraryId) -> Result<LibraryStats> {
        let state = self.state.lock();
        let mut stats = LibraryStats::default();
        for item in state
            .items
            .values()
            .filter(|item| item.library_id == library_id && item.present)
        {
            stats.total_items += 1;
            stats.total_size += item.size_bytes;
            match item.kind {
                MediaKind::Video => stats.video_count += 1,
                MediaKind::Photo => stats.photo_count += 1,
                MediaKind::Audio => stats.audio_count += 1,
                MediaKind::Other => stats.other_count += 1,
            }
            if item.kind.is_thumbnailable() {
                if item.thumb_path.is_some() {
                    stats.thumb_count += 1;
                } else {
                    stats.missing_thumbs += 1;
                }
            }
        }
        Ok(stats)
    }

    async fn reset_thumbnails(
        &self,
        library_id: LibraryId,
        scope: ThumbnailScope,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let mut state = self.state.lock();
        let mut reset = Vec::new();
        for item in state.items.values_mut() {
            let in_scope = match scope {
                ThumbnailScope::PhotosAndVideos => item.kind.is_thumbnailable(),
                ThumbnailScope::VideosOnly => item.kind == MediaKind::Video,
            };
            if item.library_id == library_id && item.present && in_scope {
                item.thumb_path = None;
                item.updated_at = now;
                reset.push(item.id);
            }
        }

        for item_id in &reset {
            let exists = state
                .jobs
                .values()
                .any(|job| job.kind == JobKind::Thumb && job.item_id == *item_id);
            if !exists {
                let job = Job {
                    id: JobId::new(),
                    kind: JobKind::Thumb,
                    item_id: *item_id,
                    run_at: now,
                    attempts: 0,
                    locked_at: None,
                    last_error: None,
                };
                state.jobs.insert(job.id, job);
            }
        }
        Ok(reset.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn observed(library_id: LibraryId, path: &str, size: u64) -> ObservedFile {
        ObservedFile {
            library_id,
            path: PathBuf::from(path),
            rel_path: path.trim_start_matches("/media/").to_string(),
            kind: MediaKind::Photo,
            size_bytes: size,
            mtime: None,
        }
    }

    #[tokio::test]
    async fn upsert_reports_insert_then_update() {
        let catalog = InMemoryCatalog::new();
        let lib = catalog
            .create_library("Photos", &[PathBuf::from("/media")])
            .await
            .unwrap();
        let now = Utc::now();

        let first = catalog
            .upsert_item(&observed(lib.id, "/media/a.jpg", 10), now, now)
            .await
            .unwrap();
        assert!(first.is_insert());
        assert!(first.content_changed);

        let same = catalog
            .upsert_item(&observed(lib.id, "/media/a.jpg", 10), now, now)
            .await
            .unwrap();
        assert_eq!(same.action, UpsertAction::Updated);
        assert_eq!(same.item_id, first.item_id);
        assert!(!same.content_changed);

        let grown = catalog
            .upsert_item(&observed(lib.id, "/media/a.jpg", 11), now, now)
            .await
            .unwrap();
        assert!(grown.content_changed);
    }

    #[tokio::test]
    async fn duplicate_enqueue_is_noop() {
        let catalog = InMemoryCatalog::new();
        let lib = catalog.create_library("L", &[]).await.unwrap();
        let now = Utc::now();
        let item = catalog
            .upsert_item(&observed(lib.id, "/media/a.jpg", 1), now, now)
            .await
            .unwrap();

        assert!(catalog.enqueue_job(JobKind::Thumb, item.item_id, now).await.unwrap());
        assert!(!catalog.enqueue_job(JobKind::Thumb, item.item_id, now).await.unwrap());
        assert!(
            catalog
                .enqueue_job(JobKind::Metadata, item.item_id, now)
                .await
                .unwrap()
        );
        assert_eq!(catalog.jobs_for_item(item.item_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn lock_is_exclusive_until_reclaim_cutoff() {
        let catalog = InMemoryCatalog::new();
        let lib = catalog.create_library("L", &[]).await.unwrap();
        let now = Utc::now();
        let item = catalog
            .upsert_item(&observed(lib.id, "/media/a.jpg", 1), now, now)
            .await
            .unwrap();
        catalog
            .enqueue_job(JobKind::Thumb, item.item_id, now)
            .await
            .unwrap();
        let job = catalog.ready_jobs(JobKind::Thumb, 10, None).await.unwrap()[0].id;

        assert!(catalog.try_lock_job(job, now, None).await.unwrap());
        assert!(!catalog.try_lock_job(job, now, None).await.unwrap());
        assert!(catalog.ready_jobs(JobKind::Thumb, 10, None).await.unwrap().is_empty());

        let later = now + Duration::minutes(5);
        let cutoff = later - Duration::minutes(1);
        let reclaimable = catalog
            .ready_jobs(JobKind::Thumb, 10, Some(cutoff))
            .await
            .unwrap();
        assert_eq!(reclaimable.len(), 1);
        assert!(catalog.try_lock_job(job, later, Some(cutoff)).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_library_cascades() {
        let catalog = InMemoryCatalog::new();
        let lib = catalog.create_library("L", &[]).await.unwrap();
        let now = Utc::now();
        let item = catalog
            .upsert_item(&observed(lib.id, "/media/a.jpg", 1), now, now)
            .await
            .unwrap();
        catalog
            .enqueue_job(JobKind::Thumb, item.item_id, now)
            .await
            .unwrap();
        catalog.begin_scan_run(lib.id, now).await.unwrap();

        assert!(catalog.delete_library(lib.id).await.unwrap());
        assert!(catalog.get_item(item.item_id).await.unwrap().is_none());
        assert_eq!(catalog.count_unlocked_jobs(JobKind::Thumb).await.unwrap(), 0);
        assert!(catalog.list_scan_runs(lib.id).await.unwrap().is_empty());
        assert!(!catalog.delete_library(lib.id).await.unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_utf8_paths_are_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let catalog = InMemoryCatalog::new();
        let lib = catalog
            .create_library("Photos", &[PathBuf::from("/media")])
            .await
            .unwrap();
        let now = Utc::now();
        let mut file = observed(lib.id, "/media/a.jpg", 1);
        file.path = PathBuf::from(OsStr::from_bytes(b"/media/\xff.jpg"));

        let err = catalog.upsert_item(&file, now, now).await.unwrap_err();
        assert!(matches!(err, MediaError::InvalidMedia(_)));
        assert!(catalog.list_items(lib.id).await.unwrap().is_empty());
    }
}
