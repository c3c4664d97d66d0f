use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, SubsecRound, Utc};
use futures::StreamExt;
use lumen_model::{JobKind, LibraryId, ObservedFile, ScanRunId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::classify::KindClassifier;
use super::fs::FileSystem;
use super::walk::{WalkEntry, walk_files};
use crate::catalog::{CatalogStore, UpsertOutcome};
use crate::{MediaError, Result};

/// Which jobs a rescan enqueues for files it has seen before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescanJobPolicy {
    /// Every re-observed item gets `metadata` (and `thumb` when applicable),
    /// whether or not the file changed.
    #[default]
    Always,
    /// Only items whose size or mtime changed get jobs.
    OnChange,
}

impl FromStr for RescanJobPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(RescanJobPolicy::Always),
            "on_change" | "on-change" | "onchange" => Ok(RescanJobPolicy::OnChange),
            other => Err(format!("unknown rescan job policy '{other}'")),
        }
    }
}

/// Counters for one completed scan run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub run_id: ScanRunId,
    pub library_id: LibraryId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub inserted: u64,
    pub updated: u64,
    /// Regular files with no matching kind.
    pub skipped: u64,
    /// Unreadable entries and per-file store failures.
    pub errors: u64,
    pub marked_missing: u64,
    pub jobs_enqueued: u64,
}

/// Walks a library's roots and reconciles what it finds into the catalog.
#[derive(Clone)]
pub struct Scanner {
    catalog: Arc<dyn CatalogStore>,
    fs: Arc<dyn FileSystem>,
    classifier: Arc<KindClassifier>,
    rescan_policy: RescanJobPolicy,
}

impl fmt::Debug for Scanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanner")
            .field("catalog", &self.catalog)
            .field("classifier", &self.classifier)
            .field("rescan_policy", &self.rescan_policy)
            .finish_non_exhaustive()
    }
}

struct RunCounters {
    inserted: u64,
    updated: u64,
    skipped: u64,
    errors: u64,
    jobs_enqueued: u64,
}

impl Scanner {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        fs: Arc<dyn FileSystem>,
        classifier: KindClassifier,
    ) -> Self {
        Self {
            catalog,
            fs,
            classifier: Arc::new(classifier),
            rescan_policy: RescanJobPolicy::default(),
        }
    }

    pub fn with_rescan_policy(mut self, policy: RescanJobPolicy) -> Self {
        self.rescan_policy = policy;
        self
    }

    pub fn classifier(&self) -> &KindClassifier {
        &self.classifier
    }

    /// Full walk of every root of the library followed by presence
    /// reconciliation. Fails only if the library is unknown or the catalog
    /// rejects run bookkeeping; individual files never abort the scan.
    pub async fn scan_library(&self, library_id: LibraryId) -> Result<ScanSummary> {
        let library = self
            .catalog
            .get_library(library_id)
            .await?
            .ok_or_else(|| MediaError::NotFound(format!("library {library_id}")))?;

        // Postgres keeps microseconds; the watermark must survive the round trip.
        let started_at = Utc::now().trunc_subsecs(6);
        let run = self.catalog.begin_scan_run(library_id, started_at).await?;
        info!(
            target: "scan::run",
            library_id = %library_id,
            run_id = %run.id,
            roots = library.roots.len(),
            "scan started"
        );

        let mut counters = RunCounters {
            inserted: 0,
            updated: 0,
            skipped: 0,
            errors: 0,
            jobs_enqueued: 0,
        };

        for root in &library.roots {
            let root = clean_path(root);
            let entries = walk_files(Arc::clone(&self.fs), root.clone());
            futures::pin_mut!(entries);

            while let Some(entry) = entries.next().await {
                match entry {
                    Ok(entry) => {
                        self.reconcile_file(
                            library_id,
                            &root,
                            entry,
                            started_at,
                            &mut counters,
                        )
                        .await
                    }
                    Err(err) => {
                        debug!(target: "scan::walk", error = %err, "skipping unreadable entry");
                        counters.errors += 1;
                    }
                }
            }
        }

        let now = Utc::now();
        let marked_missing = self
            .catalog
            .mark_absent_before(library_id, started_at, now)
            .await?;

        let finished_at = Utc::now();
        self.catalog.finish_scan_run(run.id, finished_at).await?;

        let summary = ScanSummary {
            run_id: run.id,
            library_id,
            started_at,
            finished_at,
            inserted: counters.inserted,
            updated: counters.updated,
            skipped: counters.skipped,
            errors: counters.errors,
            marked_missing,
            jobs_enqueued: counters.jobs_enqueued,
        };
        info!(
            target: "scan::summary",
            library_id = %library_id,
            run_id = %run.id,
            inserted = summary.inserted,
            updated = summary.updated,
            skipped = summary.skipped,
            errors = summary.errors,
            marked_missing = summary.marked_missing,
            jobs_enqueued = summary.jobs_enqueued,
            "scan finished"
        );
        Ok(summary)
    }

    async fn reconcile_file(
        &self,
        library_id: LibraryId,
        root: &Path,
        entry: WalkEntry,
        started_at: DateTime<Utc>,
        counters: &mut RunCounters,
    ) {
        let Some(kind) = self.classifier.classify(&entry.path) else {
            counters.skipped += 1;
            return;
        };

        // Catalog paths are text; a lossy form would alias distinct files.
        let Some(rel_path) = relative_path(root, &entry.path) else {
            debug!(
                target: "scan::walk",
                path = %entry.path.display(),
                "skipping path that is not valid UTF-8"
            );
            counters.errors += 1;
            return;
        };

        let file = ObservedFile {
            library_id,
            rel_path,
            path: entry.path,
            kind,
            size_bytes: entry.len,
            mtime: entry.modified.map(to_timestamp),
        };

        let outcome = match self
            .catalog
            .upsert_item(&file, started_at, Utc::now())
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    target: "scan::upsert",
                    path = %file.path.display(),
                    error = %err,
                    "failed to upsert media item"
                );
                counters.errors += 1;
                return;
            }
        };

        if outcome.is_insert() {
            counters.inserted += 1;
        } else {
            counters.updated += 1;
        }

        for job in self.jobs_for(&outcome, kind.is_thumbnailable()) {
            match self
                .catalog
                .enqueue_job(job, outcome.item_id, Utc::now())
                .await
            {
                Ok(true) => counters.jobs_enqueued += 1,
                Ok(false) => {}
                Err(err) => warn!(
                    target: "scan::queue",
                    item_id = %outcome.item_id,
                    job = %job,
                    error = %err,
                    "failed to enqueue job"
                ),
            }
        }
    }

    fn jobs_for(&self, outcome: &UpsertOutcome, thumbnailable: bool) -> Vec<JobKind> {
        let mut jobs = Vec::with_capacity(2);
        if outcome.is_insert() {
            if thumbnailable {
                jobs.push(JobKind::Thumb);
            }
            return jobs;
        }

        let refresh = match self.rescan_policy {
            RescanJobPolicy::Always => true,
            RescanJobPolicy::OnChange => outcome.content_changed,
        };
        if refresh {
            jobs.push(JobKind::Metadata);
            if thumbnailable {
                jobs.push(JobKind::Thumb);
            }
        }
        jobs
    }
}

/// Lexically normalise a root: drop `.` segments and resolve `..`.
fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !cleaned.pop() {
                    cleaned.push(component);
                }
            }
            other => cleaned.push(other),
        }
    }
    if cleaned.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        cleaned
    }
}

/// Library-relative form of `path`, or `None` when either the absolute or
/// the relative path is not valid UTF-8.
fn relative_path(root: &Path, path: &Path) -> Option<String> {
    path.to_str()?;
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.to_str().map(str::to_owned)
}

fn to_timestamp(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time).trunc_subsecs(6)
}
