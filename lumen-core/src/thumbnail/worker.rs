use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lumen_model::{JobKind, MediaItemId, ReadyJob};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::generator::ThumbnailGenerator;
use crate::Result;
use crate::catalog::CatalogStore;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_THUMB_DIR: &str = "/data/thumbs";

/// Locks older than this many poll intervals are considered abandoned.
pub const LOCK_TIMEOUT_POLLS: u32 = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
    pub batch_size: usize,
    /// A job that has failed this many times is deleted instead of retried.
    pub max_attempts: u32,
    /// `None` disables reclaiming jobs from crashed workers.
    pub lock_timeout: Option<Duration>,
    pub thumb_dir: PathBuf,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lock_timeout: Some(DEFAULT_POLL_INTERVAL * LOCK_TIMEOUT_POLLS),
            thumb_dir: PathBuf::from(DEFAULT_THUMB_DIR),
        }
    }
}

impl WorkerConfig {
    /// Output location for an item's thumbnail.
    pub fn thumb_path_for(&self, item_id: MediaItemId) -> PathBuf {
        self.thumb_dir.join(format!("{item_id}.jpg"))
    }

    fn reclaim_before(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.lock_timeout
            .and_then(|timeout| chrono::Duration::from_std(timeout).ok())
            .map(|timeout| now - timeout)
    }
}

/// Outcome counts of a single poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub claimed: usize,
    pub succeeded: usize,
    pub retried: usize,
    pub dropped: usize,
    /// Listed as ready but locked by someone else first.
    pub skipped: usize,
}

impl CycleReport {
    pub fn is_idle(&self) -> bool {
        self.claimed == 0 && self.skipped == 0
    }
}

/// Polls the queue for `thumb` jobs and runs them through a generator.
#[derive(Clone)]
pub struct ThumbnailWorker {
    catalog: Arc<dyn CatalogStore>,
    generator: Arc<dyn ThumbnailGenerator>,
    config: WorkerConfig,
}

impl fmt::Debug for ThumbnailWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThumbnailWorker")
            .field("generator", &self.generator)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ThumbnailWorker {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        generator: Arc<dyn ThumbnailGenerator>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            catalog,
            generator,
            config,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Poll until `shutdown` fires. A job that is mid-generation when the
    /// token fires is abandoned with its lock held; lock reclaim recovers it.
    pub async fn run(self, shutdown: CancellationToken) {
        if let Err(err) = tokio::fs::create_dir_all(&self.config.thumb_dir).await {
            warn!(
                target: "thumbnail::worker",
                dir = %self.config.thumb_dir.display(),
                error = %err,
                "failed to create thumbnail directory"
            );
        }

        let period = self.config.poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            target: "thumbnail::worker",
            poll_interval = ?period,
            batch_size = self.config.batch_size,
            "thumbnail worker started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(target: "thumbnail::worker", "thumbnail worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(report) if report.is_idle() => {}
                        Ok(report) => debug!(
                            target: "thumbnail::worker",
                            claimed = report.claimed,
                            succeeded = report.succeeded,
                            retried = report.retried,
                            dropped = report.dropped,
                            skipped = report.skipped,
                            "thumbnail cycle complete"
                        ),
                        Err(err) => error!(
                            target: "thumbnail::worker",
                            error = %err,
                            "failed to fetch thumbnail jobs"
                        ),
                    }
                }
            }
        }
    }

    /// One poll cycle: fetch up to `batch_size` claimable jobs and process
    /// each one this worker manages to lock. Only the fetch itself can fail;
    /// per-job store errors are logged and leave the job for reclaim.
    pub async fn run_once(&self) -> Result<CycleReport> {
        let reclaim_before = self.config.reclaim_before(Utc::now());
        let jobs = self
            .catalog
            .ready_jobs(JobKind::Thumb, self.config.batch_size, reclaim_before)
            .await?;

        let mut report = CycleReport::default();
        for job in jobs {
            match self
                .catalog
                .try_lock_job(job.id, Utc::now(), reclaim_before)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    report.skipped += 1;
                    continue;
                }
                Err(err) => {
                    error!(
                        target: "thumbnail::worker",
                        job_id = %job.id,
                        error = %err,
                        "failed to lock job"
                    );
                    continue;
                }
            }

            report.claimed += 1;
            self.process(job, &mut report).await;
        }
        Ok(report)
    }

    async fn process(&self, job: ReadyJob, report: &mut CycleReport) {
        let dest = self.config.thumb_path_for(job.item_id);

        let failure = match self.generator.generate(&job.path, &dest, job.kind).await {
            Ok(()) => {
                match self
                    .catalog
                    .complete_thumb_job(job.id, job.item_id, &dest)
                    .await
                {
                    Ok(()) => {
                        report.succeeded += 1;
                        debug!(
                            target: "thumbnail::worker",
                            item_id = %job.item_id,
                            thumb = %dest.display(),
                            "thumbnail generated"
                        );
                        return;
                    }
                    Err(err) => err.to_string(),
                }
            }
            Err(err) => err.to_string(),
        };

        let attempts = job.attempts.saturating_add(1);
        if attempts >= self.config.max_attempts {
            warn!(
                target: "thumbnail::worker",
                job_id = %job.id,
                item_id = %job.item_id,
                attempts,
                error = %failure,
                "thumbnail job exhausted its attempts, dropping"
            );
            match self.catalog.delete_job(job.id).await {
                Ok(()) => report.dropped += 1,
                Err(err) => error!(
                    target: "thumbnail::worker",
                    job_id = %job.id,
                    error = %err,
                    "failed to delete job"
                ),
            }
        } else {
            warn!(
                target: "thumbnail::worker",
                job_id = %job.id,
                item_id = %job.item_id,
                attempts,
                error = %failure,
                "thumbnail generation failed, will retry"
            );
            match self.catalog.release_job(job.id, attempts, &failure).await {
                Ok(()) => report.retried += 1,
                Err(err) => error!(
                    target: "thumbnail::worker",
                    job_id = %job.id,
                    error = %err,
                    "failed to release job"
                ),
            }
        }
    }
}
