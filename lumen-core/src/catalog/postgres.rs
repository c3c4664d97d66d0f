use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lumen_model::{
    Job, JobId, JobKind, Library, LibraryId, LibraryStats, MediaItem,
    MediaItemId, ObservedFile, ReadyJob, ScanRun, ScanRunId,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use tracing::info;
use uuid::Uuid;

use super::browse::{
    FOLDER_ITEM_LIMIT, FOLDER_LIMIT, FolderListing, ItemPage, ItemQuery,
    ItemSort, escape_like,
};
use super::{
    CatalogStore, ThumbnailScope, UpsertAction, UpsertOutcome, path_str,
};
use crate::{MediaError, Result};

fn db_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> MediaError {
    move |e| MediaError::Database(format!("{context}: {e}"))
}

/// Connection pool plus schema management.
#[derive(Clone)]
pub struct PostgresDatabase {
    pool: PgPool,
    max_connections: u32,
}

impl fmt::Debug for PostgresDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresDatabase")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl PostgresDatabase {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(connection_string)
            .await
            .map_err(|e| {
                MediaError::Database(format!("Database connection failed: {e}"))
            })?;

        info!(max_connections, "database pool initialized");
        Ok(Self {
            pool,
            max_connections,
        })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        let max_connections = pool.options().get_max_connections();
        Self {
            pool,
            max_connections,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending migrations.
    pub async fn initialize_schema(&self) -> Result<()> {
        crate::MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| MediaError::Database(format!("Migration failed: {e}")))
    }

    pub fn catalog(&self) -> PostgresCatalog {
        PostgresCatalog::new(self.pool.clone())
    }
}

/// [`CatalogStore`] over the migrated PostgreSQL schema.
#[derive(Clone)]
pub struct PostgresCatalog {
    pool: PgPool,
}

impl fmt::Debug for PostgresCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresCatalog")
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

impl PostgresCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn library_from_row(row: &PgRow) -> Result<Library> {
    let roots: Vec<String> = row.try_get("roots").map_err(db_err("decode library"))?;
    Ok(Library {
        id: LibraryId(row.try_get("id").map_err(db_err("decode library"))?),
        name: row.try_get("name").map_err(db_err("decode library"))?,
        roots: roots.into_iter().map(PathBuf::from).collect(),
        created_at: row.try_get("created_at").map_err(db_err("decode library"))?,
    })
}

fn item_from_row(row: &PgRow) -> Result<MediaItem> {
    let kind: String = row.try_get("kind").map_err(db_err("decode media_item"))?;
    let path: String = row.try_get("path").map_err(db_err("decode media_item"))?;
    let size: i64 = row.try_get("size_bytes").map_err(db_err("decode media_item"))?;
    let thumb: Option<String> =
        row.try_get("thumb_path").map_err(db_err("decode media_item"))?;
    Ok(MediaItem {
        id: MediaItemId(row.try_get("id").map_err(db_err("decode media_item"))?),
        library_id: LibraryId(
            row.try_get("library_id").map_err(db_err("decode media_item"))?,
        ),
        path: PathBuf::from(path),
        rel_path: row.try_get("rel_path").map_err(db_err("decode media_item"))?,
        kind: kind.parse()?,
        present: row.try_get("present").map_err(db_err("decode media_item"))?,
        missing_since: row
            .try_get("missing_since")
            .map_err(db_err("decode media_item"))?,
        size_bytes: size.max(0) as u64,
        mtime: row.try_get("mtime").map_err(db_err("decode media_item"))?,
        last_seen_at: row
            .try_get("last_seen_at")
            .map_err(db_err("decode media_item"))?,
        thumb_path: thumb.map(PathBuf::from),
        created_at: row.try_get("created_at").map_err(db_err("decode media_item"))?,
        updated_at: row.try_get("updated_at").map_err(db_err("decode media_item"))?,
    })
}

fn job_from_row(row: &PgRow) -> Result<Job> {
    let kind: String = row.try_get("kind").map_err(db_err("decode job"))?;
    let attempts: i32 = row.try_get("attempts").map_err(db_err("decode job"))?;
    Ok(Job {
        id: JobId(row.try_get("id").map_err(db_err("decode job"))?),
        kind: kind.parse()?,
        item_id: MediaItemId(row.try_get("item_id").map_err(db_err("decode job"))?),
        run_at: row.try_get("run_at").map_err(db_err("decode job"))?,
        attempts: attempts.max(0) as u32,
        locked_at: row.try_get("locked_at").map_err(db_err("decode job"))?,
        last_error: row.try_get("last_error").map_err(db_err("decode job"))?,
    })
}

fn scan_run_from_row(row: &PgRow) -> Result<ScanRun> {
    Ok(ScanRun {
        id: ScanRunId(row.try_get("id").map_err(db_err("decode scan_run"))?),
        library_id: LibraryId(
            row.try_get("library_id").map_err(db_err("decode scan_run"))?,
        ),
        started_at: row.try_get("started_at").map_err(db_err("decode scan_run"))?,
        finished_at: row
            .try_get("finished_at")
            .map_err(db_err("decode scan_run"))?,
    })
}

const ITEM_COLUMNS: &str = "id, library_id, path, rel_path, kind, present, \
    missing_since, size_bytes, mtime, last_seen_at, thumb_path, created_at, \
    updated_at";

/// Appends the `WHERE` clause shared by the count and page queries.
fn push_item_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &ItemQuery) {
    qb.push(" WHERE present = TRUE");
    if let Some(library_id) = query.library_id {
        qb.push(" AND library_id = ");
        qb.push_bind(library_id.to_uuid());
    }
    if let Some(kind) = query.kind {
        qb.push(" AND kind = ");
        qb.push_bind(kind.as_str());
    }
    if let Some(name) = &query.name {
        qb.push(" AND rel_path ILIKE ");
        qb.push_bind(name.to_like());
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl CatalogStore for PostgresCatalog {
    async fn create_library(
        &self,
        name: &str,
        roots: &[PathBuf],
    ) -> Result<Library> {
        let roots = roots
            .iter()
            .map(|p| path_str(p).map(str::to_owned))
            .collect::<Result<Vec<String>>>()?;
        let row = sqlx::query(
            r#"
            INSERT INTO library (id, name, roots)
            VALUES ($1, $2, $3)
            RETURNING id, name, roots, created_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(name)
        .bind(&roots)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err("create library"))?;
        library_from_row(&row)
    }

    async fn get_library(&self, id: LibraryId) -> Result<Option<Library>> {
        let row = sqlx::query(
            "SELECT id, name, roots, created_at FROM library WHERE id = $1",
        )
        .bind(id.to_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("get library"))?;
        row.as_ref().map(library_from_row).transpose()
    }

    async fn list_libraries(&self) -> Result<Vec<Library>> {
        let rows = sqlx::query(
            "SELECT id, name, roots, created_at FROM library ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("list libraries"))?;
        rows.iter().map(library_from_row).collect()
    }

    async fn delete_library(&self, id: LibraryId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM library WHERE id = $1")
            .bind(id.to_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_err("delete library"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn begin_scan_run(
        &self,
        library_id: LibraryId,
        started_at: DateTime<Utc>,
    ) -> Result<ScanRun> {
        let row = sqlx::query(
            r#"
            INSERT INTO scan_run (id, library_id, started_at)
            VALUES ($1, $2, $3)
            RETURNING id, library_id, started_at, finished_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(library_id.to_uuid())
        .bind(started_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                MediaError::NotFound(format!("library {library_id}"))
            }
            _ => MediaError::Database(format!("begin scan run: {e}")),
        })?;
        scan_run_from_row(&row)
    }

    async fn finish_scan_run(
        &self,
        run_id: ScanRunId,
        finished_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE scan_run SET finished_at = $2 WHERE id = $1")
            .bind(run_id.to_uuid())
            .bind(finished_at)
            .execute(&self.pool)
            .await
            .map_err(db_err("finish scan run"))?;
        Ok(())
    }

    async fn list_scan_runs(
        &self,
        library_id: LibraryId,
    ) -> Result<Vec<ScanRun>> {
        let rows = sqlx::query(
            r#"
            SELECT id, library_id, started_at, finished_at
            FROM scan_run
            WHERE library_id = $1
            ORDER BY started_at DESC
            "#,
        )
        .bind(library_id.to_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("list scan runs"))?;
        rows.iter().map(scan_run_from_row).collect()
    }

    async fn upsert_item(
        &self,
        file: &ObservedFile,
        seen_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        // Every sub-statement sees the pre-upsert snapshot, so `prev` holds
        // the stored size/mtime even when the row is updated.
        let row = sqlx::query(
            r#"
            WITH prev AS (
                SELECT size_bytes, mtime FROM media_item WHERE path = $3
            )
            INSERT INTO media_item (
                id, library_id, path, rel_path, kind, present, missing_since,
                size_bytes, mtime, last_seen_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, TRUE, NULL, $6, $7, $8, $9, $9)
            ON CONFLICT (path) DO UPDATE SET
                library_id = EXCLUDED.library_id,
                rel_path = EXCLUDED.rel_path,
                kind = EXCLUDED.kind,
                present = TRUE,
                missing_since = NULL,
                size_bytes = EXCLUDED.size_bytes,
                mtime = EXCLUDED.mtime,
                last_seen_at = EXCLUDED.last_seen_at,
                updated_at = EXCLUDED.updated_at
            RETURNING
                id,
                (xmax = 0) AS inserted,
                COALESCE(
                    (SELECT p.size_bytes IS DISTINCT FROM $6
                         OR p.mtime IS DISTINCT FROM $7
                     FROM prev p),
                    TRUE
                ) AS changed
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(file.library_id.to_uuid())
        .bind(path_str(&file.path)?)
        .bind(&file.rel_path)
        .bind(file.kind.as_str())
        .bind(file.size_bytes as i64)
        .bind(file.mtime)
        .bind(seen_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err("upsert media_item"))?;

        let inserted: bool = row.try_get("inserted").map_err(db_err("upsert media_item"))?;
        Ok(UpsertOutcome {
            item_id: MediaItemId(row.try_get("id").map_err(db_err("upsert media_item"))?),
            action: if inserted {
                UpsertAction::Inserted
            } else {
                UpsertAction::Updated
            },
            content_changed: row
                .try_get("changed")
                .map_err(db_err("upsert media_item"))?,
        })
    }

    async fn mark_absent_before(
        &self,
        library_id: LibraryId,
        watermark: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE media_item
            SET present = FALSE,
                missing_since = COALESCE(missing_since, $2),
                updated_at = $3
            WHERE library_id = $1
              AND last_seen_at < $2
              AND present = TRUE
            "#,
        )
        .bind(library_id.to_uuid())
        .bind(watermark)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err("mark absent items"))?;
        Ok(result.rows_affected())
    }

    async fn mark_item_missing(
        &self,
        id: MediaItemId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE media_item
            SET present = FALSE,
                missing_since = COALESCE(missing_since, $2),
                updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id.to_uuid())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err("mark item missing"))?;
        Ok(())
    }

    async fn get_item(&self, id: MediaItemId) -> Result<Option<MediaItem>> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM media_item WHERE id = $1"
        ))
        .bind(id.to_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("get media_item"))?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn get_item_by_path(&self, path: &Path) -> Result<Option<MediaItem>> {
        // Nothing with a non-UTF-8 path can have been stored.
        let Ok(path) = path_str(path) else {
            return Ok(None);
        };
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM media_item WHERE path = $1"
        ))
        .bind(path)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("get media_item by path"))?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn list_items(&self, library_id: LibraryId) -> Result<Vec<MediaItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM media_item WHERE library_id = $1 ORDER BY path"
        ))
        .bind(library_id.to_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("list media_items"))?;
        rows.iter().map(item_from_row).collect()
    }

    async fn query_items(&self, query: &ItemQuery) -> Result<ItemPage> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM media_item");
        push_item_filters(&mut count, query);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db_err("count media_items"))?;

        let mut page = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ITEM_COLUMNS} FROM media_item"
        ));
        push_item_filters(&mut page, query);
        page.push(match query.sort {
            ItemSort::LastSeen => " ORDER BY last_seen_at DESC, path ASC",
            ItemSort::Name => " ORDER BY rel_path ASC, path ASC",
            ItemSort::Newest => " ORDER BY created_at DESC, path ASC",
        });
        page.push(" LIMIT ");
        page.push_bind(to_i64(query.limit));
        page.push(" OFFSET ");
        page.push_bind(to_i64(query.offset));

        let rows = page
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("query media_items"))?;
        Ok(ItemPage {
            total: total.max(0) as u64,
            items: rows.iter().map(item_from_row).collect::<Result<_>>()?,
        })
    }

    async fn list_folder(
        &self,
        library_id: LibraryId,
        prefix: &str,
    ) -> Result<FolderListing> {
        let like = format!("{}%", escape_like(prefix));
        // substr() takes an int4 character offset.
        let rest_from = i32::try_from(prefix.chars().count() + 1).unwrap_or(i32::MAX);

        let folders: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT split_part(substr(rel_path, $3), '/', 1) AS folder
            FROM media_item
            WHERE library_id = $1
              AND present = TRUE
              AND rel_path LIKE $2
              AND strpos(substr(rel_path, $3), '/') > 1
            ORDER BY folder ASC
            LIMIT $4
            "#,
        )
        .bind(library_id.to_uuid())
        .bind(&like)
        .bind(rest_from)
        .bind(to_i64(FOLDER_LIMIT))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("list folders"))?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM media_item
            WHERE library_id = $1
              AND present = TRUE
              AND rel_path LIKE $2
              AND strpos(substr(rel_path, $3), '/') = 0
            ORDER BY rel_path ASC
            LIMIT $4
            "#
        ))
        .bind(library_id.to_uuid())
        .bind(&like)
        .bind(rest_from)
        .bind(to_i64(FOLDER_ITEM_LIMIT))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("list folder items"))?;

        Ok(FolderListing {
            folders,
            items: rows.iter().map(item_from_row).collect::<Result<_>>()?,
        })
    }

    async fn enqueue_job(
        &self,
        kind: JobKind,
        item_id: MediaItemId,
        run_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO job (id, kind, item_id, run_at, attempts)
            VALUES ($1, $2, $3, $4, 0)
            ON CONFLICT (kind, item_id) DO NOTHING
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(kind.as_str())
        .bind(item_id.to_uuid())
        .bind(run_at)
        .execute(&self.pool)
        .await
        .map_err(db_err("enqueue job"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn ready_jobs(
        &self,
        kind: JobKind,
        limit: usize,
        reclaim_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<ReadyJob>> {
        let rows = sqlx::query(
            r#"
            SELECT j.id, j.item_id, j.attempts, mi.path, mi.kind
            FROM job j
            JOIN media_item mi ON mi.id = j.item_id
            WHERE j.kind = $1
              AND (j.locked_at IS NULL
                   OR ($2::timestamptz IS NOT NULL AND j.locked_at < $2))
            ORDER BY j.run_at ASC, j.id ASC
            LIMIT $3
            "#,
        )
        .bind(kind.as_str())
        .bind(reclaim_before)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("select ready jobs"))?;

        rows.iter()
            .map(|row| {
                let attempts: i32 =
                    row.try_get("attempts").map_err(db_err("decode ready job"))?;
                let path: String =
                    row.try_get("path").map_err(db_err("decode ready job"))?;
                let kind: String =
                    row.try_get("kind").map_err(db_err("decode ready job"))?;
                Ok(ReadyJob {
                    id: JobId(row.try_get("id").map_err(db_err("decode ready job"))?),
                    item_id: MediaItemId(
                        row.try_get("item_id").map_err(db_err("decode ready job"))?,
                    ),
                    attempts: attempts.max(0) as u32,
                    path: PathBuf::from(path),
                    kind: kind.parse()?,
                })
            })
            .collect()
    }

    async fn try_lock_job(
        &self,
        id: JobId,
        now: DateTime<Utc>,
        reclaim_before: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE job
            SET locked_at = $2
            WHERE id = $1
              AND (locked_at IS NULL
                   OR ($3::timestamptz IS NOT NULL AND locked_at < $3))
            "#,
        )
        .bind(id.to_uuid())
        .bind(now)
        .bind(reclaim_before)
        .execute(&self.pool)
        .await
        .map_err(db_err("lock job"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn complete_thumb_job(
        &self,
        job_id: JobId,
        item_id: MediaItemId,
        thumb_path: &Path,
    ) -> Result<()> {
        let thumb_path = path_str(thumb_path)?;
        let mut tx = self.pool.begin().await.map_err(db_err("begin tx"))?;
        sqlx::query("UPDATE media_item SET thumb_path = $2 WHERE id = $1")
            .bind(item_id.to_uuid())
            .bind(thumb_path)
            .execute(&mut *tx)
            .await
            .map_err(db_err("store thumb_path"))?;
        sqlx::query("DELETE FROM job WHERE id = $1")
            .bind(job_id.to_uuid())
            .execute(&mut *tx)
            .await
            .map_err(db_err("delete completed job"))?;
        tx.commit().await.map_err(db_err("commit tx"))?;
        Ok(())
    }

    async fn release_job(
        &self,
        id: JobId,
        attempts: u32,
        error: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE job
            SET locked_at = NULL,
                attempts = $2,
                last_error = $3
            WHERE id = $1
            "#,
        )
        .bind(id.to_uuid())
        .bind(attempts as i32)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(db_err("release job"))?;
        Ok(())
    }

    async fn delete_job(&self, id: JobId) -> Result<()> {
        sqlx::query("DELETE FROM job WHERE id = $1")
            .bind(id.to_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_err("delete job"))?;
        Ok(())
    }

    async fn jobs_for_item(&self, item_id: MediaItemId) -> Result<Vec<Job>> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, item_id, run_at, attempts, locked_at, last_error
            FROM job
            WHERE item_id = $1
            ORDER BY kind
            "#,
        )
        .bind(item_id.to_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("list jobs"))?;
        rows.iter().map(job_from_row).collect()
    }

    async fn count_unlocked_jobs(&self, kind: JobKind) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM job WHERE kind = $1 AND locked_at IS NULL",
        )
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err("count jobs"))?;
        Ok(count.max(0) as u64)
    }

    async fn library_stats(&self, library_id: LibraryId) -> Result<LibraryStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_items,
                COUNT(*) FILTER (WHERE kind = 'video') AS video_count,
                COUNT(*) FILTER (WHERE kind = 'photo') AS photo_count,
                COUNT(*) FILTER (WHERE kind = 'audio') AS audio_count,
                COUNT(*) FILTER (WHERE kind = 'other') AS other_count,
                COALESCE(SUM(size_bytes), 0)::BIGINT AS total_size,
                COUNT(*) FILTER (
                    WHERE kind IN ('video', 'photo') AND thumb_path IS NOT NULL
                ) AS thumb_count,
                COUNT(*) FILTER (
                    WHERE kind IN ('video', 'photo') AND thumb_path IS NULL
                ) AS missing_thumbs
            FROM media_item
            WHERE library_id = $1 AND present = TRUE
            "#,
        )
        .bind(library_id.to_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err("library stats"))?;

        let count = |column: &str| -> Result<u64> {
            let value: i64 = row.try_get(column).map_err(db_err("decode stats"))?;
            Ok(value.max(0) as u64)
        };
        Ok(LibraryStats {
            total_items: count("total_items")?,
            video_count: count("video_count")?,
            photo_count: count("photo_count")?,
            audio_count: count("audio_count")?,
            other_count: count("other_count")?,
            total_size: count("total_size")?,
            thumb_count: count("thumb_count")?,
            missing_thumbs: count("missing_thumbs")?,
        })
    }

    async fn reset_thumbnails(
        &self,
        library_id: LibraryId,
        scope: ThumbnailScope,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let kinds: Vec<String> = match scope {
            ThumbnailScope::PhotosAndVideos => vec!["video".into(), "photo".into()],
            ThumbnailScope::VideosOnly => vec!["video".into()],
        };

        let mut tx = self.pool.begin().await.map_err(db_err("begin tx"))?;
        let reset = sqlx::query(
            r#"
            UPDATE media_item
            SET thumb_path = NULL, updated_at = $3
            WHERE library_id = $1 AND present = TRUE AND kind = ANY($2)
            "#,
        )
        .bind(library_id.to_uuid())
        .bind(&kinds)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_err("reset thumbnails"))?
        .rows_affected();

        sqlx::query(
            r#"
            INSERT INTO job (id, kind, item_id, run_at, attempts)
            SELECT gen_random_uuid(), 'thumb', id, $3, 0
            FROM media_item
            WHERE library_id = $1 AND present = TRUE AND kind = ANY($2)
            ON CONFLICT (kind, item_id) DO NOTHING
            "#,
        )
        .bind(library_id.to_uuid())
        .bind(&kinds)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_err("enqueue thumbnail jobs"))?;

        tx.commit().await.map_err(db_err("commit tx"))?;
        Ok(reset)
    }
}
