#![cfg(feature = "postgres-tests")]

use std::path::{Path, PathBuf};

use chrono::{Duration, SubsecRound, Utc};
use lumen_core::{CatalogStore, PostgresCatalog, ThumbnailScope, UpsertAction};
use lumen_model::{JobKind, MediaKind, ObservedFile};
use sqlx::PgPool;

fn observed(library_id: lumen_model::LibraryId, path: &str, size: u64) -> ObservedFile {
    ObservedFile {
        library_id,
        path: PathBuf::from(path),
        rel_path: path.trim_start_matches("/media/").to_string(),
        kind: MediaKind::Photo,
        size_bytes: size,
        mtime: None,
    }
}

fn now() -> chrono::DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[sqlx::test(migrator = "lumen_core::MIGRATOR")]
async fn upsert_reports_insert_then_update(pool: PgPool) -> anyhow::Result<()> {
    let catalog = PostgresCatalog::new(pool);
    let library = catalog
        .create_library("photos", &[PathBuf::from("/media")])
        .await?;

    let first = catalog
        .upsert_item(&observed(library.id, "/media/a.jpg", 10), now(), now())
        .await?;
    assert_eq!(first.action, UpsertAction::Inserted);
    assert!(first.content_changed);

    let same = catalog
        .upsert_item(&observed(library.id, "/media/a.jpg", 10), now(), now())
        .await?;
    assert_eq!(same.action, UpsertAction::Updated);
    assert_eq!(same.item_id, first.item_id);
    assert!(!same.content_changed);

    let grown = catalog
        .upsert_item(&observed(library.id, "/media/a.jpg", 20), now(), now())
        .await?;
    assert!(grown.content_changed);
    Ok(())
}

#[sqlx::test(migrator = "lumen_core::MIGRATOR")]
async fn absent_marking_keeps_first_watermark(pool: PgPool) -> anyhow::Result<()> {
    let catalog = PostgresCatalog::new(pool);
    let library = catalog
        .create_library("photos", &[PathBuf::from("/media")])
        .await?;
    let seen = now();
    catalog
        .upsert_item(&observed(library.id, "/media/a.jpg", 10), seen, seen)
        .await?;

    let first = seen + Duration::seconds(1);
    assert_eq!(catalog.mark_absent_before(library.id, first, first).await?, 1);
    let second = seen + Duration::seconds(2);
    assert_eq!(catalog.mark_absent_before(library.id, second, second).await?, 0);

    let item = catalog
        .get_item_by_path(Path::new("/media/a.jpg"))
        .await?
        .expect("item");
    assert!(!item.present);
    assert_eq!(item.missing_since, Some(first));
    Ok(())
}

#[sqlx::test(migrator = "lumen_core::MIGRATOR")]
async fn job_lock_is_exclusive_and_reclaimable(pool: PgPool) -> anyhow::Result<()> {
    let catalog = PostgresCatalog::new(pool);
    let library = catalog
        .create_library("photos", &[PathBuf::from("/media")])
        .await?;
    let outcome = catalog
        .upsert_item(&observed(library.id, "/media/a.jpg", 10), now(), now())
        .await?;
    assert!(catalog.enqueue_job(JobKind::Thumb, outcome.item_id, now()).await?);
    assert!(!catalog.enqueue_job(JobKind::Thumb, outcome.item_id, now()).await?);

    let ready = catalog.ready_jobs(JobKind::Thumb, 10, None).await?;
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].path, PathBuf::from("/media/a.jpg"));
    let job_id = ready[0].id;

    let locked_at = now() - Duration::minutes(10);
    assert!(catalog.try_lock_job(job_id, locked_at, None).await?);
    assert!(!catalog.try_lock_job(job_id, now(), None).await?);
    assert!(catalog.ready_jobs(JobKind::Thumb, 10, None).await?.is_empty());

    let cutoff = Some(now() - Duration::minutes(1));
    assert_eq!(catalog.ready_jobs(JobKind::Thumb, 10, cutoff).await?.len(), 1);
    assert!(catalog.try_lock_job(job_id, now(), cutoff).await?);

    catalog.release_job(job_id, 1, "boom").await?;
    let jobs = catalog.jobs_for_item(outcome.item_id).await?;
    assert_eq!(jobs[0].attempts, 1);
    assert_eq!(jobs[0].last_error.as_deref(), Some("boom"));
    assert!(jobs[0].locked_at.is_none());

    catalog
        .complete_thumb_job(job_id, outcome.item_id, Path::new("/thumbs/a.jpg"))
        .await?;
    assert!(catalog.jobs_for_item(outcome.item_id).await?.is_empty());
    let item = catalog.get_item(outcome.item_id).await?.expect("item");
    assert_eq!(item.thumb_path, Some(PathBuf::from("/thumbs/a.jpg")));
    Ok(())
}

#[sqlx::test(migrator = "lumen_core::MIGRATOR")]
async fn stats_and_regeneration(pool: PgPool) -> anyhow::Result<()> {
    let catalog = PostgresCatalog::new(pool);
    let library = catalog
        .create_library("mixed", &[PathBuf::from("/media")])
        .await?;
    let photo = catalog
        .upsert_item(&observed(library.id, "/media/a.jpg", 10), now(), now())
        .await?;
    let mut video = observed(library.id, "/media/b.mp4", 30);
    video.kind = MediaKind::Video;
    catalog.upsert_item(&video, now(), now()).await?;

    catalog.enqueue_job(JobKind::Thumb, photo.item_id, now()).await?;
    catalog
        .complete_thumb_job(
            catalog.jobs_for_item(photo.item_id).await?[0].id,
            photo.item_id,
            Path::new("/thumbs/a.jpg"),
        )
        .await?;

    let stats = catalog.library_stats(library.id).await?;
    assert_eq!(stats.total_items, 2);
    assert_eq!(stats.photo_count, 1);
    assert_eq!(stats.video_count, 1);
    assert_eq!(stats.total_size, 40);
    assert_eq!(stats.thumb_count, 1);
    assert_eq!(stats.missing_thumbs, 1);

    let reset = catalog
        .reset_thumbnails(library.id, ThumbnailScope::PhotosAndVideos, now())
        .await?;
    assert_eq!(reset, 2);
    assert_eq!(catalog.count_unlocked_jobs(JobKind::Thumb).await?, 2);
    assert_eq!(catalog.library_stats(library.id).await?.thumb_count, 0);
    Ok(())
}

#[sqlx::test(migrator = "lumen_core::MIGRATOR")]
async fn deleting_a_library_cascades(pool: PgPool) -> anyhow::Result<()> {
    let catalog = PostgresCatalog::new(pool);
    let library = catalog
        .create_library("doomed", &[PathBuf::from("/media")])
        .await?;
    let run = catalog.begin_scan_run(library.id, now()).await?;
    catalog.finish_scan_run(run.id, now()).await?;
    let outcome = catalog
        .upsert_item(&observed(library.id, "/media/a.jpg", 10), now(), now())
        .await?;
    catalog.enqueue_job(JobKind::Thumb, outcome.item_id, now()).await?;

    assert!(catalog.delete_library(library.id).await?);
    assert!(!catalog.delete_library(library.id).await?);
    assert!(catalog.get_item(outcome.item_id).await?.is_none());
    assert_eq!(catalog.count_unlocked_jobs(JobKind::Thumb).await?, 0);
    assert!(catalog.list_scan_runs(library.id).await?.is_empty());

    let err = catalog.begin_scan_run(library.id, now()).await.unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[sqlx::test(migrator = "lumen_core::MIGRATOR")]
async fn browse_queries_match_in_memory_semantics(pool: PgPool) -> anyhow::Result<()> {
    use lumen_core::{ItemQuery, ItemSort, NamePattern, folder_prefix};

    let catalog = PostgresCatalog::new(pool);
    let library = catalog
        .create_library("photos", &[PathBuf::from("/media")])
        .await?;
    let base = now();
    for (i, path) in [
        "/media/b.jpg",
        "/media/2024/beach_%.jpg",
        "/media/2024/june/c.jpg",
    ]
    .into_iter()
    .enumerate()
    {
        let at = base + Duration::seconds(i as i64);
        catalog
            .upsert_item(&observed(library.id, path, 1), at, at)
            .await?;
    }

    let page = catalog
        .query_items(&ItemQuery {
            library_id: Some(library.id),
            limit: 2,
            ..ItemQuery::default()
        })
        .await?;
    assert_eq!(page.total, 3);
    assert_eq!(page.items[0].rel_path, "2024/june/c.jpg");

    // `%` in the search text is literal, not a wildcard.
    let literal = catalog
        .query_items(&ItemQuery {
            name: NamePattern::parse("H_%"),
            sort: ItemSort::Name,
            limit: 50,
            ..ItemQuery::default()
        })
        .await?;
    assert_eq!(literal.items.len(), 1);
    assert_eq!(literal.items[0].rel_path, "2024/beach_%.jpg");

    let root = catalog.list_folder(library.id, &folder_prefix("")).await?;
    assert_eq!(root.folders, ["2024"]);
    assert_eq!(root.items.len(), 1);
    let year = catalog.list_folder(library.id, &folder_prefix("/2024")).await?;
    assert_eq!(year.folders, ["june"]);
    assert_eq!(year.items[0].rel_path, "2024/beach_%.jpg");
    Ok(())
}

#[cfg(unix)]
#[sqlx::test(migrator = "lumen_core::MIGRATOR")]
async fn non_utf8_paths_are_rejected_not_aliased(pool: PgPool) -> anyhow::Result<()> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let catalog = PostgresCatalog::new(pool);
    let library = catalog
        .create_library("photos", &[PathBuf::from("/media")])
        .await?;
    for raw in [&b"/media/\xff.jpg"[..], &b"/media/\xfe.jpg"[..]] {
        let mut file = observed(library.id, "/media/x.jpg", 1);
        file.path = PathBuf::from(OsStr::from_bytes(raw));
        let err = catalog.upsert_item(&file, now(), now()).await.unwrap_err();
        assert!(matches!(err, lumen_core::MediaError::InvalidMedia(_)));
    }
    assert!(catalog.list_items(library.id).await?.is_empty());
    assert!(
        catalog
            .get_item_by_path(Path::new(OsStr::from_bytes(b"/media/\xff.jpg")))
            .await?
            .is_none()
    );
    Ok(())
}
