use std::path::PathBuf;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use lumen_core::ThumbnailScope;
use lumen_model::{JobKind, Library, LibraryId, LibraryStats};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

#[derive(Debug, Deserialize)]
pub struct CreateLibraryRequest {
    pub name: String,
    pub roots: Vec<PathBuf>,
}

impl CreateLibraryRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::bad_request("library name must not be empty"));
        }
        if self.roots.is_empty() {
            return Err(AppError::bad_request(
                "library needs at least one root",
            ));
        }
        if let Some(root) = self.roots.iter().find(|root| !root.is_absolute()) {
            return Err(AppError::bad_request(format!(
                "library root must be absolute: {}",
                root.display()
            )));
        }
        Ok(())
    }
}

/// POST /api/libraries
pub async fn create_library(
    State(state): State<AppState>,
    Json(request): Json<CreateLibraryRequest>,
) -> AppResult<(StatusCode, Json<Library>)> {
    request.validate()?;
    let library = state
        .catalog()
        .create_library(request.name.trim(), &request.roots)
        .await?;
    info!(library_id = %library.id, name = %library.name, "library created");
    Ok((StatusCode::CREATED, Json(library)))
}

/// GET /api/libraries
pub async fn list_libraries(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Library>>> {
    Ok(Json(state.catalog().list_libraries().await?))
}

/// GET /api/libraries/{id}
pub async fn get_library(
    State(state): State<AppState>,
    Path(id): Path<LibraryId>,
) -> AppResult<Json<Library>> {
    let library = state
        .catalog()
        .get_library(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("library {id}")))?;
    Ok(Json(library))
}

/// DELETE /api/libraries/{id}
pub async fn delete_library(
    State(state): State<AppState>,
    Path(id): Path<LibraryId>,
) -> AppResult<StatusCode> {
    if state.scans().is_running(id) {
        return Err(AppError::conflict("a scan of this library is running"));
    }
    if state.catalog().delete_library(id).await? {
        info!(library_id = %id, "library deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("library {id}")))
    }
}

/// GET /api/libraries/{id}/stats
pub async fn library_stats(
    State(state): State<AppState>,
    Path(id): Path<LibraryId>,
) -> AppResult<Json<LibraryStats>> {
    ensure_library(&state, id).await?;
    Ok(Json(state.catalog().library_stats(id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct RegenerateQuery {
    #[serde(default)]
    pub video_only: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegenerateResponse {
    pub success: bool,
    pub items_reset: u64,
    /// Unlocked thumbnail jobs across all libraries after the reset.
    pub jobs_queued: u64,
    pub video_only: bool,
}

/// POST /api/libraries/{id}/regenerate-thumbs
pub async fn regenerate_thumbnails(
    State(state): State<AppState>,
    Path(id): Path<LibraryId>,
    Query(query): Query<RegenerateQuery>,
) -> AppResult<Json<RegenerateResponse>> {
    ensure_library(&state, id).await?;

    let scope = if query.video_only {
        ThumbnailScope::VideosOnly
    } else {
        ThumbnailScope::PhotosAndVideos
    };
    let items_reset = state
        .catalog()
        .reset_thumbnails(id, scope, Utc::now())
        .await?;
    let jobs_queued = state.catalog().count_unlocked_jobs(JobKind::Thumb).await?;

    info!(
        library_id = %id,
        items_reset,
        jobs_queued,
        video_only = query.video_only,
        "thumbnail regeneration queued"
    );
    Ok(Json(RegenerateResponse {
        success: true,
        items_reset,
        jobs_queued,
        video_only: query.video_only,
    }))
}

pub(crate) async fn ensure_library(
    state: &AppState,
    id: LibraryId,
) -> AppResult<Library> {
    state
        .catalog()
        .get_library(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("library {id}")))
}
