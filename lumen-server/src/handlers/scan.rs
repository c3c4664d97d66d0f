use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use lumen_model::{LibraryId, ScanRun};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, warn};

use super::libraries::ensure_library;
use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

#[derive(Debug, Deserialize)]
pub struct ScanQuery {
    pub library_id: LibraryId,
}

/// POST /api/scan?library_id=
///
/// Starts a full scan in the background, bounded by the configured scan
/// timeout, and answers immediately.
pub async fn trigger_scan(
    State(state): State<AppState>,
    Query(ScanQuery { library_id }): Query<ScanQuery>,
) -> AppResult<(StatusCode, Json<Value>)> {
    ensure_library(&state, library_id).await?;

    let guard = state.scans().try_begin(library_id).ok_or_else(|| {
        AppError::conflict(format!("library {library_id} is already being scanned"))
    })?;
    let scanner = state.scanner().clone();
    let timeout = state.scan_timeout();

    tokio::spawn(async move {
        let _guard = guard;
        match tokio::time::timeout(timeout, scanner.scan_library(library_id)).await {
            Ok(Ok(_summary)) => {}
            Ok(Err(err)) => error!(
                target: "scan::run",
                library_id = %library_id,
                error = %err,
                "scan failed"
            ),
            Err(_) => warn!(
                target: "scan::run",
                library_id = %library_id,
                timeout = ?timeout,
                "scan timed out"
            ),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "started": true, "library_id": library_id })),
    ))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScanHistory {
    pub running: bool,
    pub runs: Vec<ScanRun>,
}

/// GET /api/libraries/{id}/scans
pub async fn scan_history(
    State(state): State<AppState>,
    Path(id): Path<LibraryId>,
) -> AppResult<Json<ScanHistory>> {
    ensure_library(&state, id).await?;
    let runs = state.catalog().list_scan_runs(id).await?;
    Ok(Json(ScanHistory {
        running: state.scans().is_running(id),
        runs,
    }))
}
