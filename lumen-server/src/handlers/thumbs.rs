use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::Response,
};
use httpdate::{HttpDate, fmt_http_date, parse_http_date};
use lumen_model::MediaItemId;
use tokio_util::io::ReaderStream;

use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

// Regeneration rewrites the same path, so thumbnails are not immutable.
const THUMB_CACHE_CONTROL: &str = "public, max-age=3600";

/// GET /api/items/{id}/thumb
pub async fn item_thumbnail(
    State(state): State<AppState>,
    Path(id): Path<MediaItemId>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let item = state
        .catalog()
        .get_item(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("media item {id}")))?;
    let path = item
        .thumb_path
        .ok_or_else(|| AppError::not_found("thumbnail not generated yet"))?;

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| AppError::not_found("thumbnail file missing"))?;
    let meta = file
        .metadata()
        .await
        .map_err(|e| AppError::internal(format!("thumbnail metadata: {e}")))?;
    let modified = meta.modified().ok();

    if let Some(modified) = modified
        && let Some(since) = headers
            .get(header::IF_MODIFIED_SINCE)
            .and_then(|v| v.to_str().ok())
        && let Ok(since) = parse_http_date(since)
        && HttpDate::from(modified) <= HttpDate::from(since)
    {
        return Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .header(header::LAST_MODIFIED, fmt_http_date(modified))
            .header(header::CACHE_CONTROL, THUMB_CACHE_CONTROL)
            .body(Body::empty())
            .map_err(|e| AppError::internal(format!("response build failed: {e}")));
    }

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/jpeg")
        .header(header::CONTENT_LENGTH, meta.len())
        .header(header::CACHE_CONTROL, THUMB_CACHE_CONTROL);
    if let Some(modified) = modified {
        builder = builder.header(header::LAST_MODIFIED, fmt_http_date(modified));
    }

    builder
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::internal(format!("response build failed: {e}")))
}
