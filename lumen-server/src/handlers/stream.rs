use std::io::SeekFrom;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use httpdate::fmt_http_date;
use lumen_core::{OpenedMedia, RangeRequest};
use lumen_model::MediaItemId;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

/// GET /api/items/{id}/stream
///
/// Serves the item's bytes with single-range support.
pub async fn stream_item(
    State(state): State<AppState>,
    Path(id): Path<MediaItemId>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let OpenedMedia {
        item,
        mut file,
        len,
        modified,
    } = state.gateway().open(id).await?;

    let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let span = match RangeRequest::parse(range_header, len) {
        RangeRequest::Full => None,
        RangeRequest::Partial(span) => Some(span),
        RangeRequest::Unsatisfiable => {
            return Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::ACCEPT_RANGES, "bytes")
                .header(header::CONTENT_RANGE, format!("bytes */{len}"))
                .body(Body::empty())
                .map_err(|e| AppError::internal(format!("response build failed: {e}")));
        }
    };

    let (start, length) = match &span {
        Some(span) => (*span.start(), span.end() - span.start() + 1),
        None => (0, len),
    };
    if start > 0 {
        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|e| AppError::internal(format!("seek failed: {e}")))?;
    }
    let body = Body::from_stream(ReaderStream::new(file.take(length)));

    let content_type = mime_guess::from_path(&item.path).first_or_octet_stream();
    let mut builder = Response::builder()
        .status(if span.is_some() {
            StatusCode::PARTIAL_CONTENT
        } else {
            StatusCode::OK
        })
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, length)
        .header(
            header::CONTENT_TYPE,
            HeaderValue::from_str(content_type.as_ref()).unwrap_or(
                HeaderValue::from_static("application/octet-stream"),
            ),
        );
    if let Some(modified) = modified {
        builder = builder.header(header::LAST_MODIFIED, fmt_http_date(modified));
    }
    if let Some(span) = &span {
        builder = builder.header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{len}", span.start(), span.end()),
        );
    }

    builder
        .body(body)
        .map_err(|e| AppError::internal(format!("response build failed: {e}")))
}
