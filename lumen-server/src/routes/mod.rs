use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers::{browse, items, libraries, scan, stream, thumbs};
use crate::infra::app_state::AppState;

/// Routes mounted under `/api`.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route(
            "/libraries",
            post(libraries::create_library).get(libraries::list_libraries),
        )
        .route(
            "/libraries/{id}",
            get(libraries::get_library).delete(libraries::delete_library),
        )
        .route("/libraries/{id}/stats", get(libraries::library_stats))
        .route(
            "/libraries/{id}/regenerate-thumbs",
            post(libraries::regenerate_thumbnails),
        )
        .route("/libraries/{id}/scans", get(scan::scan_history))
        .route("/scan", post(scan::trigger_scan))
        .route("/items", get(browse::list_items))
        .route("/folders", get(browse::list_folder))
        .route("/search", get(browse::search))
        .route("/recent", get(browse::recent_items))
        .route("/items/{id}", get(items::get_item))
        .route("/items/{id}/stream", get(stream::stream_item))
        .route("/items/{id}/thumb", get(thumbs::item_thumbnail))
}
