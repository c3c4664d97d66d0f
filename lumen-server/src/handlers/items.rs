use axum::{
    Json,
    extract::{Path, State},
};
use lumen_model::{MediaItem, MediaItemId};

use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

/// GET /api/items/{id}
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<MediaItemId>,
) -> AppResult<Json<MediaItem>> {
    state
        .catalog()
        .get_item(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("media item {id}")))
}
