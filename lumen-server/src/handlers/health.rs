use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

/// GET /healthz
pub async fn health(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let libraries = state.catalog().list_libraries().await.map_err(|err| {
        AppError::service_unavailable(format!("catalog unavailable: {err}"))
    })?;

    Ok(Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "libraries": libraries.len(),
    })))
}
