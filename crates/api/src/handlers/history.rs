//! Executor history inspection and management.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use weft_executor::Executor;

use crate::error::AppResult;
use crate::state::AppState;

/// Request body for POST /history.
#[derive(Debug, Deserialize)]
pub struct HistoryAction {
    /// Forget all history.
    #[serde(default)]
    pub clear: bool,
    /// Job ids to remove from history.
    #[serde(default)]
    pub delete: Vec<Uuid>,
}

/// GET /history
pub async fn get_history(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.executor.history(None).await)
}

/// GET /history/{job_id}
pub async fn get_history_item(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Json<serde_json::Value> {
    Json(state.executor.history(Some(job_id)).await)
}

/// POST /history
pub async fn post_history(
    State(state): State<AppState>,
    Json(action): Json<HistoryAction>,
) -> AppResult<StatusCode> {
    if action.clear {
        state.executor.clear_history().await;
        tracing::info!("History wiped");
    }
    for job_id in &action.delete {
        state.executor.delete_history_item(*job_id).await;
        tracing::info!(%job_id, "History item deleted");
    }
    Ok(StatusCode::OK)
}
