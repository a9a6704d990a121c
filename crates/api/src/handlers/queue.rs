//! Executor queue inspection and management.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use weft_executor::{Executor, QueueSnapshot};

use crate::error::AppResult;
use crate::state::AppState;

/// Response for GET /queue.
#[derive(Debug, Serialize)]
pub struct QueueStatusResponse {
    pub queue_running: Vec<QueueSnapshot>,
    pub queue_pending: Vec<QueueSnapshot>,
}

/// Request body for POST /queue.
#[derive(Debug, Deserialize)]
pub struct QueueAction {
    /// Wipe all pending entries.
    #[serde(default)]
    pub clear: bool,
    /// Job ids to delete from the pending queue.
    #[serde(default)]
    pub delete: Vec<Uuid>,
}

/// GET /queue
pub async fn get_queue(State(state): State<AppState>) -> Json<QueueStatusResponse> {
    let (queue_running, queue_pending) = state.executor.current_queue().await;
    Json(QueueStatusResponse {
        queue_running,
        queue_pending,
    })
}

/// POST /queue
pub async fn post_queue(
    State(state): State<AppState>,
    Json(action): Json<QueueAction>,
) -> AppResult<StatusCode> {
    if action.clear {
        state.executor.clear_queue().await;
        tracing::info!("Queue wiped");
    }
    for job_id in &action.delete {
        let removed = state.executor.delete_queue_item(*job_id).await;
        tracing::info!(%job_id, removed, "Queue item delete requested");
    }

    if action.clear || !action.delete.is_empty() {
        state.queue_updated().await;
    }
    Ok(StatusCode::OK)
}
