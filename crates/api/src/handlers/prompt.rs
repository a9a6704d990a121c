//! Legacy fire-and-forget submission endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use weft_events::QueueInfo;
use weft_executor::Executor;

use crate::ingest;
use crate::state::AppState;

/// Request body for POST /prompt.
#[derive(Debug, Deserialize)]
pub struct PromptSubmission {
    pub prompt: Option<serde_json::Value>,
    /// Explicit priority; honored verbatim when present.
    pub number: Option<f64>,
    /// Request front-of-queue placement (ignored when `number` is set).
    #[serde(default)]
    pub front: bool,
    /// Side-channel metadata forwarded to the executor.
    pub extra_data: Option<serde_json::Map<String, serde_json::Value>>,
    /// Session id for progress-event correlation.
    pub client_id: Option<String>,
}

/// GET /prompt
///
/// Current queue depth, in the shape status events use.
pub async fn get_prompt_info(State(state): State<AppState>) -> Json<QueueInfo> {
    let remaining = state.executor.tasks_remaining().await;
    Json(QueueInfo::new(remaining))
}

/// POST /prompt
///
/// Validates and enqueues without waiting for the result. Responds with
/// the job id, the assigned priority, and an empty per-node error map;
/// validation failures return 400 with the populated map instead.
pub async fn post_prompt(
    State(state): State<AppState>,
    Json(submission): Json<PromptSubmission>,
) -> Response {
    let Some(payload) = submission.prompt else {
        let body = json!({"error": "no prompt", "node_errors": {}});
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    };

    let mut extra = submission.extra_data.unwrap_or_default();
    if let Some(client_id) = submission.client_id {
        extra.insert("client_id".into(), serde_json::Value::String(client_id));
    }

    match ingest::admit(
        &state,
        payload,
        extra,
        submission.number,
        submission.front,
        None,
    )
    .await
    {
        Ok(admitted) => {
            tracing::info!(job_id = %admitted.job_id, number = admitted.number, "Prompt queued");
            let body = json!({
                "prompt_id": admitted.job_id,
                "number": admitted.number,
                "node_errors": {},
            });
            Json(body).into_response()
        }
        Err(outcome) => {
            let message = outcome.error_message();
            tracing::warn!(error = %message, "Invalid prompt rejected");
            let body = json!({
                "error": message,
                "node_errors": outcome.node_errors,
            });
            (StatusCode::BAD_REQUEST, Json(body)).into_response()
        }
    }
}
