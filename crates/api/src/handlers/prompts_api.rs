//! Synchronous submission API: submit, wait, respond with the artifact.

use std::path::Path;

use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::{HeaderName, ACCEPT, CONTENT_TYPE, LOCATION};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

use weft_core::digest::payload_digest;
use weft_core::error::CoreError;
use weft_executor::Executor;

use crate::error::{AppError, AppResult};
use crate::files::DirKind;
use crate::handlers::file_response;
use crate::ingest::{self, SyncOutcome};
use crate::state::AppState;

/// Upper bound on submission bodies (matches the transport frame limit
/// for uploads).
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// POST /api/v1/prompts
///
/// Submit a job and wait for its artifact. Admission control rejects
/// over-capacity submissions up front with 429; identical content is
/// served straight from the artifact cache without a second enqueue.
pub async fn post_prompt_sync(
    State(state): State<AppState>,
    request: Request,
) -> AppResult<Response> {
    // Load-shed before reading the body: never queued-then-dropped.
    let depth = state.executor.tasks_remaining().await;
    let limit = state.config.queue_busy_threshold;
    if depth > limit {
        return Err(CoreError::Capacity { depth, limit }.into());
    }

    let wants_uri_list = request
        .headers()
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "text/uri-list")
        .unwrap_or(false);

    let payload = read_submission(&state, request).await?;

    let is_empty = payload
        .as_object()
        .map(|graph| graph.is_empty())
        .unwrap_or(true);
    if is_empty {
        return Err(AppError::BadRequest("no prompt was specified".into()));
    }

    let outcome = state.executor.validate(&payload).await;
    if !outcome.valid {
        return Err(CoreError::Validation(outcome.error_message()).into());
    }

    let digest = payload_digest(&payload);
    if let Some(artifact) = state.cache.lookup(&digest).await {
        tracing::debug!(digest = %digest, "Submission served from cache");
        return cached_response(&digest, &artifact).await;
    }

    let (completion_tx, completion_rx) = tokio::sync::oneshot::channel();
    let admitted = ingest::enqueue_validated(
        &state,
        payload,
        serde_json::Map::new(),
        None,
        false,
        Some(completion_tx),
        outcome.outputs,
    )
    .await;
    tracing::info!(job_id = %admitted.job_id, digest = %digest, "Synchronous job queued");

    // The bridge owns the completion handle: an aborted client releases
    // this handler without cancelling the job or skipping the cache
    // commit.
    let outcome_rx = ingest::spawn_completion_bridge(state.clone(), digest.clone(), completion_rx);

    match outcome_rx.await {
        Err(_) => Err(AppError::InternalError(
            "completion bridge dropped its result".into(),
        )),
        Ok(SyncOutcome::Failed(detail)) => Err(CoreError::Execution(detail).into()),
        Ok(SyncOutcome::NoContent) => Ok(StatusCode::NO_CONTENT.into_response()),
        Ok(SyncOutcome::Completed { artifact }) => {
            if wants_uri_list {
                uri_list_response(&digest, &artifact)
            } else {
                let filename = display_name(&artifact);
                file_response(&artifact, &filename, &digest_headers(&digest)).await
            }
        }
    }
}

/// GET /api/v1/prompts
///
/// The payload of the most recently completed job, 404 when history is
/// empty.
pub async fn get_latest_prompt(State(state): State<AppState>) -> AppResult<Response> {
    let history = state.executor.history(None).await;
    let entries = history
        .as_object()
        .filter(|entries| !entries.is_empty())
        .ok_or_else(|| CoreError::NotFound("history is empty".into()))?;

    let latest = entries
        .values()
        .max_by_key(|entry| entry.get("timestamp").and_then(Value::as_i64).unwrap_or(0))
        .expect("non-empty history");

    let payload = latest
        .get("prompt")
        .and_then(|prompt| prompt.get("payload"))
        .cloned()
        .unwrap_or(Value::Null);
    Ok(Json(payload).into_response())
}

// ---- request parsing ----

/// Read the submission payload: a JSON body is the graph verbatim; a
/// multipart body carries the graph as its JSON part (optionally
/// wrapped under `prompt`) plus inline file parts saved into the input
/// root, overwriting existing files.
async fn read_submission(state: &AppState, request: Request) -> AppResult<Value> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if content_type.starts_with("application/json") {
        let bytes = axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|e| AppError::BadRequest(format!("unreadable body: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| AppError::BadRequest(format!("invalid JSON body: {e}")))
    } else if content_type.starts_with("multipart/form-data") {
        read_multipart_submission(state, request).await
    } else {
        Err(AppError::BadRequest(format!(
            "unsupported content type: {content_type}"
        )))
    }
}

async fn read_multipart_submission(state: &AppState, request: Request) -> AppResult<Value> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mut payload = Value::Null;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let is_json = field.content_type() == Some("application/json");
        let filename = field.file_name().map(str::to_string);

        if is_json {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            let mut value: Value = serde_json::from_slice(&bytes)
                .map_err(|e| AppError::BadRequest(format!("invalid JSON part: {e}")))?;
            if let Some(inner) = value.get("prompt") {
                value = inner.clone();
            }
            payload = value;
        } else if let Some(filename) = filename {
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            let path = state
                .files
                .resolve(DirKind::Input, None, &filename)
                .map_err(AppError::Core)?;
            tokio::fs::write(&path, &data)
                .await
                .map_err(|e| AppError::InternalError(format!("upload write failed: {e}")))?;
            tracing::debug!(filename = %filename, "Inline upload stored");
        }
    }
    Ok(payload)
}

// ---- response shapes ----

fn digest_headers(digest: &str) -> [(HeaderName, String); 2] {
    [
        (HeaderName::from_static("digest"), format!("SHA-256={digest}")),
        (LOCATION, format!("/api/v1/images/{digest}")),
    ]
}

async fn cached_response(digest: &str, artifact: &Path) -> AppResult<Response> {
    file_response(artifact, &format!("{digest}.png"), &digest_headers(digest)).await
}

fn uri_list_response(digest: &str, artifact: &Path) -> AppResult<Response> {
    let filename = display_name(artifact);
    let body = format!("/api/v1/images/{digest}\r\n/view?filename={filename}&type=output\r\n");
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/uri-list")
        .body(axum::body::Body::from(body))
        .map_err(|e| AppError::InternalError(format!("response build failed: {e}")))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".into())
}
