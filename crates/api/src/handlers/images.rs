//! Cached artifact retrieval by content digest.

use axum::extract::{Path, State};
use axum::response::Response;

use weft_core::error::CoreError;

use crate::error::AppResult;
use crate::handlers::file_response;
use crate::state::AppState;

/// GET /api/v1/images/{digest}
///
/// Serve the cached artifact for a digest. Anything that is not a
/// known digest, malformed keys included, is a plain 404.
pub async fn get_image(
    State(state): State<AppState>,
    Path(digest): Path<String>,
) -> AppResult<Response> {
    let artifact = state
        .cache
        .lookup(&digest)
        .await
        .ok_or_else(|| CoreError::NotFound(format!("no cache entry for {digest}")))?;

    file_response(&artifact, &format!("{digest}.png"), &[]).await
}
