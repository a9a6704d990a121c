//! HTTP request handlers.

pub mod history;
pub mod images;
pub mod prompt;
pub mod prompts_api;
pub mod queue;
pub mod upload;
pub mod view;

use std::path::Path;

use axum::body::Body;
use axum::http::header::{HeaderName, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::Response;
use weft_core::error::CoreError;

use crate::error::{AppError, AppResult};

/// Serve a managed file with a download filename and optional extra
/// headers. Missing files are a 404, not an internal error.
pub(crate) async fn file_response(
    path: &Path,
    disposition_name: &str,
    extra_headers: &[(HeaderName, String)],
) -> AppResult<Response> {
    let bytes = tokio::fs::read(path).await.map_err(|_| {
        AppError::Core(CoreError::NotFound(format!(
            "file not found: {disposition_name}"
        )))
    })?;

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type_for(path))
        .header(
            CONTENT_DISPOSITION,
            format!("filename=\"{disposition_name}\""),
        );
    for (name, value) in extra_headers {
        builder = builder.header(name.clone(), value.as_str());
    }

    builder
        .body(Body::from(bytes))
        .map_err(|e| AppError::InternalError(format!("response build failed: {e}")))
}

/// Content type from the file extension; managed artifacts are images.
fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}
