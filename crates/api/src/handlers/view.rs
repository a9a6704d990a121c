//! Managed-file viewing with on-the-fly transcoding.

use axum::extract::{Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::Response;
use serde::Deserialize;

use weft_core::error::CoreError;

use crate::error::{AppError, AppResult};
use crate::files::preview::{ChannelSelect, PreviewParams};
use crate::files::{preview, DirKind};
use crate::handlers::file_response;
use crate::state::AppState;

/// Query parameters for GET /view.
#[derive(Debug, Deserialize)]
pub struct ViewParams {
    pub filename: Option<String>,
    pub subfolder: Option<String>,
    /// Managed root to read from; unknown values fall back to output.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// `<format>;<quality>` transcode request.
    pub preview: Option<String>,
    /// Channel extraction: `rgb`, `a`, or full `rgba` (default).
    pub channel: Option<String>,
}

/// GET /view
///
/// Resolve a managed file path-safely, then serve it raw, transcoded,
/// or channel-extracted.
pub async fn view_file(
    State(state): State<AppState>,
    Query(params): Query<ViewParams>,
) -> AppResult<Response> {
    let Some(filename) = params.filename.as_deref().filter(|f| !f.is_empty()) else {
        return Err(CoreError::NotFound("no filename requested".into()).into());
    };

    let kind = DirKind::parse(params.kind.as_deref(), DirKind::Output);
    let path = state
        .files
        .resolve(kind, params.subfolder.as_deref(), filename)
        .map_err(AppError::Core)?;

    let is_file = tokio::fs::metadata(&path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(CoreError::NotFound(format!("no such file: {filename}")).into());
    }

    if let Some(raw) = params.preview.as_deref() {
        let preview_params = PreviewParams::parse(raw, params.channel.as_deref());
        let channel = params.channel.clone();
        let transcode_path = path.clone();
        let (bytes, content_type) = tokio::task::spawn_blocking(move || {
            preview::transcode(&transcode_path, preview_params, channel.as_deref())
        })
        .await
        .map_err(|e| AppError::InternalError(format!("transcode task failed: {e}")))?
        .map_err(AppError::Core)?;

        return bytes_response(bytes, content_type, filename);
    }

    match ChannelSelect::parse(params.channel.as_deref()) {
        ChannelSelect::Rgba => file_response(&path, filename, &[]).await,
        ChannelSelect::Rgb => {
            let extract_path = path.clone();
            let bytes = tokio::task::spawn_blocking(move || preview::extract_rgb(&extract_path))
                .await
                .map_err(|e| AppError::InternalError(format!("extract task failed: {e}")))?
                .map_err(AppError::Core)?;
            bytes_response(bytes, "image/png", filename)
        }
        ChannelSelect::Alpha => {
            let extract_path = path.clone();
            let bytes = tokio::task::spawn_blocking(move || preview::extract_alpha(&extract_path))
                .await
                .map_err(|e| AppError::InternalError(format!("extract task failed: {e}")))?
                .map_err(AppError::Core)?;
            bytes_response(bytes, "image/png", filename)
        }
    }
}

fn bytes_response(bytes: Vec<u8>, content_type: &str, filename: &str) -> AppResult<Response> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_DISPOSITION, format!("filename=\"{filename}\""))
        .body(axum::body::Body::from(bytes))
        .map_err(|e| AppError::InternalError(format!("response build failed: {e}")))
}
