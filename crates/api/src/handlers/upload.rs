//! Image upload into the managed input root.

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::files::DirKind;
use crate::state::AppState;

/// Response for a stored upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub name: String,
    pub subfolder: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// POST /upload/image
///
/// Multipart form: `image` (the file), optional `type`, `subfolder`,
/// `overwrite`. Without `overwrite`, name collisions get a ` (N)`
/// suffix instead of clobbering the existing file.
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let mut image: Option<(String, Vec<u8>)> = None;
    let mut kind_raw: Option<String> = None;
    let mut subfolder: Option<String> = None;
    let mut overwrite = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                let filename = field.file_name().map(str::to_string);
                let Some(filename) = filename else {
                    return Err(AppError::BadRequest("image part has no filename".into()));
                };
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                image = Some((filename, data.to_vec()));
            }
            Some("type") => kind_raw = Some(read_text(field).await?),
            Some("subfolder") => subfolder = Some(read_text(field).await?),
            Some("overwrite") => {
                let value = read_text(field).await?;
                overwrite = value == "true" || value == "1";
            }
            _ => {}
        }
    }

    let Some((filename, data)) = image else {
        return Err(AppError::BadRequest("no image was uploaded".into()));
    };

    let kind = DirKind::parse(kind_raw.as_deref(), DirKind::Input);
    let resolved = state
        .files
        .resolve(kind, subfolder.as_deref(), &filename)
        .map_err(AppError::Core)?;
    let dir = resolved
        .parent()
        .ok_or_else(|| AppError::InternalError("upload path has no parent".into()))?
        .to_path_buf();

    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::InternalError(format!("create upload dir failed: {e}")))?;

    // The resolver reduced the filename to its basename; respond with
    // the name actually written.
    let base_name = resolved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or(filename);

    // Dodge collisions unless the client asked to overwrite.
    let mut name = base_name.clone();
    let mut target = resolved.clone();
    if !overwrite {
        let (stem, ext) = split_name(&base_name);
        let mut attempt = 1u32;
        while tokio::fs::try_exists(&target)
            .await
            .map_err(|e| AppError::InternalError(format!("stat failed: {e}")))?
        {
            name = format!("{stem} ({attempt}){ext}");
            target = dir.join(&name);
            attempt += 1;
        }
    }

    tokio::fs::write(&target, &data)
        .await
        .map_err(|e| AppError::InternalError(format!("upload write failed: {e}")))?;

    tracing::info!(
        name = %name,
        kind = kind.as_str(),
        bytes = data.len(),
        "Image uploaded",
    );

    Ok(Json(UploadResponse {
        name,
        subfolder: subfolder.unwrap_or_default(),
        kind: kind.as_str().to_string(),
    }))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Split `name.ext` into (`name`, `.ext`); extensionless names get an
/// empty suffix.
fn split_name(filename: &str) -> (&str, String) {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
        _ => (filename, String::new()),
    }
}
