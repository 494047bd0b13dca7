use axum::{
    Extension, Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use souq_types::api::{Claims, UploadResponse};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// 10 MB cap for avatar and portfolio images.
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Lowercased extension of the uploaded filename, if it is one we serve.
pub(crate) fn allowed_extension(filename: &str) -> Option<String> {
    let ext = filename.rsplit_once('.')?.1.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// POST /upload — single `file` multipart part, written to the upload
/// directory under a fresh UUID so client filenames never touch disk.
pub async fn upload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .ok_or(ApiError::Validation("Missing filename".into()))?
            .to_string();
        let ext = allowed_extension(&filename)
            .ok_or(ApiError::Validation("Unsupported file type".into()))?;

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(format!("Upload read failed: {e}")))?;
        if data.is_empty() {
            return Err(ApiError::Validation("Empty file".into()));
        }
        if data.len() > MAX_UPLOAD_SIZE {
            return Err(ApiError::Validation("File exceeds the 10 MB limit".into()));
        }

        let stored_name = format!("{}.{}", Uuid::new_v4(), ext);
        tokio::fs::create_dir_all(&state.upload_dir)
            .await
            .map_err(|e| anyhow::anyhow!("upload dir create failed: {}", e))?;
        let path = state.upload_dir.join(&stored_name);
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| anyhow::anyhow!("upload write failed: {}", e))?;

        info!("User {} uploaded {} ({} bytes)", claims.sub, stored_name, data.len());
        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse { url: format!("/uploads/{stored_name}") }),
        ));
    }

    Err(ApiError::Validation("Missing `file` part".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_allow_list() {
        assert_eq!(allowed_extension("photo.JPG").as_deref(), Some("jpg"));
        assert_eq!(allowed_extension("reel.webp").as_deref(), Some("webp"));
        assert!(allowed_extension("script.sh").is_none());
        assert!(allowed_extension("noextension").is_none());
        // Only the final extension counts
        assert!(allowed_extension("double.png.exe").is_none());
    }
}
