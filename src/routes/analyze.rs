use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};

use crate::cloudinary::UploadOptions;
use crate::error::{AppError, AppResult};
use crate::models::{AnalyzeRequest, AnalyzeResponse, AppState};
use crate::pipeline;

/// Host the photo, then identify, describe and write two recipes for it.
///
/// # Errors
///
/// 400 if the body is not JSON or `image` is missing or not base64,
/// 500 if the asset host rejects the upload. Inference failures never
/// surface here; they degrade to fallbacks inside the pipeline.
pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> AppResult<Json<AnalyzeResponse>> {
    let Json(req) = payload.map_err(|e| AppError::bad_request(format!("Invalid request body: {}", e.body_text())))?;

    let bytes = decode_image(req.image.as_deref())?;
    tracing::info!(bytes = bytes.len(), "image accepted");

    let opts = UploadOptions {
        folder: non_empty(req.folder).unwrap_or_else(|| state.config.upload_folder.clone()),
        public_id: non_empty(req.public_id)
            .unwrap_or_else(|| format!("dish-{}", uuid::Uuid::new_v4())),
        overwrite: true,
    };

    let image_url = state
        .assets
        .upload(&state.http, bytes, &opts)
        .await
        .map_err(|e| AppError::upstream("Image upload failed", &e))?;
    tracing::info!(image_url = %image_url, public_id = %opts.public_id, "image hosted");

    let caption = pipeline::clean_caption(req.caption.as_deref());
    Ok(Json(pipeline::analyze(&state, image_url, caption).await))
}

/// Decodes the `image` field. Accepts an optional `data:<mime>;base64,`
/// prefix and ignores embedded whitespace.
///
/// # Errors
///
/// `BadRequest` if the field is absent/blank or not valid base64.
pub fn decode_image(image: Option<&str>) -> AppResult<Vec<u8>> {
    let raw = image
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::bad_request("No image provided"))?;

    let payload = match raw.split_once(";base64,") {
        Some((head, data)) if head.starts_with("data:") => data,
        _ => raw,
    };
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    B64.decode(compact.as_bytes())
        .map_err(|e| AppError::bad_request(format!("Invalid base64 image data: {e}")))
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bad_request_msg(r: AppResult<Vec<u8>>) -> String {
        match r {
            Err(AppError::BadRequest(m)) => m,
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }

    #[test]
    fn decodes_plain_and_data_uri_payloads() {
        assert_eq!(decode_image(Some("aGVsbG8=")).unwrap(), b"hello");
        assert_eq!(
            decode_image(Some("data:image/jpeg;base64,aGVs\nbG8=")).unwrap(),
            b"hello"
        );
    }

    #[test]
    fn missing_or_blank_image_is_rejected() {
        assert_eq!(bad_request_msg(decode_image(None)), "No image provided");
        assert_eq!(bad_request_msg(decode_image(Some("  "))), "No image provided");
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let msg = bad_request_msg(decode_image(Some("not base64!!")));
        assert!(msg.starts_with("Invalid base64 image data"), "{msg}");
    }
}
