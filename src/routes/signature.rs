use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde_json::Value as JsonValue;

use crate::cloudinary::DIRECT_UPLOAD_KEYS;
use crate::error::{AppError, AppResult};
use crate::models::{AppState, SignatureRequest, SignatureResponse};

/// Sign a direct client upload.
///
/// # Errors
///
/// 400 naming every required key that is absent, null or blank;
/// 500 if no Cloudinary secret is configured.
pub async fn sign(
    State(state): State<AppState>,
    payload: Result<Json<SignatureRequest>, JsonRejection>,
) -> AppResult<Json<SignatureResponse>> {
    let Json(mut params) = payload.map_err(|e| AppError::bad_request(format!("Invalid request body: {}", e.body_text())))?;

    let missing = missing_keys(&params);
    if !missing.is_empty() {
        return Err(AppError::bad_request(format!(
            "Missing required parameters: {}",
            missing.join(", ")
        )));
    }

    if !state.assets.has_secret() {
        return Err(anyhow::anyhow!("Cloudinary API secret is not configured").into());
    }

    let [folder, public_id, timestamp, upload_preset] =
        DIRECT_UPLOAD_KEYS.map(|k| params.remove(k).unwrap_or(JsonValue::Null));

    let signature = state.assets.sign_direct_upload(
        &param_text(&folder),
        &param_text(&public_id),
        &param_text(&timestamp),
        &param_text(&upload_preset),
    );
    tracing::info!(public_id = %param_text(&public_id), "signed direct upload");

    Ok(Json(SignatureResponse {
        signature,
        timestamp,
        api_key: state.assets.api_key.clone(),
        cloud_name: state.assets.cloud_name.clone(),
        folder,
        public_id,
        upload_preset,
    }))
}

/// Required keys that are absent, null or blank, in canonical order.
#[must_use]
pub fn missing_keys(params: &SignatureRequest) -> Vec<&'static str> {
    DIRECT_UPLOAD_KEYS
        .into_iter()
        .filter(|k| params.get(*k).is_none_or(|v| param_text(v).trim().is_empty()))
        .collect()
}

/// Text form of a parameter as it enters the signed string. Strings are
/// signed exactly as received so they match what the client uploads.
#[must_use]
pub fn param_text(v: &JsonValue) -> String {
    match v {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}
