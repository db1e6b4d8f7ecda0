//! Cloudinary: signed server-side uploads and signatures for direct client uploads.

use sha1::{Digest, Sha1};
use std::{path::PathBuf, time::Duration};
use tempfile::NamedTempFile;

use crate::{config::Config, error::UpstreamError};

/// Key order of the canonical string signed for direct client uploads.
pub const DIRECT_UPLOAD_KEYS: [&str; 4] = ["folder", "public_id", "timestamp", "upload_preset"];

#[derive(Debug, Clone)]
pub struct AssetHost {
    pub base: String,
    pub cloud_name: String,
    pub api_key: String,
    api_secret: String,
    pub scratch_dir: PathBuf,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub folder: String,
    pub public_id: String,
    pub overwrite: bool,
}

/// `k1=v1&k2=v2...` in the order given.
#[must_use]
pub fn canonical_string(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Lowercase hex SHA-1 of the canonical string followed by the secret.
#[must_use]
pub fn sign(params: &[(&str, &str)], secret: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(canonical_string(params).as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

impl AssetHost {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            base: config.asset_api_url.clone(),
            cloud_name: config.cloudinary_cloud_name.clone(),
            api_key: config.cloudinary_api_key.clone(),
            api_secret: config.cloudinary_api_secret.clone(),
            scratch_dir: config.scratch_dir(),
            timeout: config.upload_timeout(),
        }
    }

    #[must_use]
    pub fn has_secret(&self) -> bool {
        !self.api_secret.is_empty()
    }

    /// Signature for a client-side upload, keys in [`DIRECT_UPLOAD_KEYS`] order.
    #[must_use]
    pub fn sign_direct_upload(
        &self,
        folder: &str,
        public_id: &str,
        timestamp: &str,
        upload_preset: &str,
    ) -> String {
        let [k_folder, k_public_id, k_timestamp, k_preset] = DIRECT_UPLOAD_KEYS;
        sign(
            &[
                (k_folder, folder),
                (k_public_id, public_id),
                (k_timestamp, timestamp),
                (k_preset, upload_preset),
            ],
            &self.api_secret,
        )
    }

    /// Uploads `bytes` and returns the hosted `secure_url`.
    ///
    /// The bytes are staged in a temp file under `scratch_dir`, which is
    /// removed when this function returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// `Unavailable` on staging, transport or non-2xx failures, `Malformed`
    /// if the reply carries no `secure_url`.
    pub async fn upload(
        &self,
        http: &reqwest::Client,
        bytes: Vec<u8>,
        opts: &UploadOptions,
    ) -> Result<String, UpstreamError> {
        let staged = self.stage(bytes).await?;
        tracing::debug!(path = %staged.path().display(), "staged upload");

        let file = tokio::fs::read(staged.path()).await?;
        self.send(http, file, opts).await
    }

    async fn stage(&self, bytes: Vec<u8>) -> Result<NamedTempFile, UpstreamError> {
        let dir = self.scratch_dir.clone();
        let staged = tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
            use std::io::Write as _;
            let mut tmp = tempfile::Builder::new()
                .prefix("dishlens-upload-")
                .tempfile_in(dir)?;
            tmp.write_all(&bytes)?;
            tmp.flush()?;
            Ok(tmp)
        })
        .await
        .map_err(|e| UpstreamError::Unavailable(format!("staging task: {e}")))??;
        Ok(staged)
    }

    async fn send(
        &self,
        http: &reqwest::Client,
        file: Vec<u8>,
        opts: &UploadOptions,
    ) -> Result<String, UpstreamError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let overwrite = opts.overwrite.to_string();

        // Cloudinary signs upload parameters in alphabetical order.
        let signature = sign(
            &[
                ("folder", opts.folder.as_str()),
                ("overwrite", overwrite.as_str()),
                ("public_id", opts.public_id.as_str()),
                ("timestamp", timestamp.as_str()),
            ],
            &self.api_secret,
        );

        let part = reqwest::multipart::Part::bytes(file).file_name(format!("{}.jpg", opts.public_id));
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", opts.folder.clone())
            .text("public_id", opts.public_id.clone())
            .text("overwrite", overwrite)
            .text("signature", signature);

        let url = format!(
            "{}/{}/image/upload",
            self.base.trim_end_matches('/'),
            self.cloud_name
        );

        let resp = http
            .post(url)
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        let body: serde_json::Value = serde_json::from_str(&text).unwrap_or_default();

        if !status.is_success() {
            let msg = body
                .pointer("/error/message")
                .and_then(|v| v.as_str())
                .map_or_else(|| text.chars().take(500).collect(), ToString::to_string);
            return Err(UpstreamError::Unavailable(format!(
                "asset host HTTP {status}: {msg}"
            )));
        }

        body.get("secure_url")
            .and_then(|v| v.as_str())
            .map(ToString::to_string)
            .ok_or_else(|| UpstreamError::Malformed("upload reply has no secure_url".into()))
    }
}
