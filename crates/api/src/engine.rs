//! Removal engine client
//!
//! The actual background removal is an opaque external capability: bytes in,
//! PNG bytes out. The engine's own latency and retry policy are its problem;
//! a failed call surfaces as 502 and the caller is never charged for it.

use std::time::Duration;

use crate::error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct RemovalEngine {
    base_url: String,
    http: reqwest::Client,
}

impl RemovalEngine {
    pub fn new(base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        Self { base_url, http }
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }

    /// Send an image to the engine and return the processed PNG bytes.
    pub async fn transform(&self, image: Vec<u8>, filename: &str) -> ApiResult<Vec<u8>> {
        if !self.is_configured() {
            return Err(ApiError::NotConfigured(
                "REMOVAL_ENGINE_URL not set".to_string(),
            ));
        }

        let part = reqwest::multipart::Part::bytes(image)
            .file_name(filename.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(format!("{}/remove", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("removal engine: {e}")))?
            .error_for_status()
            .map_err(|e| ApiError::Upstream(format!("removal engine: {e}")))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Upstream(format!("removal engine: {e}")))?;

        Ok(bytes.to_vec())
    }
}
