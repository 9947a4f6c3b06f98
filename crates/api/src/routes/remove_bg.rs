//! Background removal endpoint
//!
//! The metered operation. Order matters: authorize, validate, process, then
//! commit — usage is charged only after the engine demonstrably succeeded,
//! so a failed or disconnected request costs the caller nothing.

use axum::extract::{Multipart, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::config::ALLOWED_EXTENSIONS;
use crate::error::{ApiError, ApiResult};
use crate::routes::require_device_id;
use crate::state::AppState;

struct Upload {
    filename: String,
    bytes: Vec<u8>,
}

/// `POST /api/v1/remove-bg`
pub async fn remove_bg(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> ApiResult<Response> {
    let device_id = require_device_id(&headers)?.to_string();

    let decision = state.billing.gate.authorize(&device_id).await;
    if !decision.allowed {
        return Err(ApiError::QuotaExhausted {
            reset_at: decision.reset_at.unix_timestamp(),
            daily_limit: state.billing.quota.daily_limit(),
            upgrade_url: state.config.upgrade_url.clone(),
        });
    }

    let upload = read_upload(multipart, state.config.max_file_size_bytes()).await?;
    let stem = validate_filename(&upload.filename)?;

    metrics::histogram!("file_size_bytes", "tool" => clearcut_billing::tool_name())
        .record(upload.bytes.len() as f64);

    let result = state
        .engine
        .transform(upload.bytes, &upload.filename)
        .await;

    let output = match result {
        Ok(output) => {
            metrics::counter!(
                "bg_removal_total",
                "tool" => clearcut_billing::tool_name(),
                "status" => "success"
            )
            .increment(1);
            output
        }
        Err(e) => {
            metrics::counter!(
                "bg_removal_total",
                "tool" => clearcut_billing::tool_name(),
                "status" => "error"
            )
            .increment(1);
            return Err(e);
        }
    };

    // Engine succeeded; now it is safe to charge
    let remaining = state.billing.gate.commit(&device_id, decision.source).await;

    let response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=clearcut_{stem}.png"),
            ),
            (
                header::HeaderName::from_static("x-remaining-uses"),
                remaining.to_string(),
            ),
            (
                header::HeaderName::from_static("x-daily-limit"),
                state.billing.quota.daily_limit().to_string(),
            ),
        ],
        output,
    );

    Ok(response.into_response())
}

/// Pull the `file` field out of the multipart body, enforcing the size cap.
async fn read_upload(mut multipart: Multipart, max_bytes: usize) -> ApiResult<Upload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(ToString::to_string)
            .ok_or_else(|| ApiError::BadRequest("filename is required".to_string()))?;

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;

        if bytes.len() > max_bytes {
            return Err(ApiError::BadRequest(format!(
                "file too large, maximum size: {}MB",
                max_bytes / 1024 / 1024
            )));
        }

        return Ok(Upload {
            filename,
            bytes: bytes.to_vec(),
        });
    }

    Err(ApiError::BadRequest("missing file field".to_string()))
}

/// Check the extension against the allowlist; returns the filename stem used
/// for the download name.
fn validate_filename(filename: &str) -> ApiResult<&str> {
    let (stem, ext) = filename
        .rsplit_once('.')
        .ok_or_else(|| ApiError::BadRequest("filename has no extension".to_string()))?;

    let ext = ext.to_ascii_lowercase();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "file type not allowed, supported: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }

    Ok(stem)
}
