//! HTTP plumbing shared by the vendor adapters.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Response};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{Result, SwitchyardError};

/// Request timeout applied by the bundled adapters.
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SwitchyardError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Run `call` unless `cancel` fires first. Dropping the call aborts any
/// request in flight.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        _ = cancel.cancelled() => Err(SwitchyardError::Cancelled),
        result = call => result,
    }
}

/// Map a non-success response to the matching error.
pub(crate) async fn check_status(response: Response, model: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status.as_u16() {
        401 | 403 => Err(SwitchyardError::AuthenticationFailed),
        404 => Err(SwitchyardError::ModelNotFound(model.to_string())),
        429 => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(SwitchyardError::RateLimited { retry_after })
        }
        code => {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body).unwrap_or_else(|| status.to_string());
            warn!(status = code, model, %message, "vendor returned error");
            Err(SwitchyardError::Api {
                status: code,
                message,
            })
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Nested { error: ErrorDetail },
    Detail { detail: String },
    Flat { error: String },
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Pull the human-readable message out of a vendor error body.
fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody::Nested { error }) => Some(error.message),
        Ok(ErrorBody::Detail { detail }) => Some(detail),
        Ok(ErrorBody::Flat { error }) => Some(error),
        Err(_) => Some(body.chars().take(512).collect()),
    }
}
