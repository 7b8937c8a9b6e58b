use std::time::Duration;

use reqwest::{Client, Response, StatusCode};

use remora_traits::BackendError;

/// Request timeout for a single remote call
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn build_client() -> Result<Client, BackendError> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| BackendError::unavailable(format!("Failed to build HTTP client: {}", e)))
}

pub(crate) fn transport_error(err: reqwest::Error) -> BackendError {
    BackendError::io(err.to_string())
}

/// Turns a non-2xx answer into `BackendError::Rejected`, keeping the body for diagnostics.
pub(crate) async fn ensure_success(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::rejected(status.as_u16(), body))
}

pub(crate) fn is_not_found(response: &Response) -> bool {
    response.status() == StatusCode::NOT_FOUND
}
