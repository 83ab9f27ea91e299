use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::HarvestError;

pub fn user_agent() -> String {
    format!("ligand-harvester/{}", env!("CARGO_PKG_VERSION"))
}

pub fn build_client(
    timeout: Duration,
    map_err: fn(String) -> HarvestError,
) -> Result<Client, HarvestError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&user_agent()).map_err(|err| map_err(err.to_string()))?,
    );
    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|err| map_err(err.to_string()))
}

/// Sends `request` exactly once. Failed calls are never repeated.
pub fn send(
    request: RequestBuilder,
    map_err: fn(String) -> HarvestError,
) -> Result<Response, HarvestError> {
    request.send().map_err(|err| {
        tracing::debug!(error = %err, "request failed");
        map_err(err.to_string())
    })
}

/// Statuses PubChem uses for a search job that is busy rather than broken.
pub fn is_busy_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}
