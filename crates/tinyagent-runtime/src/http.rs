//! Shared HTTP plumbing for the hosted providers

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tinyagent_core::error::{AgentError, Result};

/// Longest error body echoed back in an error message
const MAX_ERROR_BODY: usize = 500;

pub(crate) fn client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AgentError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Send a request and decode a successful JSON body
pub(crate) async fn send_json<T: DeserializeOwned>(provider: &str, request: RequestBuilder) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| AgentError::ProviderUnavailable(format!("{}: {}", provider, e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AgentError::ProviderUnavailable(format!("{}: {}", provider, e)))?;

    if !status.is_success() {
        tracing::debug!(provider, status = status.as_u16(), body = %body, "Provider returned an error");
        return Err(status_error(provider, status, &body));
    }

    serde_json::from_str(&body)
        .map_err(|e| AgentError::Parse(format!("{}: invalid response body: {}", provider, e)))
}

/// Map an HTTP failure status to an agent error
pub(crate) fn status_error(provider: &str, status: StatusCode, body: &str) -> AgentError {
    let detail = format!("{} returned {}: {}", provider, status, error_detail(body));
    match status.as_u16() {
        401 | 403 => AgentError::Auth(detail),
        429 => AgentError::RateLimited(detail),
        500..=599 => AgentError::ProviderUnavailable(detail),
        _ => AgentError::Provider(detail),
    }
}

/// Pull `error.message` out of a JSON error body, else the clipped raw body
fn error_detail(body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(String::from));

    message.unwrap_or_else(|| body.trim().chars().take(MAX_ERROR_BODY).collect())
}
