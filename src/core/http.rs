//! HTTP client utilities for the upstream listing endpoints.
//!
//! Listing calls never fail as a whole: every request resolves to a
//! [`JsonResponse`] that records the status, the parsed body, or the best
//! error text available.

use std::time::Duration;

use reqwest::{Client, ClientBuilder, RequestBuilder};
use serde_json::Value;

use crate::error::{ProxydashError, Result};

/// Longest raw body excerpt kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Build a configured HTTP client.
///
/// # Errors
///
/// Returns error if client construction fails.
pub fn build_client(timeout: Duration) -> Result<Client> {
    ClientBuilder::new()
        .timeout(timeout)
        .user_agent(format!("proxydash/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProxydashError::Network(e.to_string()))
}

/// Attach the proxy key in both header styles the upstream accepts.
#[must_use]
pub fn with_api_key(request: RequestBuilder, api_key: Option<&str>) -> RequestBuilder {
    match api_key.map(str::trim).filter(|key| !key.is_empty()) {
        Some(key) => request.bearer_auth(key).header("x-goog-api-key", key),
        None => request,
    }
}

/// Outcome of one GET.
#[derive(Debug, Clone, Default)]
pub struct JsonResponse {
    pub status: Option<u16>,
    pub body: Option<Value>,
    pub error: Option<String>,
    pub timed_out: bool,
}

impl JsonResponse {
    #[must_use]
    pub const fn ok(&self) -> bool {
        self.error.is_none() && self.body.is_some()
    }

    fn failed(status: Option<u16>, error: String, timed_out: bool) -> Self {
        Self {
            status,
            body: None,
            error: Some(error),
            timed_out,
        }
    }
}

/// GET `url` and parse a JSON body.
pub async fn get_json(client: &Client, url: &str, api_key: Option<&str>) -> JsonResponse {
    let response = match with_api_key(client.get(url), api_key).send().await {
        Ok(response) => response,
        Err(e) => {
            let timed_out = e.is_timeout();
            tracing::debug!(url, error = %e, timed_out, "listing request failed");
            let message = if timed_out {
                "request timed out".to_string()
            } else {
                e.to_string()
            };
            return JsonResponse::failed(None, message, timed_out);
        }
    };

    let status = response.status();
    let code = status.as_u16();
    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => return JsonResponse::failed(Some(code), e.to_string(), e.is_timeout()),
    };

    if !status.is_success() {
        tracing::debug!(url, status = code, "listing endpoint returned an error status");
        return JsonResponse::failed(Some(code), error_message(&text, code), false);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(body) => JsonResponse {
            status: Some(code),
            body: Some(body),
            error: None,
            timed_out: false,
        },
        Err(e) => JsonResponse::failed(Some(code), format!("invalid JSON: {e}"), false),
    }
}

/// Best human-readable error text for a failed response.
///
/// Prefers `error.message`, then a string `error`, then the raw body
/// (truncated), then a generic status message.
#[must_use]
pub fn error_message(body: &str, status: u16) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let structured = value
            .pointer("/error/message")
            .and_then(Value::as_str)
            .or_else(|| value.get("error").and_then(Value::as_str))
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if let Some(message) = structured {
            return message.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return format!("unexpected status {status}");
    }
    if trimmed.chars().count() > MAX_ERROR_BODY_CHARS {
        let excerpt: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{excerpt}...")
    } else {
        trimmed.to_string()
    }
}
