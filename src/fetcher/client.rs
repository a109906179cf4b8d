//! HTTP client for the YouTube Data API v3 search endpoint.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::SecondsFormat;
use serde_json::Value;
use std::time::Duration;

use super::credentials::Credential;
use super::models::{CredentialFailure, FetchAttempt, SearchRequest};

/// Longest slice of a non-JSON error body carried into a failure message.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Issues a single search request with a single credential.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn search(&self, credential: &Credential, request: &SearchRequest) -> FetchAttempt;
}

pub struct YouTubeSearchClient {
    client: reqwest::Client,
    search_url: String,
}

impl YouTubeSearchClient {
    /// * `base_url` - API root, e.g. `https://www.googleapis.com/youtube/v3`
    /// * `timeout` - bound on each request, connection included
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let search_url = format!("{}/search", base_url.trim_end_matches('/'));

        Ok(Self { client, search_url })
    }
}

#[async_trait]
impl UpstreamClient for YouTubeSearchClient {
    async fn search(&self, credential: &Credential, request: &SearchRequest) -> FetchAttempt {
        let published_after = request
            .published_after
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let max_results = request.max_results().to_string();

        let response = self
            .client
            .get(&self.search_url)
            .query(&[
                ("part", "snippet"),
                ("q", request.query.as_str()),
                ("type", "video"),
                ("order", "date"),
                ("publishedAfter", published_after.as_str()),
                ("maxResults", max_results.as_str()),
                ("key", credential.expose()),
            ])
            .send()
            .await
            .map_err(|err| transport_failure(err, credential))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| transport_failure(err, credential))?;

        classify_response(status, &body).map_err(|failure| redact_failure(failure, credential))
    }
}

fn transport_failure(err: reqwest::Error, credential: &Credential) -> CredentialFailure {
    // The request URL carries the key as a query parameter.
    let err = err.without_url();
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else {
        credential.redact(&err.to_string())
    };
    CredentialFailure::TransportError(message)
}

fn redact_failure(failure: CredentialFailure, credential: &Credential) -> CredentialFailure {
    match failure {
        CredentialFailure::QuotaExceeded(m) => CredentialFailure::QuotaExceeded(credential.redact(&m)),
        CredentialFailure::BadRequest(m) => CredentialFailure::BadRequest(credential.redact(&m)),
        CredentialFailure::TransportError(m) => {
            CredentialFailure::TransportError(credential.redact(&m))
        }
        CredentialFailure::UnexpectedStatus { status, message } => {
            CredentialFailure::UnexpectedStatus {
                status,
                message: credential.redact(&message),
            }
        }
        CredentialFailure::UpstreamErrorBody(m) => {
            CredentialFailure::UpstreamErrorBody(credential.redact(&m))
        }
    }
}

fn error_message(body: Option<&Value>) -> Option<String> {
    let error = body?.get("error")?;
    match error.get("message").and_then(Value::as_str) {
        Some(message) => Some(message.to_string()),
        None => Some(error.to_string()),
    }
}

fn truncated(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

/// Maps an upstream HTTP status and body to either the returned items or a failure category.
///
/// Status decides first (403 quota, 400 bad request, anything else but 200 unexpected);
/// a 200 whose body is not a JSON object with an optional `items` array, or that carries
/// an `error` member, is an error body.
pub fn classify_response(status: u16, body: &str) -> FetchAttempt {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    match status {
        403 => Err(CredentialFailure::QuotaExceeded(
            error_message(parsed.as_ref()).unwrap_or_else(|| "Unknown error".to_string()),
        )),
        400 => Err(CredentialFailure::BadRequest(
            error_message(parsed.as_ref()).unwrap_or_else(|| "Bad request".to_string()),
        )),
        200 => {
            let Some(Value::Object(mut object)) = parsed else {
                return Err(CredentialFailure::UpstreamErrorBody(
                    "response body is not a JSON object".to_string(),
                ));
            };
            if let Some(error) = object.get("error") {
                let message = error
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string());
                return Err(CredentialFailure::UpstreamErrorBody(message));
            }
            match object.remove("items") {
                None | Some(Value::Null) => Ok(Vec::new()),
                Some(Value::Array(items)) => Ok(items),
                Some(_) => Err(CredentialFailure::UpstreamErrorBody(
                    "`items` is not an array".to_string(),
                )),
            }
        }
        other => Err(CredentialFailure::UnexpectedStatus {
            status: other,
            message: error_message(parsed.as_ref()).unwrap_or_else(|| truncated(body)),
        }),
    }
}
