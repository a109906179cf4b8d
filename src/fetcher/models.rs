use chrono::{DateTime, Utc};
use thiserror::Error;

/// Hard per-request cap imposed by the upstream search endpoint.
pub const UPSTREAM_MAX_RESULTS: u32 = 50;

/// Parameters of one upstream search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub published_after: DateTime<Utc>,
    max_results: u32,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, published_after: DateTime<Utc>, max_results: u32) -> Self {
        Self {
            query: query.into(),
            published_after,
            max_results: max_results.clamp(1, UPSTREAM_MAX_RESULTS),
        }
    }

    /// Result cap, always within `1..=UPSTREAM_MAX_RESULTS`.
    pub fn max_results(&self) -> u32 {
        self.max_results
    }
}

/// Why a single credential failed to produce a result. Every variant makes the
/// rotator move on to the next credential.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialFailure {
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("transport error: {0}")]
    TransportError(String),
    #[error("unexpected status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },
    #[error("upstream error body: {0}")]
    UpstreamErrorBody(String),
}

impl CredentialFailure {
    /// Stable label used for metrics.
    pub fn category(&self) -> &'static str {
        match self {
            CredentialFailure::QuotaExceeded(_) => "quota_exceeded",
            CredentialFailure::BadRequest(_) => "bad_request",
            CredentialFailure::TransportError(_) => "transport_error",
            CredentialFailure::UnexpectedStatus { .. } => "unexpected_status",
            CredentialFailure::UpstreamErrorBody(_) => "upstream_error_body",
        }
    }
}

/// Result of one upstream call with one credential: the raw items on success.
pub type FetchAttempt = Result<Vec<serde_json::Value>, CredentialFailure>;
