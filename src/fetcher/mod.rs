//! Upstream search: credentials, the HTTP client and credential rotation.

mod client;
mod credentials;
mod models;
mod rotator;

pub use client::{classify_response, UpstreamClient, YouTubeSearchClient};
pub use credentials::{Credential, CredentialSet};
pub use models::{
    CredentialFailure, FetchAttempt, SearchRequest, UPSTREAM_MAX_RESULTS,
};
pub use rotator::{CredentialRotator, FailedCredential, RotationOutcome};

#[cfg(test)]
pub(crate) use rotator::tests::ScriptedUpstream;
