use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::client::UpstreamClient;
use super::credentials::CredentialSet;
use super::models::{CredentialFailure, SearchRequest};
use crate::server::metrics;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedCredential {
    pub fingerprint: String,
    pub failure: CredentialFailure,
}

#[derive(Debug)]
pub enum RotationOutcome {
    Fetched {
        items: Vec<Value>,
        /// Position of the credential that succeeded.
        credential_index: usize,
        /// Credentials tried before the successful one.
        failures: Vec<FailedCredential>,
    },
    /// No credential produced a usable response this cycle.
    AllFailed { failures: Vec<FailedCredential> },
    /// Shutdown was requested before any credential succeeded; remaining ones were not tried.
    Interrupted { failures: Vec<FailedCredential> },
}

/// Tries each credential in configured order and stops at the first success.
pub struct CredentialRotator {
    credentials: CredentialSet,
    client: Arc<dyn UpstreamClient>,
}

impl CredentialRotator {
    pub fn new(credentials: CredentialSet, client: Arc<dyn UpstreamClient>) -> Self {
        Self {
            credentials,
            client,
        }
    }

    pub fn credentials_count(&self) -> usize {
        self.credentials.len()
    }

    /// Tries credentials in order until one succeeds. `shutdown` is checked between
    /// attempts; a call already in flight is not interrupted.
    pub async fn fetch(
        &self,
        request: &SearchRequest,
        shutdown: &CancellationToken,
    ) -> RotationOutcome {
        let mut failures = Vec::new();

        for (index, credential) in self.credentials.iter().enumerate() {
            if shutdown.is_cancelled() {
                debug!(
                    "Shutdown requested, skipping {} remaining credential(s)",
                    self.credentials.len() - index
                );
                return RotationOutcome::Interrupted { failures };
            }
            match self.client.search(credential, request).await {
                Ok(items) => {
                    debug!(
                        "Fetched {} items with credential {} ({}/{})",
                        items.len(),
                        credential.fingerprint(),
                        index + 1,
                        self.credentials.len()
                    );
                    return RotationOutcome::Fetched {
                        items,
                        credential_index: index,
                        failures,
                    };
                }
                Err(failure) => {
                    warn!(
                        "Credential {} failed ({}): {}",
                        credential.fingerprint(),
                        failure.category(),
                        failure
                    );
                    metrics::record_credential_failure(failure.category());
                    failures.push(FailedCredential {
                        fingerprint: credential.fingerprint(),
                        failure,
                    });
                }
            }
        }

        RotationOutcome::AllFailed { failures }
    }
}
