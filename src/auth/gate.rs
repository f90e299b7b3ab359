//! Authentication gate
//!
//! Tries each identity verifier in order and accepts the first success.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::store::IdentityStore;
use super::verifier::{Credentials, Identity, IdentityVerifier, VerifierOutcome};
use crate::types::{LedgerError, Result};

/// OR-composition of identity verifiers
#[derive(Clone)]
pub struct AuthGate {
    store: Arc<dyn IdentityStore>,
    verifiers: Vec<IdentityVerifier>,
    /// Bound on each verifier's store lookup
    timeout: Duration,
}

impl AuthGate {
    /// Gate accepting a password or an allow-listed address
    pub fn new(store: Arc<dyn IdentityStore>, timeout: Duration) -> Self {
        Self::with_verifiers(
            store,
            vec![IdentityVerifier::Password, IdentityVerifier::Address],
            timeout,
        )
    }

    pub fn with_verifiers(
        store: Arc<dyn IdentityStore>,
        verifiers: Vec<IdentityVerifier>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            verifiers,
            timeout,
        }
    }

    /// Resolve the caller identity
    ///
    /// A verifier error or timeout aborts the whole check. When no verifier
    /// accepts, the failure does not say which ones ran.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Identity> {
        for verifier in &self.verifiers {
            let outcome = tokio::time::timeout(
                self.timeout,
                verifier.verify(self.store.as_ref(), credentials),
            )
            .await
            .map_err(|_| {
                warn!(verifier = verifier.name(), "Identity lookup timed out");
                LedgerError::Internal(format!(
                    "Identity lookup timed out after {}ms",
                    self.timeout.as_millis()
                ))
            })?;

            match outcome {
                Ok(VerifierOutcome::Verified(identity)) => {
                    debug!(
                        verifier = verifier.name(),
                        client = identity.client_name(),
                        "Caller authenticated"
                    );
                    return Ok(identity);
                }
                Ok(VerifierOutcome::Rejected) => continue,
                Err(e) => {
                    warn!(verifier = verifier.name(), error = %e, "Identity lookup failed");
                    return Err(e);
                }
            }
        }

        Err(LedgerError::Unauthorized("Authentication required".into()))
    }
}
