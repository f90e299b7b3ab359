//! Signing authority boundary
//!
//! The authority issues keyless signature tokens for a hash and later checks a
//! token against that hash. Its internals are opaque to the ledger.

pub mod http;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use thiserror::Error;

pub use http::HttpSigningAuthority;

/// Failure reported by the signing authority
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorityError {
    /// The authority rejected the input (malformed data, unsupported algorithm)
    #[error("{0}")]
    BadInput(String),

    #[error("{0}")]
    Other(String),
}

/// Whether an authority message describes rejected input
pub fn is_bad_input_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("bad data format") || lower.contains("unsupported hash algorithm")
}

/// Properties reported when a token verifies
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerificationProperties(pub JsonMap<String, JsonValue>);

impl VerificationProperties {
    fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// When the hash was registered
    pub fn registered_time(&self) -> Option<String> {
        self.text("registered_time")
    }

    /// Where the hash was registered
    pub fn location_name(&self) -> Option<String> {
        self.text("location_name")
    }
}

/// Client for the external signing authority
#[async_trait::async_trait]
pub trait SigningAuthority: Send + Sync {
    /// Obtain a token for a digest
    async fn sign(&self, hash: &[u8], algorithm: &str) -> Result<Vec<u8>, AuthorityError>;

    /// Check a token against a digest
    async fn verify(
        &self,
        hash: &[u8],
        algorithm: &str,
        token: &[u8],
    ) -> Result<VerificationProperties, AuthorityError>;
}

/// Authority used in dev mode when no endpoints are configured
pub struct UnconfiguredAuthority;

#[async_trait::async_trait]
impl SigningAuthority for UnconfiguredAuthority {
    async fn sign(&self, _hash: &[u8], _algorithm: &str) -> Result<Vec<u8>, AuthorityError> {
        Err(AuthorityError::Other("No signing authority configured".into()))
    }

    async fn verify(
        &self,
        _hash: &[u8],
        _algorithm: &str,
        _token: &[u8],
    ) -> Result<VerificationProperties, AuthorityError> {
        Err(AuthorityError::Other("No signing authority configured".into()))
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Authority stand-in that counts calls
    ///
    /// Tokens are `b"token:" + hash`; verification succeeds when the token
    /// matches that form.
    #[derive(Default)]
    pub struct MockAuthority {
        pub sign_calls: AtomicUsize,
        pub verify_calls: AtomicUsize,
        pub delay: Option<Duration>,
        pub sign_failure: Mutex<Option<AuthorityError>>,
        pub verify_failure: Mutex<Option<AuthorityError>>,
    }

    impl MockAuthority {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_delay(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::default()
            }
        }

        pub fn fail_sign(&self, err: AuthorityError) {
            *self.sign_failure.lock().unwrap() = Some(err);
        }

        pub fn fail_verify(&self, err: AuthorityError) {
            *self.verify_failure.lock().unwrap() = Some(err);
        }

        pub fn sign_count(&self) -> usize {
            self.sign_calls.load(Ordering::SeqCst)
        }

        pub fn verify_count(&self) -> usize {
            self.verify_calls.load(Ordering::SeqCst)
        }

        pub fn token_for(hash: &[u8]) -> Vec<u8> {
            let mut token = b"token:".to_vec();
            token.extend_from_slice(hash);
            token
        }
    }

    #[async_trait::async_trait]
    impl SigningAuthority for MockAuthority {
        async fn sign(&self, hash: &[u8], _algorithm: &str) -> Result<Vec<u8>, AuthorityError> {
            self.sign_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(err) = self.sign_failure.lock().unwrap().clone() {
                return Err(err);
            }
            Ok(Self::token_for(hash))
        }

        async fn verify(
            &self,
            hash: &[u8],
            _algorithm: &str,
            token: &[u8],
        ) -> Result<VerificationProperties, AuthorityError> {
            self.verify_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(err) = self.verify_failure.lock().unwrap().clone() {
                return Err(err);
            }
            if token != Self::token_for(hash).as_slice() {
                return Err(AuthorityError::Other("Token does not match hash".into()));
            }

            let mut props = JsonMap::new();
            props.insert("registered_time".into(), "2024-05-01T12:00:00Z".into());
            props.insert("location_name".into(), "GT : EE : Tallinn".into());
            props.insert("location_id".into(), JsonValue::from(33u64));
            Ok(VerificationProperties(props))
        }
    }
}
