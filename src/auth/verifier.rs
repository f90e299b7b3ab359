//! Identity verifiers
//!
//! A small closed set of checks that turn request credentials into an
//! [`Identity`]. Each verifier either accepts, rejects, or fails with an error;
//! "no such record" and "wrong password" are rejections, lookup failures are
//! errors.

use hyper::HeaderMap;
use std::net::SocketAddr;
use tracing::debug;

use super::address::client_address;
use super::basic::{parse_basic_auth, BasicCredentials};
use super::password::verify_password;
use super::store::IdentityStore;
use crate::types::Result;

/// Credentials extracted from a request
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Basic auth pair, when the request carried one
    pub basic: Option<BasicCredentials>,
    /// Normalized caller address
    pub address: String,
}

impl Credentials {
    /// Extract credentials from request headers and the socket peer
    pub fn from_request(headers: &HeaderMap, trusted_header: &str, peer: SocketAddr) -> Self {
        let authorization = headers
            .get(hyper::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        Self {
            basic: parse_basic_auth(authorization),
            address: client_address(headers, trusted_header, peer),
        }
    }
}

/// Resolved caller identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Caller proved a password
    User { username: String },
    /// Caller connected from an allow-listed address
    Address { address: String, name: String },
}

impl Identity {
    /// Name recorded as `ClientName` on signatures
    pub fn client_name(&self) -> &str {
        match self {
            Identity::User { username } => username,
            Identity::Address { address, .. } => address,
        }
    }
}

/// Outcome of a single verifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifierOutcome {
    Verified(Identity),
    Rejected,
}

/// Available identity checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityVerifier {
    /// Username and password from basic auth
    Password,
    /// Caller address on the allow-list
    Address,
}

impl IdentityVerifier {
    pub fn name(&self) -> &'static str {
        match self {
            IdentityVerifier::Password => "password",
            IdentityVerifier::Address => "address",
        }
    }

    /// Run this check against the identity store
    pub async fn verify(
        &self,
        store: &dyn IdentityStore,
        credentials: &Credentials,
    ) -> Result<VerifierOutcome> {
        match self {
            IdentityVerifier::Password => {
                let Some(ref basic) = credentials.basic else {
                    return Ok(VerifierOutcome::Rejected);
                };

                let Some(credential) = store.find_credential(&basic.username).await? else {
                    debug!(username = %basic.username, "No credential for user");
                    return Ok(VerifierOutcome::Rejected);
                };

                if verify_password(&basic.password, &credential.password_hash)? {
                    Ok(VerifierOutcome::Verified(Identity::User {
                        username: credential.username,
                    }))
                } else {
                    debug!(username = %basic.username, "Password mismatch");
                    Ok(VerifierOutcome::Rejected)
                }
            }
            IdentityVerifier::Address => {
                if credentials.address.is_empty() {
                    return Ok(VerifierOutcome::Rejected);
                }

                match store.find_allowed_address(&credentials.address).await? {
                    Some(entry) => Ok(VerifierOutcome::Verified(Identity::Address {
                        address: entry.address,
                        name: entry.name,
                    })),
                    None => {
                        debug!(address = %credentials.address, "Address not on allow-list");
                        Ok(VerifierOutcome::Rejected)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::InMemoryIdentityStore;

    fn credentials(user: Option<(&str, &str)>, address: &str) -> Credentials {
        Credentials {
            basic: user.map(|(u, p)| BasicCredentials {
                username: u.to_string(),
                password: p.to_string(),
            }),
            address: address.to_string(),
        }
    }

    fn store() -> InMemoryIdentityStore {
        let store = InMemoryIdentityStore::new();
        store.add_credential("alice", "wonderland").unwrap();
        store.allow_address("10.0.0.7", "build-server").unwrap();
        store
    }

    #[tokio::test]
    async fn test_password_verifier() {
        let store = store();
        let verifier = IdentityVerifier::Password;

        let ok = verifier
            .verify(&store, &credentials(Some(("alice", "wonderland")), ""))
            .await
            .unwrap();
        assert_eq!(
            ok,
            VerifierOutcome::Verified(Identity::User {
                username: "alice".into()
            })
        );

        for creds in [
            credentials(Some(("alice", "looking-glass")), ""),
            credentials(Some(("mallory", "wonderland")), ""),
            credentials(None, "10.0.0.7"),
        ] {
            assert_eq!(
                verifier.verify(&store, &creds).await.unwrap(),
                VerifierOutcome::Rejected
            );
        }
    }

    #[tokio::test]
    async fn test_address_verifier() {
        let store = store();
        let verifier = IdentityVerifier::Address;

        match verifier.verify(&store, &credentials(None, "10.0.0.7")).await.unwrap() {
            VerifierOutcome::Verified(identity) => {
                assert_eq!(identity.client_name(), "10.0.0.7");
            }
            VerifierOutcome::Rejected => panic!("allow-listed address rejected"),
        }

        assert_eq!(
            verifier.verify(&store, &credentials(None, "10.0.0.8")).await.unwrap(),
            VerifierOutcome::Rejected
        );
        assert_eq!(
            verifier.verify(&store, &credentials(None, "")).await.unwrap(),
            VerifierOutcome::Rejected
        );
    }
}
