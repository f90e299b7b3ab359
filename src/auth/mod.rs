//! Caller authentication
//!
//! Credentials are extracted from the request, checked by a fixed set of
//! identity verifiers, and combined by [`AuthGate`] with OR semantics.

pub mod address;
pub mod basic;
pub mod gate;
pub mod password;
pub mod store;
pub mod verifier;

pub use address::{client_address, normalize_address};
pub use basic::{parse_basic_auth, BasicCredentials};
pub use gate::AuthGate;
pub use password::{hash_password, verify_password};
pub use store::{IdentityStore, InMemoryIdentityStore, MongoIdentityStore};
pub use verifier::{Credentials, Identity, IdentityVerifier, VerifierOutcome};
