//! Database schemas for ksdb
//!
//! Defines MongoDB document structures for signatures, credentials and the
//! address allow-list.

mod allowed_address;
mod credential;
mod signature;

pub use allowed_address::{AllowedAddressDoc, IP_COLLECTION};
pub use credential::{CredentialDoc, USER_COLLECTION};
pub use signature::{hash_filter, SignatureDoc, SignatureRecord, SIGNATURE_COLLECTION};
