//! Signature ledger
//!
//! The store of signed hashes and the four operations served over it.

pub mod accept;
pub mod service;
pub mod store;

pub use accept::Accept;
pub use service::{decode_hash, Download, LedgerService, SignOutcome, SignRequest};
pub use store::{InMemoryLedgerStore, LedgerStore, MongoLedgerStore};

/// Hash function assumed when a request names none
pub const DEFAULT_ALGORITHM: &str = "sha256";
