//! Database layer for ksdb
//!
//! Provides MongoDB storage for signature records and caller identities.

pub mod mongo;
pub mod schemas;

pub use mongo::{InsertOutcome, MongoClient, MongoCollection};
pub use schemas::{AllowedAddressDoc, CredentialDoc, SignatureDoc, SignatureRecord};
