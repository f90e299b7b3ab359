//! ksdb - keyless signature ledger
//!
//! Clients submit a content hash; the ledger obtains a timestamp token for it
//! from an external signing authority, stores the token once per hash, and
//! serves it back for verification and download.
//!
//! ## Components
//!
//! - **Authority**: client for the external signing authority
//! - **Ledger**: signature store and the sign, verify, download, and params operations
//! - **Auth**: password and address-allow-list verifiers behind a single gate
//! - **Schema**: configured mapping of request parameters onto stored fields

pub mod auth;
pub mod authority;
pub mod config;
pub mod db;
pub mod ledger;
pub mod routes;
pub mod schema;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{LedgerError, Result};
