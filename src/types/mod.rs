//! Shared types for ksdb

pub mod error;

pub use error::{LedgerError, Result};
