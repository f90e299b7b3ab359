//! Configuration for ksdb
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::db::schemas::{IP_COLLECTION, SIGNATURE_COLLECTION, USER_COLLECTION};
use crate::schema::ParamSchema;
use crate::types::LedgerError;

/// ksdb - keyless signature ledger
#[derive(Parser, Debug, Clone)]
#[command(name = "ksdb")]
#[command(about = "Hash timestamping ledger backed by a keyless signing authority")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (in-memory stores when MongoDB is unreachable)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "ksdb")]
    pub mongodb_db: String,

    /// Collection holding signature records
    #[arg(long, env = "LEDGER_COLLECTION", default_value = SIGNATURE_COLLECTION)]
    pub ledger_collection: String,

    /// Collection holding password credentials
    #[arg(long, env = "USER_COLLECTION", default_value = USER_COLLECTION)]
    pub user_collection: String,

    /// Collection holding the address allow-list
    #[arg(long, env = "IP_COLLECTION", default_value = IP_COLLECTION)]
    pub ip_collection: String,

    /// Signing authority endpoint used to sign hashes
    #[arg(long, env = "SIGNER_URL")]
    pub signer_url: Option<String>,

    /// Signing authority endpoint used to verify tokens
    #[arg(long, env = "VERIFIER_URL")]
    pub verifier_url: Option<String>,

    /// Parameter schema as inline JSON (takes precedence over PARAM_SCHEMA_FILE)
    #[arg(long, env = "PARAM_SCHEMA")]
    pub param_schema: Option<String>,

    /// Path to a JSON file holding the parameter schema
    #[arg(long, env = "PARAM_SCHEMA_FILE")]
    pub param_schema_file: Option<PathBuf>,

    /// Header set by a trusted reverse proxy carrying the caller address
    #[arg(long, env = "TRUSTED_PROXY_HEADER", default_value = "x-real-ip")]
    pub trusted_proxy_header: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Timeout for each signing authority and database call, in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,
}

impl Args {
    /// Timeout applied to collaborator calls
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Load and validate the parameter schema
    ///
    /// Inline JSON wins over the file; with neither set the schema is empty.
    pub fn load_param_schema(&self) -> Result<ParamSchema, LedgerError> {
        if let Some(ref inline) = self.param_schema {
            return ParamSchema::from_json(inline);
        }

        match self.param_schema_file {
            Some(ref path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    LedgerError::Config(format!(
                        "Failed to read parameter schema {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                ParamSchema::from_json(&raw)
            }
            None => Ok(ParamSchema::default()),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            if self.signer_url.is_none() {
                return Err("SIGNER_URL is required in production mode".to_string());
            }
            if self.verifier_url.is_none() {
                return Err("VERIFIER_URL is required in production mode".to_string());
            }
        }

        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be greater than zero".to_string());
        }

        if self.trusted_proxy_header.trim().is_empty() {
            return Err("TRUSTED_PROXY_HEADER must not be empty".to_string());
        }

        self.load_param_schema().map_err(|e| e.to_string())?;

        Ok(())
    }
}
