//! HTTP routes for ksdb

pub mod health;
pub mod ledger;

pub use health::{health_check, version_info};
pub use ledger::{error_response, handle_download, handle_params, handle_sign, handle_verify};
