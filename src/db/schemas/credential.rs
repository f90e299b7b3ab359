//! Credential document schema
//!
//! Password credentials for callers authenticating with HTTP basic auth.
//! Written by the provisioning collaborator; the ledger only reads them.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::auth::hash_password;
use crate::db::mongo::IntoIndexes;
use crate::types::LedgerError;

/// Collection name for credentials
pub const USER_COLLECTION: &str = "users";

/// Credential document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CredentialDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Login name, recorded as `ClientName` on signatures
    pub username: String,

    /// Argon2 PHC hash of the password
    #[serde(rename = "password")]
    pub password_hash: String,

    /// When the credential was created
    #[serde(default = "DateTime::now")]
    pub inserted: DateTime,
}

impl CredentialDoc {
    /// Create a credential, hashing the password with a fresh salt
    pub fn new(username: impl Into<String>, password: &str) -> Result<Self, LedgerError> {
        Ok(Self {
            _id: None,
            username: username.into(),
            password_hash: hash_password(password)?,
            inserted: DateTime::now(),
        })
    }
}

impl IntoIndexes for CredentialDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "username": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("username_unique".to_string())
                    .build(),
            ),
        )]
    }
}
