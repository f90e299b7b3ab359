//! Allow-list document schema
//!
//! Network addresses that may sign without a password.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Collection name for allowed addresses
pub const IP_COLLECTION: &str = "ips";

/// Allowed address document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AllowedAddressDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Normalized caller address (e.g. `10.0.0.7`)
    pub address: String,

    /// Human-readable label for the address owner
    pub name: String,

    /// When the entry was created
    #[serde(default = "DateTime::now")]
    pub inserted: DateTime,
}

impl AllowedAddressDoc {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            _id: None,
            address: address.into(),
            name: name.into(),
            inserted: DateTime::now(),
        }
    }
}

impl IntoIndexes for AllowedAddressDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "address": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("address_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "name": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("name_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}
