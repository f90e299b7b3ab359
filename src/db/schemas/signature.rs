//! Signature record schema
//!
//! One document per signed hash. Core fields keep the names the ledger has
//! always stored (`hash`, `alg`, `inserted`, `sig`, `ClientName`); schema
//! parameters are flattened next to them.

use bson::{doc, spec::BinarySubtype, Binary, Bson, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::types::{LedgerError, Result};

/// Default collection name for signature records
pub const SIGNATURE_COLLECTION: &str = "ksdb";

const FIELD_ID: &str = "_id";
const FIELD_HASH: &str = "hash";
const FIELD_ALGORITHM: &str = "alg";
const FIELD_INSERTED: &str = "inserted";
const FIELD_TOKEN: &str = "sig";
const FIELD_CLIENT_NAME: &str = "ClientName";

/// A signed hash and its token
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureRecord {
    /// Hex digest, unique across the ledger
    pub hash: String,

    /// Hash function the digest was produced with
    pub algorithm: String,

    /// When the record was created
    pub inserted_at: DateTime,

    /// Token issued by the signing authority
    ///
    /// Always set for records this service writes; `None` marks a damaged record.
    pub token: Option<Vec<u8>>,

    /// Identity of the caller that requested the signature
    pub client_name: String,

    /// Schema-mapped parameters, already sanitized
    pub extra_fields: Document,
}

impl SignatureRecord {
    /// Create a record stamped with the current time
    pub fn new(
        hash: String,
        algorithm: String,
        token: Vec<u8>,
        client_name: String,
        extra_fields: Document,
    ) -> Self {
        Self {
            hash,
            algorithm,
            inserted_at: DateTime::now(),
            token: Some(token),
            client_name,
            extra_fields,
        }
    }

    /// Storage form of the record
    ///
    /// Core fields are written last so a colliding extra field can never
    /// replace them.
    pub fn to_document(&self) -> Document {
        let mut document = self.extra_fields.clone();
        document.insert(FIELD_HASH, self.hash.as_str());
        document.insert(FIELD_ALGORITHM, self.algorithm.as_str());
        document.insert(FIELD_INSERTED, self.inserted_at);
        match self.token {
            Some(ref token) => document.insert(
                FIELD_TOKEN,
                Binary {
                    subtype: BinarySubtype::Generic,
                    bytes: token.clone(),
                },
            ),
            None => document.insert(FIELD_TOKEN, Bson::Null),
        };
        document.insert(FIELD_CLIENT_NAME, self.client_name.as_str());
        document
    }

    /// Rebuild a record from its storage form
    pub fn from_document(mut document: Document) -> Result<Self> {
        let hash = match document.remove(FIELD_HASH) {
            Some(Bson::String(hash)) => hash,
            _ => {
                return Err(LedgerError::Internal(
                    "Stored record has no 'hash' field".into(),
                ))
            }
        };

        let algorithm = match document.remove(FIELD_ALGORITHM) {
            Some(Bson::String(alg)) => alg,
            _ => crate::ledger::DEFAULT_ALGORITHM.to_string(),
        };

        let inserted_at = match document.remove(FIELD_INSERTED) {
            Some(Bson::DateTime(dt)) => dt,
            _ => match document.get(FIELD_ID) {
                Some(Bson::ObjectId(oid)) => oid.timestamp(),
                _ => DateTime::MIN,
            },
        };

        let token = match document.remove(FIELD_TOKEN) {
            Some(Bson::Binary(binary)) => Some(binary.bytes),
            _ => None,
        };

        let client_name = match document.remove(FIELD_CLIENT_NAME) {
            Some(Bson::String(name)) => name,
            _ => String::new(),
        };

        document.remove(FIELD_ID);

        Ok(Self {
            hash,
            algorithm,
            inserted_at,
            token,
            client_name,
            extra_fields: document,
        })
    }
}

/// Filter matching the record for a hash
pub fn hash_filter(hash: &str) -> Document {
    doc! { FIELD_HASH: hash }
}

/// Raw signature document as stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(transparent)]
pub struct SignatureDoc(pub Document);

impl From<&SignatureRecord> for SignatureDoc {
    fn from(record: &SignatureRecord) -> Self {
        Self(record.to_document())
    }
}

impl TryFrom<SignatureDoc> for SignatureRecord {
    type Error = LedgerError;

    fn try_from(doc: SignatureDoc) -> Result<Self> {
        SignatureRecord::from_document(doc.0)
    }
}

impl IntoIndexes for SignatureDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { FIELD_HASH: 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("hash_unique".to_string())
                    .build(),
            ),
        )]
    }
}
