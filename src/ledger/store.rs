//! Ledger storage
//!
//! Both backends guarantee at most one record per hash. The insert reports a
//! collision rather than failing, which is how concurrent signs of the same
//! hash are settled.

use bson::Document;
use dashmap::{mapref::entry::Entry, DashMap};

use crate::db::schemas::{hash_filter, SignatureDoc, SignatureRecord};
use crate::db::{InsertOutcome, MongoClient, MongoCollection};
use crate::types::Result;

/// Persistent mapping from hash to signature record
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    /// Point lookup by hash
    async fn find_by_hash(&self, hash: &str) -> Result<Option<SignatureRecord>>;

    /// Insert a record unless one already exists for its hash
    async fn insert(&self, record: &SignatureRecord) -> Result<InsertOutcome>;

    /// Backend name for health reporting
    fn backend(&self) -> &'static str;
}

/// MongoDB ledger store
pub struct MongoLedgerStore {
    collection: MongoCollection<SignatureDoc>,
}

impl MongoLedgerStore {
    /// Open the collection, creating the unique hash index if needed
    pub async fn new(mongo: &MongoClient, collection: &str) -> Result<Self> {
        Ok(Self {
            collection: mongo.collection(collection).await?,
        })
    }
}

#[async_trait::async_trait]
impl LedgerStore for MongoLedgerStore {
    async fn find_by_hash(&self, hash: &str) -> Result<Option<SignatureRecord>> {
        self.collection
            .find_one(hash_filter(hash))
            .await?
            .map(SignatureRecord::try_from)
            .transpose()
    }

    async fn insert(&self, record: &SignatureRecord) -> Result<InsertOutcome> {
        self.collection.insert_one(&SignatureDoc::from(record)).await
    }

    fn backend(&self) -> &'static str {
        "mongodb"
    }
}

/// In-memory ledger store
///
/// Records are held in their storage form so reads go through the same
/// decoding as the MongoDB backend.
#[derive(Default)]
pub struct InMemoryLedgerStore {
    records: DashMap<String, Document>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Store a raw document as-is, bypassing uniqueness checks
    #[cfg(test)]
    pub fn put_raw(&self, hash: &str, document: Document) {
        self.records.insert(hash.to_string(), document);
    }
}

#[async_trait::async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn find_by_hash(&self, hash: &str) -> Result<Option<SignatureRecord>> {
        let stored = self.records.get(hash).map(|r| r.value().clone());
        stored.map(SignatureRecord::from_document).transpose()
    }

    async fn insert(&self, record: &SignatureRecord) -> Result<InsertOutcome> {
        match self.records.entry(record.hash.clone()) {
            Entry::Occupied(_) => Ok(InsertOutcome::Duplicate),
            Entry::Vacant(slot) => {
                slot.insert(record.to_document());
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
