//! Identity storage
//!
//! Read-only lookups backing the identity verifiers. Provisioning happens
//! outside the ledger; the in-memory store exposes seeding helpers for dev
//! mode and tests.

use bson::doc;
use dashmap::DashMap;
use tracing::warn;

use crate::db::schemas::{AllowedAddressDoc, CredentialDoc};
use crate::db::{MongoClient, MongoCollection};
use crate::types::{LedgerError, Result};

/// Lookups the identity verifiers depend on
#[async_trait::async_trait]
pub trait IdentityStore: Send + Sync {
    /// Credential record for a username
    async fn find_credential(&self, username: &str) -> Result<Option<CredentialDoc>>;

    /// Allow-list entry for an exact, normalized address
    async fn find_allowed_address(&self, address: &str) -> Result<Option<AllowedAddressDoc>>;
}

// =============================================================================
// MongoDB Implementation
// =============================================================================

/// MongoDB-backed identity store
pub struct MongoIdentityStore {
    credentials: MongoCollection<CredentialDoc>,
    addresses: MongoCollection<AllowedAddressDoc>,
}

impl MongoIdentityStore {
    pub async fn new(
        mongo: &MongoClient,
        user_collection: &str,
        ip_collection: &str,
    ) -> Result<Self> {
        Ok(Self {
            credentials: mongo.collection(user_collection).await?,
            addresses: mongo.collection(ip_collection).await?,
        })
    }
}

#[async_trait::async_trait]
impl IdentityStore for MongoIdentityStore {
    async fn find_credential(&self, username: &str) -> Result<Option<CredentialDoc>> {
        self.credentials
            .find_one(doc! { "username": username })
            .await
    }

    async fn find_allowed_address(&self, address: &str) -> Result<Option<AllowedAddressDoc>> {
        self.addresses.find_one(doc! { "address": address }).await
    }
}

// =============================================================================
// In-Memory Implementation
// =============================================================================

/// In-memory identity store
#[derive(Default)]
pub struct InMemoryIdentityStore {
    credentials: DashMap<String, CredentialDoc>,
    addresses: DashMap<String, AllowedAddressDoc>,
}

/// Address allow-listed when running on in-memory stores
pub const DEV_LOOPBACK: &str = "127.0.0.1";

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dev-mode store allowing only the loopback address to sign
    ///
    /// The trusted proxy header is taken at face value, so any caller that can
    /// reach the port may claim the loopback address through it.
    pub fn dev_loopback(trusted_header: &str) -> Result<Self> {
        let store = Self::new();
        store.allow_address(DEV_LOOPBACK, "localhost")?;
        warn!(
            "Using in-memory stores; only {} may sign. Any caller sending '{}: {}' \
             is treated as loopback, so do not expose this port",
            DEV_LOOPBACK, trusted_header, DEV_LOOPBACK
        );
        Ok(store)
    }

    /// Add a password credential, hashing the password
    pub fn add_credential(&self, username: &str, password: &str) -> Result<()> {
        if self.credentials.contains_key(username) {
            return Err(LedgerError::InvalidArgument(format!(
                "User '{username}' already exists"
            )));
        }
        let credential = CredentialDoc::new(username, password)?;
        self.credentials.insert(username.to_string(), credential);
        Ok(())
    }

    /// Add an address to the allow-list
    pub fn allow_address(&self, address: &str, name: &str) -> Result<()> {
        if self.addresses.contains_key(address) {
            return Err(LedgerError::InvalidArgument(format!(
                "Address '{address}' already allowed"
            )));
        }
        self.addresses
            .insert(address.to_string(), AllowedAddressDoc::new(address, name));
        Ok(())
    }
}

#[async_trait::async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_credential(&self, username: &str) -> Result<Option<CredentialDoc>> {
        Ok(self.credentials.get(username).map(|c| c.value().clone()))
    }

    async fn find_allowed_address(&self, address: &str) -> Result<Option<AllowedAddressDoc>> {
        Ok(self.addresses.get(address).map(|a| a.value().clone()))
    }
}
