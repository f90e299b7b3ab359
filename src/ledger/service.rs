//! Ledger operations
//!
//! `sign` is the only operation that writes, and it writes at most once per
//! hash. Every store and authority call is bounded by the configured timeout.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bson::Document;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use super::accept::Accept;
use super::store::LedgerStore;
use super::DEFAULT_ALGORITHM;
use crate::auth::Identity;
use crate::authority::{AuthorityError, SigningAuthority, VerificationProperties};
use crate::db::schemas::SignatureRecord;
use crate::db::InsertOutcome;
use crate::schema::ParamSchema;
use crate::types::{LedgerError, Result};

/// A request to sign a hash
#[derive(Debug, Clone, Default)]
pub struct SignRequest {
    pub hash: String,
    pub algorithm: Option<String>,
    /// Query parameters, matched against the parameter schema
    pub params: HashMap<String, String>,
    /// Acknowledge before signing; the outcome is only logged
    pub async_mode: bool,
}

/// How a sign request was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutcome {
    /// A record already existed; nothing was done
    AlreadySigned,
    /// A token was obtained and stored
    Created,
    /// Signing continues in the background
    Accepted,
}

impl SignOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            SignOutcome::AlreadySigned => "Already signed",
            SignOutcome::Created => "Signature created and stored",
            SignOutcome::Accepted => "Request accepted",
        }
    }
}

/// A token ready to hand back to the caller
#[derive(Debug, Clone, PartialEq)]
pub enum Download {
    /// Raw token bytes served as a file
    Attachment {
        token: Vec<u8>,
        properties: VerificationProperties,
    },
    /// JSON envelope with the base64 token
    Envelope {
        token: String,
        properties: VerificationProperties,
    },
}

/// Validate a hex hash, returning its canonical lowercase form and bytes
pub fn decode_hash(raw: &str) -> Result<(String, Vec<u8>)> {
    let hash = raw.trim();
    if hash.is_empty() {
        return Err(LedgerError::InvalidArgument("Missing parameter 'hash'".into()));
    }

    let hash = hash.to_ascii_lowercase();
    let bytes = hex::decode(&hash)
        .map_err(|_| LedgerError::InvalidArgument("Invalid hex 'hash'".into()))?;

    Ok((hash, bytes))
}

fn resolve_algorithm(algorithm: Option<&str>) -> String {
    algorithm
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or(DEFAULT_ALGORITHM)
        .to_string()
}

fn authority_error(err: AuthorityError, ctx: &str) -> LedgerError {
    match err {
        AuthorityError::BadInput(msg) => LedgerError::Conflict(format!("{ctx}: {msg}")),
        AuthorityError::Other(msg) => LedgerError::Authority(format!("{ctx}: {msg}")),
    }
}

/// Validated sign request waiting for the authority
struct PendingSignature {
    hash: String,
    hash_bytes: Vec<u8>,
    algorithm: String,
    extra_fields: Document,
    client_name: String,
}

/// The ledger's request handlers
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    authority: Arc<dyn SigningAuthority>,
    schema: Arc<ParamSchema>,
    timeout: Duration,
}

impl LedgerService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        authority: Arc<dyn SigningAuthority>,
        schema: ParamSchema,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            authority,
            schema: Arc::new(schema),
            timeout,
        }
    }

    pub fn schema(&self) -> &ParamSchema {
        &self.schema
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    async fn bounded<F: Future>(&self, what: &str, fut: F) -> Result<F::Output> {
        tokio::time::timeout(self.timeout, fut).await.map_err(|_| {
            LedgerError::Internal(format!(
                "{what} timed out after {}ms",
                self.timeout.as_millis()
            ))
        })
    }

    async fn find(&self, hash: &str) -> Result<SignatureRecord> {
        self.bounded("Ledger lookup", self.store.find_by_hash(hash))
            .await??
            .ok_or_else(|| LedgerError::NotFound("Unknown hash".into()))
    }

    /// Look up a record's token and re-verify it with the authority
    async fn verified_token(
        &self,
        hash: &str,
        algorithm: Option<&str>,
    ) -> Result<(Vec<u8>, VerificationProperties)> {
        let (hash, hash_bytes) = decode_hash(hash)?;
        let algorithm = resolve_algorithm(algorithm);

        let record = self.find(&hash).await?;
        let token = record.token.ok_or_else(|| {
            error!(hash = %hash, "Stored record has no token");
            LedgerError::Internal("Stored record has no token".into())
        })?;

        let properties = self
            .bounded(
                "Token verification",
                self.authority.verify(&hash_bytes, &algorithm, &token),
            )
            .await?
            .map_err(|e| authority_error(e, "Error verifying token"))?;

        Ok((token, properties))
    }

    /// Sign a hash on behalf of an authenticated caller
    pub async fn sign(&self, request: SignRequest, identity: &Identity) -> Result<SignOutcome> {
        if request.hash.trim().is_empty() {
            return Err(LedgerError::InvalidArgument("Missing parameter 'hash'".into()));
        }

        if let Some(name) = self.schema.missing_required(&request.params) {
            return Err(LedgerError::InvalidArgument(format!(
                "Missing parameter '{name}'"
            )));
        }

        let (hash, hash_bytes) = decode_hash(&request.hash)?;
        let pending = PendingSignature {
            algorithm: resolve_algorithm(request.algorithm.as_deref()),
            extra_fields: self.schema.extra_fields(&request.params)?,
            client_name: identity.client_name().to_string(),
            hash,
            hash_bytes,
        };

        debug!(
            hash = %pending.hash,
            algorithm = %pending.algorithm,
            client = %pending.client_name,
            async_mode = request.async_mode,
            "Sign request"
        );

        if request.async_mode {
            let service = self.clone();
            tokio::spawn(async move {
                let hash = pending.hash.clone();
                match service.complete_sign(pending).await {
                    Ok(outcome) => info!(hash = %hash, "Async sign finished: {}", outcome.message()),
                    Err(e) => error!(hash = %hash, error = %e, "Async sign failed"),
                }
            });
            return Ok(SignOutcome::Accepted);
        }

        self.complete_sign(pending).await
    }

    async fn complete_sign(&self, pending: PendingSignature) -> Result<SignOutcome> {
        if self
            .bounded("Ledger lookup", self.store.find_by_hash(&pending.hash))
            .await??
            .is_some()
        {
            debug!(hash = %pending.hash, "Hash already signed");
            return Ok(SignOutcome::AlreadySigned);
        }

        let token = self
            .bounded(
                "Signing",
                self.authority.sign(&pending.hash_bytes, &pending.algorithm),
            )
            .await?
            .map_err(|e| authority_error(e, "Error signing hash"))?;

        let record = SignatureRecord::new(
            pending.hash,
            pending.algorithm,
            token,
            pending.client_name,
            pending.extra_fields,
        );

        let outcome = self
            .bounded("Ledger insert", self.store.insert(&record))
            .await?
            .map_err(|e| e.context("Error saving hash"))?;

        match outcome {
            InsertOutcome::Inserted => {
                debug!(hash = %record.hash, "Signature stored");
                Ok(SignOutcome::Created)
            }
            InsertOutcome::Duplicate => {
                info!(hash = %record.hash, "Concurrent sign already stored this hash");
                Ok(SignOutcome::AlreadySigned)
            }
        }
    }

    /// Verify the stored token for a hash
    pub async fn verify(
        &self,
        hash: &str,
        algorithm: Option<&str>,
        accept: &Accept,
    ) -> Result<VerificationProperties> {
        if accept.is_octet_stream() {
            return Err(LedgerError::NotAcceptable(
                "This service does not serve application/octet-stream".into(),
            ));
        }

        let (_, properties) = self.verified_token(hash, algorithm).await?;
        Ok(properties)
    }

    /// Fetch the stored token for a hash, re-verified
    pub async fn download(
        &self,
        hash: &str,
        algorithm: Option<&str>,
        accept: &Accept,
    ) -> Result<Download> {
        let (token, properties) = self.verified_token(hash, algorithm).await?;

        if accept.wants_attachment() {
            Ok(Download::Attachment { token, properties })
        } else {
            Ok(Download::Envelope {
                token: STANDARD.encode(&token),
                properties,
            })
        }
    }

    /// Retrievable schema parameters stored with a hash
    pub async fn param(&self, hash: &str, accept: &Accept) -> Result<JsonMap<String, JsonValue>> {
        if accept.is_octet_stream() {
            return Err(LedgerError::NotAcceptable(
                "This service does not serve application/octet-stream".into(),
            ));
        }

        let (hash, _) = decode_hash(hash)?;
        let record = self.find(&hash).await?;

        self.schema.project(&record.extra_fields)
    }
}
