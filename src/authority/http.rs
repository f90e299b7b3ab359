//! HTTP signing authority client

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{debug, warn};

use super::{is_bad_input_message, AuthorityError, SigningAuthority, VerificationProperties};
use crate::types::LedgerError;

#[derive(Serialize)]
struct SignBody<'a> {
    hash: String,
    algorithm: &'a str,
}

#[derive(Serialize)]
struct VerifyBody<'a> {
    hash: String,
    algorithm: &'a str,
    token: String,
}

#[derive(Deserialize)]
struct SignReply {
    token: String,
}

/// Signing authority reached over HTTP
pub struct HttpSigningAuthority {
    signer_url: String,
    verifier_url: String,
    http_client: reqwest::Client,
}

impl HttpSigningAuthority {
    pub fn new(
        signer_url: impl Into<String>,
        verifier_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LedgerError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            signer_url: signer_url.into(),
            verifier_url: verifier_url.into(),
            http_client,
        })
    }

    async fn post<T: Serialize>(&self, url: &str, body: &T) -> Result<JsonValue, AuthorityError> {
        let response = self
            .http_client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!("Signing authority request to {} failed: {}", url, e);
                AuthorityError::Other(format!("Request failed: {e}"))
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AuthorityError::Other(format!("Failed to read reply: {e}")))?;

        if !status.is_success() {
            return Err(classify_failure(status, &text));
        }

        serde_json::from_str(&text)
            .map_err(|e| AuthorityError::Other(format!("Malformed reply: {e}")))
    }
}

/// Turn a non-success reply into an authority error
pub(crate) fn classify_failure(status: StatusCode, body: &str) -> AuthorityError {
    let message = serde_json::from_str::<JsonValue>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("HTTP {status}")
            } else {
                trimmed.to_string()
            }
        });

    if is_bad_input_message(&message)
        || status == StatusCode::BAD_REQUEST
        || status == StatusCode::UNPROCESSABLE_ENTITY
    {
        AuthorityError::BadInput(message)
    } else {
        AuthorityError::Other(message)
    }
}

#[async_trait::async_trait]
impl SigningAuthority for HttpSigningAuthority {
    async fn sign(&self, hash: &[u8], algorithm: &str) -> Result<Vec<u8>, AuthorityError> {
        let body = SignBody {
            hash: hex::encode(hash),
            algorithm,
        };
        let reply = self.post(&self.signer_url, &body).await?;
        let reply: SignReply = serde_json::from_value(reply)
            .map_err(|e| AuthorityError::Other(format!("Malformed sign reply: {e}")))?;

        let token = STANDARD
            .decode(reply.token.as_bytes())
            .map_err(|e| AuthorityError::Other(format!("Token is not base64: {e}")))?;

        debug!(algorithm, size = token.len(), "Signing authority issued token");
        Ok(token)
    }

    async fn verify(
        &self,
        hash: &[u8],
        algorithm: &str,
        token: &[u8],
    ) -> Result<VerificationProperties, AuthorityError> {
        let body = VerifyBody {
            hash: hex::encode(hash),
            algorithm,
            token: STANDARD.encode(token),
        };

        match self.post(&self.verifier_url, &body).await? {
            JsonValue::Object(props) => Ok(VerificationProperties(props)),
            other => Err(AuthorityError::Other(format!(
                "Expected verification properties, got {other}"
            ))),
        }
    }
}
