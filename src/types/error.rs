//! Error types for the ledger
//!
//! Client-facing kinds map one-to-one onto HTTP status classes; the plumbing
//! kinds (database, authority, config) keep the collaborator's message as context.

use hyper::StatusCode;

/// Main error type for ledger operations
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    NotAcceptable(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Signing authority error: {0}")]
    Authority(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),
}

impl LedgerError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Authority(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error code carried in JSON error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::Unauthorized(_) => "NotAuthorized",
            Self::NotFound(_) => "ResourceNotFound",
            Self::NotAcceptable(_) => "NotAcceptable",
            Self::Conflict(_) => "Conflict",
            Self::Internal(_) => "InternalError",
            Self::Database(_) => "ServiceUnavailable",
            Self::Authority(_) => "BadGateway",
            Self::Config(_) => "InternalError",
            Self::Auth(_) => "InternalError",
        }
    }

    /// Whether the error was caused by the client rather than the service
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Prefix the message with context, keeping the error kind
    pub fn context(self, ctx: &str) -> Self {
        match self {
            Self::InvalidArgument(m) => Self::InvalidArgument(format!("{ctx}: {m}")),
            Self::Unauthorized(m) => Self::Unauthorized(format!("{ctx}: {m}")),
            Self::NotFound(m) => Self::NotFound(format!("{ctx}: {m}")),
            Self::NotAcceptable(m) => Self::NotAcceptable(format!("{ctx}: {m}")),
            Self::Conflict(m) => Self::Conflict(format!("{ctx}: {m}")),
            Self::Internal(m) => Self::Internal(format!("{ctx}: {m}")),
            Self::Database(m) => Self::Database(format!("{ctx}: {m}")),
            Self::Authority(m) => Self::Authority(format!("{ctx}: {m}")),
            Self::Config(m) => Self::Config(format!("{ctx}: {m}")),
            Self::Auth(m) => Self::Auth(format!("{ctx}: {m}")),
        }
    }
}

// Implement From conversions for common error types

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidArgument(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for LedgerError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<mongodb::error::Error> for LedgerError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(err: reqwest::Error) -> Self {
        Self::Authority(err.to_string())
    }
}

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            LedgerError::InvalidArgument("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            LedgerError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(LedgerError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            LedgerError::NotAcceptable("x".into()).status_code(),
            StatusCode::NOT_ACCEPTABLE
        );
        assert_eq!(LedgerError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            LedgerError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_context_keeps_kind() {
        let err = LedgerError::Conflict("Unsupported hash algorithm".into())
            .context("Error signing hash");
        assert!(matches!(err, LedgerError::Conflict(_)));
        assert_eq!(err.to_string(), "Error signing hash: Unsupported hash algorithm");
        assert!(err.is_client_error());
    }
}
