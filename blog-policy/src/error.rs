use auth_rebac::AuthzError;
use error_common::{Classified, ErrorClass};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication required for {operation}")]
    Unauthenticated { operation: &'static str },

    #[error("Forbidden: {operation}")]
    Denied { operation: &'static str },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Tuple store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PolicyError {
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied { .. })
    }
}

impl Classified for PolicyError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) => ErrorClass::Validation,
            Self::Unauthenticated { .. } => ErrorClass::Unauthenticated,
            Self::Denied { .. } => ErrorClass::AuthorizationDenied,
            Self::NotFound(_) => ErrorClass::NotFound,
            Self::StoreUnavailable(_) => ErrorClass::StoreUnavailable,
            Self::Timeout { .. } => ErrorClass::Timeout,
            Self::TransactionFailed(_) => ErrorClass::TransactionFailed,
            Self::Schema(_) => ErrorClass::Schema,
            Self::Internal(_) => ErrorClass::Internal,
        }
    }
}

impl From<AuthzError> for PolicyError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Validation(msg) => Self::Validation(msg),
            AuthzError::Schema(msg) => Self::Schema(msg),
            AuthzError::SchemaNotInstalled => Self::Schema(err.to_string()),
            AuthzError::StoreUnavailable(msg) => Self::StoreUnavailable(msg),
            AuthzError::Timeout {
                operation,
                timeout_ms,
            } => Self::Timeout {
                operation,
                timeout_ms,
            },
            AuthzError::PreconditionFailed(msg) => Self::TransactionFailed(msg),
            AuthzError::Internal(msg) => Self::Internal(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, PolicyError>;
