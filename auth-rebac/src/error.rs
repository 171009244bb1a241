use error_common::{Classified, ErrorClass};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthzError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid schema: {0}")]
    Schema(String),

    #[error("No schema installed")]
    SchemaNotInstalled,

    #[error("Tuple store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Classified for AuthzError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) => ErrorClass::Validation,
            Self::Schema(_) | Self::SchemaNotInstalled => ErrorClass::Schema,
            Self::StoreUnavailable(_) => ErrorClass::StoreUnavailable,
            Self::Timeout { .. } => ErrorClass::Timeout,
            Self::PreconditionFailed(_) => ErrorClass::TransactionFailed,
            Self::Internal(_) => ErrorClass::Internal,
        }
    }
}

impl From<sqlx::Error> for AuthzError {
    fn from(err: sqlx::Error) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AuthzError>;
