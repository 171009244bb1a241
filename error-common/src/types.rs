use crate::codes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse failure class shared by every crate error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Validation,
    Unauthenticated,
    AuthorizationDenied,
    NotFound,
    StoreUnavailable,
    Timeout,
    TransactionFailed,
    Schema,
    Internal,
}

impl ErrorClass {
    /// Stable code for this class
    pub fn code(self) -> &'static str {
        match self {
            Self::Validation => codes::validation::INVALID_INPUT,
            Self::Unauthenticated => codes::authentication::UNAUTHENTICATED,
            Self::AuthorizationDenied => codes::authorization::ACCESS_DENIED,
            Self::NotFound => codes::authorization::NOT_FOUND,
            Self::StoreUnavailable => codes::store::UNAVAILABLE,
            Self::Timeout => codes::store::TIMEOUT,
            Self::TransactionFailed => codes::store::TRANSACTION_FAILED,
            Self::Schema => codes::system::INVALID_SCHEMA,
            Self::Internal => codes::system::INTERNAL,
        }
    }

    /// Transient failures that a caller may retry verbatim
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable | Self::Timeout | Self::TransactionFailed
        )
    }

    /// Failures caused by the caller rather than the system
    pub fn is_client_error(self) -> bool {
        matches!(
            self,
            Self::Validation | Self::Unauthenticated | Self::AuthorizationDenied | Self::NotFound
        )
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::Unauthenticated => "unauthenticated",
            Self::AuthorizationDenied => "authorization_denied",
            Self::NotFound => "not_found",
            Self::StoreUnavailable => "store_unavailable",
            Self::Timeout => "timeout",
            Self::TransactionFailed => "transaction_failed",
            Self::Schema => "schema",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Implemented by every error type in the workspace
pub trait Classified: std::error::Error {
    fn class(&self) -> ErrorClass;

    fn code(&self) -> &'static str {
        self.class().code()
    }

    fn is_retryable(&self) -> bool {
        self.class().is_retryable()
    }
}
