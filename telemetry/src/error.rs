use error_common::{Classified, ErrorClass};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter '{directive}': {reason}")]
    InvalidFilter { directive: String, reason: String },

    #[error("Tracing initialization failed: {0}")]
    TracingError(String),
}

impl Classified for TelemetryError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidFilter { .. } => ErrorClass::Validation,
            Self::TracingError(_) => ErrorClass::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
