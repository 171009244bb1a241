use error_common::{Classified, ErrorClass};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Configuration parsing failed: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Failed to load dotenv file: {0}")]
    DotenvError(String),
}

impl Classified for ConfigError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::SourceNotFound(_) => ErrorClass::NotFound,
            Self::ParseError(_) | Self::ValidationError(_) | Self::DotenvError(_) => {
                ErrorClass::Validation
            }
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
