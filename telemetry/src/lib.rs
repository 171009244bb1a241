//! Tracing setup for the blog authorization engine
//!
//! - `pretty`: human-readable lines with RFC 3339 UTC timestamps, targets,
//!   file and line, for development
//! - `json`: one JSON object per event, for log shipping in production
//!
//! `RUST_LOG` takes precedence over the configured level.
//!
//! # Example
//!
//! ```no_run
//! use config_engine::LoggingSettings;
//!
//! telemetry::init_tracing(&LoggingSettings::default())?;
//! tracing::info!("ready");
//! # Ok::<(), telemetry::TelemetryError>(())
//! ```

pub mod error;

pub use error::*;

use config_engine::{LogFormat, LoggingSettings};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Noisy dependencies are capped regardless of the configured level
const DEPENDENCY_DIRECTIVES: &str = "sqlx=warn,hyper=info";

/// Filter from `RUST_LOG`, otherwise from the configured level
pub fn build_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let directive = format!("{},{}", level.trim(), DEPENDENCY_DIRECTIVES);
    EnvFilter::try_new(&directive).map_err(|e| TelemetryError::InvalidFilter {
        directive,
        reason: e.to_string(),
    })
}

/// Install the global subscriber. A second call fails instead of panicking.
pub fn init_tracing(settings: &LoggingSettings) -> Result<()> {
    let env_filter = build_filter(&settings.level)?;

    let result = match settings.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_level(true),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .json(),
            )
            .try_init(),
    };

    result.map_err(|e| TelemetryError::TracingError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_directive_is_accepted() {
        assert!(build_filter("debug").is_ok());
        assert!(build_filter("auth_rebac=trace").is_ok());
    }

    #[test]
    fn test_second_init_is_an_error() {
        let settings = LoggingSettings {
            format: LogFormat::Json,
            ..LoggingSettings::default()
        };
        let first = init_tracing(&settings);
        let second = init_tracing(&settings);
        // Another test in this binary may have installed a subscriber first
        assert!(first.is_err() || second.is_err());
        assert!(matches!(second, Err(TelemetryError::TracingError(_))));
    }
}
