use crate::{
    error::{ConfigError, Result},
    settings::{AuthzSettings, StoreBackend},
};

/// Reject settings the engine cannot run with
pub fn validate(settings: &AuthzSettings) -> Result<()> {
    let mut problems = Vec::new();

    if settings.store.backend == StoreBackend::Postgres
        && settings
            .store
            .database_url
            .as_deref()
            .map_or(true, str::is_empty)
    {
        problems.push("store.database_url is required for the postgres backend");
    }
    if settings.store.max_connections == 0 {
        problems.push("store.max_connections must be positive");
    }
    if settings.store.timeout_ms == 0 {
        problems.push("store.timeout_ms must be positive");
    }
    if settings.evaluator.max_depth == 0 {
        problems.push("evaluator.max_depth must be positive");
    }
    if settings.evaluator.check_timeout_ms == 0 {
        problems.push("evaluator.check_timeout_ms must be positive");
    }
    if settings.org.id.is_empty() {
        problems.push("org.id must not be empty");
    }
    if settings.logging.level.trim().is_empty() {
        problems.push("logging.level must not be empty");
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(problems.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(validate(&AuthzSettings::default()).is_ok());
    }

    #[test]
    fn test_collects_every_problem() {
        let mut settings = AuthzSettings::default();
        settings.store.timeout_ms = 0;
        settings.evaluator.max_depth = 0;

        let Err(ConfigError::ValidationError(message)) = validate(&settings) else {
            panic!("expected validation error");
        };
        assert!(message.contains("store.timeout_ms"));
        assert!(message.contains("evaluator.max_depth"));
    }

    #[test]
    fn test_settings_round_trip_through_yaml() {
        let yaml = serde_yaml::to_string(&AuthzSettings::default()).unwrap();
        let parsed: AuthzSettings = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, AuthzSettings::default());
    }
}
