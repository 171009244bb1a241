use crate::{
    error::{ConfigError, Result},
    settings::AuthzSettings,
    validation::validate,
};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Prefix for environment overrides, e.g. `BLOG_AUTHZ_STORE__TIMEOUT_MS`
pub const ENV_PREFIX: &str = "BLOG_AUTHZ_";

/// Builds [`AuthzSettings`] from layered sources, later layers winning:
/// defaults, an optional settings file, `.env`, then prefixed environment
/// variables.
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    file: Option<PathBuf>,
    dotenv: bool,
    env_prefix: String,
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsLoader {
    pub fn new() -> Self {
        Self {
            file: None,
            dotenv: true,
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Settings file; YAML unless the extension says `toml` or `json`
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn dotenv(mut self, enabled: bool) -> Self {
        self.dotenv = enabled;
        self
    }

    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    /// Merged provider stack, before extraction
    pub fn figment(&self) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(AuthzSettings::default()));

        if let Some(path) = &self.file {
            if !path.exists() {
                return Err(ConfigError::SourceNotFound(path.clone()));
            }
            figment = figment.merge(file_provider(path));
        }

        if self.dotenv {
            match dotenvy::dotenv() {
                Ok(path) => debug!("Loaded environment from {}", path.display()),
                Err(err) if err.not_found() => {}
                Err(err) => return Err(ConfigError::DotenvError(err.to_string())),
            }
        }

        Ok(figment.merge(Env::prefixed(&self.env_prefix).split("__")))
    }

    /// Load, merge and validate
    pub fn load(&self) -> Result<AuthzSettings> {
        let settings: AuthzSettings = self.figment()?.extract()?;
        validate(&settings)?;
        debug!(
            "Settings loaded: store={} max_depth={} org={}",
            settings.store.backend, settings.evaluator.max_depth, settings.org.id
        );
        Ok(settings)
    }
}

fn file_provider(path: &Path) -> Figment {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => Figment::from(Toml::file(path)),
        Some("json") => Figment::from(Json::file(path)),
        _ => Figment::from(Yaml::file(path)),
    }
}

/// Load settings from the default sources plus an optional file
pub fn load_settings(file: Option<&Path>) -> Result<AuthzSettings> {
    let mut loader = SettingsLoader::new();
    if let Some(path) = file {
        loader = loader.file(path);
    }
    loader.load()
}
