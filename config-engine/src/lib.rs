//! Layered settings for the blog authorization engine
//!
//! Sources, later ones overriding earlier ones:
//! - Built-in defaults
//! - An optional YAML, TOML or JSON settings file
//! - A `.env` file in the working directory
//! - `BLOG_AUTHZ_`-prefixed environment variables, with `__` between
//!   section and key (`BLOG_AUTHZ_STORE__TIMEOUT_MS=500`)
//!
//! # Example
//!
//! ```no_run
//! use config_engine::SettingsLoader;
//!
//! let settings = SettingsLoader::new().file("authz.yaml").load()?;
//! println!("store backend: {}", settings.store.backend);
//! # Ok::<(), config_engine::ConfigError>(())
//! ```

pub mod error;
pub mod providers;
pub mod settings;
pub mod validation;

pub use error::*;
pub use providers::*;
pub use settings::*;
pub use validation::validate;
