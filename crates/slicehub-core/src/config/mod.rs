//! Application configuration.
//!
//! Configuration is layered with the `config` crate: a base TOML file, an
//! environment overlay (`config/<env>.toml`), then `SLICEHUB__*` environment
//! variables. The merged tree is exposed two ways: typed sections through
//! [`AppConfig`], and key-path lookups through [`SettingsProvider`] for
//! plugins that only need a handful of values.

pub mod logging;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use self::logging::LoggingConfig;

use crate::error::AppError;
use crate::result::AppResult;
use crate::traits::SettingsProvider;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Per-plugin settings, keyed by plugin identifier.
    #[serde(default)]
    pub plugins: BTreeMap<String, serde_json::Value>,
}

/// The merged configuration tree.
#[derive(Debug, Clone)]
pub struct LayeredSettings {
    inner: config::Config,
}

impl LayeredSettings {
    /// Load configuration from TOML files and the environment.
    ///
    /// Both files are optional; a missing file simply contributes nothing.
    pub fn load(config_path: &str, env: &str) -> AppResult<Self> {
        let inner = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("SLICEHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        tracing::debug!(path = %config_path, env = %env, "Configuration loaded");
        Ok(Self { inner })
    }

    /// Build settings from an in-memory TOML document.
    pub fn from_toml_str(toml: &str) -> AppResult<Self> {
        let inner = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to parse config: {e}")))?;
        Ok(Self { inner })
    }

    /// Deserialize the typed application configuration.
    pub fn app_config(&self) -> AppResult<AppConfig> {
        self.inner
            .clone()
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

impl SettingsProvider for LayeredSettings {
    fn get_string(&self, key: &str) -> Option<String> {
        self.inner.get_string(key).ok()
    }
}
