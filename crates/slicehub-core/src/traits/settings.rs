//! Read-only key-path settings capability.

use std::collections::HashMap;
use std::sync::Arc;

/// Read-only access to configuration values by dotted key path
/// (e.g. `"plugins.cura_engine.cura_engine"`).
///
/// Plugins receive an implementation at construction time instead of
/// reaching for a global settings store. Values are read on demand, so a
/// provider may reflect changes made between jobs.
pub trait SettingsProvider: Send + Sync + std::fmt::Debug {
    /// Get a value as a string. Returns `None` if the key is not set.
    fn get_string(&self, key: &str) -> Option<String>;

    /// Get a boolean value. Accepts `true/false`, `yes/no`, `on/off`, `1/0`.
    fn get_bool(&self, key: &str) -> Option<bool> {
        let raw = self.get_string(key)?;
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }

    /// Get an unsigned integer value.
    fn get_u64(&self, key: &str) -> Option<u64> {
        self.get_string(key)?.trim().parse().ok()
    }
}

/// In-memory settings, used for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings {
    values: HashMap<String, String>,
}

impl StaticSettings {
    /// Create an empty settings map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Set a value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl SettingsProvider for StaticSettings {
    fn get_string(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Settings answered from an in-memory overlay first, then a base provider.
///
/// Used to let command-line flags shadow configured values for one run.
#[derive(Debug, Clone)]
pub struct OverlaySettings {
    base: Arc<dyn SettingsProvider>,
    overlay: StaticSettings,
}

impl OverlaySettings {
    /// Wrap `base` with the values in `overlay`.
    pub fn new(base: Arc<dyn SettingsProvider>, overlay: StaticSettings) -> Self {
        Self { base, overlay }
    }
}

impl SettingsProvider for OverlaySettings {
    fn get_string(&self, key: &str) -> Option<String> {
        self.overlay
            .get_string(key)
            .or_else(|| self.base.get_string(key))
    }
}
