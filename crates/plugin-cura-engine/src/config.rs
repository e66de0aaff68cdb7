//! Configuration for the CuraEngine slicing plugin.
//!
//! Values live under `plugins.cura_engine` in the application settings and
//! are read through a [`SettingsProvider`] each time a job starts, so edits
//! to the settings take effect on the next slice.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use slicehub_core::traits::SettingsProvider;
use tracing::debug;
use validator::Validate;

use crate::discovery::{DiscoveryMethod, EngineDiscovery};
use crate::error::SliceError;

/// Settings key prefix for this plugin.
pub const SETTINGS_PREFIX: &str = "plugins.cura_engine";

/// File name of the bundled fallback profile.
pub const BUNDLED_PROFILE_FILE: &str = "default.profile";

/// Fallback profile compiled into the binary.
pub const BUNDLED_PROFILE: &str = include_str!("../profiles/default.profile");

/// Configuration for the CuraEngine slicer.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path to the CuraEngine executable. Searched in PATH when unset.
    pub cura_engine: Option<PathBuf>,

    /// Profile used when a request names none. Falls back to the bundled profile.
    pub default_profile: Option<PathBuf>,

    /// Directory holding `definitions/`, `extruders/`, `quality/`, `variants/`.
    pub settings_json_path: Option<PathBuf>,

    /// Whether engine diagnostic lines are logged.
    pub debug_logging: bool,

    /// How long a single stderr read may wait before the exit status is polled.
    #[validate(range(min = 10, max = 10_000))]
    pub poll_interval_ms: u64,

    /// Overall deadline for one engine run in seconds; `0` disables it.
    #[validate(range(max = 86_400))]
    pub timeout_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cura_engine: None,
            default_profile: None,
            settings_json_path: None,
            debug_logging: false,
            poll_interval_ms: default_poll_interval_ms(),
            timeout_seconds: 0,
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// Runtime directory holding the unpacked fallback profile; also the
/// default definitions root.
pub fn bundled_profile_dir() -> PathBuf {
    std::env::temp_dir()
        .join(format!("slicehub-{}", env!("CARGO_PKG_VERSION")))
        .join("profiles")
}

/// Write [`BUNDLED_PROFILE`] into [`bundled_profile_dir`] unless an
/// identical copy is already there, and return its path.
pub async fn unpack_bundled_profile() -> Result<PathBuf, SliceError> {
    let dir = bundled_profile_dir();
    let target = dir.join(BUNDLED_PROFILE_FILE);
    let unpack_err = |reason: String| SliceError::ProfileLoad {
        path: target.clone(),
        reason,
        malformed: false,
    };

    if tokio::fs::read_to_string(&target)
        .await
        .is_ok_and(|current| current == BUNDLED_PROFILE)
    {
        return Ok(target);
    }

    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| unpack_err(e.to_string()))?;

    // Concurrent jobs may race here; each renames its own staging file.
    let staging = dir.join(format!("{BUNDLED_PROFILE_FILE}.{}.tmp", uuid::Uuid::new_v4()));
    tokio::fs::write(&staging, BUNDLED_PROFILE)
        .await
        .map_err(|e| unpack_err(e.to_string()))?;
    tokio::fs::rename(&staging, &target)
        .await
        .map_err(|e| unpack_err(e.to_string()))?;

    debug!(path = %target.display(), "Unpacked bundled profile");
    Ok(target)
}

impl EngineConfig {
    /// Read and validate the plugin configuration from a settings provider.
    ///
    /// Empty strings count as unset. Unparseable numbers fall back to the
    /// defaults; out-of-range numbers are rejected.
    pub fn from_settings(settings: &dyn SettingsProvider) -> Result<Self, SliceError> {
        let key = |name: &str| format!("{SETTINGS_PREFIX}.{name}");
        let path = |name: &str| {
            settings
                .get_string(&key(name))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
        };
        let defaults = Self::default();

        let config = Self {
            cura_engine: path("cura_engine"),
            default_profile: path("default_profile"),
            settings_json_path: path("settings_json_path"),
            debug_logging: settings
                .get_bool(&key("debug_logging"))
                .unwrap_or(defaults.debug_logging),
            poll_interval_ms: settings
                .get_u64(&key("poll_interval_ms"))
                .unwrap_or(defaults.poll_interval_ms),
            timeout_seconds: settings
                .get_u64(&key("timeout_seconds"))
                .unwrap_or(defaults.timeout_seconds),
        };

        config
            .validate()
            .map_err(|e| SliceError::Settings(e.to_string()))?;
        Ok(config)
    }

    /// Poll tick for the stderr reader.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Overall job deadline, if any.
    pub fn deadline(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }

    /// The configured default profile, or where the bundled one is unpacked.
    pub fn effective_default_profile(&self) -> PathBuf {
        self.default_profile
            .clone()
            .unwrap_or_else(|| bundled_profile_dir().join(BUNDLED_PROFILE_FILE))
    }

    /// The configured definitions directory, or the bundled one.
    pub fn effective_definitions_dir(&self) -> PathBuf {
        self.settings_json_path
            .clone()
            .unwrap_or_else(bundled_profile_dir)
    }

    /// The default profile path, unpacking the bundled one when no default
    /// is configured.
    pub async fn default_profile_path(&self) -> Result<PathBuf, SliceError> {
        match &self.default_profile {
            Some(path) => Ok(path.clone()),
            None => unpack_bundled_profile().await,
        }
    }

    /// Whether the configured engine path points at an executable file.
    pub fn is_engine_configured(&self) -> bool {
        self.cura_engine
            .as_deref()
            .is_some_and(EngineDiscovery::is_engine_configured)
    }

    /// Get a human-readable summary of the engine configuration.
    pub fn engine_summary(&self) -> String {
        match EngineDiscovery::resolve(self.cura_engine.as_deref()) {
            Ok(inst) => {
                let method = match inst.discovery_method {
                    DiscoveryMethod::ExplicitConfig => "explicit config",
                    DiscoveryMethod::SystemPath => "system PATH",
                };
                format!("{} (found via {})", inst.executable.display(), method)
            }
            Err(e) => format!("Not usable: {e}"),
        }
    }
}
