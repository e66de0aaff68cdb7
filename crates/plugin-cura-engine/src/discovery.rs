//! CuraEngine executable discovery and validation.
//!
//! The engine is located by:
//! 1. The explicitly configured path (a file, or a directory containing the binary)
//! 2. The system PATH
//!
//! A path only counts as a usable engine if it is a regular file and, on
//! unix, carries an execute permission bit.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::SliceError;

/// The engine binary name.
#[cfg(windows)]
const ENGINE_BINARY: &str = "CuraEngine.exe";
#[cfg(not(windows))]
const ENGINE_BINARY: &str = "CuraEngine";

/// Information about a located engine executable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineInstallation {
    /// Full path to the engine executable.
    pub executable: PathBuf,
    /// How the executable was found.
    pub discovery_method: DiscoveryMethod,
}

/// How the engine executable was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    /// Explicitly configured by the user.
    ExplicitConfig,
    /// Found via the system PATH environment variable.
    SystemPath,
}

/// CuraEngine discovery engine.
pub struct EngineDiscovery;

impl EngineDiscovery {
    /// Resolve the engine from configuration, falling back to PATH when
    /// nothing is configured.
    ///
    /// A configured path that does not validate is an error; PATH is only
    /// consulted when no path was configured at all.
    pub fn resolve(configured: Option<&Path>) -> Result<EngineInstallation, SliceError> {
        match configured {
            Some(path) => Self::from_explicit_path(path),
            None => {
                debug!("No engine path configured, searching PATH");
                Self::discover_from_path().ok_or_else(|| SliceError::EngineLaunch {
                    path: PathBuf::from(ENGINE_BINARY),
                    reason: "engine path not configured and not found in PATH".to_string(),
                })
            }
        }
    }

    /// Validate an explicitly configured path.
    pub fn from_explicit_path(path: &Path) -> Result<EngineInstallation, SliceError> {
        if !path.exists() {
            return Err(SliceError::EngineLaunch {
                path: path.to_path_buf(),
                reason: "path does not exist".to_string(),
            });
        }

        let executable = if path.is_dir() {
            path.join(ENGINE_BINARY)
        } else {
            path.to_path_buf()
        };

        if !Self::is_engine_configured(&executable) {
            return Err(SliceError::EngineLaunch {
                path: executable,
                reason: "not a file or not executable".to_string(),
            });
        }

        Ok(EngineInstallation {
            executable,
            discovery_method: DiscoveryMethod::ExplicitConfig,
        })
    }

    /// Search the system PATH for the engine binary.
    fn discover_from_path() -> Option<EngineInstallation> {
        let path_var = std::env::var_os("PATH")?;

        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(ENGINE_BINARY);
            if Self::is_engine_configured(&candidate) {
                info!(path = %candidate.display(), "Found CuraEngine in system PATH");
                return Some(EngineInstallation {
                    executable: candidate,
                    discovery_method: DiscoveryMethod::SystemPath,
                });
            }
        }

        None
    }

    /// Whether `path` is a regular file the current user may execute.
    pub fn is_engine_configured(path: &Path) -> bool {
        let Ok(metadata) = std::fs::metadata(path) else {
            return false;
        };
        if !metadata.is_file() {
            return false;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            metadata.permissions().mode() & 0o111 != 0
        }
        #[cfg(not(unix))]
        {
            true
        }
    }

    /// Get the engine binary file name.
    pub fn binary_name() -> &'static str {
        ENGINE_BINARY
    }
}
