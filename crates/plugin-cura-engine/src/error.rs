//! Unified error type for the CuraEngine slicing plugin.
//!
//! Profile, engine launch, supervision, and settings failures are
//! consolidated into a single `SliceError` enum that maps cleanly to
//! `slicehub_core::error::AppError`.
//!
//! Malformed diagnostic lines never produce an error; the parser drops them.

use slicehub_core::error::AppError;
use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for all slicing operations.
#[derive(Debug, Error)]
pub enum SliceError {
    // --- Profile errors ---
    /// Profile document is missing, unreadable, or not a JSON object.
    #[error("Failed to load profile {path}: {reason}")]
    ProfileLoad {
        /// The profile path that was read.
        path: PathBuf,
        /// What went wrong.
        reason: String,
        /// The file was read but is not a JSON object document.
        malformed: bool,
    },

    /// Profile document could not be written.
    #[error("Failed to save profile {path}: {reason}")]
    ProfileSave {
        /// The profile path that was written.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A profile already exists at the target path and overwrite was not allowed.
    #[error("Profile already exists: {path}")]
    ProfileExists {
        /// The existing profile path.
        path: PathBuf,
    },

    /// Profile name contains a path separator or nothing usable.
    #[error("Invalid profile name '{name}': {reason}")]
    InvalidProfileName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    // --- Request errors ---
    /// Model path has no file name to derive an output path from.
    #[error("Invalid model path: {path}")]
    InvalidModelPath {
        /// The rejected model path.
        path: PathBuf,
    },

    // --- Process execution errors ---
    /// Engine executable is missing, not executable, or failed to spawn.
    #[error("Failed to launch slicing engine {path}: {reason}")]
    EngineLaunch {
        /// The configured engine path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// Engine exited unsuccessfully.
    #[error(
        "Slicing engine failed (exit code {}): {}",
        .code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
        .stderr_tail
    )]
    SliceEngineFailed {
        /// Exit code, `None` when terminated by a signal.
        code: Option<i32>,
        /// The last lines the engine wrote to its diagnostic stream.
        stderr_tail: String,
    },

    /// Engine exceeded the configured deadline and was killed.
    #[error("Slicing engine timed out after {timeout_seconds}s")]
    Timeout {
        /// The deadline that was exceeded.
        timeout_seconds: u64,
    },

    /// Slicing was cancelled via cancellation token.
    #[error("Slicing was cancelled")]
    Cancelled,

    // --- Generic errors ---
    /// Plugin settings are invalid.
    #[error("Invalid slicer settings: {0}")]
    Settings(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SliceError> for AppError {
    fn from(err: SliceError) -> Self {
        match &err {
            SliceError::ProfileLoad {
                malformed: true, ..
            } => AppError::validation(err.to_string()),
            SliceError::ProfileLoad { .. } => AppError::not_found(err.to_string()),
            SliceError::ProfileExists { .. } | SliceError::Cancelled => {
                AppError::conflict(err.to_string())
            }
            SliceError::InvalidProfileName { .. } | SliceError::InvalidModelPath { .. } => {
                AppError::validation(err.to_string())
            }
            SliceError::EngineLaunch { .. } | SliceError::Settings(_) => {
                AppError::configuration(err.to_string())
            }
            SliceError::SliceEngineFailed { .. } => AppError::external_service(err.to_string()),
            SliceError::Timeout { .. } => AppError::service_unavailable(err.to_string()),
            SliceError::ProfileSave { .. } | SliceError::Io(_) => {
                AppError::storage(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slicehub_core::error::ErrorKind;

    #[test]
    fn test_engine_failed_message() {
        let err = SliceError::SliceEngineFailed {
            code: Some(2),
            stderr_tail: "Failed to load model".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Slicing engine failed (exit code 2): Failed to load model"
        );

        let killed = SliceError::SliceEngineFailed {
            code: None,
            stderr_tail: String::new(),
        };
        assert!(killed.to_string().contains("exit code signal"));
    }

    #[test]
    fn test_app_error_mapping() {
        let cases = [
            (
                SliceError::ProfileLoad {
                    path: PathBuf::from("/x.profile"),
                    reason: "missing".to_string(),
                    malformed: false,
                },
                ErrorKind::NotFound,
            ),
            (
                SliceError::ProfileLoad {
                    path: PathBuf::from("/x.profile"),
                    reason: "invalid JSON".to_string(),
                    malformed: true,
                },
                ErrorKind::Validation,
            ),
            (
                SliceError::InvalidProfileName {
                    name: "***".to_string(),
                    reason: "no usable characters",
                },
                ErrorKind::Validation,
            ),
            (SliceError::Cancelled, ErrorKind::Conflict),
            (
                SliceError::Timeout { timeout_seconds: 5 },
                ErrorKind::ServiceUnavailable,
            ),
            (
                SliceError::EngineLaunch {
                    path: PathBuf::from("/bin/none"),
                    reason: "not found".to_string(),
                },
                ErrorKind::Configuration,
            ),
            (
                SliceError::SliceEngineFailed {
                    code: Some(1),
                    stderr_tail: String::new(),
                },
                ErrorKind::ExternalService,
            ),
        ];

        for (err, kind) in cases {
            let app: AppError = err.into();
            assert_eq!(app.kind, kind);
        }
    }
}
