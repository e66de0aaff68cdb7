//! Slicing job orchestration: path resolution, profile merging, engine
//! validation, supervised execution, and metrics collection.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use slicehub_core::traits::SettingsProvider;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::arguments::{build_arguments, concurrency_hint};
use crate::config::EngineConfig;
use crate::discovery::EngineDiscovery;
use crate::error::SliceError;
use crate::metrics::{MetricsSnapshot, SliceMetrics};
use crate::models::{EngineInvocation, ProgressUpdate, SliceOutcome, SliceRequest, SlicerProperties};
use crate::profile::{ProfileStore, SlicingProfile};
use crate::supervisor::{ProcessSupervisor, ProgressCallback};

/// Environment variable listing the engine's resource lookup directories.
pub const SEARCH_PATH_VAR: &str = "CURA_ENGINE_SEARCH_PATH";

/// Subdirectories of the definitions directory the engine searches.
pub const SEARCH_SUBDIRS: &[&str] = &["definitions", "extruders", "quality", "variants"];

/// Entry point for slicing jobs.
///
/// Configuration is re-read from the settings provider at the start of each
/// job and stays fixed for that job.
#[derive(Debug, Clone)]
pub struct CuraEngineSlicer {
    settings: Arc<dyn SettingsProvider>,
    metrics: Arc<SliceMetrics>,
}

/// A job ready to run: the invocation plus what it was built from.
#[derive(Debug, Clone)]
pub struct PreparedSlice {
    /// Engine command, environment, and working directory.
    pub invocation: EngineInvocation,
    /// Profile the job slices with.
    pub profile: SlicingProfile,
    /// Path passed as the job settings file.
    pub profile_path: PathBuf,
    /// Where the engine writes its output.
    pub output_path: PathBuf,
    /// Configuration in effect for the job.
    pub config: EngineConfig,
}

impl CuraEngineSlicer {
    /// Create a slicer reading its configuration from `settings`.
    pub fn new(settings: Arc<dyn SettingsProvider>) -> Self {
        Self {
            settings,
            metrics: Arc::new(SliceMetrics::new()),
        }
    }

    /// Static description of this slicer.
    pub fn properties(&self) -> SlicerProperties {
        SlicerProperties::default()
    }

    /// Current plugin configuration.
    pub fn config(&self) -> Result<EngineConfig, SliceError> {
        EngineConfig::from_settings(self.settings.as_ref())
    }

    /// Whether the configured engine is an executable file.
    pub fn is_engine_configured(&self) -> bool {
        self.config().is_ok_and(|c| c.is_engine_configured())
    }

    /// Load the default profile (configured, or the bundled fallback).
    pub async fn default_profile(&self) -> Result<SlicingProfile, SliceError> {
        let config = self.config()?;
        ProfileStore::load(&config.default_profile_path().await?).await
    }

    /// The profile path a request will slice with.
    pub async fn resolve_profile_path(
        &self,
        request: &SliceRequest,
        config: &EngineConfig,
    ) -> Result<PathBuf, SliceError> {
        match &request.profile_path {
            Some(path) => Ok(path.clone()),
            None => config.default_profile_path().await,
        }
    }

    /// Resolve paths, load the profile, and build the engine invocation
    /// without running anything.
    ///
    /// Every path handed to the engine is made absolute, since the engine
    /// runs inside the model's directory.
    pub async fn prepare(&self, request: &SliceRequest) -> Result<PreparedSlice, SliceError> {
        let config = self.config()?;
        let output_path = std::path::absolute(request.resolved_output_path()?)?;
        let model_path = std::path::absolute(&request.model_path)?;
        let profile_path =
            std::path::absolute(self.resolve_profile_path(request, &config).await?)?;
        let definitions_dir = std::path::absolute(config.effective_definitions_dir())?;
        let profile = ProfileStore::load(&profile_path).await?;

        let executable = match &config.cura_engine {
            Some(path) => std::path::absolute(path)?,
            None => PathBuf::from(EngineDiscovery::binary_name()),
        };

        let argv = build_arguments(
            &executable,
            &profile_path,
            &output_path,
            &model_path,
            concurrency_hint(),
            &profile.override_settings(),
        );

        let mut env = BTreeMap::new();
        env.insert(SEARCH_PATH_VAR.to_string(), search_path(&definitions_dir)?);

        let working_dir = model_path.parent().map(Path::to_path_buf);

        Ok(PreparedSlice {
            invocation: EngineInvocation {
                executable,
                argv,
                env,
                working_dir,
            },
            profile,
            profile_path,
            output_path,
            config,
        })
    }

    /// Run a slicing job.
    ///
    /// Progress goes to `on_progress` when given. Cancelling `cancel` kills
    /// the engine and returns [`SliceError::Cancelled`].
    #[instrument(skip(self, request, on_progress, cancel), fields(job_id, model = %request.model_path.display()))]
    pub async fn slice(
        &self,
        request: &SliceRequest,
        on_progress: Option<ProgressCallback<'_>>,
        cancel: CancellationToken,
    ) -> Result<SliceOutcome, SliceError> {
        let job_id = Uuid::now_v7();
        tracing::Span::current().record("job_id", job_id.to_string());
        let started_at = Utc::now();
        let start = Instant::now();

        self.metrics.record_started();
        let result = self.run_job(request, on_progress, cancel).await;

        let outcome = match result {
            Ok((output_path, analysis)) => {
                let duration = start.elapsed();
                let output_bytes = match tokio::fs::metadata(&output_path).await {
                    Ok(meta) => meta.len(),
                    Err(_) => {
                        warn!(output = %output_path.display(), "Engine reported success but wrote no output file");
                        0
                    }
                };
                self.metrics.record_success(duration, output_bytes);
                info!(
                    output = %output_path.display(),
                    elapsed_ms = duration.as_millis() as u64,
                    "Slicing job completed"
                );
                Ok(SliceOutcome {
                    job_id,
                    started_at,
                    output_path,
                    analysis,
                    duration,
                })
            }
            Err(e) => {
                match &e {
                    SliceError::Cancelled => self.metrics.record_cancelled(),
                    SliceError::Timeout { .. } => self.metrics.record_timeout(),
                    _ => self.metrics.record_failure(),
                }
                Err(e)
            }
        };

        debug!(metrics = ?self.metrics.snapshot(), "Slicer metrics");
        outcome
    }

    /// Run a slicing job without progress reporting or cancellation.
    pub async fn slice_simple(&self, request: &SliceRequest) -> Result<SliceOutcome, SliceError> {
        self.slice(request, None, CancellationToken::new()).await
    }

    /// Current metrics.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn run_job(
        &self,
        request: &SliceRequest,
        on_progress: Option<ProgressCallback<'_>>,
        cancel: CancellationToken,
    ) -> Result<(PathBuf, Option<crate::models::AnalysisResult>), SliceError> {
        let prepared = self.prepare(request).await?;
        let config = &prepared.config;

        if !config.is_engine_configured() {
            return Err(SliceError::EngineLaunch {
                path: prepared.invocation.executable.clone(),
                reason: "engine not configured or not executable".to_string(),
            });
        }

        if let Some(parent) = prepared.output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        debug!(
            profile = %prepared.profile_path.display(),
            overrides = prepared.profile.override_settings().len(),
            command = %prepared.invocation.command_line(),
            "Prepared slicing engine invocation"
        );

        let supervisor = ProcessSupervisor::new(config.poll_interval())
            .with_deadline(config.deadline())
            .with_engine_logging(config.debug_logging);

        let analysis = match on_progress {
            Some(cb) => supervisor.run(&prepared.invocation, cb, cancel).await?,
            None => {
                let mut ignore = |_: ProgressUpdate| {};
                supervisor
                    .run(&prepared.invocation, &mut ignore, cancel)
                    .await?
            }
        };
        Ok((prepared.output_path, analysis))
    }
}

/// Join the engine resource directories under `root` with the platform
/// path-list separator.
fn search_path(root: &Path) -> Result<String, SliceError> {
    let dirs = SEARCH_SUBDIRS.iter().map(|sub| root.join(sub));
    let joined = std::env::join_paths(dirs)
        .map_err(|e| SliceError::Settings(format!("invalid definitions directory: {e}")))?;
    Ok(joined.to_string_lossy().into_owned())
}
