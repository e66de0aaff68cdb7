//! # Plugin CuraEngine
//!
//! A SliceHub plugin that turns 3D models into G-code by running the
//! CuraEngine command-line slicer as a supervised child process.
//!
//! ## Job flow
//!
//! The [`CuraEngineSlicer`] resolves the output and profile paths, merges the
//! profile's `metadata.octoprint_settings` into engine `-s key=value`
//! overrides, and hands the invocation to a [`ProcessSupervisor`]. The
//! supervisor streams the engine's stderr through the line parser, forwards
//! monotonic progress to the caller, and returns the collected
//! [`AnalysisResult`] once the engine exits.

pub mod arguments;
pub mod config;
pub mod discovery;
pub mod error;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod profile;
pub mod progress;
pub mod supervisor;

pub use config::EngineConfig;
pub use discovery::EngineDiscovery;
pub use error::SliceError;
pub use models::{
    AnalysisFragment, AnalysisResult, EngineInvocation, FilamentUsage, ProgressUpdate,
    SliceOutcome, SliceRequest, SlicerProperties,
};
pub use orchestrator::{CuraEngineSlicer, PreparedSlice};
pub use profile::{ProfileStore, SlicingProfile};
pub use supervisor::{ENGINE_LOG_TARGET, ProcessSupervisor};
