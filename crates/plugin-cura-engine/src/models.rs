//! Domain models: slice requests, engine invocations, progress, analysis.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SliceError;

/// Tool identifier used when the engine does not name one.
pub const DEFAULT_TOOL: &str = "tool0";

/// Filament volume reported for every tool. The engine output carries no
/// volume figure, so this is a fixed placeholder rather than a measurement.
pub const PLACEHOLDER_FILAMENT_VOLUME_MM3: f64 = 10.0;

/// Extension of the machine-instruction file the engine writes.
pub const OUTPUT_EXTENSION: &str = "gcode";

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A single slicing job request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceRequest {
    /// The 3D model to slice.
    pub model_path: PathBuf,
    /// Where to write the output. Derived from the model path when absent.
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    /// Profile to slice with. The configured default is used when absent.
    #[serde(default)]
    pub profile_path: Option<PathBuf>,
    /// Printer description handed over by the caller. Passed through untouched.
    #[serde(default)]
    pub printer_profile: Option<serde_json::Value>,
}

impl SliceRequest {
    /// Create a request for a model with everything else defaulted.
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            output_path: None,
            profile_path: None,
            printer_profile: None,
        }
    }

    /// Set an explicit output path.
    pub fn with_output(mut self, output_path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(output_path.into());
        self
    }

    /// Set an explicit profile path.
    pub fn with_profile(mut self, profile_path: impl Into<PathBuf>) -> Self {
        self.profile_path = Some(profile_path.into());
        self
    }

    /// The output path for this request: the explicit one, or the model
    /// path with its extension replaced by `gcode`.
    pub fn resolved_output_path(&self) -> Result<PathBuf, SliceError> {
        if let Some(out) = &self.output_path {
            return Ok(out.clone());
        }
        if self.model_path.file_name().is_none() {
            return Err(SliceError::InvalidModelPath {
                path: self.model_path.clone(),
            });
        }
        Ok(self.model_path.with_extension(OUTPUT_EXTENSION))
    }
}

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// Everything needed to launch the engine once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineInvocation {
    /// Engine executable.
    pub executable: PathBuf,
    /// Full argument vector; element 0 is the executable itself.
    pub argv: Vec<String>,
    /// Variables added on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Directory the engine runs in.
    pub working_dir: Option<PathBuf>,
}

impl EngineInvocation {
    /// The program to spawn.
    pub fn program(&self) -> &Path {
        &self.executable
    }

    /// Arguments after the program name.
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    /// Render the command line for logs and dry runs.
    pub fn command_line(&self) -> String {
        self.argv.join(" ")
    }
}

// ---------------------------------------------------------------------------
// Progress & analysis
// ---------------------------------------------------------------------------

/// Slicing progress as a fraction in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Completed share of the job.
    pub fraction: f64,
}

impl ProgressUpdate {
    /// Progress as a percentage.
    pub fn percent(&self) -> f64 {
        self.fraction * 100.0
    }
}

/// Material consumption for one tool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilamentUsage {
    /// Extruded length in millimetres.
    pub length_mm: f64,
    /// Extruded volume in cubic millimetres.
    pub volume_mm3: f64,
}

/// A single piece of analysis recovered from one engine line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisFragment {
    /// Filament consumed by a tool.
    FilamentUsed {
        /// Tool identifier.
        tool: String,
        /// Length in millimetres.
        length_mm: f64,
    },
    /// Estimated print time.
    PrintTime {
        /// Whole minutes.
        minutes: u64,
    },
}

/// Summary of a finished slice. Fields fill in independently and may stay
/// partial when the engine never reports them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Filament usage keyed by tool identifier.
    pub filament: BTreeMap<String, FilamentUsage>,
    /// Estimated print time in whole minutes.
    pub estimated_print_time_minutes: Option<u64>,
}

impl AnalysisResult {
    /// Merge one fragment in. A later value for the same field replaces the earlier one.
    pub fn apply(&mut self, fragment: AnalysisFragment) {
        match fragment {
            AnalysisFragment::FilamentUsed { tool, length_mm } => {
                self.filament.insert(
                    tool,
                    FilamentUsage {
                        length_mm,
                        volume_mm3: PLACEHOLDER_FILAMENT_VOLUME_MM3,
                    },
                );
            }
            AnalysisFragment::PrintTime { minutes } => {
                self.estimated_print_time_minutes = Some(minutes);
            }
        }
    }

    /// Filament length for a tool, if reported.
    pub fn filament_length_mm(&self, tool: &str) -> Option<f64> {
        self.filament.get(tool).map(|f| f.length_mm)
    }
}

// ---------------------------------------------------------------------------
// Descriptor & outcome
// ---------------------------------------------------------------------------

/// Static description of the slicer offered by this plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlicerProperties {
    /// Slicer type identifier.
    #[serde(rename = "type")]
    pub slicer_type: String,
    /// Human-readable name.
    pub name: String,
    /// Whether slicing runs on the same machine as the caller.
    pub same_device: bool,
    /// Whether the slicer reports progress while running.
    pub progress_report: bool,
    /// Accepted model file extensions.
    pub source_file_types: Vec<String>,
    /// Produced file extension.
    pub destination_extensions: Vec<String>,
}

impl Default for SlicerProperties {
    fn default() -> Self {
        Self {
            slicer_type: "cura_engine".to_string(),
            name: "CuraEngine".to_string(),
            same_device: true,
            progress_report: true,
            source_file_types: vec!["stl".to_string()],
            destination_extensions: vec![OUTPUT_EXTENSION.to_string()],
        }
    }
}

/// What a successful slicing job produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceOutcome {
    /// Job identifier (UUIDv7).
    pub job_id: Uuid,
    /// When the job started.
    pub started_at: DateTime<Utc>,
    /// The file the engine was told to write.
    pub output_path: PathBuf,
    /// Analysis gathered from the engine output, absent if none was reported.
    pub analysis: Option<AnalysisResult>,
    /// Wall-clock duration of the job.
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_derived_from_model() {
        let request = SliceRequest::new("/tmp/part.stl");
        assert_eq!(
            request.resolved_output_path().expect("output"),
            PathBuf::from("/tmp/part.gcode")
        );
    }

    #[test]
    fn test_output_path_explicit_wins() {
        let request = SliceRequest::new("/tmp/part.stl").with_output("/srv/out/x.gcode");
        assert_eq!(
            request.resolved_output_path().expect("output"),
            PathBuf::from("/srv/out/x.gcode")
        );
    }

    #[test]
    fn test_output_path_stable() {
        let request = SliceRequest::new("/tmp/a.b.stl");
        let first = request.resolved_output_path().expect("output");
        let second = request.resolved_output_path().expect("output");
        assert_eq!(first, second);
        assert_eq!(first, PathBuf::from("/tmp/a.b.gcode"));
    }

    #[test]
    fn test_model_without_file_name_rejected() {
        let request = SliceRequest::new("/");
        assert!(matches!(
            request.resolved_output_path(),
            Err(SliceError::InvalidModelPath { .. })
        ));
    }

    #[test]
    fn test_analysis_accumulates() {
        let mut analysis = AnalysisResult::default();
        analysis.apply(AnalysisFragment::PrintTime { minutes: 10 });
        assert!(analysis.filament.is_empty());

        analysis.apply(AnalysisFragment::FilamentUsed {
            tool: DEFAULT_TOOL.to_string(),
            length_mm: 2500.0,
        });
        assert_eq!(analysis.filament_length_mm("tool0"), Some(2500.0));
        assert_eq!(analysis.filament["tool0"].volume_mm3, 10.0);
        assert_eq!(analysis.estimated_print_time_minutes, Some(10));
    }

    #[test]
    fn test_invocation_args_skip_program() {
        let invocation = EngineInvocation {
            executable: PathBuf::from("/opt/CuraEngine"),
            argv: vec!["/opt/CuraEngine".into(), "slice".into(), "-v".into()],
            env: BTreeMap::new(),
            working_dir: None,
        };
        assert_eq!(invocation.args(), ["slice", "-v"]);
        assert_eq!(invocation.command_line(), "/opt/CuraEngine slice -v");
    }

    #[test]
    fn test_slicer_properties_serialization() {
        let json = serde_json::to_value(SlicerProperties::default()).expect("serialize");
        assert_eq!(json["type"], "cura_engine");
        assert_eq!(json["same_device"], true);
        assert_eq!(json["source_file_types"], serde_json::json!(["stl"]));
        assert_eq!(json["destination_extensions"], serde_json::json!(["gcode"]));
    }
}
