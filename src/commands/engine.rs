//! Slicing engine CLI commands.

use std::sync::Arc;

use clap::{Args, Subcommand};
use serde::Serialize;

use crate::output::{self, OutputFormat};
use plugin_cura_engine::{CuraEngineSlicer, SlicerProperties};
use slicehub_core::config::LayeredSettings;
use slicehub_core::error::AppError;

/// Arguments for engine commands
#[derive(Debug, Args)]
pub struct EngineArgs {
    /// Engine subcommand
    #[command(subcommand)]
    pub command: EngineCommand,
}

/// Engine subcommands
#[derive(Debug, Subcommand)]
pub enum EngineCommand {
    /// Check that the configured engine is usable
    Check,
}

#[derive(Debug, Serialize)]
struct EngineStatus {
    configured: bool,
    engine: String,
    default_profile: String,
    definitions_dir: String,
    properties: SlicerProperties,
}

/// Execute engine commands
pub async fn execute(
    args: &EngineArgs,
    settings: Arc<LayeredSettings>,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        EngineCommand::Check => {
            let slicer = CuraEngineSlicer::new(settings);
            let config = slicer.config()?;
            let status = EngineStatus {
                configured: config.is_engine_configured(),
                engine: config.engine_summary(),
                default_profile: config.effective_default_profile().display().to_string(),
                definitions_dir: config.effective_definitions_dir().display().to_string(),
                properties: slicer.properties(),
            };

            match format {
                OutputFormat::Json => output::print_json(&status),
                OutputFormat::Table => {
                    if status.configured {
                        output::print_success("Slicing engine is configured");
                    } else {
                        output::print_warning("Slicing engine is not configured or not executable");
                    }
                    output::print_kv("Engine", &status.engine);
                    output::print_kv("Default profile", &status.default_profile);
                    output::print_kv("Definitions", &status.definitions_dir);
                    output::print_kv("Slicer", &status.properties.name);
                    output::print_kv(
                        "Accepts",
                        &status.properties.source_file_types.join(", "),
                    );
                    output::print_kv(
                        "Produces",
                        &status.properties.destination_extensions.join(", "),
                    );
                }
            }

            if !status.configured {
                return Err(AppError::configuration(
                    "set plugins.cura_engine.cura_engine to an executable CuraEngine",
                ));
            }
        }
    }

    Ok(())
}
