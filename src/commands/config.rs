//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use crate::output::{self, OutputFormat};
use plugin_cura_engine::EngineConfig;
use slicehub_core::config::LayeredSettings;
use slicehub_core::error::AppError;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Validate the merged configuration
    Validate,
    /// Generate a default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config/generated.toml")]
        output: String,
    },
}

/// Execute config commands
pub async fn execute(
    args: &ConfigArgs,
    settings: &LayeredSettings,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let app = settings.app_config()?;
            match format {
                OutputFormat::Json => output::print_json(&app),
                OutputFormat::Table => {
                    output::print_kv("Log level", &app.logging.level);
                    output::print_kv("Log format", &app.logging.format);
                    for (plugin, values) in &app.plugins {
                        println!("  [plugins.{plugin}]");
                        println!(
                            "{}",
                            serde_json::to_string_pretty(values).unwrap_or_default()
                        );
                    }
                }
            }
        }
        ConfigCommand::Validate => {
            settings.app_config()?;
            match EngineConfig::from_settings(settings) {
                Ok(engine) => {
                    output::print_success("Configuration is valid");
                    output::print_kv("Engine", &engine.engine_summary());
                    output::print_kv(
                        "Timeout",
                        &match engine.deadline() {
                            Some(d) => format!("{}s", d.as_secs()),
                            None => "none".to_string(),
                        },
                    );
                }
                Err(e) => {
                    output::print_error(&format!("Configuration invalid: {}", e));
                    return Err(e.into());
                }
            }
        }
        ConfigCommand::Generate { output: out_path } => {
            let default_config = include_str!("../../config/default.toml");

            if let Some(parent) = std::path::Path::new(out_path).parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| AppError::storage(format!("Failed to create dir: {}", e)))?;
            }

            tokio::fs::write(out_path, default_config)
                .await
                .map_err(|e| AppError::storage(format!("Failed to write config: {}", e)))?;

            output::print_success(&format!("Default config written to '{}'", out_path));
        }
    }

    Ok(())
}
