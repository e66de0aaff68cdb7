//! CLI command definitions and dispatch.

pub mod config;
pub mod engine;
pub mod profile;
pub mod slice;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use slicehub_core::config::LayeredSettings;
use slicehub_core::error::AppError;

/// SliceHub: slice 3D models with CuraEngine
#[derive(Debug, Parser)]
#[command(name = "slicehub", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Configuration overlay to apply from `config/<env>.toml`
    #[arg(long, default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Slice a model into G-code
    Slice(slice::SliceArgs),
    /// Slicing profile management
    Profile(profile::ProfileArgs),
    /// Slicing engine status
    Engine(engine::EngineArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, settings: Arc<LayeredSettings>) -> Result<(), AppError> {
        match &self.command {
            Commands::Slice(args) => slice::execute(args, settings, self.format).await,
            Commands::Profile(args) => profile::execute(args, settings, self.format).await,
            Commands::Engine(args) => engine::execute(args, settings, self.format).await,
            Commands::Config(args) => config::execute(args, &settings, self.format).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_slice() {
        let cli = Cli::try_parse_from([
            "slicehub",
            "-f",
            "json",
            "slice",
            "part.stl",
            "-p",
            "fast.profile",
            "--timeout-seconds",
            "60",
        ])
        .expect("parse");

        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.config, "config/default.toml");
        let Commands::Slice(args) = cli.command else {
            panic!("expected slice command");
        };
        assert_eq!(args.model, std::path::PathBuf::from("part.stl"));
        assert_eq!(args.timeout_seconds, Some(60));
        assert!(args.output.is_none());
    }

    #[test]
    fn test_parse_profile_import() {
        let cli = Cli::try_parse_from([
            "slicehub",
            "profile",
            "import",
            "My Profile.json",
            "--dir",
            "profiles",
            "--allow-overwrite",
        ])
        .expect("parse");

        let Commands::Profile(profile::ProfileArgs {
            command: profile::ProfileCommand::Import { allow_overwrite, name, .. },
        }) = cli.command
        else {
            panic!("expected profile import");
        };
        assert!(allow_overwrite);
        assert!(name.is_none());
    }
}
