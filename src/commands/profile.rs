//! Slicing profile CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use plugin_cura_engine::profile::ProfileEntry;
use plugin_cura_engine::{CuraEngineSlicer, ProfileStore, SliceError, SlicingProfile};
use slicehub_core::config::LayeredSettings;
use slicehub_core::error::AppError;

/// Arguments for profile commands
#[derive(Debug, Args)]
pub struct ProfileArgs {
    /// Profile subcommand
    #[command(subcommand)]
    pub command: ProfileCommand,
}

/// Profile subcommands
#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// Show a profile's metadata, overrides, and settings
    Show {
        /// Profile file
        path: PathBuf,
    },
    /// Show the profile used when none is given
    Default,
    /// List the profiles in a directory
    List {
        /// Directory to scan
        dir: PathBuf,
    },
    /// Import a profile document into a profile directory
    Import {
        /// Profile document to import
        source: PathBuf,
        /// Destination profile directory
        #[arg(short, long)]
        dir: PathBuf,
        /// Name to store the profile under (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
        /// Replace an existing profile without asking
        #[arg(long)]
        allow_overwrite: bool,
    },
}

/// Profile row for table display
#[derive(Debug, Serialize, Tabled)]
struct ProfileRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Display Name")]
    display_name: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Overrides")]
    overrides: usize,
    #[tabled(rename = "Path")]
    path: String,
}

impl From<&ProfileEntry> for ProfileRow {
    fn from(entry: &ProfileEntry) -> Self {
        Self {
            name: entry.profile.name.clone(),
            display_name: entry.profile.display_name.clone().unwrap_or_default(),
            description: entry.profile.description.clone().unwrap_or_default(),
            overrides: entry.profile.override_settings().len(),
            path: entry.path.display().to_string(),
        }
    }
}

/// Execute profile commands
pub async fn execute(
    args: &ProfileArgs,
    settings: Arc<LayeredSettings>,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ProfileCommand::Show { path } => {
            let profile = ProfileStore::load(path).await?;
            show_profile(&profile, format);
        }
        ProfileCommand::Default => {
            let slicer = CuraEngineSlicer::new(settings);
            let profile = slicer.default_profile().await?;
            show_profile(&profile, format);
        }
        ProfileCommand::List { dir } => {
            let entries = ProfileStore::list(dir).await?;
            let rows: Vec<ProfileRow> = entries.iter().map(ProfileRow::from).collect();
            output::print_list(&rows, format);
        }
        ProfileCommand::Import {
            source,
            dir,
            name,
            allow_overwrite,
        } => {
            let target = import(source, dir, name.as_deref(), *allow_overwrite).await?;
            output::print_success(&format!("Profile imported to '{}'", target.display()));
        }
    }

    Ok(())
}

/// Import, asking before replacing an existing profile.
async fn import(
    source: &Path,
    dir: &Path,
    name: Option<&str>,
    allow_overwrite: bool,
) -> Result<PathBuf, AppError> {
    match ProfileStore::import(source, dir, name, allow_overwrite).await {
        Err(SliceError::ProfileExists { path }) => {
            let confirm = dialoguer::Confirm::new()
                .with_prompt(format!("Profile '{}' exists. Overwrite?", path.display()))
                .default(false)
                .interact()
                .map_err(|e| AppError::internal(format!("Input error: {}", e)))?;

            if !confirm {
                return Err(SliceError::ProfileExists { path }.into());
            }
            Ok(ProfileStore::import(source, dir, name, true).await?)
        }
        other => Ok(other?),
    }
}

fn show_profile(profile: &SlicingProfile, format: OutputFormat) {
    match format {
        OutputFormat::Json => output::print_json(profile),
        OutputFormat::Table => {
            output::print_kv("Name", &profile.name);
            output::print_kv(
                "Display name",
                profile.display_name.as_deref().unwrap_or("-"),
            );
            output::print_kv(
                "Description",
                profile.description.as_deref().unwrap_or("-"),
            );
            output::print_kv("Settings", &profile.data.len().to_string());

            let overrides = profile.override_settings();
            if overrides.is_empty() {
                println!("  No engine overrides.");
            } else {
                println!("  Engine overrides:");
                for (key, value) in &overrides {
                    println!("    -s {key}={value}");
                }
            }
        }
    }
}
