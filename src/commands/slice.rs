//! Model slicing CLI command.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::output::{self, OutputFormat};
use plugin_cura_engine::{CuraEngineSlicer, ProgressUpdate, SliceOutcome, SliceRequest};
use slicehub_core::config::LayeredSettings;
use slicehub_core::error::AppError;
use slicehub_core::traits::{OverlaySettings, SettingsProvider, StaticSettings};

/// Arguments for the slice command
#[derive(Debug, Args)]
pub struct SliceArgs {
    /// Model file to slice
    pub model: PathBuf,

    /// Output G-code path (defaults to the model path with a .gcode extension)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Profile to slice with (defaults to the configured default profile)
    #[arg(short, long)]
    pub profile: Option<PathBuf>,

    /// Kill the engine after this many seconds (0 disables the deadline)
    #[arg(long)]
    pub timeout_seconds: Option<u64>,

    /// Print the engine command line without running it
    #[arg(long)]
    pub dry_run: bool,
}

/// Execute the slice command
pub async fn execute(
    args: &SliceArgs,
    settings: Arc<LayeredSettings>,
    format: OutputFormat,
) -> Result<(), AppError> {
    let mut flags = StaticSettings::new();
    if let Some(secs) = args.timeout_seconds {
        flags.set("plugins.cura_engine.timeout_seconds", secs.to_string());
    }
    let provider: Arc<dyn SettingsProvider> = Arc::new(OverlaySettings::new(settings, flags));
    let slicer = CuraEngineSlicer::new(provider);

    let mut request = SliceRequest::new(&args.model);
    request.output_path = args.output.clone();
    request.profile_path = args.profile.clone();

    if args.dry_run {
        let prepared = slicer.prepare(&request).await?;
        match format {
            OutputFormat::Json => output::print_json(&prepared.invocation),
            OutputFormat::Table => {
                println!("{}", prepared.invocation.command_line());
                for (key, value) in &prepared.invocation.env {
                    output::print_kv(key, value);
                }
            }
        }
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling slice");
            on_ctrl_c.cancel();
        }
    });

    let show_progress = format == OutputFormat::Table;
    let mut on_progress = |update: ProgressUpdate| {
        if show_progress {
            output::print_progress(update.percent());
        }
    };

    let result = slicer
        .slice(&request, Some(&mut on_progress), cancel)
        .await;
    if show_progress {
        output::finish_progress();
    }
    let outcome = result?;

    match format {
        OutputFormat::Json => output::print_json(&outcome),
        OutputFormat::Table => print_outcome(&outcome),
    }
    Ok(())
}

fn print_outcome(outcome: &SliceOutcome) {
    output::print_success(&format!("Sliced to '{}'", outcome.output_path.display()));
    output::print_kv("Job", &outcome.job_id.to_string());
    output::print_kv(
        "Duration",
        &format!("{:.1}s", outcome.duration.as_secs_f64()),
    );

    let Some(analysis) = &outcome.analysis else {
        output::print_warning("Engine reported no analysis");
        return;
    };

    for (tool, usage) in &analysis.filament {
        output::print_kv(
            &format!("Filament ({tool})"),
            &format!("{:.1} mm", usage.length_mm),
        );
    }
    if let Some(minutes) = analysis.estimated_print_time_minutes {
        output::print_kv(
            "Print time",
            &format!("{}h {:02}m", minutes / 60, minutes % 60),
        );
    }
}
