//! SliceHub: supervised CuraEngine slicing from the command line.
//!
//! Loads layered configuration, initialises logging, and dispatches to the
//! subcommands in [`commands`].

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use plugin_cura_engine::ENGINE_LOG_TARGET;
use slicehub_core::SettingsProvider;
use slicehub_core::config::LayeredSettings;
use slicehub_core::config::logging::LoggingConfig;

mod commands;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let settings = match LayeredSettings::load(&cli.config, &cli.env) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&settings);
    tracing::debug!(config = %cli.config, env = %cli.env, "SliceHub v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = cli.execute(settings).await {
        output::print_error(&e.to_string());
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
///
/// `RUST_LOG` wins over the configured level. The engine output target is
/// switched on only when `plugins.cura_engine.debug_logging` is set.
fn init_logging(settings: &LayeredSettings) {
    let logging = settings
        .app_config()
        .map(|c| c.logging)
        .unwrap_or_else(|_| LoggingConfig::default());

    let engine_level = if settings
        .get_bool("plugins.cura_engine.debug_logging")
        .unwrap_or(false)
    {
        "debug"
    } else {
        "off"
    };

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let filter = EnvFilter::new(&logging.level);
            match format!("{ENGINE_LOG_TARGET}={engine_level}").parse() {
                Ok(directive) => filter.add_directive(directive),
                Err(_) => filter,
            }
        }
    };

    if logging.is_json() {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .pretty()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
