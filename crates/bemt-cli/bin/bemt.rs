//! bemt binary entry point.
//!
//! This is a thin wrapper around the bemt-cli library that:
//! 1. Parses command-line arguments
//! 2. Initializes logging
//! 3. Validates configuration
//! 4. Runs the selected command

use anyhow::Result;
use bemt_cli::{Cli, LogFormat, commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::from_args();

    // RUST_LOG overrides the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }

    cli.validate()?;

    let summary = commands::run(&cli.command)?;
    tracing::info!("{}", summary);

    Ok(())
}
