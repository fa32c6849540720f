//! Tidepool CLI - Command-line interface
//!
//! Provides command-line access to Tidepool functionality.

mod commands;

use clap::Parser;
use tidepool_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "tidepool")]
#[command(about = "An aggregated video discovery and relay server")]
struct Cli {
    /// Console log level (full debug log always goes to logs/)
    #[arg(long, value_enum, default_value_t = CliLogLevel::Info)]
    log_level: CliLogLevel,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), None)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    commands::handle_command(cli.command).await?;

    Ok(())
}
