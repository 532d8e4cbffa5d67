use anyhow::Result;
use cbr_stats::cli::OutputFormat;
use cbr_stats::core::log::init_logging;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    /// Report output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let command = match cli.command {
        Some(Commands::Setup) => cbr_stats::AppCommand::Setup,
        None => cbr_stats::AppCommand::Report(cli.format),
    };

    let result = cbr_stats::run_command(command, cli.config_path.as_deref()).await;

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
