pub mod cli;
pub mod collector;
pub mod core;
pub mod providers;

use crate::cli::{OutputFormat, report, ui};
use crate::core::config::AppConfig;
use crate::core::window;
use anyhow::Result;
use chrono::{Local, NaiveDate};
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Report(OutputFormat),
    Setup,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    match command {
        AppCommand::Setup => match config_path {
            Some(path) => cli::setup::setup_at_path(path),
            None => cli::setup::setup(),
        },
        AppCommand::Report(format) => {
            let config = AppConfig::load(config_path)?;
            debug!("Loaded config: {config:#?}");
            run_report(&config, Local::now().date_naive(), format).await
        }
    }
}

/// Fetches the window ending at `today` and prints the report to stdout.
pub async fn run_report(config: &AppConfig, today: NaiveDate, format: OutputFormat) -> Result<()> {
    info!("Collecting exchange rates up to {today}");

    let feed = Arc::new(providers::CbrFeedClient::new(&config.feed)?);
    let dates = window::trailing(today);

    let pb = ui::new_progress_bar(dates.len() as u64);
    let collection = collector::collect(
        feed,
        dates.clone(),
        config.max_concurrent_requests,
        &|| pb.inc(1),
    )
    .await;
    pb.finish_and_clear();

    let mut stdout = std::io::stdout().lock();
    report::render(&collection, &dates, format, &mut stdout)
}
