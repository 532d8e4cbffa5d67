//! Renders a collected window as text, a table or JSON.

use super::ui;
use crate::collector::{Collection, DayOutcome, DayStatus};
use crate::core::{Summary, summarize};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::ValueEnum;
use comfy_table::Cell;
use serde::Serialize;
use std::io::Write;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain report lines
    #[default]
    Text,
    /// Styled table
    Table,
    /// Machine-readable JSON
    Json,
}

const NO_DATA_FOR_PERIOD: &str = "No data for period";

fn missing_reason(day: &DayOutcome) -> String {
    match &day.status {
        DayStatus::Failed(e) => e.to_string(),
        DayStatus::Empty => "no currencies published".to_string(),
        DayStatus::Loaded(n) => format!("{n} currencies"),
    }
}

/// Writes the report for `collection`, fetched over `window`.
pub fn render<W: Write>(
    collection: &Collection,
    window: &[NaiveDate],
    format: OutputFormat,
    out: &mut W,
) -> Result<()> {
    // Nothing to aggregate: no extremes and no mean to divide out.
    let summary = if collection.records.is_empty() {
        debug!("No records collected, skipping aggregation");
        None
    } else {
        summarize(&collection.records)
    };

    match format {
        OutputFormat::Text => write_text(collection, summary.as_ref(), out),
        OutputFormat::Table => write_table(collection, summary.as_ref(), out),
        OutputFormat::Json => write_json(collection, window, summary.as_ref(), out),
    }
    .context("Failed to write report")
}

fn write_text<W: Write>(
    collection: &Collection,
    summary: Option<&Summary>,
    out: &mut W,
) -> std::io::Result<()> {
    for day in collection.missing_days() {
        writeln!(out, "No data for {}: {}", day.date, missing_reason(day))?;
    }

    let Some(summary) = summary else {
        return writeln!(out, "{NO_DATA_FOR_PERIOD}");
    };

    let (max, min) = (&summary.max, &summary.min);
    writeln!(
        out,
        "Maximum rate: {} ({}) = {:.6}, date: {}",
        max.name, max.code, max.rate, max.date
    )?;
    writeln!(
        out,
        "Minimum rate: {} ({}) = {:.6}, date: {}",
        min.name, min.code, min.rate, min.date
    )?;
    writeln!(
        out,
        "Average rate across all currencies: {:.6}",
        summary.mean
    )
}

fn write_table<W: Write>(
    collection: &Collection,
    summary: Option<&Summary>,
    out: &mut W,
) -> std::io::Result<()> {
    for day in collection.missing_days() {
        let line = format!("No data for {}: {}", day.date, missing_reason(day));
        writeln!(out, "{}", ui::style_text(&line, ui::StyleType::Error))?;
    }

    let Some(summary) = summary else {
        return writeln!(
            out,
            "{}",
            ui::style_text(NO_DATA_FOR_PERIOD, ui::StyleType::Error)
        );
    };

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell(""),
        ui::header_cell("Currency"),
        ui::header_cell("Code"),
        ui::header_cell("Rate"),
        ui::header_cell("Date"),
    ]);
    for (label, record) in [("Maximum", &summary.max), ("Minimum", &summary.min)] {
        table.add_row(vec![
            Cell::new(ui::style_text(label, ui::StyleType::Label)),
            Cell::new(&record.name),
            Cell::new(&record.code),
            ui::rate_cell(record.rate),
            Cell::new(record.date),
        ]);
    }
    table.add_row(vec![
        Cell::new(ui::style_text("Average", ui::StyleType::Label)),
        Cell::new("all currencies"),
        Cell::new(""),
        ui::rate_cell(summary.mean),
        Cell::new(""),
    ]);

    writeln!(
        out,
        "\n{}\n",
        ui::style_text("Exchange rates, last 90 days", ui::StyleType::Title)
    )?;
    writeln!(out, "{table}")?;
    writeln!(
        out,
        "{}",
        ui::style_text(
            &format!(
                "{} rates from {} days",
                summary.count,
                collection.days.len() - collection.missing_days().count()
            ),
            ui::StyleType::Subtle
        )
    )
}

#[derive(Serialize)]
struct MissingDay {
    date: NaiveDate,
    reason: String,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    window_start: Option<NaiveDate>,
    window_end: Option<NaiveDate>,
    days_requested: usize,
    records: usize,
    missing_days: Vec<MissingDay>,
    summary: Option<&'a Summary>,
}

fn write_json<W: Write>(
    collection: &Collection,
    window: &[NaiveDate],
    summary: Option<&Summary>,
    out: &mut W,
) -> std::io::Result<()> {
    let report = JsonReport {
        window_start: window.first().copied(),
        window_end: window.last().copied(),
        days_requested: window.len(),
        records: collection.records.len(),
        missing_days: collection
            .missing_days()
            .map(|day| MissingDay {
                date: day.date,
                reason: missing_reason(day),
            })
            .collect(),
        summary,
    };

    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)
}
