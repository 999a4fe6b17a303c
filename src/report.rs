//! Final report rendering
//!
//! The table form is meant for people; the JSON form carries the same
//! numbers plus the run statistics for scripts.

use serde::Serialize;

use crate::parallel::{AggregateSnapshot, RunOutcome};
use crate::stats::ProcessingStats;

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    record_count: u64,
    logged_in: u64,
    logged_out: u64,
    length_count: u64,
    average_length: f64,
    invalid_fields: u64,
    partial: bool,
    cancelled: bool,
    worker_faults: usize,
    stats: &'a ProcessingStats,
}

/// Format an integer with `,` thousands separators
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn table_rows(snapshot: &AggregateSnapshot, stats: &ProcessingStats) -> Vec<(&'static str, String)> {
    let mut rows = vec![
        ("total records", format_count(snapshot.record_count)),
        ("logged in", format_count(snapshot.logged_in)),
        ("logged out", format_count(snapshot.logged_out)),
        ("records with length", format_count(snapshot.length_count)),
        ("average length", format!("{:.2}s", snapshot.average_length())),
    ];
    if snapshot.invalid_fields > 0 {
        rows.push(("mistyped fields", format_count(snapshot.invalid_fields)));
    }
    rows.push((
        "elapsed",
        format!("{:.3}s", stats.processing_time.as_secs_f64()),
    ));
    rows
}

pub fn render_table(outcome: &RunOutcome) -> String {
    let rows = table_rows(&outcome.snapshot, &outcome.stats);
    let label_width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0) + 1;
    let value_width = rows.iter().map(|(_, value)| value.len()).max().unwrap_or(0);

    let mut out = String::new();
    for (label, value) in &rows {
        out.push_str(&format!(
            "{:<lw$} {:>vw$}\n",
            format!("{}:", label),
            value,
            lw = label_width,
            vw = value_width
        ));
    }

    if outcome.cancelled {
        out.push_str("(partial: cancelled before the input was fully processed)\n");
    } else if outcome.is_partial() {
        out.push_str(&format!(
            "(partial: {} batch(es) lost to worker faults)\n",
            outcome.stats.batches_lost
        ));
    }
    out
}

pub fn render_json(outcome: &RunOutcome) -> serde_json::Result<String> {
    let snapshot = &outcome.snapshot;
    let report = JsonReport {
        record_count: snapshot.record_count,
        logged_in: snapshot.logged_in,
        logged_out: snapshot.logged_out,
        length_count: snapshot.length_count,
        average_length: snapshot.average_length(),
        invalid_fields: snapshot.invalid_fields,
        partial: outcome.is_partial(),
        cancelled: outcome.cancelled,
        worker_faults: outcome.faults.len(),
        stats: &outcome.stats,
    };
    let mut text = serde_json::to_string_pretty(&report)?;
    text.push('\n');
    Ok(text)
}

pub fn render(outcome: &RunOutcome, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Table => Ok(render_table(outcome)),
        OutputFormat::Json => render_json(outcome),
    }
}
