use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Color, ContentArrangement, Table};
use pulseboard_core::{DashboardSnapshot, RenderSink, SeriesSnapshot};
use serde_json::json;
use std::io::{IsTerminal, Write};
use std::sync::Arc;

const SPARK_TICKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Redraws a comfy-table summary of every series on stdout.
pub struct TableSink {
    clear_screen: bool,
    source: String,
}

impl TableSink {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            clear_screen: std::io::stdout().is_terminal(),
            source: source.into(),
        }
    }
}

impl RenderSink for TableSink {
    fn draw(&self, snapshot: &DashboardSnapshot) {
        let mut out = std::io::stdout().lock();
        if self.clear_screen {
            let _ = write!(out, "\x1B[2J\x1B[H");
        }
        let _ = writeln!(out, "{}", render_table(snapshot, &self.source));
        let _ = out.flush();
    }
}

/// Prints one JSON document per snapshot.
pub struct JsonSink;

impl RenderSink for JsonSink {
    fn draw(&self, snapshot: &DashboardSnapshot) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", snapshot_json(snapshot));
        let _ = out.flush();
    }
}

pub fn sink_for(format: OutputFormat, source: &str) -> Arc<dyn RenderSink> {
    match format {
        OutputFormat::Table => Arc::new(TableSink::new(source)),
        OutputFormat::Json => Arc::new(JsonSink),
    }
}

pub fn render_table(snapshot: &DashboardSnapshot, source: &str) -> String {
    let latest_label = snapshot.labels().last().map(String::as_str).unwrap_or("-");

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Metric").fg(Color::Cyan),
            Cell::new("Latest").fg(Color::Cyan),
            Cell::new("Min").fg(Color::Cyan),
            Cell::new("Max").fg(Color::Cyan),
            Cell::new("Mean").fg(Color::Cyan),
            Cell::new("Trend").fg(Color::Cyan),
        ]);

    for (key, series) in snapshot.iter() {
        table.add_row(vec![
            Cell::new(key),
            value_cell(series.latest().map(|(_, v)| v)),
            value_cell(series.min()),
            value_cell(series.max()),
            value_cell(series.mean()),
            Cell::new(sparkline(series.values())),
        ]);
    }

    format!(
        "{} {}  {} {}  {} {}\n{}",
        "Pulseboard".cyan().bold(),
        snapshot.scope.to_string().yellow(),
        "source:".dimmed(),
        source,
        "at".dimmed(),
        latest_label,
        table
    )
}

fn value_cell(value: Option<f64>) -> Cell {
    match value {
        Some(v) => Cell::new(format!("{:.2}", v)).set_alignment(CellAlignment::Right),
        None => Cell::new("-").set_alignment(CellAlignment::Right),
    }
}

/// One block character per point, scaled between the window's min and max.
pub fn sparkline(values: &[f64]) -> String {
    let Some((min, max)) = values.iter().fold(None, |acc: Option<(f64, f64)>, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    }) else {
        return String::new();
    };

    let span = max - min;
    values
        .iter()
        .map(|&v| {
            if span <= f64::EPSILON {
                SPARK_TICKS[0]
            } else {
                let idx = ((v - min) / span * (SPARK_TICKS.len() - 1) as f64).round() as usize;
                SPARK_TICKS[idx.min(SPARK_TICKS.len() - 1)]
            }
        })
        .collect()
}

pub fn snapshot_json(snapshot: &DashboardSnapshot) -> serde_json::Value {
    let series: serde_json::Map<String, serde_json::Value> = snapshot
        .iter()
        .map(|(key, series)| (key.to_string(), series_json(series)))
        .collect();

    json!({
        "scope": snapshot.scope.to_string(),
        "taken_at": snapshot.taken_at.to_rfc3339(),
        "labels": snapshot.labels(),
        "series": series,
    })
}

fn series_json(series: &SeriesSnapshot) -> serde_json::Value {
    json!({
        "values": series.values(),
        "latest": series.latest().map(|(_, v)| v),
        "min": series.min(),
        "max": series.max(),
        "mean": series.mean(),
    })
}
