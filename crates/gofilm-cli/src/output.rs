//! Output formatting for CLI

use serde::Serialize;
use tabled::{Table, Tabled};

use crate::commands::{HistoryRow, ManifestSummary, ProbeReport, SimulationReport};

/// Output format options
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

/// Format output based on selected format
pub fn format_output<T: Serialize>(data: &T, format: &str) -> String {
    match OutputFormat::from(format) {
        OutputFormat::Json => {
            serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Table | OutputFormat::Text => {
            // Flat `key: value` lines from the serialized form
            match serde_json::to_value(data).unwrap_or_default() {
                serde_json::Value::Object(map) => map
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key, value))
                    .collect::<Vec<_>>()
                    .join("\n"),
                other => other.to_string(),
            }
        }
    }
}

fn table<T: Tabled>(rows: &[T]) -> String {
    Table::new(rows).to_string()
}

pub fn print_probe(report: &ProbeReport, format: &str) {
    if let OutputFormat::Json = OutputFormat::from(format) {
        println!("{}", format_output(report, format));
        return;
    }

    println!("Source: {}", report.url);
    println!("  Kind: {} ({})", report.kind, report.mime_type);
    println!("  Custom player link: {}", if report.custom_player_link { "yes" } else { "no" });

    match &report.manifest {
        Some(ManifestSummary::Master { variants }) => {
            println!("\nVariants: {}", variants.len());
            match OutputFormat::from(format) {
                OutputFormat::Table => println!("{}", table(variants)),
                _ => {
                    for (i, v) in variants.iter().enumerate() {
                        println!("  {}. {}bps {} {}", i + 1, v.bandwidth, v.resolution, v.uri);
                    }
                }
            }
        }
        Some(ManifestSummary::Media {
            segments,
            target_duration,
            total_duration,
            live,
        }) => {
            println!("\nMedia playlist:");
            println!("  Segments: {}", segments);
            println!("  Target duration: {:.1}s", target_duration);
            if *live {
                println!("  Live: yes");
            } else {
                println!("  Duration: {:.1}s", total_duration);
            }
        }
        None => {}
    }

    if let Some(file) = &report.file {
        println!("\nFile:");
        println!("  Status: {}", file.status);
        println!("  Content type: {}", file.content_type.as_deref().unwrap_or("-"));
        match file.content_length {
            Some(len) => println!("  Content length: {} bytes", len),
            None => println!("  Content length: -"),
        }
    }
}

pub fn print_simulation(report: &SimulationReport, format: &str) {
    if let OutputFormat::Json = OutputFormat::from(format) {
        println!("{}", format_output(report, format));
        return;
    }

    println!("Session {}", report.generation);
    match report.final_state {
        Some(state) => println!("  Final state: {}", state),
        None => println!("  Final state: detached"),
    }
    println!("  Mini mode: {}", report.mini);
    if let Some(progress) = report.last_position {
        println!("  Position: {:.1}s / {:.1}s", progress.current_time, progress.duration);
    }

    println!("\nEvents:");
    for event in &report.events {
        println!("  {}", serde_json::to_string(event).unwrap_or_default());
    }

    println!("\nEngine commands:");
    for command in &report.commands {
        println!("  {}", serde_json::to_string(command).unwrap_or_default());
    }
}

pub fn print_history(rows: &[HistoryRow], format: &str) {
    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", format_output(&rows, format)),
        OutputFormat::Table => println!("{}", table(rows)),
        OutputFormat::Text => {
            if rows.is_empty() {
                println!("No watch history");
            }
            for row in rows {
                println!("{} [{}] {} {} {}", row.name, row.episode, row.progress, row.watched, row.link);
            }
        }
    }
}
