//! Output formatting utilities

use clap::ValueEnum;
use cluster_lib::resources::NodeStatus;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a GPU count, dropping the decimals of whole numbers
pub fn format_gpus(gpus: f64) -> String {
    if gpus.fract() == 0.0 {
        format!("{:.0}", gpus)
    } else {
        format!("{:.2}", gpus)
    }
}

/// Format CPU cores
pub fn format_cpu(cores: f64) -> String {
    if cores.fract() == 0.0 {
        format!("{:.0}", cores)
    } else {
        format!("{:.2}", cores)
    }
}

pub fn format_bytes(bytes: f64) -> String {
    cluster_lib::resources::format_bytes(bytes)
}

pub fn format_percent(percent: Option<f64>) -> String {
    match percent {
        Some(p) => format!("{:.0}%", p),
        None => "-".to_string(),
    }
}

/// Format a duration as e.g. `2h 5m`, `3m 20s` or `45s`
pub fn format_idle(idle: Option<Duration>) -> String {
    let Some(idle) = idle else {
        return "-".to_string();
    };
    let secs = idle.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Color node readiness
pub fn color_status(status: NodeStatus) -> String {
    match status {
        NodeStatus::Ready => status.to_string().green().to_string(),
        NodeStatus::NotReady => status.to_string().red().to_string(),
    }
}

/// Color a utilization percentage by how busy the resource is
pub fn color_utilization(percent: Option<f64>) -> String {
    let formatted = format_percent(percent);
    match percent {
        Some(p) if p >= 90.0 => formatted.red().to_string(),
        Some(p) if p >= 60.0 => formatted.yellow().to_string(),
        Some(_) => formatted.green().to_string(),
        None => formatted,
    }
}
