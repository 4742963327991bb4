//! Rendering of reported rates.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use semprate_types::{MonitoredTarget, Rate};
use serde::Serialize;

/// How each result is printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// `<target>\t<rate>`
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

#[derive(Serialize)]
struct Sample<'a> {
    target: &'a str,
    rate: &'a Rate,
    timestamp_ms: u64,
}

/// Render one result as a single line.
pub fn render(
    target: &MonitoredTarget,
    rate: &Rate,
    format: OutputFormat,
    timestamp_ms: u64,
) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(format!("{}\t{}", target.identifier(), rate)),
        OutputFormat::Json => Ok(serde_json::to_string(&Sample {
            target: target.identifier(),
            rate,
            timestamp_ms,
        })?),
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
