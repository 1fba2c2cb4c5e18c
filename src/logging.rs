use std::str::FromStr;

use clap::ValueEnum;
use color_eyre::eyre::{Result, eyre};
use serde::Deserialize;
use tracing::{Level, warn};

pub const DEFAULT_LEVEL: Level = Level::WARN;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Parse a configured level, `None` when it is not one tracing knows.
pub fn parse_level(raw: &str) -> Option<Level> {
    Level::from_str(raw.trim()).ok()
}

/// Install the global subscriber. Logs go to stderr; stdout carries the
/// metric lines.
///
/// An unknown level falls back to `warn` and is reported once the
/// subscriber is up.
pub fn init(level: &str, format: LogFormat) -> Result<()> {
    let parsed = parse_level(level);

    let builder = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_target(false)
        .with_max_level(parsed.unwrap_or(DEFAULT_LEVEL))
        .with_writer(std::io::stderr);

    let installed = match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    };
    installed.map_err(|e| eyre!("failed to set tracing subscriber: {e}"))?;

    if parsed.is_none() {
        warn!(level, fallback = %DEFAULT_LEVEL, "unknown log level");
    }
    Ok(())
}
