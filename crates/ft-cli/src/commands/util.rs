//! Shared utilities for CLI commands.

use std::io::Write;
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use regex::Regex;

use ft_core::{Color, IntervalStore, RecordingNotifier, TagStyle};
use ft_db::Database;

use crate::Config;

/// Pre-compiled regex for `[hh:]mm:ss[.fff]` timecodes.
///
/// Minutes are unbounded when no hours are given (`125:00`).
static TIMECODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d+):(\d{1,2})|(\d+)):(\d{1,2}(?:\.\d+)?)$")
        .expect("timecode pattern is valid")
});

/// The store every mutating command runs against.
pub type Store = IntervalStore<Database, RecordingNotifier>;

/// Parse a point in time given as seconds or as a timecode.
///
/// Supports:
/// - Seconds: "12.5", "90"
/// - Timecode: "01:30", "1:02:03.250"
pub fn parse_time(s: &str) -> Result<f64> {
    let s = s.trim();
    if let Ok(seconds) = s.parse::<f64>() {
        if !seconds.is_finite() {
            bail!("Invalid time: {s}. Must be a finite number of seconds");
        }
        return Ok(seconds);
    }

    let Some(caps) = TIMECODE_RE.captures(s) else {
        bail!("Invalid time: {s}. Use seconds (e.g., 12.5) or a timecode (e.g., 01:02:03.5)");
    };

    let (hours, minutes) = match (caps.get(1), caps.get(2), caps.get(3)) {
        (Some(hours), Some(minutes), _) => (hours.as_str(), minutes.as_str()),
        (_, _, Some(minutes)) => ("0", minutes.as_str()),
        _ => bail!("Invalid time: {s}. Missing minutes"),
    };
    let hours: f64 = hours.parse().context("failed to parse hours")?;
    let minutes: f64 = minutes.parse().context("failed to parse minutes")?;
    let seconds: f64 = caps[4].parse().context("failed to parse seconds")?;

    if seconds >= 60.0 {
        bail!("Invalid time: {s}. Seconds must be below 60");
    }
    if caps.get(1).is_some() && minutes >= 60.0 {
        bail!("Invalid time: {s}. Minutes must be below 60");
    }

    Ok(hours.mul_add(3600.0, minutes.mul_add(60.0, seconds)))
}

/// Parse an optional time argument.
pub fn parse_optional_time(s: Option<&str>) -> Result<Option<f64>> {
    s.map(parse_time).transpose()
}

/// Apply color overrides on top of a base style.
pub fn style_with_overrides(
    base: TagStyle,
    font_color: Option<&str>,
    background_color: Option<&str>,
) -> Result<TagStyle> {
    let mut style = base;
    if let Some(color) = font_color {
        style.font_color = Color::new(color).context("invalid font color")?;
    }
    if let Some(color) = background_color {
        style.background_color = Color::new(color).context("invalid background color")?;
    }
    Ok(style)
}

/// Open the configured database, creating its directory if needed.
pub fn open_database(config: &Config) -> Result<Database> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))
}

/// Open a store over the configured database that records its changes.
pub fn open_store(config: &Config) -> Result<Store> {
    let db = open_database(config)?;
    Ok(IntervalStore::with_notifier(db, RecordingNotifier::new()))
}

/// Write each recorded change as one JSON line.
pub fn write_changes<W: Write>(writer: &mut W, store: &Store) -> Result<()> {
    for change in store.notifier().take() {
        let line = serde_json::to_string(&change).context("failed to serialize change")?;
        writeln!(writer, "{line}")?;
    }
    Ok(())
}
