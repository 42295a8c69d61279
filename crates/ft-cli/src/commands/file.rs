//! Media file registration and listing.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use ft_core::FileId;

use super::util::{open_database, parse_time};
use crate::Config;

#[derive(Debug, Args)]
pub struct FileAddArgs {
    /// File identifier used by the other commands.
    pub id: String,
    /// Media length, in seconds or as a timecode.
    #[arg(long)]
    pub duration: String,
    /// Location of the media on disk.
    #[arg(long)]
    pub path: Option<String>,
}

/// File data for JSON output.
#[derive(Debug, Serialize)]
struct FileEntry {
    id: String,
    path: Option<String>,
    duration: f64,
    created_at: String,
}

pub fn add<W: Write>(writer: &mut W, args: &FileAddArgs, config: &Config) -> Result<()> {
    let id = FileId::new(args.id.as_str()).context("invalid file id")?;
    let duration = parse_time(&args.duration)?;

    let mut db = open_database(config)?;
    db.upsert_file(&id, args.path.as_deref(), duration)?;
    tracing::debug!(%id, duration, "registered media file");

    writeln!(writer, "Registered {id} ({duration}s)")?;
    Ok(())
}

pub fn list<W: Write>(writer: &mut W, json: bool, config: &Config) -> Result<()> {
    let db = open_database(config)?;
    let files = db.list_files()?;

    if json {
        let entries: Vec<FileEntry> = files
            .into_iter()
            .map(|file| FileEntry {
                id: file.id.to_string(),
                path: file.path,
                duration: file.duration,
                created_at: file.created_at.to_rfc3339(),
            })
            .collect();
        writeln!(writer, "{}", serde_json::to_string_pretty(&entries)?)?;
        return Ok(());
    }

    if files.is_empty() {
        writeln!(writer, "No media files registered.")?;
        return Ok(());
    }
    for file in files {
        match file.path {
            Some(path) => writeln!(writer, "{:<20} {:>10}s  {path}", file.id.as_str(), file.duration)?,
            None => writeln!(writer, "{:<20} {:>10}s", file.id.as_str(), file.duration)?,
        }
    }
    Ok(())
}
