//! Update and detach commands for existing fragment tags.

use std::io::Write;

use anyhow::{Context, Result};
use clap::{ArgGroup, Args};

use ft_core::{FileId, FragmentTagId};

use super::util::{open_store, parse_optional_time, write_changes};
use crate::Config;

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("bounds").required(true).multiple(true).args(["begin", "end"])))]
pub struct UpdateArgs {
    /// File the fragment belongs to.
    pub file: String,
    /// Fragment ID.
    pub id: FragmentTagId,
    /// New start of the fragment.
    #[arg(long)]
    pub begin: Option<String>,
    /// New end of the fragment (exclusive).
    #[arg(long)]
    pub end: Option<String>,
}

#[derive(Debug, Args)]
pub struct DetachArgs {
    /// File the fragment belongs to.
    pub file: String,
    /// Fragment ID.
    pub id: FragmentTagId,
}

pub fn update<W: Write>(writer: &mut W, args: &UpdateArgs, config: &Config) -> Result<()> {
    let file = FileId::new(args.file.as_str()).context("invalid file id")?;
    let begin = parse_optional_time(args.begin.as_deref())?;
    let end = parse_optional_time(args.end.as_deref())?;

    let store = open_store(config)?;
    store
        .update(&file, args.id, begin, end)
        .with_context(|| format!("failed to update fragment {} in {file}", args.id))?;

    write_changes(writer, &store)
}

pub fn detach<W: Write>(writer: &mut W, args: &DetachArgs, config: &Config) -> Result<()> {
    let file = FileId::new(args.file.as_str()).context("invalid file id")?;

    let store = open_store(config)?;
    let removed = store
        .detach(&file, args.id)
        .with_context(|| format!("failed to detach fragment {} from {file}", args.id))?;
    if !removed {
        writeln!(writer, "No fragment {} in {file}", args.id)?;
        return Ok(());
    }

    write_changes(writer, &store)
}
