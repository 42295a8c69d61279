//! Slot command for probing free space in a sibling group.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;

use ft_core::{CategoryPath, FileId, Placement};

use super::util::{open_store, parse_time};
use crate::Config;

#[derive(Debug, Args)]
pub struct SlotArgs {
    /// File to search.
    pub file: String,
    /// Category the fragment would belong to.
    pub category: String,
    /// Desired start of the fragment.
    #[arg(long)]
    pub at: String,
    /// Required length (defaults to `placement.min_fragment_length`).
    #[arg(long)]
    pub length: Option<String>,
    /// Accept the closest point with room instead of only `--at`.
    #[arg(long)]
    pub nearest: bool,
}

pub fn run<W: Write>(writer: &mut W, args: &SlotArgs, config: &Config) -> Result<()> {
    let file = FileId::new(args.file.as_str()).context("invalid file id")?;
    let category = CategoryPath::parse(&args.category).context("invalid category")?;
    let at = parse_time(&args.at)?;
    let length = match &args.length {
        Some(length) => parse_time(length)?,
        None => config.placement.min_fragment_length,
    };
    let placement = if args.nearest {
        Placement::Nearest
    } else {
        Placement::Exact
    };

    let store = open_store(config)?;
    let slot = store
        .free_slot(&file, &category, at, length, placement)
        .with_context(|| format!("failed to search {file}"))?;

    match slot {
        Some(interval) => writeln!(writer, "{interval}")?,
        None => writeln!(writer, "No free slot of {length}s under {} at {at}s", category.parent())?,
    }
    Ok(())
}
