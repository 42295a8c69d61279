//! Category registration and listing.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;

use ft_core::{CategoryPath, TagStyle};

use super::util::{open_database, style_with_overrides};
use crate::Config;

#[derive(Debug, Args)]
pub struct CategoryAddArgs {
    /// Dotted category path (e.g., scene.intro).
    pub path: String,
    /// Default text color of tags in this category (#rrggbb).
    #[arg(long)]
    pub font_color: Option<String>,
    /// Default background color of tags in this category (#rrggbb).
    #[arg(long)]
    pub background_color: Option<String>,
}

pub fn add<W: Write>(writer: &mut W, args: &CategoryAddArgs, config: &Config) -> Result<()> {
    let path = CategoryPath::parse(&args.path).context("invalid category")?;

    let mut db = open_database(config)?;
    let base = db
        .get_category(&path)?
        .map_or_else(TagStyle::default, |existing| existing.style);
    let style = style_with_overrides(
        base,
        args.font_color.as_deref(),
        args.background_color.as_deref(),
    )?;
    db.add_category(&path, &style)?;

    writeln!(
        writer,
        "Registered {path} ({} on {})",
        style.font_color, style.background_color
    )?;
    Ok(())
}

pub fn list<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let db = open_database(config)?;
    let categories = db.list_categories()?;

    if categories.is_empty() {
        writeln!(writer, "No categories registered.")?;
        return Ok(());
    }
    for category in categories {
        writeln!(
            writer,
            "{:<30} {} on {}",
            category.path.to_string(),
            category.style.font_color,
            category.style.background_color
        )?;
    }
    Ok(())
}
