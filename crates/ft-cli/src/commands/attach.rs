//! Attach command for adding fragment tags.

use std::io::Write;

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Args};

use ft_core::{CategoryPath, FileId, Interval, IntervalStore, Placement, RecordingNotifier};

use super::util::{open_database, parse_time, style_with_overrides, write_changes};
use crate::Config;

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("placement").required(true).args(["begin", "near"])))]
pub struct AttachArgs {
    /// File to attach the fragment to.
    pub file: String,
    /// Category of the fragment (e.g., scene.intro).
    pub category: String,
    /// Start of the fragment.
    #[arg(long, requires = "end")]
    pub begin: Option<String>,
    /// End of the fragment (exclusive).
    #[arg(long, requires = "begin")]
    pub end: Option<String>,
    /// Place the fragment at this point instead of giving explicit bounds.
    #[arg(long)]
    pub near: Option<String>,
    /// Length of a fragment placed with --near (defaults to
    /// `placement.min_fragment_length`).
    #[arg(long, requires = "near")]
    pub length: Option<String>,
    /// With --near, move to the closest point with room instead of failing.
    #[arg(long, requires = "near")]
    pub nearest: bool,
    /// Text color override (#rrggbb).
    #[arg(long)]
    pub font_color: Option<String>,
    /// Background color override (#rrggbb).
    #[arg(long)]
    pub background_color: Option<String>,
}

pub fn run<W: Write>(writer: &mut W, args: &AttachArgs, config: &Config) -> Result<()> {
    let file = FileId::new(args.file.as_str()).context("invalid file id")?;
    let category = CategoryPath::parse(&args.category).context("invalid category")?;

    let db = open_database(config)?;
    let base = db
        .get_category(&category)?
        .map(|definition| definition.style)
        .unwrap_or_default();
    let style = style_with_overrides(
        base,
        args.font_color.as_deref(),
        args.background_color.as_deref(),
    )?;
    let store = IntervalStore::with_notifier(db, RecordingNotifier::new());

    if let Some(near) = &args.near {
        let at = parse_time(near)?;
        let length = match &args.length {
            Some(length) => parse_time(length)?,
            None => config.placement.min_fragment_length,
        };
        let placement = if args.nearest {
            Placement::Nearest
        } else {
            Placement::Exact
        };
        let (id, interval) = store
            .attach_near(&file, category, at, length, style, placement)
            .with_context(|| format!("failed to attach fragment to {file}"))?;
        tracing::debug!(%file, %id, %interval, "attached fragment near {at}");
    } else {
        let (Some(begin), Some(end)) = (&args.begin, &args.end) else {
            bail!("either --begin and --end, or --near, is required");
        };
        let interval =
            Interval::new(parse_time(begin)?, parse_time(end)?).context("invalid interval")?;
        let id = store
            .attach(&file, category, interval, style)
            .with_context(|| format!("failed to attach fragment to {file}"))?;
        tracing::debug!(%file, %id, "attached fragment");
    }

    write_changes(writer, &store)
}
