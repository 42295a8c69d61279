//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::attach::AttachArgs;
use crate::commands::category::CategoryAddArgs;
use crate::commands::edit::{DetachArgs, UpdateArgs};
use crate::commands::file::FileAddArgs;
use crate::commands::list::ListArgs;
use crate::commands::slot::SlotArgs;
use crate::commands::tracks::TracksArgs;

/// Fragment tag editor.
///
/// Annotates media files with categorized time intervals. Tags under the
/// same parent category never overlap.
#[derive(Debug, Parser)]
#[command(name = "ft", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Register and list media files.
    #[command(subcommand)]
    File(FileAction),

    /// Register and list categories.
    #[command(subcommand)]
    Category(CategoryAction),

    /// Attach a fragment tag to a file.
    Attach(AttachArgs),

    /// Move or resize a fragment tag.
    Update(UpdateArgs),

    /// Remove a fragment tag.
    Detach(DetachArgs),

    /// List the fragment tags of a file.
    List(ListArgs),

    /// Find room for a fragment without attaching it.
    Slot(SlotArgs),

    /// Lay out fragment tags on as few display tracks as possible.
    Tracks(TracksArgs),
}

/// Media file actions.
#[derive(Debug, Subcommand)]
pub enum FileAction {
    /// Register a media file, or update its duration.
    Add(FileAddArgs),

    /// List registered media files.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Category actions.
#[derive(Debug, Subcommand)]
pub enum CategoryAction {
    /// Register a category, or change its default colors.
    Add(CategoryAddArgs),

    /// List registered categories.
    List,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn attach_accepts_near_placement() {
        let cli = Cli::parse_from([
            "ft", "attach", "movie", "scene.intro", "--near", "1:30", "--nearest",
        ]);
        let Some(Commands::Attach(args)) = cli.command else {
            panic!("expected attach command");
        };
        assert_eq!(args.near.as_deref(), Some("1:30"));
        assert!(args.nearest);
        assert!(args.begin.is_none());
    }

    #[test]
    fn attach_rejects_mixed_placement() {
        let result = Cli::try_parse_from([
            "ft", "attach", "movie", "scene.intro", "--begin", "0", "--end", "5", "--near", "3",
        ]);
        assert!(result.is_err());
    }
}
