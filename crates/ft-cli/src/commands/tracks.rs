//! Tracks command for laying out fragments on display lanes.
//!
//! Sibling groups whose fragments never overlap share a track, so the
//! layout uses as few tracks as the packing engine finds.

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Args};

use ft_core::{CategoryPath, FileId, FragmentRepository, Track, pack_many};

use super::list::write_tag;
use super::util::{open_database, open_store};
use crate::Config;

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("target").required(true).args(["file", "all"])))]
pub struct TracksArgs {
    /// File to lay out.
    pub file: Option<String>,
    /// Lay out every registered file.
    #[arg(long)]
    pub all: bool,
    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write>(writer: &mut W, args: &TracksArgs, config: &Config) -> Result<()> {
    let layouts = if args.all {
        all_layouts(config)?
    } else {
        let Some(file) = &args.file else {
            bail!("either a file or --all is required");
        };
        let file = FileId::new(file.as_str()).context("invalid file id")?;
        let store = open_store(config)?;
        let tracks = store
            .tracks(&file, &config.packing)
            .with_context(|| format!("failed to lay out {file}"))?;
        vec![(file, tracks)]
    };

    if args.json {
        let json = if args.all {
            let by_file: BTreeMap<String, Vec<Track>> = layouts
                .into_iter()
                .map(|(file, tracks)| (file.to_string(), tracks))
                .collect();
            serde_json::to_string_pretty(&by_file)?
        } else {
            let tracks: Vec<Track> = layouts.into_iter().flat_map(|(_, tracks)| tracks).collect();
            serde_json::to_string_pretty(&tracks)?
        };
        writeln!(writer, "{json}")?;
        return Ok(());
    }

    for (file, tracks) in &layouts {
        write_layout(writer, file, tracks)?;
    }
    Ok(())
}

/// Lays out every registered file, packing them in parallel.
///
/// Files are loaded the way a store loads them, so a file whose rows break
/// the sibling invariant fails the command instead of producing a track
/// with overlaps.
fn all_layouts(config: &Config) -> Result<Vec<(FileId, Vec<Track>)>> {
    let mut db = open_database(config)?;
    let mut files = Vec::new();
    let mut snapshots = Vec::new();
    for record in db.list_files()? {
        let media = db
            .load_file(&record.id)
            .with_context(|| format!("failed to load {}", record.id))?;
        snapshots.push(media.map(|media| media.tags).unwrap_or_default());
        files.push(record.id);
    }
    tracing::debug!(files = files.len(), "packing all files");

    let layouts = pack_many(&snapshots, &config.packing);
    Ok(files.into_iter().zip(layouts).collect())
}

fn write_layout<W: Write>(writer: &mut W, file: &FileId, tracks: &[Track]) -> Result<()> {
    writeln!(writer, "{file}")?;
    if tracks.is_empty() {
        writeln!(writer, "  (no fragments)")?;
        return Ok(());
    }
    for (index, track) in tracks.iter().enumerate() {
        let groups: Vec<String> = track.groups.iter().map(group_label).collect();
        writeln!(writer, "  track {}: {}", index + 1, groups.join(", "))?;
        for tag in &track.tags {
            write_tag(writer, tag, "    ")?;
        }
    }
    Ok(())
}

fn group_label(group: &CategoryPath) -> String {
    if group.is_root() {
        "(top level)".to_string()
    } else {
        group.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;

    use ft_core::{FragmentTag, FragmentTagId, Interval, IntervalStore, TagStyle};

    use crate::commands::{seed_movie, test_config};

    fn attach_all(config: &Config, file: &str, tags: &[(&str, f64, f64)]) {
        let store = IntervalStore::new(open_database(config).unwrap());
        let file = FileId::new(file).unwrap();
        for &(category, begin, end) in tags {
            store
                .attach(
                    &file,
                    CategoryPath::parse(category).unwrap(),
                    Interval::new(begin, end).unwrap(),
                    TagStyle::default(),
                )
                .unwrap();
        }
    }

    #[test]
    fn tracks_merge_compatible_groups() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        seed_movie(&config);
        attach_all(
            &config,
            "movie",
            &[
                ("scene.intro", 0.0, 10.0),
                ("scene.climax", 20.0, 30.0),
                ("music.theme", 10.0, 20.0),
                ("credits", 5.0, 25.0),
            ],
        );
        let mut output = Vec::new();

        let args = TracksArgs {
            file: Some("movie".to_string()),
            all: false,
            json: false,
        };
        run(&mut output, &args, &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        movie
          track 1: music, scene
            #1    [0, 10)            scene.intro
            #3    [10, 20)           music.theme
            #2    [20, 30)           scene.climax
          track 2: (top level)
            #4    [5, 25)            credits
        ");
    }

    #[test]
    fn tracks_all_lays_out_every_file() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        seed_movie(&config);
        open_database(&config)
            .unwrap()
            .upsert_file(&FileId::new("clip").unwrap(), None, 30.0)
            .unwrap();
        attach_all(&config, "clip", &[("credits", 0.0, 5.0)]);
        let mut output = Vec::new();

        let args = TracksArgs {
            file: None,
            all: true,
            json: false,
        };
        run(&mut output, &args, &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        clip
          track 1: (top level)
            #1    [0, 5)             credits
        movie
          (no fragments)
        ");
    }

    #[test]
    fn tracks_all_rejects_overlapping_rows() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        seed_movie(&config);
        let mut db = open_database(&config).unwrap();
        let movie = FileId::new("movie").unwrap();
        for (id, category, begin, end) in [
            (1, "scene.intro", 0.0, 10.0),
            (2, "scene.climax", 5.0, 15.0),
        ] {
            let tag = FragmentTag {
                id: FragmentTagId::new(id),
                category: CategoryPath::parse(category).unwrap(),
                interval: Interval::new(begin, end).unwrap(),
                style: TagStyle::default(),
            };
            db.insert_fragment(&movie, &tag).unwrap();
        }

        let args = TracksArgs {
            file: None,
            all: true,
            json: true,
        };
        let err = run(&mut Vec::new(), &args, &config).unwrap_err();
        assert_eq!(err.to_string(), "failed to load movie");
        assert!(format!("{err:#}").contains("overlaps sibling fragment 1"));
    }

    #[test]
    fn tracks_json_lists_groups_and_tags() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        seed_movie(&config);
        attach_all(
            &config,
            "movie",
            &[("scene.intro", 0.0, 10.0), ("music.theme", 5.0, 15.0)],
        );
        let mut output = Vec::new();

        let args = TracksArgs {
            file: Some("movie".to_string()),
            all: false,
            json: true,
        };
        run(&mut output, &args, &config).unwrap();

        let tracks: Vec<Track> = serde_json::from_slice(&output).unwrap();
        assert_eq!(tracks.len(), 2);
        assert!(tracks.iter().all(|track| track.groups.len() == 1));
    }
}
