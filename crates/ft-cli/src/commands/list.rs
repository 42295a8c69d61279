//! List command for showing the fragment tags of a file.

use std::io::Write;

use anyhow::{Context, Result, bail};
use clap::Args;

use ft_core::{CategoryPath, FileId, FragmentTag};

use super::util::open_database;
use crate::Config;

#[derive(Debug, Args)]
pub struct ListArgs {
    /// File whose fragments to list.
    pub file: String,
    /// Only show fragments in this category or below it.
    #[arg(long)]
    pub under: Option<String>,
    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write>(writer: &mut W, args: &ListArgs, config: &Config) -> Result<()> {
    let file = FileId::new(args.file.as_str()).context("invalid file id")?;
    let prefix = args
        .under
        .as_deref()
        .map(CategoryPath::parse)
        .transpose()
        .context("invalid category")?;

    let db = open_database(config)?;
    if db.get_file(&file)?.is_none() {
        bail!("unknown file: {file}");
    }
    let tags = match &prefix {
        Some(prefix) => db.list_fragments_by_prefix(&file, prefix)?,
        None => db.list_fragments(&file)?,
    };

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&tags)?)?;
        return Ok(());
    }

    if tags.is_empty() {
        writeln!(writer, "No fragments in {file}.")?;
        return Ok(());
    }
    for tag in &tags {
        write_tag(writer, tag, "")?;
    }
    Ok(())
}

/// One fragment per line: id, interval, category.
pub(crate) fn write_tag<W: Write>(writer: &mut W, tag: &FragmentTag, indent: &str) -> Result<()> {
    writeln!(
        writer,
        "{indent}{:<5} {:<18} {}",
        format!("#{}", tag.id),
        tag.interval.to_string(),
        tag.category
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;

    use ft_core::{Interval, IntervalStore, TagStyle};

    use crate::commands::{seed_movie, test_config, util::open_database};

    fn seed_tags(config: &Config) {
        seed_movie(config);
        let store = IntervalStore::new(open_database(config).unwrap());
        let movie = FileId::new("movie").unwrap();
        for (category, begin, end) in [
            ("scene.intro", 0.0, 10.0),
            ("music.theme", 5.0, 62.5),
            ("scene.climax", 90.0, 110.0),
            ("credits", 110.0, 120.0),
        ] {
            store
                .attach(
                    &movie,
                    CategoryPath::parse(category).unwrap(),
                    Interval::new(begin, end).unwrap(),
                    TagStyle::default(),
                )
                .unwrap();
        }
    }

    fn args(under: Option<&str>) -> ListArgs {
        ListArgs {
            file: "movie".to_string(),
            under: under.map(str::to_string),
            json: false,
        }
    }

    #[test]
    fn list_orders_by_begin() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        seed_tags(&config);
        let mut output = Vec::new();

        run(&mut output, &args(None), &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        #1    [0, 10)            scene.intro
        #2    [5, 62.5)          music.theme
        #3    [90, 110)          scene.climax
        #4    [110, 120)         credits
        ");
    }

    #[test]
    fn list_filters_by_category_prefix() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        seed_tags(&config);
        let mut output = Vec::new();

        run(&mut output, &args(Some("scene")), &config).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        #1    [0, 10)            scene.intro
        #3    [90, 110)          scene.climax
        ");
    }

    #[test]
    fn list_json_round_trips() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        seed_tags(&config);
        let mut output = Vec::new();

        let args = ListArgs {
            json: true,
            ..args(Some("credits"))
        };
        run(&mut output, &args, &config).unwrap();

        let tags: Vec<FragmentTag> = serde_json::from_slice(&output).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].interval, Interval::new(110.0, 120.0).unwrap());
    }

    #[test]
    fn list_rejects_unknown_file() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        let args = ListArgs {
            file: "missing".to_string(),
            ..args(None)
        };

        let err = run(&mut Vec::new(), &args, &config).unwrap_err();
        assert_eq!(err.to_string(), "unknown file: missing");
    }
}
