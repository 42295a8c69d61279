//! CLI subcommand implementations.

pub mod attach;
pub mod category;
pub mod edit;
pub mod file;
pub mod list;
pub mod slot;
pub mod tracks;
pub mod util;

#[cfg(test)]
pub(crate) fn test_config(dir: &std::path::Path) -> crate::Config {
    crate::Config {
        database_path: dir.join("ft.db"),
        ..crate::Config::default()
    }
}

/// Registers `movie` (120s) and the categories `scene.intro`,
/// `scene.climax`, `music.theme` and `credits`.
#[cfg(test)]
pub(crate) fn seed_movie(config: &crate::Config) {
    use ft_core::{CategoryPath, FileId, TagStyle};

    let mut db = util::open_database(config).unwrap();
    db.upsert_file(&FileId::new("movie").unwrap(), None, 120.0)
        .unwrap();
    for category in ["scene.intro", "scene.climax", "music.theme", "credits"] {
        db.add_category(&CategoryPath::parse(category).unwrap(), &TagStyle::default())
            .unwrap();
    }
}
