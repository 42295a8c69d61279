//! Storage layer for fragment tags.
//!
//! Provides persistence for media files, category definitions and fragment
//! tags using `rusqlite`, and implements [`FragmentRepository`] so an
//! [`IntervalStore`](ft_core::IntervalStore) can run on top of it.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! An `IntervalStore` already serializes repository access behind its own
//! mutex, so a `Database` handed to a store can be shared across threads
//! through the store.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! `created_at` columns are TEXT in RFC 3339 format with millisecond
//! precision (e.g., `2024-01-15T10:30:00.000Z`), always UTC.
//!
//! ## Intervals
//!
//! Fragment bounds are stored as REAL seconds in `begin_s` / `end_s`.
//! Categories and colors are stored in their textual forms (`scene.intro`,
//! `#rrggbb`) and validated again when rows are read back. Loading a file
//! for a store also re-checks that no two sibling tags overlap.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;

use ft_core::{
    CategoryPath, Color, FileId, FragmentRepository, FragmentTag, FragmentTagId, Interval,
    MediaFile, Mutation, TagStyle, first_sibling_overlap,
};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A media duration was not a positive number of seconds.
    #[error("invalid media duration: {0}")]
    InvalidDuration(f64),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp in {table} row {key}: {timestamp}")]
    TimestampParse {
        table: &'static str,
        key: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A fragment id does not fit in an SQLite integer.
    #[error("fragment id {0} is out of range")]
    IdOutOfRange(u64),
    /// A stored row no longer passes domain validation.
    #[error("invalid {table} row {key}: {message}")]
    InvalidRow {
        table: &'static str,
        key: String,
        message: String,
    },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A media file stored in the database.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub id: FileId,
    pub path: Option<String>,
    /// Length of the media in seconds.
    pub duration: f64,
    pub created_at: DateTime<Utc>,
}

/// A registered category and its default style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRecord {
    pub path: CategoryPath,
    pub style: TagStyle,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS media_files (
                id TEXT PRIMARY KEY,
                path TEXT,
                duration REAL NOT NULL,
                next_tag_id INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS categories (
                path TEXT PRIMARY KEY,
                font_color TEXT NOT NULL,
                background_color TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            -- Fragment tags: categorized half-open intervals [begin_s, end_s)
            -- id: per-file sequence, never reused (see media_files.next_tag_id)
            CREATE TABLE IF NOT EXISTS fragment_tags (
                file_id TEXT NOT NULL,
                id INTEGER NOT NULL,
                category TEXT NOT NULL,
                begin_s REAL NOT NULL,
                end_s REAL NOT NULL,
                font_color TEXT NOT NULL,
                background_color TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (file_id, id),
                FOREIGN KEY (file_id) REFERENCES media_files(id) ON DELETE CASCADE,
                FOREIGN KEY (category) REFERENCES categories(path)
            );

            CREATE INDEX IF NOT EXISTS idx_fragment_tags_category ON fragment_tags(file_id, category);
            ",
        )?;
        Ok(())
    }

    /// Registers a media file, or updates its path and duration.
    pub fn upsert_file(
        &mut self,
        id: &FileId,
        path: Option<&str>,
        duration: f64,
    ) -> Result<(), DbError> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(DbError::InvalidDuration(duration));
        }
        self.conn.execute(
            "
            INSERT INTO media_files (id, path, duration, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                path = excluded.path,
                duration = excluded.duration
            ",
            params![id.as_str(), path, duration, format_timestamp(Utc::now())],
        )?;
        Ok(())
    }

    /// Lists media files ordered by ID.
    pub fn list_files(&self) -> Result<Vec<FileRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, path, duration, created_at
            FROM media_files
            ORDER BY id ASC
            ",
        )?;
        let rows = stmt.query_map([], FileRow::from_row)?;
        let mut files = Vec::new();
        for row in rows {
            files.push(row?.into_record()?);
        }
        Ok(files)
    }

    /// Looks up a single media file.
    pub fn get_file(&self, id: &FileId) -> Result<Option<FileRecord>, DbError> {
        self.conn
            .query_row(
                "SELECT id, path, duration, created_at FROM media_files WHERE id = ?",
                [id.as_str()],
                FileRow::from_row,
            )
            .optional()?
            .map(FileRow::into_record)
            .transpose()
    }

    /// Registers a category, or replaces its default style.
    pub fn add_category(&mut self, path: &CategoryPath, style: &TagStyle) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO categories (path, font_color, background_color, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(path) DO UPDATE SET
                font_color = excluded.font_color,
                background_color = excluded.background_color
            ",
            params![
                path.to_string(),
                style.font_color.as_str(),
                style.background_color.as_str(),
                format_timestamp(Utc::now()),
            ],
        )?;
        Ok(())
    }

    /// Lists categories ordered by path.
    pub fn list_categories(&self) -> Result<Vec<CategoryRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT path, font_color, background_color
            FROM categories
            ORDER BY path ASC
            ",
        )?;
        let rows = stmt.query_map([], CategoryRow::from_row)?;
        let mut categories = Vec::new();
        for row in rows {
            categories.push(row?.into_record()?);
        }
        Ok(categories)
    }

    /// Looks up a single category definition.
    pub fn get_category(&self, path: &CategoryPath) -> Result<Option<CategoryRecord>, DbError> {
        self.conn
            .query_row(
                "SELECT path, font_color, background_color FROM categories WHERE path = ?",
                [path.to_string()],
                CategoryRow::from_row,
            )
            .optional()?
            .map(CategoryRow::into_record)
            .transpose()
    }

    /// Lists the fragment tags of a file ordered by begin, then ID.
    pub fn list_fragments(&self, file: &FileId) -> Result<Vec<FragmentTag>, DbError> {
        self.query_fragments(
            "
            SELECT id, category, begin_s, end_s, font_color, background_color
            FROM fragment_tags
            WHERE file_id = ?1
            ORDER BY begin_s ASC, id ASC
            ",
            params![file.as_str()],
        )
    }

    /// Lists the fragment tags of a file whose category is `prefix` or lies
    /// below it.
    pub fn list_fragments_by_prefix(
        &self,
        file: &FileId,
        prefix: &CategoryPath,
    ) -> Result<Vec<FragmentTag>, DbError> {
        if prefix.is_root() {
            return self.list_fragments(file);
        }
        self.query_fragments(
            "
            SELECT id, category, begin_s, end_s, font_color, background_color
            FROM fragment_tags
            WHERE file_id = ?1
              AND (category = ?2 OR substr(category, 1, length(?2) + 1) = ?2 || '.')
            ORDER BY begin_s ASC, id ASC
            ",
            params![file.as_str(), prefix.to_string()],
        )
    }

    /// Inserts a fragment tag and advances the file's ID sequence past it.
    pub fn insert_fragment(&mut self, file: &FileId, tag: &FragmentTag) -> Result<(), DbError> {
        let id = sql_id(tag.id)?;
        let next_id = id
            .checked_add(1)
            .ok_or(DbError::IdOutOfRange(tag.id.value()))?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "
            INSERT INTO fragment_tags
            (file_id, id, category, begin_s, end_s, font_color, background_color, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                file.as_str(),
                id,
                tag.category.to_string(),
                tag.interval.begin(),
                tag.interval.end(),
                tag.style.font_color.as_str(),
                tag.style.background_color.as_str(),
                format_timestamp(Utc::now()),
            ],
        )?;
        tx.execute(
            "UPDATE media_files SET next_tag_id = MAX(next_tag_id, ?) WHERE id = ?",
            params![next_id, file.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Replaces the interval of a fragment tag. Returns whether it existed.
    pub fn update_fragment_interval(
        &mut self,
        file: &FileId,
        id: FragmentTagId,
        interval: &Interval,
    ) -> Result<bool, DbError> {
        let id = sql_id(id)?;
        let tx = self.conn.transaction()?;
        let updated = tx.execute(
            "UPDATE fragment_tags SET begin_s = ?, end_s = ? WHERE file_id = ? AND id = ?",
            params![interval.begin(), interval.end(), file.as_str(), id],
        )?;
        tx.commit()?;
        Ok(updated > 0)
    }

    /// Deletes a fragment tag. Returns whether it existed.
    pub fn delete_fragment(&mut self, file: &FileId, id: FragmentTagId) -> Result<bool, DbError> {
        let id = sql_id(id)?;
        let tx = self.conn.transaction()?;
        let deleted = tx.execute(
            "DELETE FROM fragment_tags WHERE file_id = ? AND id = ?",
            params![file.as_str(), id],
        )?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    fn next_tag_id(&self, file: &FileId) -> Result<Option<FragmentTagId>, DbError> {
        let next: Option<i64> = self
            .conn
            .query_row(
                "SELECT next_tag_id FROM media_files WHERE id = ?",
                [file.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        next.map(|value| tag_id(value, file.as_str())).transpose()
    }

    fn query_fragments(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<FragmentTag>, DbError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, FragmentRow::from_row)?;
        let mut tags = Vec::new();
        for row in rows {
            tags.push(row?.into_tag()?);
        }
        Ok(tags)
    }
}

impl FragmentRepository for Database {
    type Error = DbError;

    fn load_file(&mut self, file: &FileId) -> Result<Option<MediaFile>, Self::Error> {
        let Some(record) = self.get_file(file)? else {
            return Ok(None);
        };
        let tags = self.list_fragments(file)?;
        if let Some((first, second)) = first_sibling_overlap(&tags) {
            return Err(DbError::InvalidRow {
                table: "fragment_tags",
                key: second.id.to_string(),
                message: format!(
                    "{} overlaps sibling fragment {} in file {file}",
                    second.category, first.id
                ),
            });
        }
        let next_tag_id = self.next_tag_id(file)?;
        tracing::debug!(%file, tags = tags.len(), "loaded media file");
        Ok(Some(MediaFile {
            id: record.id,
            duration: record.duration,
            tags,
            next_tag_id,
        }))
    }

    fn has_category(&mut self, category: &CategoryPath) -> Result<bool, Self::Error> {
        Ok(self.get_category(category)?.is_some())
    }

    fn commit(&mut self, file: &FileId, mutation: &Mutation) -> Result<(), Self::Error> {
        match mutation {
            Mutation::Insert(tag) => self.insert_fragment(file, tag),
            Mutation::Update { id, interval } => {
                if !self.update_fragment_interval(file, *id, interval)? {
                    tracing::warn!(%file, %id, "updated fragment missing from database");
                }
                Ok(())
            }
            Mutation::Delete(id) => {
                if !self.delete_fragment(file, *id)? {
                    tracing::warn!(%file, %id, "deleted fragment missing from database");
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug)]
struct FileRow {
    id: String,
    path: Option<String>,
    duration: f64,
    created_at: String,
}

impl FileRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            path: row.get(1)?,
            duration: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    fn into_record(self) -> Result<FileRecord, DbError> {
        let created_at = parse_timestamp("media_files", &self.id, &self.created_at)?;
        let id = FileId::new(self.id.clone())
            .map_err(|err| invalid_row("media_files", &self.id, &err))?;
        Ok(FileRecord {
            id,
            path: self.path,
            duration: self.duration,
            created_at,
        })
    }
}

#[derive(Debug)]
struct CategoryRow {
    path: String,
    font_color: String,
    background_color: String,
}

impl CategoryRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            path: row.get(0)?,
            font_color: row.get(1)?,
            background_color: row.get(2)?,
        })
    }

    fn into_record(self) -> Result<CategoryRecord, DbError> {
        let invalid = |err: ft_core::ValidationError| invalid_row("categories", &self.path, &err);
        Ok(CategoryRecord {
            path: CategoryPath::parse(&self.path).map_err(invalid)?,
            style: TagStyle {
                font_color: Color::new(self.font_color.as_str()).map_err(invalid)?,
                background_color: Color::new(self.background_color.as_str()).map_err(invalid)?,
            },
        })
    }
}

#[derive(Debug)]
struct FragmentRow {
    id: i64,
    category: String,
    begin: f64,
    end: f64,
    font_color: String,
    background_color: String,
}

impl FragmentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            category: row.get(1)?,
            begin: row.get(2)?,
            end: row.get(3)?,
            font_color: row.get(4)?,
            background_color: row.get(5)?,
        })
    }

    fn into_tag(self) -> Result<FragmentTag, DbError> {
        let key = self.id.to_string();
        let invalid = |err: ft_core::ValidationError| invalid_row("fragment_tags", &key, &err);
        Ok(FragmentTag {
            id: tag_id(self.id, &key)?,
            category: CategoryPath::parse(&self.category).map_err(invalid)?,
            interval: Interval::new(self.begin, self.end).map_err(invalid)?,
            style: TagStyle {
                font_color: Color::new(self.font_color.as_str()).map_err(invalid)?,
                background_color: Color::new(self.background_color.as_str()).map_err(invalid)?,
            },
        })
    }
}

fn sql_id(id: FragmentTagId) -> Result<i64, DbError> {
    i64::try_from(id.value()).map_err(|_| DbError::IdOutOfRange(id.value()))
}

fn tag_id(value: i64, key: &str) -> Result<FragmentTagId, DbError> {
    u64::try_from(value)
        .ok()
        .filter(|&v| v > 0)
        .map(FragmentTagId::new)
        .ok_or_else(|| DbError::InvalidRow {
            table: "fragment_tags",
            key: key.to_string(),
            message: format!("tag id {value} is not positive"),
        })
}

fn invalid_row(table: &'static str, key: &str, err: &ft_core::ValidationError) -> DbError {
    DbError::InvalidRow {
        table,
        key: key.to_string(),
        message: err.to_string(),
    }
}

fn parse_timestamp(
    table: &'static str,
    key: &str,
    timestamp: &str,
) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            table,
            key: key.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
