//! Authoritative fragment-tag store.
//!
//! The store owns the current tags of every file it has touched and enforces
//! the sibling non-overlap invariant on every mutation.
//!
//! # Concurrency
//!
//! Each file has a writer lock and a published, immutable snapshot. A
//! mutation holds the file's writer lock across validate, persist, publish
//! and notify, so collision checks never race a concurrent commit on the
//! same file and change events leave in commit order. Readers only clone the
//! published `Arc`, so they observe either the state before or after any
//! single mutation.
//!
//! Validation and snapshot publication for different files run in parallel.
//! The repository itself sits behind one mutex, because a single SQLite
//! connection cannot be shared between threads, so the persist step of
//! writers to different files is serialized. Each commit holds that mutex
//! only for one repository call.
//!
//! Persistence and change delivery are delegated to a [`FragmentRepository`]
//! and a [`ChangeNotifier`]. A failing repository commit leaves the
//! published snapshot untouched and emits nothing.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::category::CategoryPath;
use crate::collision::{first_collision, siblings_of};
use crate::fragment::{FragmentTag, MediaFile, TagStyle};
use crate::free_space::{find_nearest_slot, find_slot};
use crate::interval::Interval;
use crate::packing::{PackingConfig, Track, pack};
use crate::types::{FileId, FragmentTagId, ValidationError};

/// Errors returned by [`IntervalStore`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The interval overlaps a tag of the same sibling group.
    #[error("interval under {category} collides with fragment {conflicting}")]
    Collision {
        category: CategoryPath,
        conflicting: FragmentTagId,
    },

    /// The file is not known to the repository.
    #[error("unknown file: {file}")]
    UnknownFile { file: FileId },

    /// The category has no registered definition.
    #[error("unknown category: {category}")]
    UnknownCategory { category: CategoryPath },

    /// The file has no fragment with this id.
    #[error("unknown fragment {id} in file {file}")]
    UnknownFragment { file: FileId, id: FragmentTagId },

    /// No gap of the requested length exists at the requested point.
    #[error("not enough free space under {category} for {length}s at {at}s")]
    NoFreeSpace {
        category: CategoryPath,
        at: f64,
        length: f64,
    },

    /// The file's tag id sequence has no identifiers left.
    #[error("no fragment ids left in file {file}")]
    IdsExhausted { file: FileId },

    /// An input value failed validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// The persistence collaborator failed.
    #[error("repository error: {0}")]
    Repository(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    fn repository<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Repository(Box::new(err))
    }

    /// Whether the referenced file, category or fragment does not exist.
    pub const fn is_unknown_target(&self) -> bool {
        matches!(
            self,
            Self::UnknownFile { .. } | Self::UnknownCategory { .. } | Self::UnknownFragment { .. }
        )
    }
}

/// A single committed change, as handed to the repository.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Insert(FragmentTag),
    Update {
        id: FragmentTagId,
        interval: Interval,
    },
    Delete(FragmentTagId),
}

/// Persistence collaborator of the store.
///
/// The store calls `commit` while holding the file's writer lock, so an
/// implementation only has to make each individual commit atomic.
pub trait FragmentRepository {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Loads a file with all its tags, or `None` if the file is unknown.
    fn load_file(&mut self, file: &FileId) -> Result<Option<MediaFile>, Self::Error>;

    /// Whether a category definition exists.
    fn has_category(&mut self, category: &CategoryPath) -> Result<bool, Self::Error>;

    /// Persists one mutation of a file's tags.
    fn commit(&mut self, file: &FileId, mutation: &Mutation) -> Result<(), Self::Error>;
}

/// A change notification, emitted once per successful commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    Added {
        id: FragmentTagId,
        category: CategoryPath,
        interval: Interval,
        style: TagStyle,
    },
    /// Only the endpoints that actually changed are present.
    Updated {
        id: FragmentTagId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        begin: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<f64>,
    },
    Removed {
        id: FragmentTagId,
    },
}

/// A [`ChangeEvent`] together with the file it happened to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChange {
    pub file: FileId,
    #[serde(flatten)]
    pub event: ChangeEvent,
}

/// Notification collaborator of the store.
///
/// Called after each successful commit, in commit order per file.
pub trait ChangeNotifier {
    fn notify(&self, change: &FileChange);
}

/// Discards all notifications.
impl ChangeNotifier for () {
    fn notify(&self, _change: &FileChange) {}
}

impl ChangeNotifier for std::sync::mpsc::Sender<FileChange> {
    fn notify(&self, change: &FileChange) {
        if self.send(change.clone()).is_err() {
            tracing::trace!(file = %change.file, "change receiver dropped");
        }
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    changes: Mutex<Vec<FileChange>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the recorded changes.
    pub fn take(&self) -> Vec<FileChange> {
        std::mem::take(&mut *lock(&self.changes))
    }

    pub fn len(&self) -> usize {
        lock(&self.changes).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChangeNotifier for RecordingNotifier {
    fn notify(&self, change: &FileChange) {
        lock(&self.changes).push(change.clone());
    }
}

/// How [`IntervalStore::attach_near`] places a fragment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Placement {
    /// Exactly at the requested point, or not at all.
    #[default]
    Exact,
    /// At the closest point with enough room.
    Nearest,
}

#[derive(Debug, Clone)]
struct FileState {
    duration: f64,
    tags: Vec<FragmentTag>,
    /// `None` once the id sequence has run out.
    next_id: Option<FragmentTagId>,
}

impl From<MediaFile> for FileState {
    fn from(file: MediaFile) -> Self {
        let after_tags = match file.tags.iter().map(|tag| tag.id).max() {
            Some(last) => last.next(),
            None => Some(FragmentTagId::FIRST),
        };
        let next_id =
            after_tags.map(|after| file.next_tag_id.map_or(after, |stored| stored.max(after)));
        Self {
            duration: file.duration,
            tags: file.tags,
            next_id,
        }
    }
}

#[derive(Debug)]
struct FileSlot {
    writer: Mutex<()>,
    snapshot: RwLock<Arc<FileState>>,
}

impl FileSlot {
    fn current(&self) -> Arc<FileState> {
        Arc::clone(&read(&self.snapshot))
    }
}

/// Fragment tags of all files, guarded by the sibling non-overlap invariant.
pub struct IntervalStore<R, N = ()> {
    repository: Mutex<R>,
    notifier: N,
    files: RwLock<HashMap<FileId, Arc<FileSlot>>>,
}

impl<R: FragmentRepository> IntervalStore<R> {
    /// Creates a store that discards change notifications.
    pub fn new(repository: R) -> Self {
        Self::with_notifier(repository, ())
    }
}

impl<R: FragmentRepository, N: ChangeNotifier> IntervalStore<R, N> {
    pub fn with_notifier(repository: R, notifier: N) -> Self {
        Self {
            repository: Mutex::new(repository),
            notifier,
            files: RwLock::new(HashMap::new()),
        }
    }

    pub const fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Consumes the store, returning its repository.
    pub fn into_repository(self) -> R {
        self.repository
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Attaches a new fragment tag to `file`.
    pub fn attach(
        &self,
        file: &FileId,
        category: CategoryPath,
        interval: Interval,
        style: TagStyle,
    ) -> Result<FragmentTagId, StoreError> {
        let slot = self.slot(file)?;
        self.ensure_category(&category)?;

        let _writer = lock(&slot.writer);
        let state = slot.current();
        check_siblings(&state.tags, &category, &interval, None)?;
        self.insert(file, &slot, &state, category, interval, style)
    }

    /// Attaches a fragment of `min_length` at (or near) `at`, wherever the
    /// sibling group has room.
    pub fn attach_near(
        &self,
        file: &FileId,
        category: CategoryPath,
        at: f64,
        min_length: f64,
        style: TagStyle,
        placement: Placement,
    ) -> Result<(FragmentTagId, Interval), StoreError> {
        let slot = self.slot(file)?;
        self.ensure_category(&category)?;

        let _writer = lock(&slot.writer);
        let state = slot.current();
        let interval = free_slot_in(&state, &category, at, min_length, placement).ok_or_else(
            || StoreError::NoFreeSpace {
                category: category.clone(),
                at,
                length: min_length,
            },
        )?;
        let id = self.insert(file, &slot, &state, category, interval, style)?;
        Ok((id, interval))
    }

    /// Moves or resizes a fragment.
    ///
    /// An endpoint that would cross the other one swaps with it instead of
    /// producing an empty interval. An update that changes nothing commits
    /// nothing and emits no event.
    pub fn update(
        &self,
        file: &FileId,
        id: FragmentTagId,
        begin: Option<f64>,
        end: Option<f64>,
    ) -> Result<(), StoreError> {
        let slot = self.slot(file)?;

        let _writer = lock(&slot.writer);
        let state = slot.current();
        let Some(position) = state.tags.iter().position(|tag| tag.id == id) else {
            return Err(StoreError::UnknownFragment {
                file: file.clone(),
                id,
            });
        };
        let current = &state.tags[position];
        let interval = Interval::ordered(
            begin.unwrap_or(current.interval.begin()),
            end.unwrap_or(current.interval.end()),
        )?;
        if interval == current.interval {
            return Ok(());
        }
        check_siblings(&state.tags, &current.category, &interval, Some(id))?;

        let event = ChangeEvent::Updated {
            id,
            begin: changed(current.interval.begin(), interval.begin()),
            end: changed(current.interval.end(), interval.end()),
        };
        let mut next = FileState::clone(&state);
        next.tags[position].interval = interval;
        self.commit(file, &slot, next, &Mutation::Update { id, interval }, event)
    }

    /// Removes a fragment. Returns whether it existed.
    pub fn detach(&self, file: &FileId, id: FragmentTagId) -> Result<bool, StoreError> {
        let slot = self.slot(file)?;

        let _writer = lock(&slot.writer);
        let state = slot.current();
        let Some(position) = state.tags.iter().position(|tag| tag.id == id) else {
            return Ok(false);
        };
        let mut next = FileState::clone(&state);
        next.tags.remove(position);
        self.commit(
            file,
            &slot,
            next,
            &Mutation::Delete(id),
            ChangeEvent::Removed { id },
        )?;
        Ok(true)
    }

    /// Current tags of `file`, in no particular order.
    pub fn list(&self, file: &FileId) -> Result<Vec<FragmentTag>, StoreError> {
        Ok(self.slot(file)?.current().tags.clone())
    }

    /// Length of the media in seconds.
    pub fn duration(&self, file: &FileId) -> Result<f64, StoreError> {
        Ok(self.slot(file)?.current().duration)
    }

    /// The slot [`attach_near`](Self::attach_near) would use, without
    /// attaching anything.
    pub fn free_slot(
        &self,
        file: &FileId,
        category: &CategoryPath,
        at: f64,
        min_length: f64,
        placement: Placement,
    ) -> Result<Option<Interval>, StoreError> {
        let state = self.slot(file)?.current();
        Ok(free_slot_in(&state, category, at, min_length, placement))
    }

    /// Display tracks for the current tags of `file`.
    pub fn tracks(&self, file: &FileId, config: &PackingConfig) -> Result<Vec<Track>, StoreError> {
        let state = self.slot(file)?.current();
        Ok(pack(&state.tags, config))
    }

    fn insert(
        &self,
        file: &FileId,
        slot: &FileSlot,
        state: &FileState,
        category: CategoryPath,
        interval: Interval,
        style: TagStyle,
    ) -> Result<FragmentTagId, StoreError> {
        let Some(id) = state.next_id else {
            return Err(StoreError::IdsExhausted { file: file.clone() });
        };
        let tag = FragmentTag {
            id,
            category,
            interval,
            style,
        };
        let event = ChangeEvent::Added {
            id,
            category: tag.category.clone(),
            interval,
            style: tag.style.clone(),
        };
        let mut next = state.clone();
        next.tags.push(tag.clone());
        next.next_id = id.next();
        self.commit(file, slot, next, &Mutation::Insert(tag), event)?;
        Ok(id)
    }

    /// Persists, publishes and announces one mutation. Caller holds the
    /// file's writer lock.
    fn commit(
        &self,
        file: &FileId,
        slot: &FileSlot,
        next: FileState,
        mutation: &Mutation,
        event: ChangeEvent,
    ) -> Result<(), StoreError> {
        lock(&self.repository)
            .commit(file, mutation)
            .map_err(StoreError::repository)?;
        *write(&slot.snapshot) = Arc::new(next);
        tracing::debug!(%file, ?event, "fragment change committed");
        self.notifier.notify(&FileChange {
            file: file.clone(),
            event,
        });
        Ok(())
    }

    fn ensure_category(&self, category: &CategoryPath) -> Result<(), StoreError> {
        let known = lock(&self.repository)
            .has_category(category)
            .map_err(StoreError::repository)?;
        if known {
            Ok(())
        } else {
            Err(StoreError::UnknownCategory {
                category: category.clone(),
            })
        }
    }

    /// Returns the file's slot, loading it from the repository on first use.
    fn slot(&self, file: &FileId) -> Result<Arc<FileSlot>, StoreError> {
        if let Some(slot) = read(&self.files).get(file) {
            return Ok(Arc::clone(slot));
        }

        let mut files = write(&self.files);
        if let Some(slot) = files.get(file) {
            return Ok(Arc::clone(slot));
        }
        let loaded = lock(&self.repository)
            .load_file(file)
            .map_err(StoreError::repository)?;
        let Some(media) = loaded else {
            return Err(StoreError::UnknownFile { file: file.clone() });
        };
        tracing::debug!(%file, tags = media.tags.len(), "loaded file state");
        let slot = Arc::new(FileSlot {
            writer: Mutex::new(()),
            snapshot: RwLock::new(Arc::new(FileState::from(media))),
        });
        files.insert(file.clone(), Arc::clone(&slot));
        Ok(slot)
    }
}

fn check_siblings(
    tags: &[FragmentTag],
    category: &CategoryPath,
    candidate: &Interval,
    exclude: Option<FragmentTagId>,
) -> Result<(), StoreError> {
    let siblings: Vec<&FragmentTag> = siblings_of(tags, category, exclude).collect();
    let intervals: Vec<Interval> = siblings.iter().map(|tag| tag.interval).collect();
    match first_collision(&intervals, candidate) {
        None => Ok(()),
        Some(index) => Err(StoreError::Collision {
            category: category.clone(),
            conflicting: siblings[index].id,
        }),
    }
}

fn free_slot_in(
    state: &FileState,
    category: &CategoryPath,
    at: f64,
    min_length: f64,
    placement: Placement,
) -> Option<Interval> {
    let siblings: Vec<Interval> = siblings_of(&state.tags, category, None)
        .map(|tag| tag.interval)
        .collect();
    match placement {
        Placement::Exact => find_slot(&siblings, state.duration, at, min_length),
        Placement::Nearest => find_nearest_slot(&siblings, state.duration, at, min_length),
    }
}

#[expect(clippy::float_cmp, reason = "reports endpoints that were rewritten")]
fn changed(old: f64, new: f64) -> Option<f64> {
    (old != new).then_some(new)
}

// Every mutation publishes a complete new snapshot before releasing its
// locks, so a poisoned lock still guards consistent data.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Errors from [`MemoryRepository`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryRepositoryError {
    /// Commits were disabled with [`MemoryRepository::set_read_only`].
    #[error("repository is read-only")]
    ReadOnly,
    /// A mutation referenced a file that was never added.
    #[error("file {0} is not in the repository")]
    MissingFile(FileId),
}

/// An in-memory [`FragmentRepository`].
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    files: HashMap<FileId, MediaFile>,
    categories: HashSet<CategoryPath>,
    read_only: bool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an empty media file.
    pub fn add_file(&mut self, id: FileId, duration: f64) {
        self.files.insert(
            id.clone(),
            MediaFile {
                id,
                duration,
                tags: Vec::new(),
                next_tag_id: None,
            },
        );
    }

    /// Registers a category definition.
    pub fn add_category(&mut self, category: CategoryPath) {
        self.categories.insert(category);
    }

    pub fn file(&self, id: &FileId) -> Option<&MediaFile> {
        self.files.get(id)
    }

    /// Makes every following commit fail.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }
}

impl FragmentRepository for MemoryRepository {
    type Error = MemoryRepositoryError;

    fn load_file(&mut self, file: &FileId) -> Result<Option<MediaFile>, Self::Error> {
        Ok(self.files.get(file).cloned())
    }

    fn has_category(&mut self, category: &CategoryPath) -> Result<bool, Self::Error> {
        Ok(self.categories.contains(category))
    }

    fn commit(&mut self, file: &FileId, mutation: &Mutation) -> Result<(), Self::Error> {
        if self.read_only {
            return Err(MemoryRepositoryError::ReadOnly);
        }
        let media = self
            .files
            .get_mut(file)
            .ok_or_else(|| MemoryRepositoryError::MissingFile(file.clone()))?;
        match mutation {
            Mutation::Insert(tag) => {
                media.tags.push(tag.clone());
                media.next_tag_id = tag.id.next();
            }
            Mutation::Update { id, interval } => {
                if let Some(tag) = media.tags.iter_mut().find(|tag| tag.id == *id) {
                    tag.interval = *interval;
                }
            }
            Mutation::Delete(id) => media.tags.retain(|tag| tag.id != *id),
        }
        Ok(())
    }
}
