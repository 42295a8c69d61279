//! Core domain logic for fragment tags.
//!
//! This crate contains the fundamental types and logic for:
//! - Intervals and categories: half-open time ranges under dotted category paths
//! - Collision checks: the sibling non-overlap invariant
//! - Free space: finding room for a new fragment near a point in time
//! - Store: invariant-preserving mutations with change notifications
//! - Packing: merging compatible categories into the fewest display tracks

pub mod category;
pub mod clique;
pub mod collision;
pub mod fragment;
pub mod free_space;
pub mod interval;
pub mod packing;
pub mod store;
pub mod types;

pub use category::CategoryPath;
pub use clique::{AdjacencyMatrix, CliqueConfig, CliqueError, max_clique};
pub use collision::{first_sibling_overlap, validate};
pub use fragment::{FragmentTag, MediaFile, TagStyle};
pub use free_space::{find_nearest_slot, find_slot};
pub use interval::Interval;
pub use packing::{CompatibilityGraph, PackingConfig, Track, pack, pack_many};
pub use store::{
    ChangeEvent, ChangeNotifier, FileChange, FragmentRepository, IntervalStore, MemoryRepository,
    Mutation, Placement, RecordingNotifier, StoreError,
};
pub use types::{Color, FileId, FragmentTagId, ValidationError};
