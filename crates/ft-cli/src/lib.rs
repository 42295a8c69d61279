//! Fragment tag CLI library.
//!
//! This crate provides the CLI interface for editing fragment tags.

mod cli;
pub mod commands;
mod config;

pub use cli::{CategoryAction, Cli, Commands, FileAction};
pub use config::{Config, PlacementConfig};
