//! CLI command implementations for nanosuite-aggregator.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: Configuration validation and reachability probe
//! - `config`: Configuration file generation
//! - `collect`: One-shot collection pass

pub mod check;
pub mod collect;
pub mod config;

// Re-export command functions
pub use check::command_check;
pub use collect::command_collect;
pub use config::command_config;
