//! CLI command implementations for passenger-exporter.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: Configuration validation and a single status command run
//! - `config`: Configuration file generation
//! - `test`: Poll loop printing the slot assignment

pub mod check;
pub mod config;
pub mod test;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use test::command_test;
