//! Command-line interface for swe-mend.
//!
//! Provides the `run` command that drives the repair-and-verify pipeline over
//! a range of task indices.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli};
