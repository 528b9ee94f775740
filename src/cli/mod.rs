//! Command Line Interface (CLI) layer for skyfuse.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the dispatch of each subcommand (`runner`) onto the library API
//! exposed via `skyfuse::api` and `skyfuse::serving`.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
