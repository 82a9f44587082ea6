//! Rigforge CLI
//!
//! Library side of the `rigforge` binary: config and input loading, the
//! subcommands, and logging setup.

#![warn(unreachable_pub)]

pub mod commands;
pub mod config;
pub mod logging;

pub use commands::{generate, generate_with, list_stages, list_types, GenerateOutcome};
pub use config::{load_input, CliConfig, LoggingConfig, Overrides, DEFAULT_LOG_FILTER, DEFAULT_ROOT_UNIT};
