//! carmatch command-line front end: path resolution and command handlers.

pub mod commands;
pub mod config;

pub use commands::{
    info, run_compare, run_match, run_validate, CommandOutput, MatchOptions, EXIT_NOT_FOUND,
    NOT_FOUND_MESSAGE,
};
pub use config::{load_engine_config, resolve_catalog_path, resolve_config_path};
