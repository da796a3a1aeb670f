//! Command-line interface definitions and helpers.
//!
//! This module contains all CLI argument parsing, enums, and subcommand handlers.

mod args;
mod commands;
mod enums;

pub use args::{Args, Command, ConfigAction, GenerateArgs};
pub use commands::{
    build_request, handle_config_action, init_config, load_config, read_batch_prompts,
    run_generate, run_script,
};
pub use enums::ClipKind;
