//! CLI module for clampr - command-line interface and subcommands.

pub mod commands;

pub use commands::{Cli, Commands, LoopCommands};
