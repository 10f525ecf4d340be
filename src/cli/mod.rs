//! CLI module - command-line interface
//!
//! Contains the subcommand implementations and console rendering.

pub mod commands;
pub mod console;

pub use console::{truncate_for_display, ConsoleObserver};
