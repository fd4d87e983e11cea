//! CLI module for symposium - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for listing participants
//! and conversations, offline simulation, and interactive chat.

pub mod chat;
pub mod commands;
pub mod simulate;

pub use commands::Cli;
