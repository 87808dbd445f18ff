//! # dbot-cli
//!
//! `dbot-dialogue` command line: argument parsing and settings loading.

pub mod cli;

pub use cli::{load_settings, Cli, Commands, Settings};
