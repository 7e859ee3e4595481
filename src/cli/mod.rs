//! CLI module
//!
//! Command-line interface for the collectors.
//!
//! # Commands
//!
//! - `messages` - Collect channel messages around a reference message
//! - `stargazers` - Collect the stargazer list of a repository
//! - `emails` - Look up public emails for a list of accounts, resumable

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::Runner;
