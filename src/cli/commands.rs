//! CLI commands and argument parsing

use crate::sources::discord::DEFAULT_BASE_URL;
use crate::sources::github::{DEFAULT_API_URL, DEFAULT_WEB_URL};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Resilient paginated collection from rate-limited HTTP APIs
#[derive(Parser, Debug)]
#[command(name = "pagewalk")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect channel messages around a reference message
    Messages {
        /// Authorization token
        #[arg(long, env = "PAGEWALK_DISCORD_TOKEN", hide_env_values = true)]
        token: String,

        /// Channel to read
        #[arg(long)]
        channel: String,

        /// Message to collect around (latest messages when omitted)
        #[arg(long)]
        reference: Option<String>,

        /// Messages to collect before the reference
        #[arg(long, default_value = "250")]
        before: usize,

        /// Messages to collect after the reference
        #[arg(long, default_value = "250")]
        after: usize,

        /// Also write the messages of this user
        #[arg(long)]
        user: Option<String>,

        /// Output directory
        #[arg(long, default_value = "discord_output")]
        output_dir: PathBuf,

        /// API root
        #[arg(long, default_value = DEFAULT_BASE_URL)]
        base_url: String,
    },

    /// Collect the stargazers of a repository
    Stargazers {
        /// Repository or stargazer page URL
        repo_url: String,

        /// Output CSV
        #[arg(short, long, default_value = "stargazers.csv")]
        output: PathBuf,

        /// First page to fetch
        #[arg(long, default_value = "1")]
        start: u32,

        /// Page budget
        #[arg(long, default_value = "1000")]
        max_pages: u32,

        /// Attempts per page
        #[arg(long)]
        retries: Option<u32>,
    },

    /// Look up public emails for a list of accounts
    Emails {
        /// Input CSV, account name in the first column
        #[arg(short, long, default_value = "complete_stargazers.csv")]
        input: PathBuf,

        /// Output CSV
        #[arg(short, long, default_value = "github_emails.csv")]
        output: PathBuf,

        /// API token
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Seconds between items and between repositories
        #[arg(long, default_value = "1.0")]
        delay: f64,

        /// Attempts per API call
        #[arg(long)]
        max_retries: Option<u32>,

        /// First row to process (1-based)
        #[arg(long, default_value = "1")]
        start: u64,

        /// Row to stop before
        #[arg(long)]
        stop: Option<u64>,

        /// Skip accounts already in the output
        #[arg(long)]
        resume: bool,

        /// API root
        #[arg(long, default_value = DEFAULT_API_URL)]
        api_url: String,

        /// Web root used for patch downloads
        #[arg(long, default_value = DEFAULT_WEB_URL)]
        web_url: String,
    },
}
