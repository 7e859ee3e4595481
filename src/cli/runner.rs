//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands};
use crate::collector::BidirectionalCollector;
use crate::config::PagewalkConfig;
use crate::engine::{ItemRunConfig, ItemRunner};
use crate::error::{Error, Result, ResultExt};
use crate::http::{HttpClient, Transport, TransportConfig, TransportStats};
use crate::output::{write_csv, write_json};
use crate::pagination::{CursorPaginator, PageNumberPaginator};
use crate::sources::discord::{extract_users, messages_by_author, ChannelMessages, ChatUser};
use crate::sources::github::{EmailFinder, EmailFinderConfig};
use crate::sources::stargazers::{self, StargazerPages};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        let config = self.load_config()?;

        match &self.cli.command {
            Commands::Messages {
                token,
                channel,
                reference,
                before,
                after,
                user,
                output_dir,
                base_url,
            } => {
                let request = MessagesRequest {
                    token,
                    channel,
                    reference: reference.as_deref(),
                    before: *before,
                    after: *after,
                    user: user.as_deref(),
                    output_dir,
                    base_url,
                };
                messages(&config, &request).await
            }
            Commands::Stargazers {
                repo_url,
                output,
                start,
                max_pages,
                retries,
            } => stargazers(&config, repo_url, output, *start, *max_pages, *retries).await,
            Commands::Emails {
                input,
                output,
                token,
                delay,
                max_retries,
                start,
                stop,
                resume,
                api_url,
                web_url,
            } => {
                let delay = Duration::try_from_secs_f64(*delay).map_err(|_| {
                    Error::invalid_value("delay", "must be a non-negative number of seconds")
                })?;
                let run = ItemRunConfig::new()
                    .with_start(*start)
                    .with_stop(*stop)
                    .with_resume(*resume)
                    .with_item_delay(delay);
                let finder = EmailFinderConfig::default()
                    .with_token(token.clone())
                    .with_urls(api_url.as_str(), web_url.as_str())
                    .with_repo_delay(delay);
                emails(&config, run, finder, *max_retries, input, output).await
            }
        }
    }

    /// Load the config file, or defaults when none is given
    fn load_config(&self) -> Result<PagewalkConfig> {
        match &self.cli.config {
            Some(path) => {
                info!("Loading config from {}", path.display());
                PagewalkConfig::from_file(path)
            }
            None => Ok(PagewalkConfig::default()),
        }
    }
}

/// Arguments of the `messages` command
struct MessagesRequest<'a> {
    token: &'a str,
    channel: &'a str,
    reference: Option<&'a str>,
    before: usize,
    after: usize,
    user: Option<&'a str>,
    output_dir: &'a Path,
    base_url: &'a str,
}

async fn messages(config: &PagewalkConfig, request: &MessagesRequest<'_>) -> Result<()> {
    let mut http = config.http_config();
    http.base_url = Some(request.base_url.to_string());
    http.default_headers
        .insert("authorization".to_string(), request.token.to_string());
    http.default_headers
        .entry("accept".to_string())
        .or_insert_with(|| "*/*".to_string());

    let source = ChannelMessages::with_client(HttpClient::with_config(http), request.channel);
    let mut transport = Transport::new(config.transport_config());

    let collected = BidirectionalCollector::new(CursorPaginator::default())
        .collect_around(
            &mut transport,
            &source,
            request.reference,
            request.before,
            request.after,
        )
        .await;
    info!("Collected {} messages from channel {}", collected.len(), request.channel);

    fs::create_dir_all(request.output_dir)
        .with_context(|| format!("Failed to create {}", request.output_dir.display()))?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");

    let users = extract_users(&collected);
    let users_path = request.output_dir.join(format!("users_{stamp}.csv"));
    write_csv(
        &users_path,
        &ChatUser::CSV_HEADER,
        users.iter().map(ChatUser::csv_row),
    )?;
    info!("Wrote {} users to {}", users.len(), users_path.display());

    let messages_path = request.output_dir.join(format!("messages_{stamp}.json"));
    write_json(&messages_path, &collected)?;
    info!("Wrote {} messages to {}", collected.len(), messages_path.display());

    if let Some(user) = request.user {
        let mine = messages_by_author(&collected, user);
        let path = request
            .output_dir
            .join(format!("user_{user}_messages_{stamp}.json"));
        write_json(&path, &mine)?;
        info!("Wrote {} messages by {user} to {}", mine.len(), path.display());
    }

    log_transport(transport.stats());
    Ok(())
}

async fn stargazers(
    config: &PagewalkConfig,
    repo_url: &str,
    output: &Path,
    start: u32,
    max_pages: u32,
    retries: Option<u32>,
) -> Result<()> {
    let source = StargazerPages::with_config(config.http_config(), repo_url)?;
    let mut transport = Transport::new(with_retries(config.transport_config(), retries)?);
    info!("Collecting stargazers from {}", source.url());

    let found = PageNumberPaginator::new(start.max(1))
        .with_max_pages(max_pages)
        .collect(&mut transport, &source, usize::MAX)
        .await;

    let rows = write_csv(
        output,
        &stargazers::CSV_HEADER,
        found.iter().map(stargazers::Stargazer::csv_row),
    )?;
    info!("Wrote {rows} stargazers to {}", output.display());

    log_transport(transport.stats());
    Ok(())
}

async fn emails(
    config: &PagewalkConfig,
    run: ItemRunConfig,
    finder: EmailFinderConfig,
    max_retries: Option<u32>,
    input: &Path,
    output: &Path,
) -> Result<()> {
    if !input.exists() {
        return Err(Error::FileNotFound {
            path: input.display().to_string(),
        });
    }
    if finder.token.is_none() {
        info!("No API token given, running with the anonymous quota");
    }

    let transport = with_retries(config.transport_config(), max_retries)?;
    let mut finder = EmailFinder::new(finder, transport);

    let stats = ItemRunner::new(run).run(&mut finder, input, output).await?;
    finder.log_summary();
    info!(
        "Emails: {} processed, {} skipped, {} errors",
        stats.processed, stats.skipped, stats.errors
    );
    log_transport(finder.transport_stats());
    Ok(())
}

/// Apply a command-line retry override
fn with_retries(mut config: TransportConfig, retries: Option<u32>) -> Result<TransportConfig> {
    if let Some(retries) = retries {
        if retries == 0 {
            return Err(Error::invalid_value("retries", "must be at least 1"));
        }
        config.max_retries = retries;
    }
    Ok(config)
}

fn log_transport(stats: &TransportStats) {
    info!(
        "Transport: {} calls, {} retries, {} rate limit waits, {} slowdowns, {} failures, {} not found",
        stats.calls,
        stats.retries,
        stats.rate_limit_waits,
        stats.slowdowns,
        stats.failures,
        stats.not_found
    );
}
