//! Public email lookup for GitHub accounts
//!
//! [`EmailFinder`] is the per-item workload of the `emails` command. For each
//! username it reads the profile and, when the profile has no public email,
//! falls back to commit metadata, push events and finally raw `.patch` text.
//! The first lookup that finds an address wins.

use crate::engine::ItemProcessor;
use crate::error::{Error, Result};
use crate::http::{
    HttpClient, HttpClientConfig, RequestConfig, Transport, TransportConfig, TransportStats,
};
use crate::types::OptionStringExt;
use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default REST API root
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Default web root, used for profile links and `.patch` downloads
pub const DEFAULT_WEB_URL: &str = "https://github.com";

/// Output CSV header
pub const CSV_HEADER: [&str; 6] = [
    "Username",
    "GitHub URL",
    "Email",
    "Location",
    "Organization",
    "Source",
];

static PATCH_EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^<>@\s]+@[^<>\s]+)>").unwrap());

/// Check that an address is usable (not a GitHub relay address)
pub fn is_usable_email(email: &str) -> bool {
    let email = email.trim();
    !email.is_empty() && !email.ends_with("noreply.github.com")
}

/// Addresses found in the headers of a patch
pub fn emails_in_patch(text: &str) -> impl Iterator<Item = &str> {
    PATCH_EMAIL
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .map(|m| m.as_str())
        .filter(|email| is_usable_email(email))
}

// ============================================================================
// Configuration
// ============================================================================

/// Lookup limits and endpoints
#[derive(Debug, Clone, PartialEq)]
pub struct EmailFinderConfig {
    /// REST API root
    pub api_url: String,
    /// Web root
    pub web_url: String,
    /// API token, sent as `Authorization: token <T>`
    pub token: Option<String>,
    /// Pause between repositories within one lookup
    pub repo_delay: Duration,
    /// Repositories scanned by the commit lookup
    pub commit_repos: u32,
    /// Commits listed per repository by the commit lookup
    pub commits_per_repo: u32,
    /// Public events scanned by the event lookup
    pub events: u32,
    /// Repositories scanned by the patch lookup
    pub patch_repos: u32,
    /// Commits listed per repository by the patch lookup
    pub patch_commits: u32,
}

impl Default for EmailFinderConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            web_url: DEFAULT_WEB_URL.to_string(),
            token: None,
            repo_delay: Duration::from_secs(1),
            commit_repos: 10,
            commits_per_repo: 100,
            events: 30,
            patch_repos: 15,
            patch_commits: 10,
        }
    }
}

impl EmailFinderConfig {
    /// Set the API token
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// Point both roots at another host
    #[must_use]
    pub fn with_urls(mut self, api_url: impl Into<String>, web_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self.web_url = web_url.into();
        self
    }

    /// Set the pause between repositories
    #[must_use]
    pub fn with_repo_delay(mut self, delay: Duration) -> Self {
        self.repo_delay = delay;
        self
    }
}

// ============================================================================
// Results
// ============================================================================

/// Lookup that produced an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EmailSource {
    Profile,
    Commit,
    Event,
    Patch,
    None,
}

impl fmt::Display for EmailSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EmailSource::Profile => "Profile",
            EmailSource::Commit => "Commit",
            EmailSource::Event => "Event",
            EmailSource::Patch => "Patch",
            EmailSource::None => "None",
        };
        f.write_str(name)
    }
}

/// Everything learned about one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailResult {
    pub username: String,
    pub profile_url: String,
    pub email: Option<String>,
    pub location: Option<String>,
    pub organization: Option<String>,
    pub source: EmailSource,
}

impl EmailResult {
    /// Row matching [`CSV_HEADER`]
    pub fn csv_row(&self) -> Vec<String> {
        vec![
            self.username.clone(),
            self.profile_url.clone(),
            self.email.clone().unwrap_or_default(),
            self.location.clone().unwrap_or_default(),
            self.organization.clone().unwrap_or_default(),
            self.source.to_string(),
        ]
    }
}

/// Per-source counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmailStats {
    pub users: u64,
    pub emails_found: u64,
    pub profile_emails: u64,
    pub commit_emails: u64,
    pub event_emails: u64,
    pub patch_emails: u64,
    pub no_email: u64,
}

impl EmailStats {
    fn record(&mut self, source: EmailSource) {
        self.users += 1;
        match source {
            EmailSource::Profile => self.profile_emails += 1,
            EmailSource::Commit => self.commit_emails += 1,
            EmailSource::Event => self.event_emails += 1,
            EmailSource::Patch => self.patch_emails += 1,
            EmailSource::None => {
                self.no_email += 1;
                return;
            }
        }
        self.emails_found += 1;
    }
}

// ============================================================================
// API payloads
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct Profile {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    company: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Repo {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    owner: Option<Owner>,
}

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct CommitEntry {
    #[serde(default)]
    sha: Option<String>,
    #[serde(default)]
    commit: Option<CommitDetail>,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    #[serde(default)]
    author: Option<Author>,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Event {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    payload: Option<PushPayload>,
}

#[derive(Debug, Deserialize)]
struct PushPayload {
    #[serde(default)]
    commits: Vec<PushCommit>,
}

#[derive(Debug, Deserialize)]
struct PushCommit {
    #[serde(default)]
    author: Option<Author>,
}

fn usable(author: Option<&Author>) -> Option<String> {
    author
        .and_then(|a| a.email.as_deref())
        .filter(|email| is_usable_email(email))
        .map(|email| email.trim().to_string())
}

// ============================================================================
// Finder
// ============================================================================

/// Email lookup workload with its own transport
pub struct EmailFinder {
    api: HttpClient,
    web: HttpClient,
    transport: Transport,
    config: EmailFinderConfig,
    stats: EmailStats,
}

impl EmailFinder {
    /// Create a finder
    pub fn new(config: EmailFinderConfig, transport: TransportConfig) -> Self {
        let mut api = HttpClientConfig::builder()
            .base_url(&config.api_url)
            .header("Accept", "application/vnd.github.v3+json");
        if let Some(token) = &config.token {
            api = api.header("Authorization", format!("token {token}"));
        }

        let web = HttpClientConfig::builder().base_url(&config.web_url).build();

        Self {
            api: HttpClient::with_config(api.build()),
            web: HttpClient::with_config(web),
            transport: Transport::new(transport),
            config,
            stats: EmailStats::default(),
        }
    }

    /// Per-source counters so far
    pub fn stats(&self) -> &EmailStats {
        &self.stats
    }

    /// Transport counters so far
    pub fn transport_stats(&self) -> &TransportStats {
        self.transport.stats()
    }

    /// Run every lookup for one account
    ///
    /// `profile_url` is copied to the result as given. Without one the link
    /// is built from the configured web root.
    pub async fn find(&mut self, username: &str, profile_url: Option<&str>) -> Result<EmailResult> {
        let profile = self.profile(username).await?.unwrap_or_default();
        let location = profile.location.none_if_empty();
        let organization = profile.company.none_if_empty();

        let (email, source) = match profile.email.filter(|e| !e.trim().is_empty()) {
            Some(email) => (Some(email), EmailSource::Profile),
            None => self.fallback(username).await,
        };

        match &email {
            Some(email) => info!("Found email for {username} ({source}): {email}"),
            None => info!("No email found for {username}"),
        }
        self.stats.record(source);

        Ok(EmailResult {
            username: username.to_string(),
            profile_url: match profile_url {
                Some(url) => url.to_string(),
                None => format!("{}/{username}", self.config.web_url.trim_end_matches('/')),
            },
            email,
            location,
            organization,
            source,
        })
    }

    /// Commit, event and patch lookups in order, first hit wins
    async fn fallback(&mut self, username: &str) -> (Option<String>, EmailSource) {
        if let Some(email) = self.commit_email(username).await {
            return (Some(email), EmailSource::Commit);
        }
        if let Some(email) = self.event_email(username).await {
            return (Some(email), EmailSource::Event);
        }
        if let Some(email) = self.patch_email(username).await {
            return (Some(email), EmailSource::Patch);
        }
        (None, EmailSource::None)
    }

    /// Profile lookup; a missing account is not an error
    async fn profile(&mut self, username: &str) -> Result<Option<Profile>> {
        let path = format!("/users/{username}");
        match self.api_json::<Profile>(&path, RequestConfig::new()).await {
            Ok(profile) => Ok(Some(profile)),
            Err(Error::NotFound { .. }) => {
                debug!("No profile for {username}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn commit_email(&mut self, username: &str) -> Option<String> {
        let repos = self.repos(username, self.config.commit_repos).await;
        for repo in repos {
            let owned = repo.owner.as_ref().is_some_and(|o| o.login == username);
            let Some(name) = repo.name.filter(|_| owned) else {
                continue;
            };

            let commits = self
                .commits(username, &name, self.config.commits_per_repo)
                .await
                .unwrap_or_default();
            let found = commits
                .iter()
                .find_map(|c| usable(c.commit.as_ref().and_then(|d| d.author.as_ref())));
            if found.is_some() {
                return found;
            }

            self.pause().await;
        }
        None
    }

    async fn event_email(&mut self, username: &str) -> Option<String> {
        let path = format!("/users/{username}/events/public");
        let config = RequestConfig::new().query("per_page", self.config.events.to_string());
        let events = self.api_json::<Vec<Event>>(&path, config).await.ok()?;

        events
            .iter()
            .filter(|event| event.kind == "PushEvent")
            .filter_map(|event| event.payload.as_ref())
            .flat_map(|payload| &payload.commits)
            .find_map(|commit| usable(commit.author.as_ref()))
    }

    async fn patch_email(&mut self, username: &str) -> Option<String> {
        let repos = self.repos(username, self.config.patch_repos).await;
        for repo in repos {
            let Some(name) = repo.name else { continue };

            let shas: Vec<String> = self
                .commits(username, &name, self.config.patch_commits)
                .await
                .unwrap_or_default()
                .into_iter()
                .filter_map(|c| c.sha)
                .collect();

            let revisions = if shas.is_empty() {
                vec!["HEAD".to_string()]
            } else {
                shas
            };

            for revision in revisions {
                if let Some(email) = self.patch_for(username, &name, &revision).await {
                    return Some(email);
                }
            }

            self.pause().await;
        }
        None
    }

    async fn patch_for(&mut self, username: &str, repo: &str, revision: &str) -> Option<String> {
        let path = format!("/{username}/{repo}/commit/{revision}.patch");
        let label = format!("GET {path}");
        let web = &self.web;
        let text = self
            .transport
            .execute(&label, || web.get_text(&path, RequestConfig::new()))
            .await
            .ok()?;
        let email = emails_in_patch(&text).next()?;
        Some(email.to_string())
    }

    async fn repos(&mut self, username: &str, per_page: u32) -> Vec<Repo> {
        let path = format!("/users/{username}/repos");
        let config = RequestConfig::new()
            .query("sort", "updated")
            .query("per_page", per_page.to_string());
        self.api_json(&path, config).await.unwrap_or_default()
    }

    async fn commits(&mut self, username: &str, repo: &str, per_page: u32) -> Option<Vec<CommitEntry>> {
        let path = format!("/repos/{username}/{repo}/commits");
        let config = RequestConfig::new()
            .query("author", username)
            .query("per_page", per_page.to_string());
        self.api_json(&path, config).await.ok()
    }

    async fn api_json<T: DeserializeOwned + Send>(
        &mut self,
        path: &str,
        config: RequestConfig,
    ) -> Result<T> {
        let label = format!("GET {path}");
        let api = &self.api;
        self.transport
            .execute(&label, || api.get_json::<T>(path, config.clone()))
            .await
    }

    async fn pause(&self) {
        if !self.config.repo_delay.is_zero() {
            tokio::time::sleep(self.config.repo_delay).await;
        }
    }

    /// Log the per-source counters
    pub fn log_summary(&self) {
        let s = &self.stats;
        info!(
            "Email lookup: {} users, {} emails ({} profile, {} commit, {} event, {} patch), {} without email",
            s.users,
            s.emails_found,
            s.profile_emails,
            s.commit_emails,
            s.event_emails,
            s.patch_emails,
            s.no_email
        );
        let t = self.transport.stats();
        if t.failures > 0 {
            warn!("{} API calls failed for good", t.failures);
        }
    }
}

#[async_trait]
impl ItemProcessor for EmailFinder {
    fn header(&self) -> Vec<String> {
        CSV_HEADER.iter().map(ToString::to_string).collect()
    }

    async fn process(&mut self, id: &str, row: &[&str]) -> Result<Vec<String>> {
        let profile_url = row.get(1).copied().filter(|url| !url.is_empty());
        Ok(self.find(id, profile_url).await?.csv_row())
    }
}
