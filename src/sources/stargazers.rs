//! Repository stargazer pages
//!
//! Walks the numbered HTML pages of a repository's stargazer list and pulls
//! usernames out with an ordered chain of selector strategies.

use crate::error::{Error, Result};
use crate::extract::{ExtractStrategy, StrategyChain};
use crate::http::{HttpClient, HttpClientConfig, Reply, RequestConfig};
use crate::pagination::{Cursor, PageRequest, PageSource};
use crate::record::Record;
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

/// Profile root used to build stargazer URLs
pub const PROFILE_ROOT: &str = "https://github.com";

/// Output CSV header
pub const CSV_HEADER: [&str; 2] = ["Username", "GitHub URL"];

static STARGAZERS_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(https?://[^/]+/[^/]+/[^/?#]+)/stargazers").unwrap());

static PAGE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\?page=\d+$").unwrap());

static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse(r#"a[href^="/"]"#).unwrap());

/// Selectors tried in order, oldest page layout first
pub const SELECTORS: [&str; 4] = [
    ".follow-list-item",
    r#"a[data-hovercard-type="user"]"#,
    "li.mb-2.mr-3.ml-0",
    r#"div.d-inline-block a[href^="/"]"#,
];

/// Normalize a repository or stargazer page URL to `<repo>/stargazers`
pub fn stargazers_url(repo_url: &str) -> String {
    let repo_url = repo_url.trim();
    if let Some(captures) = STARGAZERS_URL.captures(repo_url) {
        return format!("{}/stargazers", &captures[1]);
    }

    let base = PAGE_SUFFIX.replace(repo_url, "");
    let base = base.trim_end_matches('/');
    if base.ends_with("/stargazers") {
        base.to_string()
    } else {
        format!("{base}/stargazers")
    }
}

/// A user who starred the repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stargazer {
    /// Account name
    pub username: String,
    /// Profile URL
    pub url: String,
}

impl Stargazer {
    /// Create a stargazer with its profile URL
    pub fn new(username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            url: format!("{PROFILE_ROOT}/{username}"),
            username,
        }
    }

    /// Row matching [`CSV_HEADER`]
    pub fn csv_row(&self) -> [&str; 2] {
        [&self.username, &self.url]
    }
}

impl Record for Stargazer {
    type Id = String;
    type Timestamp = ();

    fn id(&self) -> &String {
        &self.username
    }

    fn timestamp(&self) -> &() {
        &()
    }
}

/// Usernames matched by one CSS selector
struct SelectorStrategy {
    css: &'static str,
    selector: Selector,
}

impl SelectorStrategy {
    fn new(css: &'static str) -> Result<Self> {
        let selector = Selector::parse(css)
            .map_err(|e| Error::config(format!("invalid selector {css}: {e}")))?;
        Ok(Self { css, selector })
    }
}

impl ExtractStrategy<Html, String> for SelectorStrategy {
    fn name(&self) -> &str {
        self.css
    }

    fn extract(&self, document: &Html) -> Vec<String> {
        document
            .select(&self.selector)
            .filter_map(username_of)
            .collect()
    }
}

/// Username from an element's own link, its first descendant link, or its text
fn username_of(element: ElementRef<'_>) -> Option<String> {
    let href = if element.value().name() == "a" {
        element.value().attr("href")
    } else {
        element
            .select(&LINK)
            .next()
            .and_then(|link| link.value().attr("href"))
    };

    let from_href = href
        .map(|href| href.trim_matches('/'))
        .filter(|path| !path.is_empty() && !path.contains('/'));

    let username = match from_href {
        Some(path) => path.to_string(),
        None => element.text().collect::<String>().trim().to_string(),
    };

    (!username.is_empty()).then_some(username)
}

/// Default selector chain
pub fn selector_chain() -> Result<StrategyChain<Html, String>> {
    SELECTORS
        .iter()
        .try_fold(StrategyChain::new(), |chain, &css| {
            Ok(chain.with(SelectorStrategy::new(css)?))
        })
}

/// Extract stargazers from one page of HTML
pub fn parse_stargazers(chain: &StrategyChain<Html, String>, html: &str) -> Vec<Stargazer> {
    let document = Html::parse_document(html);
    match chain.run(&document) {
        Some(extraction) => {
            debug!(
                "Selector {} matched {} users",
                extraction.strategy,
                extraction.items.len()
            );
            extraction.items.into_iter().map(Stargazer::new).collect()
        }
        None => Vec::new(),
    }
}

/// Numbered stargazer pages of one repository
pub struct StargazerPages {
    client: HttpClient,
    url: String,
    chain: StrategyChain<Html, String>,
}

impl StargazerPages {
    /// Create a source for `repo_url`
    pub fn new(repo_url: &str) -> Result<Self> {
        Self::with_config(HttpClientConfig::default(), repo_url)
    }

    /// Create a source from client settings, adding browser-style
    /// `Accept` headers unless already present
    pub fn with_config(mut config: HttpClientConfig, repo_url: &str) -> Result<Self> {
        let headers = &mut config.default_headers;
        headers.entry("Accept".to_string()).or_insert_with(|| {
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string()
        });
        headers
            .entry("Accept-Language".to_string())
            .or_insert_with(|| "en-US,en;q=0.5".to_string());
        Self::with_client(HttpClient::with_config(config), repo_url)
    }

    /// Create a source using a preconfigured client
    pub fn with_client(client: HttpClient, repo_url: &str) -> Result<Self> {
        let url = stargazers_url(repo_url);
        url::Url::parse(&url)?;
        Ok(Self {
            client,
            url,
            chain: selector_chain()?,
        })
    }

    /// Normalized stargazers URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PageSource for StargazerPages {
    type Record = Stargazer;

    fn name(&self) -> &str {
        &self.url
    }

    async fn fetch(&self, request: &PageRequest) -> Result<Reply<Vec<Stargazer>>> {
        let mut config = RequestConfig::new();
        match &request.cursor {
            Cursor::Page(page) => config = config.query("page", page.to_string()),
            Cursor::Latest => {}
            other => {
                return Err(Error::config(format!(
                    "stargazer pages only support page cursors, got {other}"
                )))
            }
        }

        let reply = self.client.get_text(&self.url, config).await?;
        Ok(reply.map(|html| parse_stargazers(&self.chain, &html)))
    }
}
