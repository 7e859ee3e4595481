//! Pagination types and traits
//!
//! Defines the core pagination abstractions used by all walks.

use crate::error::{Result, TransportErrorKind};
use crate::http::Reply;
use crate::record::Record;
use crate::types::Direction;
use async_trait::async_trait;
use std::fmt;

/// Position token for a single page request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Cursor {
    /// Most recent page
    Latest,
    /// Records older than this id
    Before(String),
    /// Records newer than this id
    After(String),
    /// Records surrounding this id
    Around(String),
    /// Page number for numbered walks
    Page(u32),
}

impl Cursor {
    /// Build the cursor for a walk direction anchored at `value`
    pub fn directed(direction: Direction, value: impl Into<String>) -> Self {
        match direction {
            Direction::Before => Self::Before(value.into()),
            Direction::After => Self::After(value.into()),
        }
    }

    /// Starting cursor for a walk, `None` meaning the most recent page
    pub fn start(direction: Direction, anchor: Option<&str>) -> Self {
        match anchor {
            Some(id) => Self::directed(direction, id),
            None => Self::Latest,
        }
    }

    /// Query parameter carrying this cursor, if any
    pub fn query_param(&self) -> Option<(&'static str, String)> {
        match self {
            Self::Latest => None,
            Self::Before(id) => Some(("before", id.clone())),
            Self::After(id) => Some(("after", id.clone())),
            Self::Around(id) => Some(("around", id.clone())),
            Self::Page(n) => Some(("page", n.to_string())),
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.query_param() {
            Some((key, value)) => write!(f, "{key}={value}"),
            None => write!(f, "latest"),
        }
    }
}

/// A single page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Where the page starts
    pub cursor: Cursor,
    /// Maximum records requested
    pub limit: u32,
}

impl PageRequest {
    /// Create a new page request
    pub fn new(cursor: Cursor, limit: u32) -> Self {
        Self { cursor, limit }
    }
}

/// Records returned by one page call
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult<R> {
    /// Records in the order the source returned them
    pub records: Vec<R>,
    /// Fewer records than requested were returned
    pub short: bool,
}

impl<R> FetchResult<R> {
    /// Wrap a page, computing `short` against the requested limit
    pub fn new(records: Vec<R>, limit: u32) -> Self {
        let short = records.len() < limit as usize;
        Self { records, short }
    }
}

/// Tagged result of a page call
///
/// Separates "no more data" from "this call failed" so walks can decide
/// whether to stop or move on.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<R> {
    /// A non-empty page
    Page(FetchResult<R>),
    /// The source has nothing at this cursor
    Empty,
    /// The call failed after the transport gave up on it
    Failed(TransportErrorKind),
}

impl<R> FetchOutcome<R> {
    /// Classify a decoded page
    pub fn from_records(records: Vec<R>, limit: u32) -> Self {
        if records.is_empty() {
            Self::Empty
        } else {
            Self::Page(FetchResult::new(records, limit))
        }
    }

    /// Check if this outcome carries records
    pub fn is_page(&self) -> bool {
        matches!(self, Self::Page(_))
    }

    /// Check if this outcome is a failure
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// A remote collection that can be read one page at a time
///
/// Implementations perform a single attempt per call and report quota
/// metadata through [`Reply`]; the transport handles retries and waits.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Record type produced by this source
    type Record: Record;

    /// Short label used in logs
    fn name(&self) -> &str;

    /// Fetch one page
    async fn fetch(&self, request: &PageRequest) -> Result<Reply<Vec<Self::Record>>>;
}

/// Pagination state tracking for one walk
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    /// Pages requested so far
    pub pages: u32,
    /// Cursor of the last request
    pub cursor: Option<Cursor>,
    /// Total records kept
    pub total_fetched: usize,
    /// Consecutive empty pages (numbered walks)
    pub empty_streak: u32,
    /// Page calls that failed
    pub failures: u32,
    /// Whether the walk is finished
    pub done: bool,
}

impl PaginationState {
    /// Create new pagination state
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request for `cursor`
    pub fn requested(&mut self, cursor: Cursor) {
        self.pages += 1;
        self.cursor = Some(cursor);
    }

    /// Add to total fetched count
    pub fn add_fetched(&mut self, count: usize) {
        self.total_fetched += count;
    }

    /// Mark pagination as done
    pub fn mark_done(&mut self) {
        self.done = true;
    }
}
