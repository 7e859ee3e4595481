//! In-memory page source for exercising walks and collectors

use super::types::{Cursor, PageRequest, PageSource};
use crate::error::{Error, Result};
use crate::http::{RateLimitInfo, Reply};
use crate::record::Record;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TestRecord {
    pub id: u64,
    pub timestamp: i64,
    pub body: String,
}

impl TestRecord {
    pub fn new(id: u64, timestamp: i64) -> Self {
        Self {
            id,
            timestamp,
            body: format!("message {id}"),
        }
    }
}

impl Record for TestRecord {
    type Id = u64;
    type Timestamp = i64;

    fn id(&self) -> &u64 {
        &self.id
    }

    fn timestamp(&self) -> &i64 {
        &self.timestamp
    }
}

/// Channel-like source: records sorted by id, pages returned newest first
pub(crate) struct MockSource {
    records: Vec<TestRecord>,
    pages: Option<Vec<Vec<TestRecord>>>,
    failing: HashSet<Cursor>,
    inclusive: bool,
    rate_limit: Option<RateLimitInfo>,
    requests: Mutex<Vec<PageRequest>>,
}

impl MockSource {
    /// Records with ids `1..=count`, timestamp `10 * id`
    pub fn with_count(count: u64) -> Self {
        Self::new((1..=count).map(|id| TestRecord::new(id, id as i64 * 10)).collect())
    }

    pub fn new(mut records: Vec<TestRecord>) -> Self {
        records.sort_by_key(|r| r.id);
        Self {
            records,
            pages: None,
            failing: HashSet::new(),
            inclusive: false,
            rate_limit: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Numbered pages, `pages[0]` answering `Cursor::Page(1)`
    pub fn paged(pages: Vec<Vec<TestRecord>>) -> Self {
        Self {
            pages: Some(pages),
            ..Self::new(Vec::new())
        }
    }

    pub fn failing_on(mut self, cursor: Cursor) -> Self {
        self.failing.insert(cursor);
        self
    }

    /// Answer before/after cursors including the anchor record itself
    pub fn inclusive(mut self) -> Self {
        self.inclusive = true;
        self
    }

    pub fn reporting(mut self, info: RateLimitInfo) -> Self {
        self.rate_limit = Some(info);
        self
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn cursors(&self) -> Vec<Cursor> {
        self.requests().into_iter().map(|r| r.cursor).collect()
    }

    fn newest_first(mut slice: Vec<TestRecord>) -> Vec<TestRecord> {
        slice.reverse();
        slice
    }

    fn page(&self, request: &PageRequest) -> Vec<TestRecord> {
        let limit = request.limit as usize;
        let parse = |id: &str| id.parse::<u64>().unwrap_or(0);
        let inclusive = self.inclusive;
        match &request.cursor {
            Cursor::Latest => {
                let start = self.records.len().saturating_sub(limit);
                Self::newest_first(self.records[start..].to_vec())
            }
            Cursor::Before(id) => {
                let id = parse(id);
                let older: Vec<_> = self
                    .records
                    .iter()
                    .filter(|r| r.id < id || (inclusive && r.id == id))
                    .cloned()
                    .collect();
                let start = older.len().saturating_sub(limit);
                Self::newest_first(older[start..].to_vec())
            }
            Cursor::After(id) => {
                let id = parse(id);
                let newer: Vec<_> = self
                    .records
                    .iter()
                    .filter(|r| r.id > id || (inclusive && r.id == id))
                    .take(limit)
                    .cloned()
                    .collect();
                Self::newest_first(newer)
            }
            Cursor::Around(id) => {
                let id = parse(id);
                let center = self.records.iter().position(|r| r.id >= id).unwrap_or(0);
                let start = center.saturating_sub(limit / 2);
                let end = (start + limit).min(self.records.len());
                let mut window = self.records[start..end].to_vec();
                window.sort_by_key(|r| std::cmp::Reverse(r.id == id));
                window
            }
            Cursor::Page(n) => self
                .pages
                .as_ref()
                .and_then(|pages| pages.get((*n as usize).wrapping_sub(1)))
                .cloned()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl PageSource for MockSource {
    type Record = TestRecord;

    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, request: &PageRequest) -> Result<Reply<Vec<TestRecord>>> {
        self.requests.lock().unwrap().push(request.clone());
        if self.failing.contains(&request.cursor) {
            return Err(Error::server_error(500, "boom"));
        }
        let reply = Reply::new(self.page(request));
        Ok(match &self.rate_limit {
            Some(info) => reply.with_rate_limit(info.clone()),
            None => reply,
        })
    }
}
