//! Pagination walk implementations
//!
//! Each walk drives a [`PageSource`] through a [`Transport`] one page at a
//! time and stops on its own termination rules.

use super::types::{Cursor, FetchOutcome, PageRequest, PageSource, PaginationState};
use crate::http::Transport;
use crate::record::Record;
use crate::types::Direction;
use std::collections::HashSet;
use tracing::{debug, info, warn};

// ============================================================================
// Cursor Pagination
// ============================================================================

/// Id-cursor walk (before/after a record id)
///
/// Sources return every page newest first regardless of direction, so a
/// "before" walk appends each page and advances from its last record while an
/// "after" walk prepends each page and advances from its first record.
#[derive(Debug, Clone)]
pub struct CursorPaginator {
    /// Maximum records requested per page
    pub page_size: u32,
}

impl Default for CursorPaginator {
    fn default() -> Self {
        Self { page_size: 100 }
    }
}

impl CursorPaginator {
    /// Create a new cursor paginator
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    /// Walk from `anchor` in `direction` until the source runs dry or
    /// `max_items` records are collected
    ///
    /// A missing anchor starts from the most recent page. Failed page calls
    /// end the walk with whatever was collected so far.
    pub async fn collect<S: PageSource>(
        &self,
        transport: &mut Transport,
        source: &S,
        direction: Direction,
        anchor: Option<&str>,
        max_items: usize,
    ) -> Vec<S::Record> {
        let mut state = PaginationState::new();
        self.walk(transport, source, direction, anchor, max_items, &mut state)
            .await
    }

    /// Same as [`collect`](Self::collect), exposing the walk state
    pub async fn walk<S: PageSource>(
        &self,
        transport: &mut Transport,
        source: &S,
        direction: Direction,
        anchor: Option<&str>,
        max_items: usize,
        state: &mut PaginationState,
    ) -> Vec<S::Record> {
        let mut collected: Vec<S::Record> = Vec::new();
        let mut cursor = Cursor::start(direction, anchor);
        let mut seen: HashSet<Cursor> = HashSet::new();

        while collected.len() < max_items {
            if !seen.insert(cursor.clone()) {
                warn!("{}: cursor {cursor} already requested, stopping", source.name());
                break;
            }

            let remaining = max_items - collected.len();
            let batch_size = self.page_size.min(u32::try_from(remaining).unwrap_or(u32::MAX));
            let request = PageRequest::new(cursor.clone(), batch_size);
            state.requested(cursor.clone());

            let page = match transport.fetch_page(source, &request).await {
                FetchOutcome::Page(page) => page,
                FetchOutcome::Empty => {
                    debug!("{}: empty page at {cursor}", source.name());
                    break;
                }
                FetchOutcome::Failed(kind) => {
                    state.failures += 1;
                    warn!(
                        "{}: page at {cursor} failed ({kind:?}), ending {direction} walk",
                        source.name()
                    );
                    break;
                }
            };

            let boundary = match direction {
                Direction::Before => page.records.last(),
                Direction::After => page.records.first(),
            };
            let Some(boundary) = boundary.map(|record| record.cursor_value()) else {
                break;
            };

            state.add_fetched(page.records.len());
            match direction {
                Direction::Before => collected.extend(page.records),
                Direction::After => {
                    let mut records = page.records;
                    records.append(&mut collected);
                    collected = records;
                }
            }
            info!(
                "{}: fetched {} records ({direction}) so far",
                source.name(),
                collected.len()
            );

            cursor = Cursor::directed(direction, boundary);

            if page.short {
                break;
            }
        }

        state.mark_done();
        collected
    }
}

// ============================================================================
// Page Number Pagination
// ============================================================================

/// Numbered page walk (`?page=N`)
///
/// Empty pages are skipped; the walk ends after a run of consecutive empty
/// pages, a page budget, a failed page call, or `max_items` records.
#[derive(Debug, Clone)]
pub struct PageNumberPaginator {
    /// First page number
    pub start_page: u32,
    /// Maximum pages requested
    pub max_pages: u32,
    /// Consecutive empty pages that end the walk
    pub max_empty_pages: u32,
    /// Limit passed with each request
    pub page_size: u32,
}

impl Default for PageNumberPaginator {
    fn default() -> Self {
        Self {
            start_page: 1,
            max_pages: 1000,
            max_empty_pages: 3,
            page_size: 100,
        }
    }
}

impl PageNumberPaginator {
    /// Create a new page number paginator starting at `start_page`
    pub fn new(start_page: u32) -> Self {
        Self {
            start_page,
            ..Self::default()
        }
    }

    /// Set the page budget
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Set the empty page tolerance
    #[must_use]
    pub fn with_max_empty_pages(mut self, max_empty_pages: u32) -> Self {
        self.max_empty_pages = max_empty_pages.max(1);
        self
    }

    /// Walk numbered pages, deduplicating records by id in first-seen order
    pub async fn collect<S: PageSource>(
        &self,
        transport: &mut Transport,
        source: &S,
        max_items: usize,
    ) -> Vec<S::Record> {
        let mut state = PaginationState::new();
        let mut seen = HashSet::new();
        let mut collected = Vec::new();
        let mut page = self.start_page;

        while state.pages < self.max_pages && collected.len() < max_items {
            let cursor = Cursor::Page(page);
            let request = PageRequest::new(cursor.clone(), self.page_size);
            state.requested(cursor);

            match transport.fetch_page(source, &request).await {
                FetchOutcome::Page(result) => {
                    state.empty_streak = 0;
                    let mut added = 0usize;
                    for record in result.records {
                        if collected.len() >= max_items {
                            break;
                        }
                        if seen.insert(record.id().clone()) {
                            collected.push(record);
                            added += 1;
                        }
                    }
                    state.add_fetched(added);
                    info!(
                        "{}: page {page} added {added} records, {} total",
                        source.name(),
                        collected.len()
                    );
                }
                FetchOutcome::Empty => {
                    state.empty_streak += 1;
                    info!(
                        "{}: page {page} empty ({}/{})",
                        source.name(),
                        state.empty_streak,
                        self.max_empty_pages
                    );
                    if state.empty_streak >= self.max_empty_pages {
                        break;
                    }
                }
                FetchOutcome::Failed(kind) => {
                    state.failures += 1;
                    warn!("{}: page {page} failed ({kind:?}), stopping", source.name());
                    break;
                }
            }

            page = match page.checked_add(1) {
                Some(next) => next,
                None => break,
            };
        }

        if state.pages >= self.max_pages {
            info!("{}: reached page budget of {}", source.name(), self.max_pages);
        }
        state.mark_done();
        collected
    }
}
