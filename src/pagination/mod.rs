//! Pagination module
//!
//! Supports: id cursors (before/after/around) and numbered pages
//!
//! # Overview
//!
//! A [`PageSource`] knows how to fetch one page for a [`Cursor`]. The walks in
//! this module decide which cursor comes next and when to stop, while the
//! [`Transport`](crate::http::Transport) turns each call into a tagged
//! [`FetchOutcome`].

mod strategies;
mod types;

pub use strategies::{CursorPaginator, PageNumberPaginator};
pub use types::{Cursor, FetchOutcome, FetchResult, PageRequest, PageSource, PaginationState};

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests;
