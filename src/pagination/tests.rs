//! Tests for pagination module

use super::testing::{MockSource, TestRecord};
use super::*;
use crate::error::TransportErrorKind;
use crate::http::{Transport, TransportConfig};
use crate::types::Direction;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use test_case::test_case;

fn transport() -> Transport {
    Transport::new(TransportConfig::builder().no_pacing().build())
}

fn ids(records: &[TestRecord]) -> Vec<u64> {
    records.iter().map(|r| r.id).collect()
}

// ============================================================================
// Cursor Tests
// ============================================================================

#[test]
fn test_cursor_query_param() {
    assert_eq!(Cursor::Latest.query_param(), None);
    assert_eq!(
        Cursor::Before("123".into()).query_param(),
        Some(("before", "123".to_string()))
    );
    assert_eq!(
        Cursor::After("9".into()).query_param(),
        Some(("after", "9".to_string()))
    );
    assert_eq!(
        Cursor::Around("5".into()).query_param(),
        Some(("around", "5".to_string()))
    );
    assert_eq!(Cursor::Page(3).query_param(), Some(("page", "3".to_string())));
}

#[test]
fn test_cursor_start() {
    assert_eq!(Cursor::start(Direction::Before, None), Cursor::Latest);
    assert_eq!(
        Cursor::start(Direction::Before, Some("77")),
        Cursor::Before("77".into())
    );
    assert_eq!(
        Cursor::start(Direction::After, Some("77")),
        Cursor::After("77".into())
    );
    assert_eq!(Cursor::Page(2).to_string(), "page=2");
    assert_eq!(Cursor::Latest.to_string(), "latest");
}

#[test]
fn test_fetch_result_short_flag() {
    let full = FetchResult::new(vec![1, 2, 3], 3);
    assert!(!full.short);

    let short = FetchResult::new(vec![1, 2], 3);
    assert!(short.short);
}

#[test]
fn test_fetch_outcome_from_records() {
    assert_eq!(FetchOutcome::<u32>::from_records(vec![], 10), FetchOutcome::Empty);
    let outcome = FetchOutcome::from_records(vec![1u32], 10);
    assert!(outcome.is_page());
    assert!(!outcome.is_failed());
    assert!(FetchOutcome::<u32>::Failed(TransportErrorKind::Network).is_failed());
}

// ============================================================================
// Cursor Paginator Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_before_walk_stops_on_short_page() {
    let source = MockSource::with_count(180);
    let mut transport = transport();

    let records = CursorPaginator::new(100)
        .collect(&mut transport, &source, Direction::Before, None, 250)
        .await;

    assert_eq!(records.len(), 180);
    assert_eq!(ids(&records), (1..=180).rev().collect::<Vec<_>>());

    let requests = source.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], PageRequest::new(Cursor::Latest, 100));
    assert_eq!(requests[1], PageRequest::new(Cursor::Before("81".into()), 100));
}

#[tokio::test(start_paused = true)]
async fn test_zero_max_items_makes_no_calls() {
    let source = MockSource::with_count(50);
    let mut transport = transport();

    let records = CursorPaginator::new(100)
        .collect(&mut transport, &source, Direction::Before, Some("10"), 0)
        .await;

    assert!(records.is_empty());
    assert!(source.requests().is_empty());
    assert_eq!(transport.stats().calls, 0);
}

#[tokio::test(start_paused = true)]
async fn test_batch_size_shrinks_to_item_cap() {
    let source = MockSource::with_count(1000);
    let mut transport = transport();

    let records = CursorPaginator::new(100)
        .collect(&mut transport, &source, Direction::Before, None, 250)
        .await;

    assert_eq!(records.len(), 250);
    let limits: Vec<u32> = source.requests().iter().map(|r| r.limit).collect();
    assert_eq!(limits, vec![100, 100, 50]);
}

#[tokio::test(start_paused = true)]
async fn test_after_walk_prepends_pages() {
    let source = MockSource::with_count(300);
    let mut transport = transport();

    let records = CursorPaginator::new(100)
        .collect(&mut transport, &source, Direction::After, Some("50"), 250)
        .await;

    assert_eq!(ids(&records), (51..=300).rev().collect::<Vec<_>>());
    assert_eq!(
        source.cursors(),
        vec![
            Cursor::After("50".into()),
            Cursor::After("150".into()),
            Cursor::After("250".into()),
        ]
    );
}

#[test_case(0, 100 ; "empty source")]
#[test_case(99, 100 ; "under one page")]
#[test_case(200, 100 ; "exact multiple")]
#[test_case(523, 50 ; "many pages")]
#[test_case(17, 1 ; "single record pages")]
#[tokio::test(start_paused = true)]
async fn test_walk_terminates_without_repeating_cursors(total: u64, page_size: u32) {
    let source = MockSource::with_count(total);
    let mut transport = transport();

    let records = CursorPaginator::new(page_size)
        .collect(&mut transport, &source, Direction::Before, None, usize::MAX)
        .await;

    assert_eq!(records.len() as u64, total);

    let cursors = source.cursors();
    let unique: HashSet<_> = cursors.iter().cloned().collect();
    assert_eq!(unique.len(), cursors.len());

    let bound = total.div_ceil(u64::from(page_size)) + 1;
    assert!(cursors.len() as u64 <= bound);
}

#[tokio::test(start_paused = true)]
async fn test_failed_page_ends_walk_with_partial_result() {
    let source = MockSource::with_count(300).failing_on(Cursor::Before("201".into()));
    let mut transport = transport();
    let mut state = PaginationState::new();

    let records = CursorPaginator::new(100)
        .walk(
            &mut transport,
            &source,
            Direction::Before,
            None,
            300,
            &mut state,
        )
        .await;

    assert_eq!(records.len(), 100);
    assert_eq!(state.failures, 1);
    assert!(state.done);
    assert_eq!(transport.stats().failures, 1);
    // one call for the first page plus three attempts at the failing one
    assert_eq!(source.requests().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_before_walk_from_anchor() {
    let source = MockSource::with_count(500);
    let mut transport = transport();

    let records = CursorPaginator::new(100)
        .collect(&mut transport, &source, Direction::Before, Some("120"), 150)
        .await;

    assert_eq!(ids(&records), (1..=119).rev().collect::<Vec<_>>());
    assert_eq!(
        source.cursors(),
        vec![Cursor::Before("120".into()), Cursor::Before("20".into())]
    );
}

// ============================================================================
// Page Number Paginator Tests
// ============================================================================

fn rec(id: u64) -> TestRecord {
    TestRecord::new(id, id as i64)
}

#[tokio::test(start_paused = true)]
async fn test_page_walk_skips_empty_pages_and_dedups() {
    let source = MockSource::paged(vec![
        vec![rec(1), rec(2)],
        vec![],
        vec![rec(2), rec(3)],
        vec![],
        vec![],
        vec![],
        vec![rec(4)],
    ]);
    let mut transport = transport();

    let records = PageNumberPaginator::new(1)
        .collect(&mut transport, &source, usize::MAX)
        .await;

    assert_eq!(ids(&records), vec![1, 2, 3]);
    assert_eq!(
        source.cursors(),
        (1..=6).map(Cursor::Page).collect::<Vec<_>>()
    );
}

#[tokio::test(start_paused = true)]
async fn test_page_walk_respects_start_and_budget() {
    let pages = (1..=10).map(|n| vec![rec(n)]).collect();
    let source = MockSource::paged(pages);
    let mut transport = transport();

    let records = PageNumberPaginator::new(3)
        .with_max_pages(4)
        .collect(&mut transport, &source, usize::MAX)
        .await;

    assert_eq!(ids(&records), vec![3, 4, 5, 6]);
    assert_eq!(source.cursors().first(), Some(&Cursor::Page(3)));
}

#[tokio::test(start_paused = true)]
async fn test_page_walk_stops_at_max_items() {
    let pages = (1..=5).map(|n| vec![rec(n * 10), rec(n * 10 + 1)]).collect();
    let source = MockSource::paged(pages);
    let mut transport = transport();

    let records = PageNumberPaginator::default()
        .collect(&mut transport, &source, 3)
        .await;

    assert_eq!(ids(&records), vec![10, 11, 20]);
    assert_eq!(source.requests().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_page_walk_stops_on_failure() {
    let pages = (1..=5).map(|n| vec![rec(n)]).collect();
    let source = MockSource::paged(pages).failing_on(Cursor::Page(2));
    let mut transport = transport();

    let records = PageNumberPaginator::default()
        .collect(&mut transport, &source, usize::MAX)
        .await;

    assert_eq!(ids(&records), vec![1]);
    assert!(!source.cursors().contains(&Cursor::Page(3)));
}
