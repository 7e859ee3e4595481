//! Bidirectional collection around a reference record
//!
//! Runs a "before" walk and an "after" walk from the same anchor, makes sure
//! the anchor itself is present, and merges everything into one
//! chronological sequence.

use crate::http::Transport;
use crate::merge::merge;
use crate::pagination::{Cursor, CursorPaginator, FetchOutcome, PageRequest, PageSource};
use crate::record::Record;
use crate::types::Direction;
use tracing::{info, warn};

/// Orchestrates the walks on either side of an anchor
#[derive(Debug, Clone, Default)]
pub struct BidirectionalCollector {
    paginator: CursorPaginator,
}

impl BidirectionalCollector {
    /// Create a collector using `paginator` for both walks
    pub fn new(paginator: CursorPaginator) -> Self {
        Self { paginator }
    }

    /// Collect up to `max_before` records older than `reference` and up to
    /// `max_after` newer ones, returned oldest first
    ///
    /// Without a reference only the most recent `max_before` records are
    /// collected.
    pub async fn collect_around<S: PageSource>(
        &self,
        transport: &mut Transport,
        source: &S,
        reference: Option<&str>,
        max_before: usize,
        max_after: usize,
    ) -> Vec<S::Record> {
        let Some(reference) = reference else {
            info!("{}: no reference id, collecting most recent records", source.name());
            let recent = self
                .paginator
                .collect(transport, source, Direction::Before, None, max_before)
                .await;
            return merge([recent]);
        };

        info!("{}: collecting before {reference}", source.name());
        let before = self
            .paginator
            .collect(transport, source, Direction::Before, Some(reference), max_before)
            .await;

        info!("{}: collecting after {reference}", source.name());
        let after = self
            .paginator
            .collect(transport, source, Direction::After, Some(reference), max_after)
            .await;

        let is_anchor = |record: &S::Record| record.cursor_value() == reference;
        let anchor = if before.iter().chain(after.iter()).any(is_anchor) {
            Vec::new()
        } else {
            self.fetch_anchor(transport, source, reference).await
        };

        let merged = merge([before, anchor, after]);
        info!("{}: {} unique records collected", source.name(), merged.len());
        merged
    }

    /// Fetch the anchor record directly
    ///
    /// Failure is not fatal; the merged output then lacks the anchor.
    async fn fetch_anchor<S: PageSource>(
        &self,
        transport: &mut Transport,
        source: &S,
        reference: &str,
    ) -> Vec<S::Record> {
        let request = PageRequest::new(Cursor::Around(reference.to_string()), 1);
        match transport.fetch_page(source, &request).await {
            FetchOutcome::Page(page) => {
                let mut records = page.records;
                let position = records
                    .iter()
                    .position(|r| r.cursor_value() == reference)
                    .unwrap_or(0);
                vec![records.swap_remove(position)]
            }
            FetchOutcome::Empty => {
                warn!("{}: reference {reference} not found", source.name());
                Vec::new()
            }
            FetchOutcome::Failed(kind) => {
                warn!("{}: could not fetch reference {reference} ({kind:?})", source.name());
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::TransportConfig;
    use crate::pagination::testing::{MockSource, TestRecord};
    use pretty_assertions::assert_eq;

    fn transport() -> Transport {
        Transport::new(TransportConfig::builder().no_pacing().build())
    }

    fn collector(page_size: u32) -> BidirectionalCollector {
        BidirectionalCollector::new(CursorPaginator::new(page_size))
    }

    fn assert_chronological(records: &[TestRecord]) {
        for pair in records.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp, "{pair:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_anchor_missing_from_both_walks_is_fetched_once() {
        let source = MockSource::with_count(40);
        let mut transport = transport();

        let records = collector(100)
            .collect_around(&mut transport, &source, Some("20"), 10, 10)
            .await;

        let around: Vec<_> = source
            .cursors()
            .into_iter()
            .filter(|c| matches!(c, Cursor::Around(_)))
            .collect();
        assert_eq!(around, vec![Cursor::Around("20".into())]);

        let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, (10..=30).collect::<Vec<_>>());
        assert_chronological(&records);
    }

    #[tokio::test(start_paused = true)]
    async fn test_anchor_found_in_walk_skips_direct_fetch() {
        let source = MockSource::with_count(30).inclusive();
        let mut transport = transport();

        let records = collector(100)
            .collect_around(&mut transport, &source, Some("15"), 10, 10)
            .await;

        assert!(!source
            .cursors()
            .iter()
            .any(|c| matches!(c, Cursor::Around(_))));
        let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, (6..=24).collect::<Vec<_>>());
        assert_chronological(&records);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_reference_collects_recent_in_order() {
        let source = MockSource::with_count(75);
        let mut transport = transport();

        let records = collector(20)
            .collect_around(&mut transport, &source, None, 50, 999)
            .await;

        let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, (26..=75).collect::<Vec<_>>());
        assert!(source
            .cursors()
            .iter()
            .all(|c| !matches!(c, Cursor::After(_) | Cursor::Around(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_output_is_chronological_when_ids_disagree_with_time() {
        let records = vec![
            TestRecord::new(1, 500),
            TestRecord::new(2, 100),
            TestRecord::new(3, 300),
            TestRecord::new(4, 200),
            TestRecord::new(5, 400),
            TestRecord::new(6, 50),
        ];
        let source = MockSource::new(records);
        let mut transport = transport();

        let collected = collector(2)
            .collect_around(&mut transport, &source, Some("3"), 10, 10)
            .await;

        assert_eq!(collected.len(), 6);
        assert_chronological(&collected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_anchor_fetch_is_not_fatal() {
        let source = MockSource::with_count(40).failing_on(Cursor::Around("20".into()));
        let mut transport = transport();

        let records = collector(100)
            .collect_around(&mut transport, &source, Some("20"), 5, 5)
            .await;

        let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![15, 16, 17, 18, 19, 21, 22, 23, 24, 25]);
        assert_eq!(transport.stats().failures, 1);
    }
}
