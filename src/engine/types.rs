//! Engine types
//!
//! Configuration, statistics and the processor seam for the per-item loop.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Work performed for one input identifier
///
/// Each call produces exactly one output row. Errors are counted by the
/// runner and leave no row behind, so the item is retried on the next
/// resumed run.
#[async_trait]
pub trait ItemProcessor: Send {
    /// Output CSV header
    fn header(&self) -> Vec<String>;

    /// Process one identifier into an output row
    ///
    /// `row` holds every field of the input line, the identifier first.
    async fn process(&mut self, id: &str, row: &[&str]) -> Result<Vec<String>>;
}

/// Configuration for a per-item run
#[derive(Debug, Clone)]
pub struct ItemRunConfig {
    /// First input position to process (1-based)
    pub start: u64,
    /// Position at which the run ends, exclusive
    pub stop: Option<u64>,
    /// Skip identifiers already present in the output
    pub resume: bool,
    /// Wait after each processed item
    pub item_delay: Duration,
    /// Log progress every this many processed items
    pub progress_every: u64,
    /// Log progress at least this often
    pub progress_interval: Duration,
}

impl Default for ItemRunConfig {
    fn default() -> Self {
        Self {
            start: 1,
            stop: None,
            resume: false,
            item_delay: Duration::from_secs(1),
            progress_every: 5,
            progress_interval: Duration::from_secs(300),
        }
    }
}

impl ItemRunConfig {
    /// Create a new run config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set start position, clamped to 1
    #[must_use]
    pub fn with_start(mut self, start: u64) -> Self {
        self.start = start.max(1);
        self
    }

    /// Set exclusive stop position
    #[must_use]
    pub fn with_stop(mut self, stop: Option<u64>) -> Self {
        self.stop = stop;
        self
    }

    /// Enable or disable resume mode
    #[must_use]
    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Set per-item delay
    #[must_use]
    pub fn with_item_delay(mut self, delay: Duration) -> Self {
        self.item_delay = delay;
        self
    }

    /// Check the start/stop window
    pub fn validate(&self) -> Result<()> {
        if let Some(stop) = self.stop {
            if stop <= self.start {
                return Err(Error::invalid_value(
                    "stop",
                    format!("stop ({stop}) must be greater than start ({})", self.start),
                ));
            }
        }
        Ok(())
    }
}

/// Statistics from a per-item run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Items processed and written
    pub processed: u64,
    /// Items skipped because they were already in the output
    pub skipped: u64,
    /// Items whose processing failed
    pub errors: u64,
    /// Rows with an empty identifier
    pub empty_rows: u64,
    /// Rows that could not be read
    pub malformed_rows: u64,
    /// Last input position handled
    pub last_position: u64,
}

impl RunStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }
}
