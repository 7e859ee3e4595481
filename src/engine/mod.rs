//! Execution engine module
//!
//! Long-running per-item loop with start/stop windows and resume.
//!
//! # Overview
//!
//! The engine module provides:
//! - `ItemRunner` - Reads identifiers from a CSV, processes each one and
//!   appends a row to the output, checkpointing after every item
//! - `ItemProcessor` - The work done for a single identifier
//! - `ItemRunConfig` / `RunStats` - Run configuration and counters

mod types;

pub use types::{ItemProcessor, ItemRunConfig, RunStats};

use crate::error::Result;
use crate::output::CsvSink;
use crate::state::{Checkpoint, CheckpointTracker};
use std::path::Path;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Per-item runner
#[derive(Debug, Clone, Default)]
pub struct ItemRunner {
    /// Run configuration
    config: ItemRunConfig,
}

impl ItemRunner {
    /// Create a new runner
    pub fn new(config: ItemRunConfig) -> Self {
        Self { config }
    }

    /// Get the run configuration
    pub fn config(&self) -> &ItemRunConfig {
        &self.config
    }

    /// Process every identifier in `input` (first column, header row
    /// skipped) and append one row per item to `output`
    pub async fn run<P: ItemProcessor + ?Sized>(
        &self,
        processor: &mut P,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<RunStats> {
        let (input, output) = (input.as_ref(), output.as_ref());
        self.config.validate()?;

        let mut completed = CheckpointTracker::load_completed(output, self.config.resume)?;
        let mut tracker = CheckpointTracker::for_output(output);
        if self.config.resume {
            info!("Resume mode: {} identifiers already in output", completed.len());
            match tracker.read().await {
                Ok(Some(previous)) => info!(
                    "Previous run stopped at position {} after {} items",
                    previous.current_position, previous.processed
                ),
                Ok(None) => {}
                Err(e) => warn!("Ignoring unreadable checkpoint: {e}"),
            }
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(input)?;

        let header = processor.header();
        let header: Vec<&str> = header.iter().map(String::as_str).collect();
        let mut sink = CsvSink::append(output, &header)?;

        let start = self.config.start.max(1);
        let mut checkpoint = Checkpoint::new(start);
        let mut stats = RunStats::new();
        let mut progress = Progress::new(Instant::now());

        info!(
            "Processing {} from position {start}{}",
            input.display(),
            self.config
                .stop
                .map(|stop| format!(" to {stop}"))
                .unwrap_or_default()
        );

        for (index, row) in reader.records().enumerate() {
            let position = index as u64 + 1;
            if position < start {
                continue;
            }
            if self.config.stop.is_some_and(|stop| position >= stop) {
                info!("Reached stop position {position}");
                break;
            }
            stats.last_position = position;

            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    stats.malformed_rows += 1;
                    warn!("Skipping unreadable row {position}: {e}");
                    continue;
                }
            };

            let Some(id) = row.get(0).map(str::trim).filter(|id| !id.is_empty()) else {
                stats.empty_rows += 1;
                debug!("Skipping empty row {position}");
                continue;
            };

            if completed.contains(id) {
                stats.skipped += 1;
                debug!("Skipping {id} (already processed)");
                continue;
            }

            info!("Processing {id} (position {position})");
            let fields: Vec<&str> = row.iter().map(str::trim).collect();
            match processor.process(id, &fields).await {
                Ok(fields) => {
                    sink.write_row(&fields)?;
                    completed.insert(id.to_string());
                    stats.processed += 1;
                }
                Err(e) => {
                    stats.errors += 1;
                    error!("Error processing {id}: {e}");
                }
            }

            checkpoint.processed = stats.processed;
            checkpoint.current_position = position;
            checkpoint.skipped = stats.skipped;
            if let Err(e) = tracker.record_progress(&checkpoint).await {
                warn!("Failed to save checkpoint: {e}");
            }

            if progress.due(&stats, &self.config, Instant::now()) {
                progress.log(&stats, &self.config, start, Instant::now());
            }

            if !self.config.item_delay.is_zero() {
                tokio::time::sleep(self.config.item_delay).await;
            }
        }

        if let Err(e) = tracker.clear().await {
            warn!("Failed to remove checkpoint file: {e}");
        }

        info!(
            "Run complete: {} processed, {} skipped, {} errors, last position {}",
            stats.processed, stats.skipped, stats.errors, stats.last_position
        );
        Ok(stats)
    }
}

/// Periodic progress reporting
struct Progress {
    started: Instant,
    last_report: Instant,
    last_processed: u64,
}

impl Progress {
    fn new(now: Instant) -> Self {
        Self {
            started: now,
            last_report: now,
            last_processed: 0,
        }
    }

    fn due(&self, stats: &RunStats, config: &ItemRunConfig, now: Instant) -> bool {
        let every = config.progress_every.max(1);
        (stats.processed > self.last_processed && stats.processed % every == 0)
            || now.duration_since(self.last_report) >= config.progress_interval
    }

    fn log(&mut self, stats: &RunStats, config: &ItemRunConfig, start: u64, now: Instant) {
        let elapsed = now.duration_since(self.started).as_secs_f64();
        let rate = if elapsed > 0.0 {
            stats.processed as f64 / (elapsed / 60.0)
        } else {
            0.0
        };

        let eta = config.stop.and_then(|stop| {
            let remaining = stop.saturating_sub(stats.last_position + 1);
            (rate > 0.0).then(|| format!(", ~{:.0} min left", remaining as f64 / rate))
        });

        info!(
            "Progress: {} processed, {} skipped, {} errors, position {} (started at {start}), {rate:.1} items/min{}",
            stats.processed,
            stats.skipped,
            stats.errors,
            stats.last_position,
            eta.unwrap_or_default()
        );

        self.last_report = now;
        self.last_processed = stats.processed;
    }
}
