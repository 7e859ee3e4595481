//! Checkpoint module
//!
//! Handles progress tracking and resumability for long per-item runs.
//!
//! # Overview
//!
//! The state module provides:
//! - `Checkpoint` - Processed/position/start/skipped counters
//! - `CheckpointTracker` - Sidecar file persistence and the resume set
//!
//! After a crash at most one processed item is missing from the output, and
//! a resumed run reprocesses it.

mod manager;
mod types;

pub use manager::CheckpointTracker;
pub use types::Checkpoint;
