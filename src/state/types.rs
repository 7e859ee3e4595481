//! Checkpoint types for tracking per-item progress
//!
//! A checkpoint is persisted as a single line of four comma-separated
//! integers: `processed,current_position,start_position,skipped`.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Where a per-item loop stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checkpoint {
    /// Items processed in this run
    pub processed: u64,
    /// Input position of the last item handled (1-based)
    pub current_position: u64,
    /// Position the run started from
    pub start_position: u64,
    /// Items skipped because they were already in the output
    pub skipped: u64,
}

impl Checkpoint {
    /// Create a checkpoint for a run starting at `start_position`
    pub fn new(start_position: u64) -> Self {
        Self {
            start_position,
            ..Self::default()
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.processed, self.current_position, self.start_position, self.skipped
        )
    }
}

impl FromStr for Checkpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let fields: Vec<&str> = s.trim().split(',').map(str::trim).collect();
        let [processed, current, start, skipped] = fields.as_slice() else {
            return Err(Error::checkpoint(format!(
                "expected 4 comma-separated fields, got {}",
                fields.len()
            )));
        };

        let parse = |name: &str, value: &str| {
            value
                .parse::<u64>()
                .map_err(|e| Error::checkpoint(format!("invalid {name} '{value}': {e}")))
        };

        Ok(Self {
            processed: parse("processed count", *processed)?,
            current_position: parse("current position", *current)?,
            start_position: parse("start position", *start)?,
            skipped: parse("skipped count", *skipped)?,
        })
    }
}
