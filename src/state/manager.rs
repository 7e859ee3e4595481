//! Checkpoint tracker implementation
//!
//! Provides sidecar-file persistence with atomic writes and the resume set
//! derived from an existing output file.

use super::types::Checkpoint;
use crate::error::{Error, Result};
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Tracks progress of a per-item loop next to its output file
#[derive(Debug)]
pub struct CheckpointTracker {
    /// Path to the sidecar file
    path: PathBuf,
    /// Last position written in this run
    last_position: Option<u64>,
}

impl CheckpointTracker {
    /// Create a tracker writing to an explicit sidecar path
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            last_position: None,
        }
    }

    /// Create a tracker for `<output>.progress`
    pub fn for_output(output: impl AsRef<Path>) -> Self {
        Self::new(with_suffix(output.as_ref(), ".progress"))
    }

    /// Get the sidecar path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Identifiers already present in an output file
    ///
    /// Reads the first column of every data row. Returns an empty set when
    /// `resume` is off or the file does not exist yet.
    pub fn load_completed(output: impl AsRef<Path>, resume: bool) -> Result<HashSet<String>> {
        let output = output.as_ref();
        if !resume || !output.exists() {
            return Ok(HashSet::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(output)?;

        let mut completed = HashSet::new();
        for row in reader.records() {
            let row = row?;
            if let Some(id) = row.get(0).map(str::trim).filter(|id| !id.is_empty()) {
                completed.insert(id.to_string());
            }
        }

        debug!(
            "Loaded {} completed identifiers from {}",
            completed.len(),
            output.display()
        );
        Ok(completed)
    }

    /// Read the sidecar file, if any
    pub async fn read(&self) -> Result<Option<Checkpoint>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::checkpoint(format!("Failed to read checkpoint file: {e}")))?;

        contents.parse().map(Some)
    }

    /// Overwrite the sidecar with `checkpoint`
    ///
    /// Positions may not move backwards within one run.
    pub async fn record_progress(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        if let Some(last) = self.last_position {
            if checkpoint.current_position < last {
                return Err(Error::checkpoint(format!(
                    "position moved backwards from {last} to {}",
                    checkpoint.current_position
                )));
            }
        }

        // Write to temp file first, then rename for atomicity
        let temp_path = with_suffix(&self.path, ".tmp");
        tokio::fs::write(&temp_path, format!("{checkpoint}\n"))
            .await
            .map_err(|e| Error::checkpoint(format!("Failed to write checkpoint file: {e}")))?;

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::checkpoint(format!("Failed to rename checkpoint file: {e}")))?;

        self.last_position = Some(checkpoint.current_position);
        Ok(())
    }

    /// Remove the sidecar file
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::checkpoint(format!(
                "Failed to remove checkpoint file: {e}"
            ))),
        }
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
