//! CSV file writer
//!
//! Provides an append-capable CSV sink that writes its header once and
//! flushes every row, so a killed run loses at most the row in flight.

use crate::error::{Error, Result};
use csv::Writer;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// How an existing file is treated when the sink opens it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace any existing content
    #[default]
    Truncate,
    /// Keep existing rows and add new ones after them
    Append,
}

/// CSV sink writing one flushed row at a time
pub struct CsvSink {
    /// CSV writer
    writer: Writer<File>,
    /// Output path
    path: PathBuf,
    /// Number of data rows written by this sink
    rows_written: usize,
}

impl CsvSink {
    /// Open `path` and write `header` when the file is new or empty
    pub fn open(path: impl AsRef<Path>, header: &[&str], mode: WriteMode) -> Result<Self> {
        let path = path.as_ref();
        ensure_parent_dir(path)?;

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(mode == WriteMode::Append)
            .truncate(mode == WriteMode::Truncate)
            .open(path)
            .map_err(|e| Error::output(format!("Failed to open {}: {e}", path.display())))?;

        let is_empty = file
            .metadata()
            .map_err(|e| Error::output(format!("Failed to stat {}: {e}", path.display())))?
            .len()
            == 0;

        let mut sink = Self {
            writer: Writer::from_writer(file),
            path: path.to_path_buf(),
            rows_written: 0,
        };

        if is_empty && !header.is_empty() {
            sink.writer.write_record(header)?;
            sink.flush()?;
        }

        Ok(sink)
    }

    /// Open for appending
    pub fn append(path: impl AsRef<Path>, header: &[&str]) -> Result<Self> {
        Self::open(path, header, WriteMode::Append)
    }

    /// Write one row and flush it to disk
    pub fn write_row<I, T>(&mut self, row: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer.write_record(row)?;
        self.flush()?;
        self.rows_written += 1;
        Ok(())
    }

    /// Get the output path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the number of rows written so far
    #[must_use]
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| {
            Error::output(format!("Failed to flush {}: {e}", self.path.display()))
        })
    }
}

/// Write a whole table to a fresh CSV file
pub fn write_csv<I, R, T>(path: impl AsRef<Path>, header: &[&str], rows: I) -> Result<usize>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut sink = CsvSink::open(path, header, WriteMode::Truncate)?;
    for row in rows {
        sink.write_row(row)?;
    }
    Ok(sink.rows_written())
}

/// Create the parent directory of `path` if needed
pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::output(format!("Failed to create {}: {e}", parent.display()))
            })
        }
        _ => Ok(()),
    }
}
