//! Output module
//!
//! Handles CSV and JSON file writing.
//!
//! # Overview
//!
//! This module provides utilities for:
//! - Appending flushed rows to CSV files with a header written once
//! - Writing whole CSV tables
//! - Writing JSON documents

mod json;
mod writer;

pub use json::write_json;
pub use writer::{write_csv, CsvSink, WriteMode};
