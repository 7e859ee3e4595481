// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # pagewalk
//!
//! Resilient collection from paginated, rate-limited HTTP APIs.
//!
//! ## Features
//!
//! - **Rate-Limited Transport**: Call pacing, quota-aware slowdowns, free
//!   retries on rate limiting, bounded backoff on transient failures
//! - **Cursor Pagination**: Walks newest to oldest or oldest to newest from an
//!   anchor, stopping on empty, short or repeated pages
//! - **Bidirectional Collection**: Records around a reference, merged and
//!   deduplicated into chronological order
//! - **Resumable Runs**: Per-item loop with start/stop windows and an atomic
//!   progress sidecar next to the output
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pagewalk::collector::BidirectionalCollector;
//! use pagewalk::http::{Transport, TransportConfig};
//! use pagewalk::sources::ChannelMessages;
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = ChannelMessages::new("token", "1234");
//!     let mut transport = Transport::new(TransportConfig::default());
//!
//!     let messages = BidirectionalCollector::default()
//!         .collect_around(&mut transport, &source, Some("98765"), 250, 250)
//!         .await;
//!     println!("{} messages", messages.len());
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │   BidirectionalCollector            ItemRunner               │
//! │   collect_around() → Vec<R>         run(processor) → Stats   │
//! └──────────────────────────────────────────────────────────────┘
//!                │                            │
//! ┌──────────────┴──────────┬─────────────────┴──────┬───────────┐
//! │ Pagination              │ Transport              │ State     │
//! ├─────────────────────────┼────────────────────────┼───────────┤
//! │ Cursor (before/after)   │ Pacing (governor)      │ Sidecar   │
//! │ Page number             │ Quota watermarks       │ Completed │
//! │ Merge / dedup           │ Retry + backoff        │ ids       │
//! └─────────────────────────┴────────────────────────┴───────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Record abstraction
pub mod record;

/// HTTP client, pacing and the retrying transport
pub mod http;

/// Pagination walks
pub mod pagination;

/// Bidirectional collection around a reference record
pub mod collector;

/// Merge and deduplication
pub mod merge;

/// Progress checkpointing
pub mod state;

/// Resumable per-item runner
pub mod engine;

/// Ordered extraction strategies
pub mod extract;

/// CSV and JSON output
pub mod output;

/// Concrete sources and workloads
pub mod sources;

/// YAML configuration
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use record::{JsonRecord, Record, SortKey};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
