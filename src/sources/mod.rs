//! Concrete page sources and per-item workloads
//!
//! - [`discord`] - chat channel message history (cursor pages)
//! - [`stargazers`] - repository stargazer list (numbered HTML pages)
//! - [`github`] - public email lookup per account

pub mod discord;
pub mod github;
pub mod stargazers;

pub use discord::{extract_users, messages_by_author, ChannelMessages, ChatUser};
pub use github::{EmailFinder, EmailFinderConfig, EmailResult, EmailSource, EmailStats};
pub use stargazers::{stargazers_url, Stargazer, StargazerPages};
