//! Chat channel message source
//!
//! Reads a channel's message history through
//! `GET {base}/channels/{channel_id}/messages?limit=N&before|after|around=ID`.
//! Pages come back newest first for every cursor kind.

use crate::error::Result;
use crate::http::{HttpClient, HttpClientConfig, Reply, RequestConfig};
use crate::pagination::{PageRequest, PageSource};
use crate::record::JsonRecord;
use crate::types::JsonValue;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// Default API root
pub const DEFAULT_BASE_URL: &str = "https://discord.com/api/v9";

/// Largest page the endpoint serves
pub const MAX_PAGE_SIZE: u32 = 100;

/// Messages of one channel
#[derive(Debug, Clone)]
pub struct ChannelMessages {
    client: HttpClient,
    channel_id: String,
    label: String,
}

impl ChannelMessages {
    /// Create a source against the default API root
    pub fn new(token: &str, channel_id: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, token, channel_id)
    }

    /// Create a source against a custom API root
    pub fn with_base_url(base_url: &str, token: &str, channel_id: impl Into<String>) -> Self {
        let config = HttpClientConfig::builder()
            .base_url(base_url)
            .header("accept", "*/*")
            .header("authorization", token)
            .build();
        Self::with_client(HttpClient::with_config(config), channel_id)
    }

    /// Create a source from a preconfigured client
    pub fn with_client(client: HttpClient, channel_id: impl Into<String>) -> Self {
        let channel_id = channel_id.into();
        Self {
            client,
            label: format!("channel {channel_id}"),
            channel_id,
        }
    }

    /// Channel being read
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }
}

#[async_trait]
impl PageSource for ChannelMessages {
    type Record = JsonRecord;

    fn name(&self) -> &str {
        &self.label
    }

    async fn fetch(&self, request: &PageRequest) -> Result<Reply<Vec<JsonRecord>>> {
        let path = format!("/channels/{}/messages", self.channel_id);
        let mut config = RequestConfig::new().query("limit", request.limit.to_string());
        if let Some((key, value)) = request.cursor.query_param() {
            config = config.query(key, value);
        }

        let reply: Reply<Vec<JsonValue>> = self.client.get_json(&path, config).await?;
        Ok(reply.map(|values| {
            values
                .into_iter()
                .filter_map(|value| {
                    let record = JsonRecord::from_value(value);
                    if record.is_none() {
                        debug!("Dropping message without id or timestamp");
                    }
                    record
                })
                .collect()
        }))
    }
}

/// A user seen as a message author or mention
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatUser {
    /// User id
    pub id: String,
    /// Account name
    pub username: Option<String>,
    /// Display name
    pub global_name: Option<String>,
    /// Legacy discriminator
    pub discriminator: Option<String>,
    /// Avatar hash
    pub avatar: Option<String>,
    /// Bot account flag
    pub bot: bool,
}

impl ChatUser {
    /// CSV header for [`csv_row`](Self::csv_row)
    pub const CSV_HEADER: [&'static str; 6] =
        ["id", "username", "global_name", "discriminator", "avatar", "bot"];

    fn from_value(value: &JsonValue) -> Option<Self> {
        let text = |field: &str| value.get(field).and_then(JsonValue::as_str).map(String::from);
        Some(Self {
            id: text("id").filter(|id| !id.is_empty())?,
            username: text("username"),
            global_name: text("global_name"),
            discriminator: text("discriminator"),
            avatar: text("avatar"),
            bot: value.get("bot").and_then(JsonValue::as_bool).unwrap_or(false),
        })
    }

    /// Row matching [`CSV_HEADER`](Self::CSV_HEADER)
    pub fn csv_row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.username.clone().unwrap_or_default(),
            self.global_name.clone().unwrap_or_default(),
            self.discriminator.clone().unwrap_or_default(),
            self.avatar.clone().unwrap_or_default(),
            if self.bot { "True" } else { "False" }.to_string(),
        ]
    }
}

/// Unique authors and mentioned users, in first-seen order
pub fn extract_users(messages: &[JsonRecord]) -> Vec<ChatUser> {
    let mut seen = HashSet::new();
    let mut users = Vec::new();

    for message in messages {
        let author = message.get("author").into_iter();
        let mentions = message
            .get("mentions")
            .and_then(JsonValue::as_array)
            .into_iter()
            .flatten();

        for user in author.chain(mentions).filter_map(ChatUser::from_value) {
            if seen.insert(user.id.clone()) {
                users.push(user);
            }
        }
    }

    users
}

/// Messages written by `user_id`
pub fn messages_by_author<'a>(messages: &'a [JsonRecord], user_id: &str) -> Vec<&'a JsonRecord> {
    messages
        .iter()
        .filter(|message| {
            message
                .get("author")
                .and_then(|author| author.get("id"))
                .and_then(JsonValue::as_str)
                == Some(user_id)
        })
        .collect()
}
