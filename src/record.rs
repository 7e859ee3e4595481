//! Record abstraction
//!
//! The engine is generic over the payload it collects. It only needs a unique,
//! source-assigned identifier and a monotonic timestamp for ordering.

use crate::types::JsonValue;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{self, Debug, Display};
use std::hash::{Hash, Hasher};

/// An item returned by a page source
pub trait Record: Clone + Send + Sync {
    /// Unique identifier assigned by the source
    type Id: Clone + Eq + Hash + Ord + Debug + Display + Send + Sync;
    /// Ordering key used when ids alone do not imply order
    type Timestamp: Clone + Ord + Debug + Send + Sync;

    /// Record identifier
    fn id(&self) -> &Self::Id;

    /// Record timestamp
    fn timestamp(&self) -> &Self::Timestamp;

    /// Cursor value pointing at this record
    fn cursor_value(&self) -> String {
        self.id().to_string()
    }
}

/// A scalar id or timestamp that keeps its source text but orders by value
///
/// Integers (or all-digit strings) compare numerically and RFC 3339 strings
/// compare as instants. Anything else compares as text. Across kinds,
/// integers sort before instants, which sort before text. Equality and
/// hashing use the source text.
#[derive(Debug, Clone)]
pub struct SortKey {
    raw: String,
    order: KeyOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum KeyOrder {
    Int(i128),
    Time(DateTime<FixedOffset>),
    Text,
}

impl SortKey {
    /// Parse a key from its text form
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let order = if let Ok(n) = raw.parse::<i128>() {
            KeyOrder::Int(n)
        } else if let Ok(t) = DateTime::parse_from_rfc3339(&raw) {
            KeyOrder::Time(t)
        } else {
            KeyOrder::Text
        };
        Self { raw, order }
    }

    fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::String(s) if !s.is_empty() => Some(Self::new(s.as_str())),
            JsonValue::Number(n) => {
                let int = n.as_i64().map(i128::from).or_else(|| n.as_u64().map(i128::from));
                Some(match int {
                    Some(int) => Self {
                        raw: n.to_string(),
                        order: KeyOrder::Int(int),
                    },
                    None => Self::new(n.to_string()),
                })
            }
            _ => None,
        }
    }

    /// Source text
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for SortKey {}

impl Hash for SortKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order
            .cmp(&other.order)
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq<str> for SortKey {
    fn eq(&self, other: &str) -> bool {
        self.raw == other
    }
}

impl Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for SortKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// A JSON object with its id and timestamp fields lifted out
///
/// Serializes as the original payload, so a collection of these writes
/// back out exactly as the source returned it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "JsonValue")]
pub struct JsonRecord {
    id: SortKey,
    timestamp: SortKey,
    payload: JsonValue,
}

impl JsonRecord {
    /// Build a record from an object using `id` and `timestamp` fields
    pub fn from_value(value: JsonValue) -> Option<Self> {
        Self::from_value_with(value, "id", "timestamp")
    }

    /// Build a record from an object using custom field names
    ///
    /// Numeric ids and timestamps are accepted and keep numeric ordering.
    pub fn from_value_with(value: JsonValue, id_field: &str, timestamp_field: &str) -> Option<Self> {
        let id = SortKey::from_json(value.get(id_field)?)?;
        let timestamp = SortKey::from_json(value.get(timestamp_field)?)?;
        Some(Self {
            id,
            timestamp,
            payload: value,
        })
    }

    /// The full source payload
    pub fn payload(&self) -> &JsonValue {
        &self.payload
    }

    /// Consume the record and return its payload
    pub fn into_payload(self) -> JsonValue {
        self.payload
    }

    /// Look up a field of the payload
    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.payload.get(field)
    }
}

impl TryFrom<JsonValue> for JsonRecord {
    type Error = String;

    fn try_from(value: JsonValue) -> std::result::Result<Self, Self::Error> {
        Self::from_value(value).ok_or_else(|| "record is missing id or timestamp".to_string())
    }
}

impl Serialize for JsonRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.payload.serialize(serializer)
    }
}

impl Record for JsonRecord {
    type Id = SortKey;
    type Timestamp = SortKey;

    fn id(&self) -> &SortKey {
        &self.id
    }

    fn timestamp(&self) -> &SortKey {
        &self.timestamp
    }
}
