//! Reply-thread reconstruction.
//!
//! A similarity hit is a single chat message. Its thread is every message in a
//! bounded window around it that shares the same root, found by following
//! `reply_to_message_id` pointers until they leave the window.

mod reconstruct;

pub use reconstruct::{build_thread, ThreadReconstructor, DEFAULT_WINDOW_SIZE};

use crate::message_store::{SimilarityHit, StoredMessage};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use tracing::warn;

/// A window message prepared for thread reconstruction.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadMessage {
    /// Store sequence id.
    pub id: i64,
    pub content: String,
    pub title: String,
    pub message_id: i64,
    pub reply_to_message_id: Option<i64>,
    /// Parsed timestamp; None when absent or unparseable.
    pub date: Option<NaiveDateTime>,
    /// Timestamp as stored, used for display.
    pub raw_date: Option<String>,
    pub author: Option<String>,
}

impl ThreadMessage {
    fn new(id: i64, content: &str, metadata: &crate::message_store::MessageMetadata) -> Self {
        let date = metadata.date.as_deref().and_then(|raw| {
            let parsed = parse_timestamp(raw);
            if parsed.is_none() {
                warn!(
                    "Unparseable date {:?} on message {} in '{}'",
                    raw, metadata.message_id, metadata.title
                );
            }
            parsed
        });

        Self {
            id,
            content: content.to_string(),
            title: metadata.title.clone(),
            message_id: metadata.message_id,
            reply_to_message_id: metadata.reply_to_message_id,
            date,
            raw_date: metadata.date.clone(),
            author: metadata.author.clone(),
        }
    }
}

impl From<&StoredMessage> for ThreadMessage {
    fn from(message: &StoredMessage) -> Self {
        Self::new(message.id, &message.content, &message.metadata)
    }
}

impl From<&SimilarityHit> for ThreadMessage {
    fn from(hit: &SimilarityHit) -> Self {
        Self::new(hit.id, &hit.content, &hit.metadata)
    }
}

/// Parse an ISO-8601 timestamp as exported by chat clients.
///
/// Accepts RFC 3339 (normalized to UTC), naive date-times with `T` or a space
/// separator, and bare dates (midnight).
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// One message of a reconstructed thread, reduced for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadEntry {
    pub author: String,
    pub content: String,
    pub date: String,
}

impl From<&ThreadMessage> for ThreadEntry {
    fn from(message: &ThreadMessage) -> Self {
        let content = if message.content.is_empty() {
            "No content".to_string()
        } else {
            message.content.clone()
        };

        Self {
            author: message
                .author
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            content,
            date: message
                .raw_date
                .clone()
                .unwrap_or_else(|| "No date".to_string()),
        }
    }
}

/// A reconstructed conversation: the root's message id and its members in
/// chronological order.
///
/// Serializes as `[{"root_id": n}, {author, content, date}, ...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationThread {
    pub root_id: i64,
    pub entries: Vec<ThreadEntry>,
}

impl ConversationThread {
    /// JSON text used in the generation context.
    pub fn to_context_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("[{{\"root_id\":{}}}]", self.root_id))
    }
}

struct RootMarker(i64);

impl Serialize for RootMarker {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("root_id", &self.0)?;
        map.end()
    }
}

impl Serialize for ConversationThread {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.entries.len() + 1))?;
        seq.serialize_element(&RootMarker(self.root_id))?;
        for entry in &self.entries {
            seq.serialize_element(entry)?;
        }
        seq.end()
    }
}
