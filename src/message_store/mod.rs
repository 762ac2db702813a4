//! Message store abstraction for Hilo.
//!
//! Provides a trait-based interface over the table of embedded chat messages.
//! Rows are keyed by a store-assigned sequence id that follows insertion order.

mod memory;
mod sqlite;

pub use memory::MemoryMessageStore;
pub use sqlite::SqliteMessageStore;

use crate::error::{HiloError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Metadata carried by every stored message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Id of the message in the chat export, unique within `title`.
    pub message_id: i64,
    /// Conversation or channel name.
    pub title: String,
    /// ISO-8601 timestamp as exported.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, rename = "from", alias = "author")]
    pub author: Option<String>,
    #[serde(default)]
    pub reply_to_message_id: Option<i64>,
    #[serde(default)]
    pub img_name: Option<String>,
}

impl MessageMetadata {
    /// Parse and validate the metadata JSON of the row with sequence id `id`.
    pub fn from_json(id: i64, json: &str) -> Result<Self> {
        let metadata: MessageMetadata =
            serde_json::from_str(json).map_err(|e| HiloError::MalformedRecord {
                id,
                reason: e.to_string(),
            })?;

        if metadata.title.trim().is_empty() {
            return Err(HiloError::MalformedRecord {
                id,
                reason: "empty title".to_string(),
            });
        }

        Ok(metadata)
    }
}

/// A message as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    /// Store sequence id.
    pub id: i64,
    pub content: String,
    pub metadata: MessageMetadata,
}

/// A message waiting to be written.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: MessageMetadata,
}

/// A nearest-neighbour search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityHit {
    /// Store sequence id of the matched row.
    pub id: i64,
    pub content: String,
    pub metadata: MessageMetadata,
    /// Cosine distance to the query (smaller is more similar).
    pub distance: f32,
}

/// Summary of one conversation in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleSummary {
    pub title: String,
    pub message_count: u32,
    pub first_id: i64,
    pub last_id: i64,
}

/// Trait for message store implementations.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Store a message, returning its sequence id.
    async fn insert(&self, message: &NewMessage) -> Result<i64>;

    /// Store messages in order, in a single transaction.
    async fn insert_batch(&self, messages: &[NewMessage]) -> Result<usize>;

    /// Return up to `top_k` messages ordered by ascending cosine distance.
    async fn similarity_search(&self, embedding: &[f32], top_k: usize)
        -> Result<Vec<SimilarityHit>>;

    /// Return up to `limit` rows of `title` with `id < before_id` (newest first),
    /// followed by up to `limit` rows with `id >= after_id` (oldest first).
    ///
    /// Rows with malformed metadata are skipped.
    async fn window_fetch(
        &self,
        before_id: i64,
        after_id: i64,
        title: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>>;

    /// Latest stored row for `message_id` in `title`, if any.
    async fn find_message(&self, title: &str, message_id: i64) -> Result<Option<StoredMessage>>;

    /// List stored conversations, most recently inserted first.
    async fn list_titles(&self) -> Result<Vec<TitleSummary>>;

    /// Get total message count.
    async fn message_count(&self) -> Result<usize>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Cosine distance in `[0, 2]`, as used for ranking hits.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    (1.0 - cosine_similarity(a, b)).max(0.0)
}

/// Sort hits by ascending distance and keep the first `top_k`.
pub(crate) fn rank_hits(mut hits: Vec<SimilarityHit>, top_k: usize) -> Vec<SimilarityHit> {
    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(top_k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_distance_is_non_negative() {
        let a = vec![1.0, 0.0];
        assert!(cosine_distance(&a, &a).abs() < 0.001);
        assert!((cosine_distance(&a, &[0.0, 1.0]) - 1.0).abs() < 0.001);
        assert!((cosine_distance(&a, &[-1.0, 0.0]) - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_metadata_uses_export_field_names() {
        let metadata = MessageMetadata::from_json(
            7,
            r#"{"message_id": 12, "title": "Escuelas", "from": "Ana", "reply_to_message_id": 10, "date": "2024-03-01T10:00:00"}"#,
        )
        .unwrap();

        assert_eq!(metadata.message_id, 12);
        assert_eq!(metadata.author.as_deref(), Some("Ana"));
        assert_eq!(metadata.reply_to_message_id, Some(10));
        assert!(metadata.img_name.is_none());

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["from"], "Ana");
    }

    #[test]
    fn test_metadata_without_message_id_is_malformed() {
        let err = MessageMetadata::from_json(3, r#"{"title": "T"}"#).unwrap_err();
        assert!(matches!(err, HiloError::MalformedRecord { id: 3, .. }));

        let err = MessageMetadata::from_json(4, r#"{"title": " ", "message_id": 1}"#).unwrap_err();
        assert!(matches!(err, HiloError::MalformedRecord { id: 4, .. }));
    }
}
