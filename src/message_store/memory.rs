//! In-memory message store implementation.
//!
//! Useful for testing and small datasets.

use super::{
    cosine_distance, rank_hits, MessageStore, NewMessage, SimilarityHit, StoredMessage,
    TitleSummary,
};
use crate::error::{HiloError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

struct Row {
    message: StoredMessage,
    embedding: Vec<f32>,
}

/// In-memory message store. Rows are kept in insertion order; row `n` has id `n + 1`.
#[derive(Default)]
pub struct MemoryMessageStore {
    rows: RwLock<Vec<Row>>,
}

impl MemoryMessageStore {
    /// Create a new in-memory message store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Row>>> {
        self.rows
            .read()
            .map_err(|e| HiloError::MessageStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Row>>> {
        self.rows
            .write()
            .map_err(|e| HiloError::MessageStore(format!("Failed to acquire lock: {}", e)))
    }

    fn push(rows: &mut Vec<Row>, message: &NewMessage) -> i64 {
        let id = rows.len() as i64 + 1;
        rows.push(Row {
            message: StoredMessage {
                id,
                content: message.content.clone(),
                metadata: message.metadata.clone(),
            },
            embedding: message.embedding.clone(),
        });
        id
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn insert(&self, message: &NewMessage) -> Result<i64> {
        let mut rows = self.write()?;
        Ok(Self::push(&mut rows, message))
    }

    async fn insert_batch(&self, messages: &[NewMessage]) -> Result<usize> {
        let mut rows = self.write()?;
        for message in messages {
            Self::push(&mut rows, message);
        }
        Ok(messages.len())
    }

    async fn similarity_search(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SimilarityHit>> {
        let rows = self.read()?;

        let hits = rows
            .iter()
            .map(|row| SimilarityHit {
                id: row.message.id,
                content: row.message.content.clone(),
                metadata: row.message.metadata.clone(),
                distance: cosine_distance(embedding, &row.embedding),
            })
            .collect();

        Ok(rank_hits(hits, top_k))
    }

    async fn window_fetch(
        &self,
        before_id: i64,
        after_id: i64,
        title: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        let rows = self.read()?;
        let in_title = |row: &&Row| row.message.metadata.title == title;

        let mut window: Vec<StoredMessage> = rows
            .iter()
            .rev()
            .filter(|row| row.message.id < before_id)
            .filter(in_title)
            .take(limit)
            .map(|row| row.message.clone())
            .collect();

        window.extend(
            rows.iter()
                .filter(|row| row.message.id >= after_id)
                .filter(in_title)
                .take(limit)
                .map(|row| row.message.clone()),
        );

        Ok(window)
    }

    async fn find_message(&self, title: &str, message_id: i64) -> Result<Option<StoredMessage>> {
        let rows = self.read()?;
        Ok(rows
            .iter()
            .rev()
            .map(|row| &row.message)
            .find(|m| m.metadata.title == title && m.metadata.message_id == message_id)
            .cloned())
    }

    async fn list_titles(&self) -> Result<Vec<TitleSummary>> {
        let rows = self.read()?;

        let mut titles: HashMap<&str, TitleSummary> = HashMap::new();
        for row in rows.iter() {
            let message = &row.message;
            let entry = titles
                .entry(message.metadata.title.as_str())
                .or_insert_with(|| TitleSummary {
                    title: message.metadata.title.clone(),
                    message_count: 0,
                    first_id: message.id,
                    last_id: message.id,
                });
            entry.message_count += 1;
            entry.last_id = message.id;
        }

        let mut titles: Vec<TitleSummary> = titles.into_values().collect();
        titles.sort_by(|a, b| b.last_id.cmp(&a.last_id));
        Ok(titles)
    }

    async fn message_count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}
