//! SQLite-based message store implementation.
//!
//! Cosine distance is computed in Rust over every stored embedding. Each call
//! opens its own connection and drops it before returning, so no connection
//! outlives a single store operation.

use super::{
    cosine_distance, rank_hits, MessageMetadata, MessageStore, NewMessage, SimilarityHit,
    StoredMessage, TitleSummary,
};
use crate::error::Result;
use async_trait::async_trait;
use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        content TEXT NOT NULL,
        embedding BLOB NOT NULL,
        metadata TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_messages_title
        ON messages(json_extract(metadata, '$.title'), id);
"#;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based message store.
pub struct SqliteMessageStore {
    path: PathBuf,
}

impl SqliteMessageStore {
    /// Open (and create if needed) a message store at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL lets readers proceed while ingestion writes
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite message store at {:?}", path);

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a connection scoped to one store operation.
    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn insert_row(conn: &Connection, message: &NewMessage) -> Result<i64> {
        let metadata = serde_json::to_string(&message.metadata)?;
        conn.execute(
            "INSERT INTO messages (content, embedding, metadata) VALUES (?1, ?2, ?3)",
            params![
                message.content,
                Self::embedding_to_bytes(&message.embedding),
                metadata,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Read `(id, content, metadata)` rows, skipping malformed metadata.
    fn read_messages(
        stmt: &mut rusqlite::Statement<'_>,
        params: impl rusqlite::Params,
    ) -> Result<Vec<StoredMessage>> {
        let rows = stmt.query_map(params, |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (id, content, metadata_json) = row?;
            match MessageMetadata::from_json(id, &metadata_json) {
                Ok(metadata) => messages.push(StoredMessage {
                    id,
                    content,
                    metadata,
                }),
                Err(e) => warn!("Skipping row: {}", e),
            }
        }
        Ok(messages)
    }
}

fn hit_from_row(row: &Row<'_>) -> rusqlite::Result<(i64, String, String, Vec<u8>)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    #[instrument(skip(self, message), fields(message_id = message.metadata.message_id))]
    async fn insert(&self, message: &NewMessage) -> Result<i64> {
        let conn = self.connect()?;
        let id = Self::insert_row(&conn, message)?;
        debug!("Inserted message as row {}", id);
        Ok(id)
    }

    #[instrument(skip(self, messages), fields(count = messages.len()))]
    async fn insert_batch(&self, messages: &[NewMessage]) -> Result<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        for message in messages {
            Self::insert_row(&tx, message)?;
        }

        tx.commit()?;
        debug!("Batch inserted {} messages", messages.len());
        Ok(messages.len())
    }

    #[instrument(skip(self, embedding))]
    async fn similarity_search(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SimilarityHit>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT id, content, metadata, embedding FROM messages")?;

        let mut hits = Vec::new();
        for row in stmt.query_map([], hit_from_row)? {
            let (id, content, metadata_json, embedding_bytes) = row?;
            let metadata = match MessageMetadata::from_json(id, &metadata_json) {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("Skipping row: {}", e);
                    continue;
                }
            };
            let distance = cosine_distance(embedding, &Self::bytes_to_embedding(&embedding_bytes));
            hits.push(SimilarityHit {
                id,
                content,
                metadata,
                distance,
            });
        }

        let hits = rank_hits(hits, top_k);
        debug!("Found {} similar messages", hits.len());
        Ok(hits)
    }

    #[instrument(skip(self))]
    async fn window_fetch(
        &self,
        before_id: i64,
        after_id: i64,
        title: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        let conn = self.connect()?;
        let limit = limit as i64;

        let mut before = conn.prepare(
            r#"
            SELECT id, content, metadata FROM messages
            WHERE id < ?1 AND json_extract(metadata, '$.title') = ?2
            ORDER BY id DESC
            LIMIT ?3
            "#,
        )?;
        let mut messages = Self::read_messages(&mut before, params![before_id, title, limit])?;

        let mut after = conn.prepare(
            r#"
            SELECT id, content, metadata FROM messages
            WHERE id >= ?1 AND json_extract(metadata, '$.title') = ?2
            ORDER BY id ASC
            LIMIT ?3
            "#,
        )?;
        messages.extend(Self::read_messages(&mut after, params![after_id, title, limit])?);

        debug!("Fetched {} window rows", messages.len());
        Ok(messages)
    }

    #[instrument(skip(self))]
    async fn find_message(&self, title: &str, message_id: i64) -> Result<Option<StoredMessage>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, content, metadata FROM messages
            WHERE json_extract(metadata, '$.title') = ?1
              AND json_extract(metadata, '$.message_id') = ?2
            ORDER BY id DESC
            LIMIT 1
            "#,
        )?;
        let messages = Self::read_messages(&mut stmt, params![title, message_id])?;
        Ok(messages.into_iter().next())
    }

    #[instrument(skip(self))]
    async fn list_titles(&self) -> Result<Vec<TitleSummary>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT json_extract(metadata, '$.title') AS title, COUNT(*), MIN(id), MAX(id)
            FROM messages
            WHERE json_extract(metadata, '$.title') IS NOT NULL
            GROUP BY title
            ORDER BY MAX(id) DESC
            "#,
        )?;

        let titles = stmt.query_map([], |row| {
            Ok(TitleSummary {
                title: row.get(0)?,
                message_count: row.get(1)?,
                first_id: row.get(2)?,
                last_id: row.get(3)?,
            })
        })?;

        let result = titles.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(result)
    }

    async fn message_count(&self) -> Result<usize> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
