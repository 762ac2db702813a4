//! Embedding and storage of prepared messages.

use super::{ChatExport, PreparedMessage, DEFAULT_MIN_TEXT_CHARS};
use crate::embedding::Embedder;
use crate::error::Result;
use crate::message_store::{MessageStore, NewMessage};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub title: String,
    /// Entries in the export (after start-at trimming).
    pub total: usize,
    pub imported: usize,
    /// Entries that were not messages or had too little text.
    pub skipped: usize,
    /// Messages whose embedding failed.
    pub failed: usize,
}

/// Embeds export messages and writes them to a store.
///
/// Embedding calls run concurrently; rows are written in export order.
pub struct IngestionPipeline {
    store: Arc<dyn MessageStore>,
    embedder: Arc<dyn Embedder>,
    max_concurrent: usize,
    batch_size: usize,
    min_text_chars: usize,
    show_progress: bool,
}

impl IngestionPipeline {
    pub fn new(store: Arc<dyn MessageStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            max_concurrent: 4,
            batch_size: 100,
            min_text_chars: DEFAULT_MIN_TEXT_CHARS,
            show_progress: false,
        }
    }

    /// Maximum number of embedding requests in flight.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Rows written per store transaction.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_min_text_chars(mut self, min_text_chars: usize) -> Self {
        self.min_text_chars = min_text_chars;
        self
    }

    /// Draw a progress bar on the terminal.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("  {spinner:.green} Embedding [{bar:30.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Import every message of `export`.
    ///
    /// Embedding failures are counted and skipped; a store failure aborts
    /// the run, keeping the batches already written.
    #[instrument(skip_all, fields(title = %export.title))]
    pub async fn run(&self, export: &ChatExport) -> Result<IngestReport> {
        let (prepared, skipped) = export.prepare(self.min_text_chars);
        for (id, reason) in &skipped {
            debug!("Skipping message {:?}: {}", id, reason);
        }

        info!(
            "Embedding {} of {} entries with up to {} concurrent requests",
            prepared.len(),
            export.messages.len(),
            self.max_concurrent
        );

        let mut report = IngestReport {
            title: export.title.clone(),
            total: export.messages.len(),
            skipped: skipped.len(),
            ..Default::default()
        };

        let pb = self.progress_bar(prepared.len());
        let mut batch: Vec<NewMessage> = Vec::with_capacity(self.batch_size);

        // `buffered` yields in input order, so rows keep export order
        let mut embedded = stream::iter(prepared)
            .map(|message| async move {
                let result = self.embedder.embed(&message.content).await;
                (message, result)
            })
            .buffered(self.max_concurrent);

        while let Some((message, result)) = embedded.next().await {
            pb.inc(1);
            match result {
                Ok(embedding) if !embedding.is_empty() => {
                    batch.push(to_new_message(message, embedding));
                    if batch.len() >= self.batch_size {
                        report.imported += self.flush(&mut batch).await?;
                    }
                }
                Ok(_) => {
                    warn!("Empty embedding for message {}", message.metadata.message_id);
                    report.failed += 1;
                }
                Err(e) => {
                    warn!("Failed to embed message {}: {}", message.metadata.message_id, e);
                    report.failed += 1;
                }
            }
        }

        report.imported += self.flush(&mut batch).await?;
        pb.finish_and_clear();

        info!(
            "Imported {} messages into '{}' ({} skipped, {} failed)",
            report.imported, report.title, report.skipped, report.failed
        );
        Ok(report)
    }

    async fn flush(&self, batch: &mut Vec<NewMessage>) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let written = self.store.insert_batch(batch.as_slice()).await?;
        batch.clear();
        Ok(written)
    }
}

fn to_new_message(message: PreparedMessage, embedding: Vec<f32>) -> NewMessage {
    NewMessage {
        content: message.content,
        embedding,
        metadata: message.metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HiloError;
    use crate::message_store::{MemoryMessageStore, SqliteMessageStore};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Embeds by text length; fails on texts containing "boom". Shorter
    /// texts take longer, so completion order differs from input order.
    struct SlowEmbedder;

    #[async_trait]
    impl Embedder for SlowEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            tokio::time::sleep(Duration::from_millis(40u64.saturating_sub(text.len() as u64))).await;
            if text.contains("boom") {
                return Err(HiloError::EmbeddingUnavailable("boom".to_string()));
            }
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    fn export() -> ChatExport {
        ChatExport::from_json(
            r#"{"name": "Padres", "messages": [
                {"id": 10, "type": "message", "text": "a fairly long first message here"},
                {"id": 11, "type": "message", "text": "short"},
                {"id": 12, "type": "service", "text": "joined"},
                {"id": 13, "type": "message", "text": "boom goes this one"},
                {"id": 14, "type": "message", "reply_to_message_id": 10, "text": "mid size reply"},
                {"id": 15, "type": "message", "text": "no"}
            ]}"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_run_counts_and_preserves_order() {
        let store = Arc::new(MemoryMessageStore::new());
        let pipeline = IngestionPipeline::new(store.clone(), Arc::new(SlowEmbedder))
            .with_max_concurrent(4)
            .with_batch_size(2);

        let report = pipeline.run(&export()).await.unwrap();
        assert_eq!(
            report,
            IngestReport {
                title: "Padres".to_string(),
                total: 6,
                imported: 3,
                skipped: 2,
                failed: 1,
            }
        );

        let rows = store.window_fetch(1, 1, "Padres", 10).await.unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.metadata.message_id).collect();
        assert_eq!(ids, vec![10, 11, 14]);
        assert_eq!(rows[2].metadata.reply_to_message_id, Some(10));
    }

    #[tokio::test]
    async fn test_run_into_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteMessageStore::new(&dir.path().join("messages.db")).unwrap());
        let pipeline = IngestionPipeline::new(store.clone(), Arc::new(SlowEmbedder));

        let report = pipeline.run(&export().start_at(13).unwrap()).await.unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.imported, 1);
        assert_eq!(store.message_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteMessageStore::new(&dir.path().join("db").join("messages.db")).unwrap();
        std::fs::remove_dir_all(dir.path().join("db")).unwrap();

        let pipeline = IngestionPipeline::new(Arc::new(store), Arc::new(SlowEmbedder));
        assert!(matches!(
            pipeline.run(&export()).await,
            Err(HiloError::StorageUnavailable(_))
        ));
    }
}
