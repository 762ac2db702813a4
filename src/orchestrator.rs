//! Component wiring for Hilo.
//!
//! Builds the store and backends selected in settings and exposes the
//! operations the CLI and the HTTP server run.

use crate::config::{Prompts, Settings};
use crate::embedding::{create_embedder, Embedder};
use crate::error::{HiloError, Result};
use crate::generation::{create_generator, Generator};
use crate::ingest::{ChatExport, IngestReport, IngestionPipeline};
use crate::message_store::{MessageStore, SimilarityHit, SqliteMessageStore};
use crate::rag::{AnswerService, InteractionLog};
use crate::thread::{ConversationThread, ThreadReconstructor};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

/// The main orchestrator for Hilo.
pub struct Orchestrator {
    settings: Settings,
    prompts: Prompts,
    store: Arc<dyn MessageStore>,
    embedder: Arc<dyn Embedder>,
}

impl Orchestrator {
    /// Open the configured store and create the configured embedder.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let embedder = create_embedder(&settings.embedding)?;
        info!(
            "Using {} embeddings ({})",
            settings.embedding.provider, settings.embedding.model
        );

        let store: Arc<dyn MessageStore> = Arc::new(SqliteMessageStore::new(&settings.sqlite_path())?);

        Ok(Self::with_components(settings, prompts, store, embedder))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        store: Arc<dyn MessageStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            settings,
            prompts,
            store,
            embedder,
        }
    }

    pub fn store(&self) -> Arc<dyn MessageStore> {
        self.store.clone()
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Create the answer service with the configured generation backend.
    pub fn answer_service(&self) -> Result<AnswerService> {
        let generator = create_generator(&self.settings.generation)?;
        info!(
            "Using {} generation ({})",
            self.settings.generation.provider,
            generator.model()
        );
        Ok(self.answer_service_with(generator))
    }

    /// Create the answer service around a given generator.
    pub fn answer_service_with(&self, generator: Arc<dyn Generator>) -> AnswerService {
        AnswerService::new(self.store.clone(), self.embedder.clone(), generator)
            .with_prompts(self.prompts.clone())
            .with_top_k(self.settings.rag.top_k)
            .with_window_size(self.settings.store.window_size)
            .with_validation(self.settings.rag.validate_input)
            .with_interaction_log(self.settings.interaction_log_path().map(InteractionLog::new))
    }

    /// Import a chat export file.
    #[instrument(skip(self))]
    pub async fn ingest_file(
        &self,
        path: &Path,
        start_at: Option<i64>,
        title: Option<&str>,
        show_progress: bool,
    ) -> Result<IngestReport> {
        let mut export = ChatExport::load(path).await?.with_title(title);
        if let Some(message_id) = start_at {
            export = export.start_at(message_id)?;
        }

        IngestionPipeline::new(self.store.clone(), self.embedder.clone())
            .with_max_concurrent(self.settings.ingest.max_concurrent)
            .with_batch_size(self.settings.ingest.batch_size)
            .with_min_text_chars(self.settings.ingest.min_text_chars)
            .with_progress(show_progress)
            .run(&export)
            .await
    }

    /// Messages closest to `query`.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SimilarityHit>> {
        let embedding = self.embedder.embed(query).await?;
        self.store.similarity_search(&embedding, limit).await
    }

    /// Reconstruct the thread around a stored message.
    #[instrument(skip(self))]
    pub async fn thread(&self, title: &str, message_id: i64) -> Result<ConversationThread> {
        let message = self
            .store
            .find_message(title, message_id)
            .await?
            .ok_or_else(|| {
                HiloError::InvalidInput(format!("Message {} not found in '{}'", message_id, title))
            })?;

        let hit = SimilarityHit {
            id: message.id,
            content: message.content,
            metadata: message.metadata,
            distance: 0.0,
        };

        ThreadReconstructor::new(self.store.clone())
            .with_window_size(self.settings.store.window_size)
            .reconstruct(&hit)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message_store::MemoryMessageStore;
    use async_trait::async_trait;

    struct ConstantEmbedder;

    #[async_trait]
    impl Embedder for ConstantEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, text.len() as f32 / 100.0])
        }
    }

    struct EchoGenerator;

    #[async_trait]
    impl Generator for EchoGenerator {
        async fn generate(&self, system: &str, _user: &str) -> Result<String> {
            Ok(if system.is_empty() { "True".to_string() } else { system.to_string() })
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    const EXPORT: &str = r#"{"name": "Colegios", "messages": [
        {"id": 100, "type": "message", "date": "2024-02-01T08:00:00", "from": "Sofía",
         "text": "¿Alguien conoce el colegio Belgrano?"},
        {"id": 101, "type": "message", "date": "2024-02-01T08:30:00", "text": "Unrelated chatter"},
        {"id": 102, "type": "message", "date": "2024-02-01T09:00:00", "from": "Pablo",
         "reply_to_message_id": 100, "text": "Sí, la cuota es de 50.000 pesos"}
    ]}"#;

    async fn orchestrator_with_export() -> (tempfile::TempDir, Orchestrator) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.json");
        std::fs::write(&path, EXPORT).unwrap();

        let orchestrator = Orchestrator::with_components(
            Settings::default(),
            Prompts::default(),
            Arc::new(MemoryMessageStore::new()),
            Arc::new(ConstantEmbedder),
        );
        let report = orchestrator.ingest_file(&path, None, None, false).await.unwrap();
        assert_eq!(report.imported, 3);

        (dir, orchestrator)
    }

    #[tokio::test]
    async fn test_ingest_then_thread() {
        let (_dir, orchestrator) = orchestrator_with_export().await;

        let thread = orchestrator.thread("Colegios", 102).await.unwrap();
        assert_eq!(thread.root_id, 100);
        assert_eq!(thread.entries.len(), 2);
        assert_eq!(thread.entries[0].author, "Sofía");
        assert_eq!(thread.entries[1].content, "Sí, la cuota es de 50.000 pesos");

        let err = orchestrator.thread("Colegios", 999).await.unwrap_err();
        assert!(matches!(err, HiloError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_ingest_start_at_and_title_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.json");
        std::fs::write(&path, EXPORT).unwrap();

        let orchestrator = Orchestrator::with_components(
            Settings::default(),
            Prompts::default(),
            Arc::new(MemoryMessageStore::new()),
            Arc::new(ConstantEmbedder),
        );
        let report = orchestrator
            .ingest_file(&path, Some(101), Some("Padres"), false)
            .await
            .unwrap();
        assert_eq!(report.title, "Padres");
        assert_eq!(report.imported, 2);

        let titles = orchestrator.store().list_titles().await.unwrap();
        assert_eq!(titles.len(), 1);
        assert_eq!(titles[0].title, "Padres");

        let missing = orchestrator.ingest_file(&path, Some(5), None, false).await;
        assert!(matches!(missing, Err(HiloError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_answer_service_sees_the_whole_thread() {
        let (_dir, orchestrator) = orchestrator_with_export().await;
        let service = orchestrator
            .answer_service_with(Arc::new(EchoGenerator))
            .with_top_k(1);

        let answer = service.answer("Cuota del colegio Belgrano").await.unwrap();
        assert!(answer.text.contains("colegio Belgrano"));
        assert!(answer.text.contains("50.000 pesos"));
        assert!(answer.process_time.is_some());
    }

    #[tokio::test]
    async fn test_search_limit() {
        let (_dir, orchestrator) = orchestrator_with_export().await;
        let hits = orchestrator.search("colegio", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].distance <= hits[1].distance);
    }
}
