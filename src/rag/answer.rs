//! Question answering over the message archive.

use super::{ContextAssembler, InteractionLog};
use crate::config::Prompts;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::generation::Generator;
use crate::message_store::{MessageStore, SimilarityHit};
use crate::thread::{ConversationThread, ThreadReconstructor, DEFAULT_WINDOW_SIZE};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Default number of similarity hits used as context.
pub const DEFAULT_TOP_K: usize = 5;

/// The outcome of one question.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// Seconds spent after validation; `None` when validation did not let
    /// the question through.
    pub process_time: Option<f64>,
    /// Threads the answer was generated from.
    pub threads: Vec<ConversationThread>,
}

impl Answer {
    fn rejected(text: &str) -> Self {
        Self {
            text: text.to_string(),
            process_time: None,
            threads: Vec::new(),
        }
    }
}

/// Validates, retrieves, assembles context and generates an answer.
pub struct AnswerService {
    store: Arc<dyn MessageStore>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    prompts: Prompts,
    top_k: usize,
    window_size: usize,
    validate_input: bool,
    interaction_log: Option<InteractionLog>,
}

impl AnswerService {
    pub fn new(
        store: Arc<dyn MessageStore>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            store,
            embedder,
            generator,
            prompts: Prompts::default(),
            top_k: DEFAULT_TOP_K,
            window_size: DEFAULT_WINDOW_SIZE,
            validate_input: true,
            interaction_log: None,
        }
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    /// Enable or disable the in-domain check.
    pub fn with_validation(mut self, validate_input: bool) -> Self {
        self.validate_input = validate_input;
        self
    }

    pub fn with_interaction_log(mut self, log: Option<InteractionLog>) -> Self {
        self.interaction_log = log;
        self
    }

    fn assembler(&self) -> ContextAssembler {
        ContextAssembler::new(
            ThreadReconstructor::new(self.store.clone()).with_window_size(self.window_size),
        )
        .with_framing(&self.prompts.rag.context_header, &self.prompts.rag.context_footer)
    }

    /// Answer a question.
    ///
    /// Backend failures become canned answers; only store failures are
    /// returned as errors.
    #[instrument(skip(self), fields(question = %question))]
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        info!("Processing question: {}", question);

        if self.validate_input {
            match self.is_related(question).await {
                Ok(true) => {}
                Ok(false) => {
                    info!("Question rejected as unrelated");
                    return Ok(Answer::rejected(&self.prompts.rag.invalid_input_answer));
                }
                Err(e) => {
                    error!("Input validation failed: {}", e);
                    return Ok(Answer::rejected(&self.prompts.rag.apology_answer));
                }
            }
        }

        let started = Instant::now();

        let hits = self.retrieve(question).await?;
        let assembler = self.assembler();
        let threads = assembler.collect_threads(&hits).await?;

        let (text, logged) = if threads.is_empty() {
            info!("No context found");
            (self.prompts.rag.no_context_answer.clone(), None)
        } else {
            let vars = HashMap::from([("context".to_string(), assembler.format(&threads))]);
            let system = self.prompts.render_with_custom(&self.prompts.rag.system, &vars);

            match self.generator.generate(&system, question).await {
                Ok(text) => (text, None),
                Err(e) => {
                    error!("Generation with {} failed: {}", self.generator.model(), e);
                    (self.prompts.rag.apology_answer.clone(), Some(format!("Error: {}", e)))
                }
            }
        };

        if let Some(log) = &self.interaction_log {
            log.record(question, logged.as_deref().unwrap_or(&text)).await;
        }

        let process_time = started.elapsed().as_secs_f64();
        debug!("Answered from {} threads in {:.3}s", threads.len(), process_time);

        Ok(Answer {
            text,
            process_time: Some(process_time),
            threads,
        })
    }

    /// Ask the generation backend whether `question` concerns the configured domain.
    pub async fn is_related(&self, question: &str) -> Result<bool> {
        let vars = HashMap::from([("query".to_string(), question.to_string())]);
        let prompt = self.prompts.render_with_custom(&self.prompts.rag.validation, &vars);
        let reply = self.generator.generate("", &prompt).await?;
        debug!("Validation reply: {}", reply.trim());
        Ok(is_affirmative(&reply))
    }

    /// Nearest stored messages for `question`.
    ///
    /// An embedding failure yields no hits.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<SimilarityHit>> {
        let embedding = match self.embedder.embed(question).await {
            Ok(embedding) if !embedding.is_empty() => embedding,
            Ok(_) => {
                warn!("Embedding backend returned an empty vector");
                return Ok(Vec::new());
            }
            Err(e) => {
                warn!("No embedding for question: {}", e);
                return Ok(Vec::new());
            }
        };

        let hits = self.store.similarity_search(&embedding, self.top_k).await?;
        debug!("Found {} similar messages", hits.len());
        Ok(hits)
    }
}

fn is_affirmative(reply: &str) -> bool {
    reply.trim().eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HiloError;
    use crate::message_store::{MemoryMessageStore, MessageMetadata, NewMessage, SqliteMessageStore};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeEmbedder {
        fail: bool,
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            if self.fail {
                Err(HiloError::EmbeddingUnavailable("offline".to_string()))
            } else {
                Ok(vec![1.0, 0.0])
            }
        }
    }

    /// Replies to validation prompts (empty system) with `verdict`, and to
    /// answer prompts with `answer`.
    struct FakeGenerator {
        verdict: Option<&'static str>,
        answer: Option<&'static str>,
        systems: Mutex<Vec<String>>,
    }

    impl FakeGenerator {
        fn new(verdict: Option<&'static str>, answer: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                verdict,
                answer,
                systems: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Generator for FakeGenerator {
        async fn generate(&self, system: &str, _user: &str) -> Result<String> {
            let reply = if system.is_empty() {
                self.verdict
            } else {
                self.systems.lock().unwrap().push(system.to_string());
                self.answer
            };
            reply
                .map(str::to_string)
                .ok_or_else(|| HiloError::GenerationFailure("quota exceeded".to_string()))
        }

        fn model(&self) -> &str {
            "fake"
        }
    }

    async fn archive() -> Arc<MemoryMessageStore> {
        let store = Arc::new(MemoryMessageStore::new());
        let message = |message_id: i64, reply_to: Option<i64>, content: &str| NewMessage {
            content: content.to_string(),
            embedding: vec![1.0, 0.0],
            metadata: MessageMetadata {
                message_id,
                title: "Schools".to_string(),
                date: Some(format!("2024-03-0{}", message_id)),
                author: Some("Lucía".to_string()),
                reply_to_message_id: reply_to,
                img_name: None,
            },
        };
        store
            .insert_batch(&[
                message(1, None, "Is there a bilingual school in Córdoba?"),
                message(2, Some(1), "Yes, the Goethe school teaches German"),
            ])
            .await
            .unwrap();
        store
    }

    fn service(
        store: Arc<dyn MessageStore>,
        embed_fails: bool,
        generator: Arc<FakeGenerator>,
    ) -> AnswerService {
        AnswerService::new(store, Arc::new(FakeEmbedder { fail: embed_fails }), generator)
    }

    #[test]
    fn test_affirmative_replies() {
        assert!(is_affirmative("True"));
        assert!(is_affirmative("  true\n"));
        assert!(!is_affirmative("False"));
        assert!(!is_affirmative("True, it is about schools"));
    }

    #[tokio::test]
    async fn test_answer_uses_reconstructed_threads() {
        let generator = FakeGenerator::new(Some("True"), Some("Try the Goethe school."));
        let service = service(archive().await, false, generator.clone());

        let answer = service.answer("German schools in Córdoba?").await.unwrap();
        assert_eq!(answer.text, "Try the Goethe school.");
        assert!(answer.process_time.is_some());
        assert_eq!(answer.threads.len(), 2);
        assert!(answer.threads.iter().all(|t| t.root_id == 1));

        let systems = generator.systems.lock().unwrap();
        assert_eq!(systems.len(), 1);
        assert!(systems[0].contains("Available context:\n[{\"root_id\":1}"));
        assert!(systems[0].contains("bilingual school in Córdoba"));
        assert!(!systems[0].contains("{{context}}"));
    }

    #[tokio::test]
    async fn test_rejected_question_has_no_process_time() {
        let generator = FakeGenerator::new(Some("False"), Some("unused"));
        let service = service(archive().await, false, generator.clone());

        let answer = service.answer("Best pizza in Rome?").await.unwrap();
        assert_eq!(answer.text, "Invalid input. Please input related question.");
        assert!(answer.process_time.is_none());
        assert!(generator.systems.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validation_failure_apologizes() {
        let generator = FakeGenerator::new(None, Some("unused"));
        let answer = service(archive().await, false, generator)
            .answer("Schools?")
            .await
            .unwrap();

        assert_eq!(answer.text, "Sorry, an error occurred while getting the response.");
        assert!(answer.process_time.is_none());
    }

    #[tokio::test]
    async fn test_validation_can_be_disabled() {
        let generator = FakeGenerator::new(Some("False"), Some("answered"));
        let answer = service(archive().await, false, generator)
            .with_validation(false)
            .answer("Anything")
            .await
            .unwrap();

        assert_eq!(answer.text, "answered");
        assert!(answer.process_time.is_some());
    }

    #[tokio::test]
    async fn test_empty_archive_states_nothing_was_found() {
        let generator = FakeGenerator::new(Some("True"), Some("unused"));
        let service = service(Arc::new(MemoryMessageStore::new()), false, generator.clone());

        let answer = service.answer("Schools?").await.unwrap();
        assert!(answer.text.contains("couldn't find any relevant information"));
        assert!(answer.process_time.is_some());
        assert!(answer.threads.is_empty());
        assert!(generator.systems.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_means_no_context() {
        let generator = FakeGenerator::new(Some("True"), Some("unused"));
        let service = service(archive().await, true, generator);

        assert!(service.retrieve("Schools?").await.unwrap().is_empty());
        let answer = service.answer("Schools?").await.unwrap();
        assert_eq!(answer.text, Prompts::default().rag.no_context_answer);
    }

    #[tokio::test]
    async fn test_generation_failure_apologizes() {
        let generator = FakeGenerator::new(Some("True"), None);
        let answer = service(archive().await, false, generator)
            .answer("Schools?")
            .await
            .unwrap();

        assert_eq!(answer.text, "Sorry, an error occurred while getting the response.");
        assert!(answer.process_time.is_some());
    }

    #[tokio::test]
    async fn test_storage_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteMessageStore::new(&dir.path().join("db").join("messages.db")).unwrap();
        std::fs::remove_dir_all(dir.path().join("db")).unwrap();

        let generator = FakeGenerator::new(Some("True"), Some("unused"));
        let err = service(Arc::new(store), false, generator)
            .answer("Schools?")
            .await
            .unwrap_err();
        assert!(matches!(err, HiloError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn test_interactions_are_logged() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("interactions.md");
        let generator = FakeGenerator::new(Some("True"), Some("Goethe."));

        service(archive().await, false, generator)
            .with_interaction_log(Some(InteractionLog::new(&log_path)))
            .answer("German schools?")
            .await
            .unwrap();

        let log = std::fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("**Question:**\nGerman schools?"));
        assert!(log.contains("**LLM Response:**\nGoethe."));
    }

    #[tokio::test]
    async fn test_generation_error_is_logged() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("interactions.md");
        let generator = FakeGenerator::new(Some("True"), None);

        let answer = service(archive().await, false, generator)
            .with_interaction_log(Some(InteractionLog::new(&log_path)))
            .answer("German schools?")
            .await
            .unwrap();
        assert_eq!(answer.text, "Sorry, an error occurred while getting the response.");

        let log = std::fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("**LLM Response:**\nError: "));
        assert!(log.contains("quota exceeded"));
        assert!(!log.contains("Sorry, an error occurred"));
    }
}
