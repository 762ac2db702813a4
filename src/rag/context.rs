//! Context assembly: reconstructed threads folded into one prompt block.

use crate::config::RagPrompts;
use crate::error::{HiloError, Result};
use crate::message_store::SimilarityHit;
use crate::thread::{ConversationThread, ThreadEntry, ThreadMessage, ThreadReconstructor};
use tracing::{debug, instrument, warn};

/// Separator between threads in the context block.
pub const THREAD_SEPARATOR: &str = "\n---\n";

/// Builds the generation context from similarity hits.
pub struct ContextAssembler {
    reconstructor: ThreadReconstructor,
    header: String,
    footer: String,
}

impl ContextAssembler {
    /// Create an assembler with the default header and footer.
    pub fn new(reconstructor: ThreadReconstructor) -> Self {
        let prompts = RagPrompts::default();
        Self {
            reconstructor,
            header: prompts.context_header,
            footer: prompts.context_footer,
        }
    }

    /// Set the text placed before and after the threads.
    pub fn with_framing(mut self, header: &str, footer: &str) -> Self {
        self.header = header.to_string();
        self.footer = footer.to_string();
        self
    }

    /// Reconstruct the thread of every hit, in hit order.
    ///
    /// A hit whose reply chain loops contributes only itself. Store failures
    /// abort the whole call.
    #[instrument(skip_all, fields(hits = hits.len()))]
    pub async fn collect_threads(&self, hits: &[SimilarityHit]) -> Result<Vec<ConversationThread>> {
        let mut threads = Vec::with_capacity(hits.len());

        for hit in hits {
            match self.reconstructor.reconstruct(hit).await {
                Ok(thread) => threads.push(thread),
                Err(e @ HiloError::CyclicThread { .. }) => {
                    warn!("{}; using the message alone", e);
                    threads.push(ConversationThread {
                        root_id: hit.metadata.message_id,
                        entries: vec![ThreadEntry::from(&ThreadMessage::from(hit))],
                    });
                }
                Err(e) => return Err(e),
            }
        }

        debug!(
            "Collected {} threads with {} messages",
            threads.len(),
            threads.iter().map(|t| t.entries.len()).sum::<usize>()
        );
        Ok(threads)
    }

    /// Reconstruct every hit and render the context block.
    pub async fn assemble(&self, hits: &[SimilarityHit]) -> Result<String> {
        let threads = self.collect_threads(hits).await?;
        Ok(self.format(&threads))
    }

    /// Render already reconstructed threads with this assembler's framing.
    pub fn format(&self, threads: &[ConversationThread]) -> String {
        format_context(threads, &self.header, &self.footer)
    }
}

/// Render threads as one context block; empty when there are no threads.
pub fn format_context(threads: &[ConversationThread], header: &str, footer: &str) -> String {
    if threads.is_empty() {
        return String::new();
    }

    let body = threads
        .iter()
        .map(ConversationThread::to_context_string)
        .collect::<Vec<_>>()
        .join(THREAD_SEPARATOR);

    format!("{}\n{}{}{}", header, body, THREAD_SEPARATOR, footer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message_store::{MemoryMessageStore, MessageMetadata, MessageStore, NewMessage};
    use std::sync::Arc;

    fn stored(title: &str, message_id: i64, reply_to: Option<i64>, content: &str) -> NewMessage {
        NewMessage {
            content: content.to_string(),
            embedding: vec![1.0, 0.0],
            metadata: MessageMetadata {
                message_id,
                title: title.to_string(),
                date: Some(format!("2024-01-{:02}", message_id)),
                author: Some("Ana".to_string()),
                reply_to_message_id: reply_to,
                img_name: None,
            },
        }
    }

    async fn fixture() -> (Arc<MemoryMessageStore>, ContextAssembler) {
        let store = Arc::new(MemoryMessageStore::new());
        store
            .insert_batch(&[
                stored("T", 1, None, "Which school teaches German?"),
                stored("T", 2, Some(1), "Try the Goethe school"),
                stored("U", 1, None, "Fees for next year?"),
                stored("U", 2, Some(2), "Loops on itself"),
            ])
            .await
            .unwrap();
        let assembler = ContextAssembler::new(ThreadReconstructor::new(store.clone()));
        (store, assembler)
    }

    fn hit(store_id: i64, title: &str, message_id: i64, reply_to: Option<i64>, content: &str) -> SimilarityHit {
        SimilarityHit {
            id: store_id,
            content: content.to_string(),
            metadata: MessageMetadata {
                message_id,
                title: title.to_string(),
                date: None,
                author: None,
                reply_to_message_id: reply_to,
                img_name: None,
            },
            distance: 0.1,
        }
    }

    #[tokio::test]
    async fn test_no_hits_means_no_context() {
        let (_, assembler) = fixture().await;
        assert_eq!(assembler.assemble(&[]).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_threads_keep_hit_order_and_separators() {
        let (_, assembler) = fixture().await;
        let hits = vec![
            hit(3, "U", 1, None, "Fees for next year?"),
            hit(2, "T", 2, Some(1), "Try the Goethe school"),
        ];

        let context = assembler.assemble(&hits).await.unwrap();
        assert!(context.starts_with("Available context:\n[{\"root_id\":1}"));
        assert!(context.ends_with("state this."));
        assert_eq!(context.matches(THREAD_SEPARATOR).count(), 2);

        let fees = context.find("Fees for next year?").unwrap();
        let goethe = context.find("Try the Goethe school").unwrap();
        assert!(fees < goethe);
        assert!(context.contains("Which school teaches German?"));
    }

    #[tokio::test]
    async fn test_cyclic_hit_contributes_itself() {
        let (_, assembler) = fixture().await;
        let threads = assembler
            .collect_threads(&[hit(4, "U", 2, Some(2), "Loops on itself")])
            .await
            .unwrap();

        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].root_id, 2);
        assert_eq!(threads[0].entries.len(), 1);
        assert_eq!(threads[0].entries[0].content, "Loops on itself");
    }

    #[tokio::test]
    async fn test_degenerate_threads_are_kept() {
        let (_, assembler) = fixture().await;
        let threads = assembler
            .collect_threads(&[hit(99, "Gone", 7, None, "deleted meanwhile")])
            .await
            .unwrap();

        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].root_id, 7);
        assert_eq!(threads[0].entries[0].content, "deleted meanwhile");
    }

    #[test]
    fn test_format_context_framing() {
        let thread = ConversationThread {
            root_id: 5,
            entries: Vec::new(),
        };
        let context = format_context(&[thread.clone(), thread], "Head", "Foot");
        assert_eq!(context, "Head\n[{\"root_id\":5}]\n---\n[{\"root_id\":5}]\n---\nFoot");
    }
}
