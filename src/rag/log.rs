//! Markdown log of answered questions.

use crate::error::Result;
use chrono::Local;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Appends each question and its answer to a markdown file.
#[derive(Debug, Clone)]
pub struct InteractionLog {
    path: PathBuf,
}

impl InteractionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one interaction, creating the file and its directory if needed.
    pub async fn append(&self, question: &str, response: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        let entry = format_entry(
            &Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            question,
            response,
        );
        file.write_all(entry.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Like [`append`](Self::append), but failures are only logged.
    pub async fn record(&self, question: &str, response: &str) {
        if let Err(e) = self.append(question, response).await {
            warn!("Failed to write interaction log {:?}: {}", self.path, e);
        }
    }
}

fn format_entry(timestamp: &str, question: &str, response: &str) -> String {
    format!(
        "## Interaction on {}\n\n**Question:**\n{}\n\n**LLM Response:**\n{}\n\n---\n\n",
        timestamp, question, response
    )
}
