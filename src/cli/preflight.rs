//! Pre-flight checks before operations that call remote backends.
//!
//! Validates that the API keys the configured providers need are present
//! before starting work that would otherwise fail midway.

use crate::config::{EmbeddingProvider, GenerationProvider, Settings};
use crate::error::{HiloError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Answering needs both the embedding and the generation backend.
    Ask,
    /// Ingestion and search only embed.
    Ingest,
    Search,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    check_with(operation, settings, |name| std::env::var(name).ok())
}

fn check_with(
    operation: Operation,
    settings: &Settings,
    env: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if settings.embedding.provider == EmbeddingProvider::OpenAI {
        check_env_key("OPENAI_API_KEY", &env)?;
    }

    if let Operation::Ask = operation {
        match settings.generation.provider {
            GenerationProvider::OpenAI => check_env_key("OPENAI_API_KEY", &env)?,
            GenerationProvider::Gemini => {
                let configured = settings
                    .generation
                    .api_key
                    .as_deref()
                    .is_some_and(|k| !k.is_empty());
                if !configured
                    && check_env_key("GEMINI_API_KEY", &env).is_err()
                    && check_env_key("GOOGLE_API_KEY", &env).is_err()
                {
                    return Err(HiloError::Config(
                        "No Gemini API key. Set GEMINI_API_KEY or generation.api_key".to_string(),
                    ));
                }
            }
        }
    }

    Ok(())
}

fn check_env_key(name: &str, env: &impl Fn(&str) -> Option<String>) -> Result<()> {
    match env(name) {
        Some(key) if !key.is_empty() => Ok(()),
        Some(_) => Err(HiloError::Config(format!(
            "{} is empty. Set it with: export {}='...'",
            name, name
        ))),
        None => Err(HiloError::Config(format!(
            "{} not set. Set it with: export {}='...'",
            name, name
        ))),
    }
}
