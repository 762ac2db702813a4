//! Text generation backends used for answers and input validation.

mod gemini;
mod openai;

pub use gemini::GeminiGenerator;
pub use openai::OpenAIGenerator;

use crate::config::{GenerationProvider, GenerationSettings};
use crate::error::{HiloError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Trait for chat-style text generation.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a reply to `user`, steered by `system` (which may be empty).
    async fn generate(&self, system: &str, user: &str) -> Result<String>;

    /// Model name, for logging.
    fn model(&self) -> &str;
}

/// Create the generator selected in settings.
pub fn create_generator(settings: &GenerationSettings) -> Result<Arc<dyn Generator>> {
    let timeout = Duration::from_secs(settings.timeout_seconds);
    let generator: Arc<dyn Generator> = match settings.provider {
        GenerationProvider::OpenAI => Arc::new(
            OpenAIGenerator::with_timeout(&settings.model, timeout)?
                .with_temperature(settings.temperature),
        ),
        GenerationProvider::Gemini => {
            let api_key = settings.gemini_api_key().ok_or_else(|| {
                HiloError::Config(
                    "Gemini API key not set. Set GEMINI_API_KEY or generation.api_key".to_string(),
                )
            })?;
            Arc::new(
                GeminiGenerator::with_config(&settings.base_url, &settings.model, &api_key, timeout)?
                    .with_temperature(settings.temperature),
            )
        }
    };
    Ok(generator)
}
