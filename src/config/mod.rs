//! Configuration module for Hilo.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, RagPrompts};
pub use settings::{
    EmbeddingProvider, EmbeddingSettings, GeneralSettings, GenerationProvider,
    GenerationSettings, IngestSettings, PromptSettings, RagSettings, ServerSettings, Settings,
    StoreSettings,
};
