//! Hilo - question answering over chat exports
//!
//! Imports Telegram chat exports into a SQLite message store with one
//! embedding per message, and answers questions from the reply threads
//! around the messages most similar to the question.
//!
//! # Overview
//!
//! A question flows through:
//! - an optional in-domain check against the generation backend
//! - an embedding of the question and a similarity search over stored messages
//! - thread reconstruction for every hit, following reply pointers within a
//!   bounded window of the same conversation
//! - context assembly and answer generation
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `message_store` - Message store abstraction (SQLite, in-memory)
//! - `thread` - Reply-thread reconstruction
//! - `rag` - Context assembly and the answer service
//! - `embedding` - Embedding backends (Ollama, OpenAI)
//! - `generation` - Generation backends (OpenAI, Gemini)
//! - `ingest` - Chat export parsing and import
//! - `orchestrator` - Component wiring
//!
//! # Example
//!
//! ```rust,no_run
//! use hilo::config::Settings;
//! use hilo::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let report = orchestrator
//!         .ingest_file("result.json".as_ref(), None, None, true)
//!         .await?;
//!     println!("Imported {} messages", report.imported);
//!
//!     let answer = orchestrator.answer_service()?.answer("Which schools teach German?").await?;
//!     println!("{}", answer.text);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod ingest;
pub mod message_store;
pub mod openai;
pub mod orchestrator;
pub mod rag;
pub mod thread;

pub use error::{HiloError, Result};
