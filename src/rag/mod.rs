//! Retrieval-augmented question answering over reconstructed chat threads.

mod answer;
pub mod context;
mod log;

pub use answer::{Answer, AnswerService, DEFAULT_TOP_K};
pub use context::{format_context, ContextAssembler};
pub use log::InteractionLog;
