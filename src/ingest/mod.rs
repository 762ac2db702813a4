//! Import of chat exports into the message store.

mod export;
mod pipeline;

pub use export::{
    ChatExport, ExportMessage, MessageText, PreparedMessage, SkipReason, TextPart, DEFAULT_MIN_TEXT_CHARS,
    DEFAULT_TITLE,
};
pub use pipeline::{IngestReport, IngestionPipeline};
