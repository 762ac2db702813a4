//! Telegram chat export parsing.
//!
//! Accepts the `result.json` written by Telegram Desktop (`{name, messages}`)
//! as well as a bare array of messages, as left behind by trimming tools.

use crate::error::{HiloError, Result};
use crate::message_store::MessageMetadata;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, instrument};

/// Title used when the export carries no chat name.
pub const DEFAULT_TITLE: &str = "Unknown Chat";

/// Default minimum length, in characters, of an importable message.
pub const DEFAULT_MIN_TEXT_CHARS: usize = 3;

#[derive(Deserialize)]
#[serde(untagged)]
enum ExportFile {
    Chat {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        messages: Vec<ExportMessage>,
    },
    Messages(Vec<ExportMessage>),
}

/// One entry of the `messages` array.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportMessage {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub reply_to_message_id: Option<i64>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub text: Option<MessageText>,
}

/// Message text: plain, or a list of plain strings and formatted entities.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageText {
    Plain(String),
    Parts(Vec<TextPart>),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TextPart {
    Plain(String),
    Entity { text: String },
    Other(serde_json::Value),
}

impl MessageText {
    /// Flatten to a single trimmed string, joining parts with spaces.
    pub fn flatten(&self) -> String {
        match self {
            MessageText::Plain(text) => text.trim().to_string(),
            MessageText::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    TextPart::Plain(text) | TextPart::Entity { text } => Some(text.as_str()),
                    TextPart::Other(_) => None,
                })
                .collect::<Vec<_>>()
                .join(" ")
                .trim()
                .to_string(),
            MessageText::Other(_) => String::new(),
        }
    }
}

/// Why an export entry was not imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingId,
    NotAMessage,
    EmptyText,
    TooShort,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            SkipReason::MissingId => "no message id",
            SkipReason::NotAMessage => "not a message",
            SkipReason::EmptyText => "empty text",
            SkipReason::TooShort => "text too short",
        };
        write!(f, "{}", reason)
    }
}

/// A message ready to be embedded and stored.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedMessage {
    pub content: String,
    pub metadata: MessageMetadata,
}

/// A parsed chat export.
#[derive(Debug, Clone)]
pub struct ChatExport {
    pub title: String,
    pub messages: Vec<ExportMessage>,
}

impl ChatExport {
    /// Parse an export from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ExportFile = serde_json::from_str(json)
            .map_err(|e| HiloError::Ingest(format!("Not a chat export: {}", e)))?;

        Ok(match file {
            ExportFile::Chat {
                name,
                title,
                messages,
            } => Self {
                title: name
                    .or(title)
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
                messages,
            },
            ExportFile::Messages(messages) => Self {
                title: DEFAULT_TITLE.to_string(),
                messages,
            },
        })
    }

    /// Read and parse an export file.
    #[instrument]
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            HiloError::Ingest(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let export = Self::from_json(&json)?;
        debug!("Loaded {} entries of '{}'", export.messages.len(), export.title);
        Ok(export)
    }

    /// Replace the chat title.
    pub fn with_title(mut self, title: Option<&str>) -> Self {
        if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
            self.title = title.to_string();
        }
        self
    }

    /// Drop every entry before the one with id `message_id`.
    pub fn start_at(mut self, message_id: i64) -> Result<Self> {
        let index = self
            .messages
            .iter()
            .position(|m| m.id == Some(message_id))
            .ok_or_else(|| {
                HiloError::InvalidInput(format!(
                    "Message {} not found in '{}'",
                    message_id, self.title
                ))
            })?;

        self.messages.drain(..index);
        Ok(self)
    }

    /// Split the entries into importable messages and skipped ones, keeping
    /// export order.
    pub fn prepare(&self, min_text_chars: usize) -> (Vec<PreparedMessage>, Vec<(Option<i64>, SkipReason)>) {
        let mut prepared = Vec::with_capacity(self.messages.len());
        let mut skipped = Vec::new();

        for message in &self.messages {
            match self.prepare_one(message, min_text_chars) {
                Ok(p) => prepared.push(p),
                Err(reason) => skipped.push((message.id, reason)),
            }
        }

        (prepared, skipped)
    }

    fn prepare_one(
        &self,
        message: &ExportMessage,
        min_text_chars: usize,
    ) -> std::result::Result<PreparedMessage, SkipReason> {
        let message_id = message.id.ok_or(SkipReason::MissingId)?;

        if message.kind.as_deref() != Some("message") {
            return Err(SkipReason::NotAMessage);
        }

        let content = message.text.as_ref().map(MessageText::flatten).unwrap_or_default();
        if content.is_empty() {
            return Err(SkipReason::EmptyText);
        }
        if content.chars().count() < min_text_chars {
            return Err(SkipReason::TooShort);
        }

        Ok(PreparedMessage {
            content,
            metadata: MessageMetadata {
                message_id,
                title: self.title.clone(),
                date: message.date.clone(),
                author: message.from.clone(),
                reply_to_message_id: message.reply_to_message_id,
                img_name: message.photo.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"{
        "name": "Escuelas",
        "type": "public_supergroup",
        "id": 1234,
        "messages": [
            {"id": 1, "type": "service", "date": "2024-01-01T09:00:00", "action": "create_group"},
            {"id": 2, "type": "message", "date": "2024-01-01T10:00:00", "from": "Lucía",
             "text": "¿Dónde hay una escuela bilingüe?"},
            {"id": 3, "type": "message", "date": "2024-01-01T10:05:00", "from": "Marcos",
             "reply_to_message_id": 2,
             "text": ["Mirá ", {"type": "link", "text": "https://goethe.edu.ar"}, " en Córdoba"]},
            {"id": 4, "type": "message", "date": "2024-01-01T10:06:00", "from": "Lucía", "text": "ok"},
            {"id": 5, "type": "message", "date": "2024-01-01T10:07:00", "text": "",
             "photo": "photos/photo_1.jpg"},
            {"type": "message", "text": "orphan without id"},
            {"id": 6, "type": "message", "date": "2024-01-01T11:00:00", "from": null,
             "photo": "photos/photo_2.jpg", "text": "Foto del acto escolar"}
        ]
    }"#;

    #[test]
    fn test_text_flattening() {
        let text: MessageText =
            serde_json::from_str(r#"["a", {"type": "bold", "text": "b"}, {"type": "x"}, " c "]"#).unwrap();
        assert_eq!(text.flatten(), "a b  c");

        let text: MessageText = serde_json::from_str(r#""  plain  ""#).unwrap();
        assert_eq!(text.flatten(), "plain");

        let text: MessageText = serde_json::from_str("42").unwrap();
        assert_eq!(text.flatten(), "");
    }

    #[test]
    fn test_prepare_filters_and_keeps_order() {
        let export = ChatExport::from_json(EXPORT).unwrap();
        assert_eq!(export.title, "Escuelas");

        let (prepared, skipped) = export.prepare(DEFAULT_MIN_TEXT_CHARS);
        let ids: Vec<i64> = prepared.iter().map(|p| p.metadata.message_id).collect();
        assert_eq!(ids, vec![2, 3, 6]);

        assert_eq!(
            skipped,
            vec![
                (Some(1), SkipReason::NotAMessage),
                (Some(4), SkipReason::TooShort),
                (Some(5), SkipReason::EmptyText),
                (None, SkipReason::MissingId),
            ]
        );

        let reply = &prepared[1];
        assert_eq!(reply.content, "Mirá  https://goethe.edu.ar  en Córdoba");
        assert_eq!(reply.metadata.reply_to_message_id, Some(2));
        assert_eq!(reply.metadata.author.as_deref(), Some("Marcos"));
        assert_eq!(reply.metadata.title, "Escuelas");

        let photo = &prepared[2];
        assert_eq!(photo.metadata.img_name.as_deref(), Some("photos/photo_2.jpg"));
        assert!(photo.metadata.author.is_none());
    }

    #[test]
    fn test_metadata_uses_export_field_names() {
        let export = ChatExport::from_json(EXPORT).unwrap();
        let (prepared, _) = export.prepare(DEFAULT_MIN_TEXT_CHARS);

        let json = serde_json::to_value(&prepared[0].metadata).unwrap();
        assert_eq!(json["from"], "Lucía");
        assert_eq!(json["message_id"], 2);
        assert_eq!(json["date"], "2024-01-01T10:00:00");
    }

    #[test]
    fn test_start_at() {
        let export = ChatExport::from_json(EXPORT).unwrap().start_at(4).unwrap();
        let ids: Vec<Option<i64>> = export.messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![Some(4), Some(5), None, Some(6)]);

        let err = tokio_test::assert_err!(ChatExport::from_json(EXPORT).unwrap().start_at(99));
        assert!(matches!(err, HiloError::InvalidInput(_)));
    }

    #[test]
    fn test_bare_message_list_and_title_override() {
        let export = ChatExport::from_json(r#"[{"id": 7, "type": "message", "text": "hola hola"}]"#)
            .unwrap();
        assert_eq!(export.title, DEFAULT_TITLE);

        let export = export.with_title(Some("Escuelas"));
        let (prepared, _) = export.prepare(DEFAULT_MIN_TEXT_CHARS);
        assert_eq!(prepared[0].metadata.title, "Escuelas");
    }

    #[test]
    fn test_title_falls_back_to_title_field() {
        let export = ChatExport::from_json(r#"{"title": "Padres", "messages": []}"#).unwrap();
        assert_eq!(export.title, "Padres");
    }

    #[test]
    fn test_not_an_export() {
        assert!(matches!(
            ChatExport::from_json(r#""just a string""#),
            Err(HiloError::Ingest(_))
        ));
    }
}
