use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A captured message as stored, including the verbatim source.
///
/// This is also the payload delivered to change subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender: Option<String>,
    pub recipients: Vec<String>,
    pub subject: Option<String>,
    pub source: String,
    pub size: i64,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub created_at: NaiveDateTime,
}

/// Row of the message list (no source).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: i64,
    pub sender: Option<String>,
    pub recipients: Vec<String>,
    pub subject: Option<String>,
    pub size: i64,
    pub created_at: NaiveDateTime,
}

/// One decoded MIME part of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePart {
    pub id: i64,
    pub message_id: i64,
    pub cid: Option<String>,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub is_attachment: bool,
    pub filename: Option<String>,
    pub charset: Option<String>,
    pub body: String,
    pub size: i64,
    pub created_at: NaiveDateTime,
}

/// Part listing entry (no body).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartSummary {
    pub cid: Option<String>,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub filename: Option<String>,
    pub size: i64,
}

/// The record chosen to render a message in a given format.
///
/// Messages captured without sub-parts carry their body at the top level, in
/// which case the message itself stands in for the part.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BodyView {
    Part(MessagePart),
    Message(Message),
}

impl BodyView {
    pub fn mime_type(&self) -> &str {
        match self {
            BodyView::Part(part) => &part.mime_type,
            BodyView::Message(message) => &message.mime_type,
        }
    }

    /// Decoded part body, or the raw source for a whole message.
    pub fn body(&self) -> &str {
        match self {
            BodyView::Part(part) => &part.body,
            BodyView::Message(message) => &message.source,
        }
    }

    pub fn charset(&self) -> Option<&str> {
        match self {
            BodyView::Part(part) => part.charset.as_deref(),
            BodyView::Message(_) => None,
        }
    }

    pub fn is_message_fallback(&self) -> bool {
        matches!(self, BodyView::Message(_))
    }
}
