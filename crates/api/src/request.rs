use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The role of a replayed message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A user input.
    User,
    /// A finalized assistant answer.
    Assistant,
}

/// The minimal role/content pair sent back to the inference endpoint as
/// conversation context.
///
/// This is deliberately smaller than a transcript entry: reasoning text,
/// timing and display state never travel back to the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplayMessage {
    /// Who produced the content.
    pub role: Role,
    /// The message text.
    pub content: String,
}

impl ReplayMessage {
    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The body of a streaming chat request.
#[derive(Clone, Debug, Serialize)]
pub struct ChatRequest {
    /// The full replay history, including the prompt being submitted.
    pub messages: Vec<ReplayMessage>,
    /// Identifier of the model to sample from.
    pub model: String,
    /// Backend-defined sampling options, passed through opaquely.
    pub options: Value,
    /// The persisted conversation id, or an empty string when the
    /// conversation has not been stored yet.
    pub history_id: String,
}

impl ChatRequest {
    /// Creates a request with empty options.
    pub fn new(
        messages: Vec<ReplayMessage>,
        model: impl Into<String>,
        history_id: impl Into<String>,
    ) -> Self {
        Self {
            messages,
            model: model.into(),
            options: Value::Object(Default::default()),
            history_id: history_id.into(),
        }
    }
}

/// A row from the history directory listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySummary {
    /// The backend-assigned conversation id.
    pub history_id: String,
    /// A display title for the conversation.
    pub title: String,
    /// When the conversation was created.
    pub created_at: DateTime<Utc>,
    /// The model the conversation was held with.
    pub model: String,
}

/// A message as the backend stores it.
///
/// The stored form collapses an assistant turn into a single string; a
/// reasoning segment, if any, is embedded inline between the markers of
/// [`REASONING_OPEN`](crate::REASONING_OPEN) and
/// [`REASONING_CLOSE`](crate::REASONING_CLOSE).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// The stored role string (`"user"` or `"assistant"`).
    pub role: String,
    /// The collapsed message content.
    pub content: String,
}
