use brook_api::{Fragment, HistorySummary, StoredMessage};
use chrono::{DateTime, Utc};
use serde::Deserialize;

// ------------------------------
// Types received from the server
// ------------------------------

/// One line of the streaming chat response.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct StreamLine {
    pub history_id: Option<String>,
    pub message: Option<LineMessage>,
    pub created_at: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct LineMessage {
    pub content: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct HistoryListPayload {
    pub histories: Vec<HistorySummary>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct HistoryDetailPayload {
    pub messages: Vec<StoredMessage>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ModelsPayload {
    pub models: Vec<String>,
}

impl StreamLine {
    /// Lowers the wire form into the backend-agnostic fragment.
    ///
    /// A timestamp that fails to parse is dropped rather than failing the
    /// fragment, since it only degrades the elapsed-time estimate.
    pub fn into_fragment(self) -> Fragment {
        let created_at = self.created_at.as_deref().and_then(parse_timestamp);
        Fragment {
            history_id: self.history_id,
            content: self.message.and_then(|m| m.content),
            created_at,
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(err) => {
            warn!("unparseable created_at {raw:?}: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_line_lowering() {
        let line: StreamLine = serde_json::from_str(
            r#"{
                "history_id": "h-1",
                "message": {"role": "assistant", "content": "<think>"},
                "created_at": "2025-04-01T10:00:05Z",
                "done": false
            }"#,
        )
        .unwrap();
        let fragment = line.into_fragment();
        assert_eq!(fragment.history_id.as_deref(), Some("h-1"));
        assert_eq!(fragment.content.as_deref(), Some("<think>"));
        assert!(fragment.created_at.is_some());
    }

    #[test]
    fn test_missing_fields() {
        let line: StreamLine = serde_json::from_str(r#"{"done": true}"#).unwrap();
        let fragment = line.into_fragment();
        assert_eq!(fragment, Fragment::default());
    }

    #[test]
    fn test_bad_timestamp_is_dropped() {
        let line: StreamLine = serde_json::from_str(
            r#"{"message": {"content": "hi"}, "created_at": "not a time"}"#,
        )
        .unwrap();
        let fragment = line.into_fragment();
        assert_eq!(fragment.content.as_deref(), Some("hi"));
        assert_eq!(fragment.created_at, None);
    }
}
