//! The history directory client.
//!
//! Translates stored role/content records into the dual transcript and
//! replay representation the session needs, and keeps a cached summary
//! listing for the UI.

use brook_api::{HistorySummary, HistoryStore};

use crate::session::Session;

/// The notice shown when a stored conversation fails to load.
pub const LOAD_ERROR_MESSAGE: &str =
    "Failed to load the conversation. Please try again later.";

/// A client for the persisted conversation directory.
pub struct HistoryDirectory<S: HistoryStore> {
    store: S,
    summaries: Vec<HistorySummary>,
}

impl<S: HistoryStore> HistoryDirectory<S> {
    /// Creates a directory client over the given store. The summary cache
    /// starts empty; call [`refresh`](Self::refresh) to populate it.
    pub fn new(store: S) -> Self {
        Self {
            store,
            summaries: Vec::new(),
        }
    }

    /// The cached summaries, in the order the backend listed them.
    #[inline]
    pub fn summaries(&self) -> &[HistorySummary] {
        &self.summaries
    }

    /// Re-fetches the summary listing. An empty directory is not an
    /// error. On failure the previous cache is kept.
    pub async fn refresh(&mut self) -> Result<(), S::Error> {
        self.summaries = self.store.list().await?;
        Ok(())
    }

    /// Loads a stored conversation into the session, replacing the open
    /// one wholesale.
    ///
    /// On failure the transcript is replaced with a single error notice
    /// and `false` is returned; the error never propagates further.
    pub async fn open(&self, session: &mut Session, history_id: &str) -> bool {
        match self.store.detail(history_id).await {
            Ok(records) => {
                if let Some(summary) = self
                    .summaries
                    .iter()
                    .find(|s| s.history_id == history_id)
                {
                    session.set_selected_model(summary.model.clone());
                }
                session.load_conversation(history_id, records);
                true
            }
            Err(err) => {
                error!("failed to load history {history_id:?}: {err}");
                session.replace_with_error(LOAD_ERROR_MESSAGE);
                false
            }
        }
    }

    /// Deletes a stored conversation.
    ///
    /// On success the summary is dropped from the cache, and if the
    /// deleted conversation is the one currently open, the session is
    /// reset to an empty unsaved conversation. On failure nothing
    /// changes and the error is returned for the caller to surface.
    pub async fn remove(
        &mut self,
        session: &mut Session,
        history_id: &str,
    ) -> Result<(), S::Error> {
        self.store.delete(history_id).await?;
        self.summaries.retain(|s| s.history_id != history_id);
        if session.conversation().persisted_id() == history_id {
            session.start_new_conversation();
        }
        Ok(())
    }

    /// Lists the model identifiers the backend can serve.
    pub async fn models(&self) -> Result<Vec<String>, S::Error> {
        self.store.models().await
    }
}

#[cfg(test)]
mod tests {
    use brook_api::StoredMessage;
    use brook_test_backend::ScriptedBackend;
    use chrono::Utc;

    use super::*;
    use crate::session::{EntryKind, Speaker};

    fn summary(history_id: &str, model: &str) -> HistorySummary {
        HistorySummary {
            history_id: history_id.to_owned(),
            title: "a conversation".to_owned(),
            created_at: Utc::now(),
            model: model.to_owned(),
        }
    }

    fn stored(role: &str, content: &str) -> StoredMessage {
        StoredMessage {
            role: role.to_owned(),
            content: content.to_owned(),
        }
    }

    #[tokio::test]
    async fn test_refresh_with_empty_directory() {
        let backend = ScriptedBackend::default();
        let mut directory = HistoryDirectory::new(backend);
        directory.refresh().await.unwrap();
        assert!(directory.summaries().is_empty());
    }

    #[tokio::test]
    async fn test_open_restores_conversation_and_model() {
        let backend = ScriptedBackend::default();
        backend.add_history(
            summary("h-1", "deepseek-r1:32b"),
            [
                stored("user", "hi"),
                stored("assistant", "<think>because</think>answer"),
            ],
        );

        let mut directory = HistoryDirectory::new(backend);
        directory.refresh().await.unwrap();

        let mut session = Session::new("deepseek-r1:7b");
        assert!(directory.open(&mut session, "h-1").await);

        assert_eq!(session.selected_model(), "deepseek-r1:32b");
        assert_eq!(session.conversation().persisted_id(), "h-1");
        let transcript = session.conversation().transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].reasoning, "because");
        assert_eq!(transcript[1].answer, "answer");
    }

    #[tokio::test]
    async fn test_open_failure_replaces_transcript_with_error() {
        let backend = ScriptedBackend::default();
        let directory = HistoryDirectory::new(backend);

        let mut session = Session::new("m");
        session.load_conversation("h-old", vec![stored("user", "hi")]);

        assert!(!directory.open(&mut session, "h-missing").await);

        let transcript = session.conversation().transcript();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].speaker, Speaker::System);
        assert_eq!(transcript[0].kind, EntryKind::Error);
        assert_eq!(transcript[0].answer, LOAD_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_remove_open_conversation_starts_a_new_one() {
        let backend = ScriptedBackend::default();
        backend.add_history(summary("h-1", "m"), [stored("user", "hi")]);

        let mut directory = HistoryDirectory::new(backend);
        directory.refresh().await.unwrap();

        let mut session = Session::new("m");
        directory.open(&mut session, "h-1").await;
        assert_eq!(session.conversation().persisted_id(), "h-1");

        directory.remove(&mut session, "h-1").await.unwrap();
        assert!(directory.summaries().is_empty());
        assert_eq!(session.conversation().persisted_id(), "");
        assert!(session.conversation().transcript().is_empty());
    }

    #[tokio::test]
    async fn test_remove_other_conversation_keeps_session() {
        let backend = ScriptedBackend::default();
        backend.add_history(summary("h-1", "m"), [stored("user", "hi")]);
        backend.add_history(summary("h-2", "m"), [stored("user", "yo")]);

        let mut directory = HistoryDirectory::new(backend);
        directory.refresh().await.unwrap();

        let mut session = Session::new("m");
        directory.open(&mut session, "h-1").await;

        directory.remove(&mut session, "h-2").await.unwrap();
        assert_eq!(directory.summaries().len(), 1);
        assert_eq!(session.conversation().persisted_id(), "h-1");
        assert_eq!(session.conversation().transcript().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_failure_leaves_cache_untouched() {
        let backend = ScriptedBackend::default();
        backend.add_history(summary("h-1", "m"), [stored("user", "hi")]);

        let mut directory = HistoryDirectory::new(backend);
        directory.refresh().await.unwrap();

        let mut session = Session::new("m");
        assert!(directory.remove(&mut session, "h-missing").await.is_err());
        assert_eq!(directory.summaries().len(), 1);
    }
}
