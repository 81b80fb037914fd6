//! Session state: the conversation handle and its transitions.
//!
//! The same turn is kept in two synchronized projections: the transcript
//! (what the UI shows, reasoning and answer split apart) and the replay
//! history (the minimal role/content pairs the backend accepts as
//! context). Keeping them separate means reasoning text can never leak
//! into replay context.

use brook_api::{
    REASONING_CLOSE, REASONING_OPEN, ReplayMessage, StoredMessage,
};

/// Who a transcript entry is displayed as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Speaker {
    /// The local user.
    User,
    /// The model.
    Assistant,
    /// The client itself, e.g. error notices.
    System,
}

/// Display treatment of a transcript entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EntryKind {
    /// An ordinary turn.
    #[default]
    Normal,
    /// An error notice.
    Error,
}

/// What is known about a turn's reasoning duration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReasoningTime {
    /// Not known yet; the turn has not reasoned, or no timestamped
    /// fragment has arrived.
    #[default]
    Unknown,
    /// A measured duration.
    Seconds(i64),
    /// The turn did reason, but the stored form does not preserve timing.
    Unspecified,
}

/// One displayed conversation turn.
#[derive(Clone, Debug)]
pub struct TranscriptEntry {
    /// Sequence position, unique within the conversation.
    pub id: usize,
    /// Who this entry is displayed as.
    pub speaker: Speaker,
    /// The answer content. Append-only while the turn streams.
    pub answer: String,
    /// The reasoning content, disjoint from `answer`.
    pub reasoning: String,
    /// The reasoning duration, if known.
    pub reasoning_time: ReasoningTime,
    /// Whether the reasoning segment is unfolded in the UI.
    pub reasoning_expanded: bool,
    /// A local `HH:MM` label captured when the entry was created.
    pub created_at_label: String,
    /// Display treatment.
    pub kind: EntryKind,
}

impl TranscriptEntry {
    fn new(id: usize, speaker: Speaker) -> Self {
        Self {
            id,
            speaker,
            answer: String::new(),
            reasoning: String::new(),
            reasoning_time: ReasoningTime::Unknown,
            reasoning_expanded: true,
            created_at_label: time_label(),
            kind: EntryKind::Normal,
        }
    }
}

/// The in-memory bundle for one open conversation: the transcript, the
/// replay history, and the backend-assigned identifier correlating them
/// with a stored record.
#[derive(Clone, Debug, Default)]
pub struct Conversation {
    pub(crate) persisted_id: String,
    pub(crate) transcript: Vec<TranscriptEntry>,
    pub(crate) replay: Vec<ReplayMessage>,
}

impl Conversation {
    /// The backend-assigned id, or an empty string while unsaved.
    #[inline]
    pub fn persisted_id(&self) -> &str {
        &self.persisted_id
    }

    /// The displayed turns, in order.
    #[inline]
    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    /// The replay history sent back to the backend as context.
    #[inline]
    pub fn replay(&self) -> &[ReplayMessage] {
        &self.replay
    }

    /// Adopts a backend-reported persisted id. The first writer wins;
    /// conflicting later ids are not applied.
    pub(crate) fn adopt_persisted_id(&mut self, id: String) {
        if self.persisted_id.is_empty() {
            self.persisted_id = id;
        } else if self.persisted_id != id {
            warn!(
                "ignoring conflicting history id {id:?}, keeping {:?}",
                self.persisted_id
            );
        }
    }

    /// Appends the user turn to both projections.
    pub(crate) fn push_user_turn(&mut self, prompt: &str) {
        let entry = self.push_entry(Speaker::User);
        entry.answer.push_str(prompt);
        self.replay.push(ReplayMessage::user(prompt));
    }

    /// Opens the assistant entry that all fragments of this turn target.
    pub(crate) fn begin_assistant_turn(&mut self) {
        self.push_entry(Speaker::Assistant);
    }

    /// The entry currently being appended to, i.e. the last one.
    pub(crate) fn open_entry_mut(&mut self) -> Option<&mut TranscriptEntry> {
        self.transcript.last_mut()
    }

    /// Closes the open assistant turn, mirroring its answer into the
    /// replay history. Turns that produced no answer text are not
    /// replayed; reasoning text never is.
    pub(crate) fn finalize_assistant_turn(&mut self) {
        let Some(entry) = self.transcript.last() else {
            return;
        };
        if entry.speaker != Speaker::Assistant || entry.answer.is_empty() {
            return;
        }
        self.replay.push(ReplayMessage::assistant(entry.answer.clone()));
    }

    /// Appends a system notice of kind error.
    pub(crate) fn push_error_entry(&mut self, message: &str) {
        let entry = self.push_entry(Speaker::System);
        entry.answer.push_str(message);
        entry.kind = EntryKind::Error;
    }

    fn push_entry(&mut self, speaker: Speaker) -> &mut TranscriptEntry {
        let id = self.transcript.len() + 1;
        self.transcript.push(TranscriptEntry::new(id, speaker));
        self.transcript.last_mut().expect("entry was just pushed")
    }
}

/// The state container for the conversation currently open: the handle,
/// the busy gate and the selected model.
#[derive(Clone, Debug)]
pub struct Session {
    pub(crate) conversation: Conversation,
    pub(crate) busy: bool,
    selected_model: String,
}

impl Session {
    /// Creates a session with an empty conversation.
    pub fn new<S: Into<String>>(selected_model: S) -> Self {
        Self {
            conversation: Conversation::default(),
            busy: false,
            selected_model: selected_model.into(),
        }
    }

    /// The conversation currently open.
    #[inline]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Whether an ingest operation is in flight for this conversation.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// The model identifier new submissions are sent to.
    #[inline]
    pub fn selected_model(&self) -> &str {
        &self.selected_model
    }

    /// Selects the model for subsequent submissions.
    #[inline]
    pub fn set_selected_model<S: Into<String>>(&mut self, model: S) {
        self.selected_model = model.into();
    }

    /// Discards the open conversation and starts an empty, unsaved one.
    pub fn start_new_conversation(&mut self) {
        self.conversation = Conversation::default();
    }

    /// Replaces the open conversation with one reconstructed from stored
    /// records.
    ///
    /// Assistant records may carry an embedded reasoning block, which is
    /// split back out for display; the stored form does not preserve
    /// timing, so such entries get [`ReasoningTime::Unspecified`]. The
    /// replay history keeps the records verbatim.
    pub fn load_conversation(
        &mut self,
        history_id: impl Into<String>,
        records: Vec<StoredMessage>,
    ) {
        let mut conversation = Conversation {
            persisted_id: history_id.into(),
            ..Default::default()
        };
        for record in records {
            match record.role.as_str() {
                "user" => {
                    conversation.push_user_turn(&record.content);
                }
                "assistant" => {
                    let (reasoning, answer) =
                        split_reasoning(&record.content);
                    let entry =
                        conversation.push_entry(Speaker::Assistant);
                    entry.answer = answer;
                    if !reasoning.is_empty() {
                        entry.reasoning = reasoning;
                        entry.reasoning_time = ReasoningTime::Unspecified;
                    }
                    conversation
                        .replay
                        .push(ReplayMessage::assistant(record.content));
                }
                other => {
                    warn!("skipping stored message with role {other:?}");
                }
            }
        }
        self.conversation = conversation;
    }

    /// Replaces the transcript with a single error notice.
    pub fn replace_with_error(&mut self, message: &str) {
        self.start_new_conversation();
        self.conversation.push_error_entry(message);
    }

    /// Folds or unfolds the reasoning segment of one entry.
    pub fn toggle_reasoning(&mut self, entry_id: usize) {
        if let Some(entry) = self
            .conversation
            .transcript
            .iter_mut()
            .find(|e| e.id == entry_id)
        {
            entry.reasoning_expanded = !entry.reasoning_expanded;
        }
    }
}

/// Splits an embedded `<think>…</think>` block out of a stored assistant
/// message. Content without a complete block is all answer.
fn split_reasoning(content: &str) -> (String, String) {
    let Some(open_idx) = content.find(REASONING_OPEN) else {
        return (String::new(), content.trim().to_owned());
    };
    let after_open = &content[open_idx + REASONING_OPEN.len()..];
    let Some(close_idx) = after_open.find(REASONING_CLOSE) else {
        return (String::new(), content.trim().to_owned());
    };

    let reasoning = after_open[..close_idx].trim().to_owned();
    let mut answer = String::new();
    answer.push_str(&content[..open_idx]);
    answer.push_str(&after_open[close_idx + REASONING_CLOSE.len()..]);
    (reasoning, answer.trim().to_owned())
}

fn time_label() -> String {
    chrono::Local::now().format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use brook_api::Role;

    use super::*;

    fn stored(role: &str, content: &str) -> StoredMessage {
        StoredMessage {
            role: role.to_owned(),
            content: content.to_owned(),
        }
    }

    #[test]
    fn test_load_conversation_splits_reasoning() {
        let mut session = Session::new("deepseek-r1:7b");
        session.load_conversation(
            "h-1",
            vec![
                stored("user", "hi"),
                stored("assistant", "<think>because</think>answer"),
            ],
        );

        let conversation = session.conversation();
        assert_eq!(conversation.persisted_id(), "h-1");

        let transcript = conversation.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].speaker, Speaker::User);
        assert_eq!(transcript[0].answer, "hi");
        assert_eq!(transcript[1].speaker, Speaker::Assistant);
        assert_eq!(transcript[1].reasoning, "because");
        assert_eq!(transcript[1].answer, "answer");
        assert_eq!(
            transcript[1].reasoning_time,
            ReasoningTime::Unspecified
        );

        // Replay keeps the stored form verbatim.
        let replay = conversation.replay();
        assert_eq!(replay.len(), 2);
        assert_eq!(replay[1].role, Role::Assistant);
        assert_eq!(replay[1].content, "<think>because</think>answer");
    }

    #[test]
    fn test_load_conversation_without_reasoning() {
        let mut session = Session::new("m");
        session.load_conversation(
            "h-2",
            vec![stored("assistant", "plain answer")],
        );
        let entry = &session.conversation().transcript()[0];
        assert_eq!(entry.answer, "plain answer");
        assert_eq!(entry.reasoning, "");
        assert_eq!(entry.reasoning_time, ReasoningTime::Unknown);
    }

    #[test]
    fn test_unclosed_reasoning_block_is_answer() {
        let (reasoning, answer) = split_reasoning("<think>half done");
        assert_eq!(reasoning, "");
        assert_eq!(answer, "<think>half done");
    }

    #[test]
    fn test_unknown_roles_are_skipped() {
        let mut session = Session::new("m");
        session.load_conversation(
            "h-3",
            vec![stored("tool", "ignored"), stored("user", "hi")],
        );
        assert_eq!(session.conversation().transcript().len(), 1);
        assert_eq!(session.conversation().replay().len(), 1);
    }

    #[test]
    fn test_start_new_conversation_clears_everything() {
        let mut session = Session::new("m");
        session.load_conversation("h-4", vec![stored("user", "hi")]);
        session.start_new_conversation();
        assert_eq!(session.conversation().persisted_id(), "");
        assert!(session.conversation().transcript().is_empty());
        assert!(session.conversation().replay().is_empty());
    }

    #[test]
    fn test_toggle_reasoning() {
        let mut session = Session::new("m");
        session.load_conversation(
            "h-5",
            vec![stored("assistant", "<think>r</think>a")],
        );
        assert!(session.conversation().transcript()[0].reasoning_expanded);
        session.toggle_reasoning(1);
        assert!(!session.conversation().transcript()[0].reasoning_expanded);
    }

    #[test]
    fn test_persisted_id_first_writer_wins() {
        let mut conversation = Conversation::default();
        conversation.adopt_persisted_id("h-1".to_owned());
        conversation.adopt_persisted_id("h-2".to_owned());
        assert_eq!(conversation.persisted_id(), "h-1");
    }
}
