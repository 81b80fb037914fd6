//! The stream ingest engine.
//!
//! One submission folds an arriving fragment stream into the session,
//! fragment by fragment and strictly in arrival order, running a small
//! two-state machine that routes text to the reasoning or the answer
//! segment of the open assistant entry.

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::future::poll_fn;
use std::pin::pin;

use brook_api::{
    ChatBackend, ChatRequest, ChatStream, Fragment, REASONING_CLOSE,
    REASONING_OPEN,
};
use chrono::{DateTime, Utc};
use tokio::select;

use crate::cancel::CancelToken;
use crate::session::{Conversation, ReasoningTime, Session};

/// Marker appended to a turn's answer when the user stops generation.
pub const CANCELLED_MARKER: &str = "\n\n[generation stopped by user]";

/// The notice shown when a stream fails to open or aborts mid-flight.
pub const STREAM_ERROR_MESSAGE: &str =
    "Sorry, something went wrong. Please try again later.";

/// How a submitted turn ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The server closed the stream; the answer was finalized.
    Completed,
    /// The user stopped generation; partial text was kept.
    Cancelled,
    /// The stream failed; an error notice was appended.
    Failed,
}

/// Why a submission was refused before any state changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitError {
    /// Another submission is in flight for this conversation.
    Busy,
    /// The prompt was blank.
    EmptyPrompt,
}

impl Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Busy => write!(f, "a submission is already in flight"),
            SubmitError::EmptyPrompt => write!(f, "the prompt is blank"),
        }
    }
}

impl StdError for SubmitError {}

/// Submits a prompt and folds the response stream into the session.
///
/// The user turn is appended to both projections before any network
/// activity. Exactly one stream may be open per conversation; the busy
/// flag gates re-entry and is cleared on every exit path. Cancellation
/// is observed between fragment reads.
pub async fn submit<B: ChatBackend>(
    session: &mut Session,
    backend: &B,
    prompt: &str,
    cancel: &CancelToken,
) -> Result<TurnOutcome, SubmitError> {
    if session.busy {
        return Err(SubmitError::Busy);
    }
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(SubmitError::EmptyPrompt);
    }

    session.busy = true;
    let outcome = run_turn(session, backend, prompt, cancel).await;
    session.busy = false;
    Ok(outcome)
}

async fn run_turn<B: ChatBackend>(
    session: &mut Session,
    backend: &B,
    prompt: &str,
    cancel: &CancelToken,
) -> TurnOutcome {
    session.conversation.push_user_turn(prompt);

    let req = ChatRequest::new(
        session.conversation.replay().to_vec(),
        session.selected_model(),
        session.conversation.persisted_id(),
    );
    let stream = select! {
        biased;

        _ = cancel.cancelled() => {
            // Stopped before the stream opened; there is no assistant
            // entry to mark yet.
            return TurnOutcome::Cancelled;
        }
        res = backend.send_chat(&req) => match res {
            Ok(stream) => stream,
            Err(err) => {
                error!("failed to open chat stream: {err}");
                session.conversation.push_error_entry(STREAM_ERROR_MESSAGE);
                return TurnOutcome::Failed;
            }
        },
    };

    session.conversation.begin_assistant_turn();

    let mut stream = pin!(stream);
    let mut reducer = TurnReducer::default();
    loop {
        let next = select! {
            biased;

            _ = cancel.cancelled() => {
                if let Some(entry) = session.conversation.open_entry_mut() {
                    entry.answer.push_str(CANCELLED_MARKER);
                }
                return TurnOutcome::Cancelled;
            }
            next = poll_fn(|cx| stream.as_mut().poll_next_fragment(cx)) => next,
        };

        match next {
            Ok(Some(fragment)) => {
                trace!("got fragment: {fragment:?}");
                reducer.apply(&mut session.conversation, fragment);
            }
            Ok(None) => break,
            Err(err) => {
                error!("chat stream failed: {err}");
                session.conversation.push_error_entry(STREAM_ERROR_MESSAGE);
                return TurnOutcome::Failed;
            }
        }
    }

    session.conversation.finalize_assistant_turn();
    TurnOutcome::Completed
}

/// Which segment of the open entry incoming text is routed to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Phase {
    #[default]
    Answering,
    Reasoning,
}

/// The per-turn state machine.
///
/// The reasoning start and end instants are each recorded once; a repeated
/// open marker or a close without a matching open leaves the recorded
/// instants alone, so the machine is total over malformed marker
/// sequences.
#[derive(Debug, Default)]
struct TurnReducer {
    phase: Phase,
    reasoning_start: Option<DateTime<Utc>>,
    duration_fixed: bool,
}

impl TurnReducer {
    fn apply(&mut self, conversation: &mut Conversation, fragment: Fragment) {
        let Fragment {
            history_id,
            content,
            created_at,
        } = fragment;

        if let Some(id) = history_id {
            conversation.adopt_persisted_id(id);
        }
        let Some(content) = content else {
            return;
        };
        let Some(entry) = conversation.open_entry_mut() else {
            return;
        };

        match content.as_str() {
            REASONING_OPEN => {
                if self.phase == Phase::Reasoning {
                    warn!("repeated reasoning open marker, ignored");
                    return;
                }
                self.phase = Phase::Reasoning;
                if self.reasoning_start.is_none() {
                    self.reasoning_start = created_at;
                }
            }
            REASONING_CLOSE => {
                if self.phase == Phase::Answering {
                    warn!("unmatched reasoning close marker, ignored");
                    return;
                }
                self.phase = Phase::Answering;
                if !self.duration_fixed {
                    self.duration_fixed = true;
                    entry.reasoning_time = ReasoningTime::Seconds(
                        elapsed_seconds(self.reasoning_start, created_at),
                    );
                }
            }
            _ => match self.phase {
                Phase::Reasoning => {
                    entry.reasoning.push_str(&content);
                    if !self.duration_fixed {
                        if let (Some(start), Some(now)) =
                            (self.reasoning_start, created_at)
                        {
                            entry.reasoning_time = ReasoningTime::Seconds(
                                (now - start).num_seconds(),
                            );
                        }
                    }
                }
                Phase::Answering => entry.answer.push_str(&content),
            },
        }
    }
}

fn elapsed_seconds(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> i64 {
    match (start, end) {
        (Some(start), Some(end)) => (end - start).num_seconds(),
        _ => 0,
    }
}
