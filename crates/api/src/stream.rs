use std::pin::Pin;
use std::task::{self, Poll};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::BackendError;

/// Fragment content that opens the reasoning segment of a turn.
pub const REASONING_OPEN: &str = "<think>";

/// Fragment content that closes the reasoning segment of a turn.
pub const REASONING_CLOSE: &str = "</think>";

/// One decoded object from the newline-delimited response stream.
///
/// Any combination of the fields may be present; a fragment that carries
/// neither an id nor content is valid and has no effect.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    /// The persisted conversation id, present once the backend has
    /// assigned one.
    pub history_id: Option<String>,
    /// A text fragment. May be exactly [`REASONING_OPEN`] or
    /// [`REASONING_CLOSE`], or ordinary text to accumulate.
    pub content: Option<String>,
    /// The server-side timestamp of this fragment, used for reasoning
    /// elapsed-time computation.
    pub created_at: Option<DateTime<Utc>>,
}

impl Fragment {
    /// Creates a content-only fragment.
    #[inline]
    pub fn content<S: Into<String>>(content: S) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }
}

/// A streaming chat response.
pub trait ChatStream: Sized + Send + 'static {
    /// The error type that may be returned by the backend.
    type Error: BackendError;

    /// Attempts to pull out the next fragment from the stream.
    ///
    /// # Return value
    ///
    /// There are several possible return values, each indicating a
    /// distinct stream state:
    ///
    /// - `Poll::Pending` means that this stream is still waiting for the
    ///   next fragment. Implementations will ensure that the current task
    ///   will be notified when the next fragment may be ready.
    /// - `Poll::Ready(Ok(Some(fragment)))` means the stream has a fragment
    ///   to deliver, and may produce further fragments on subsequent
    ///   `poll_next_fragment` calls.
    /// - `Poll::Ready(Ok(None))` means the server has closed the stream.
    /// - `Poll::Ready(Err(error))` means the stream failed mid-flight.
    ///
    /// Calling this method after completion should always return `None`.
    fn poll_next_fragment(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<Fragment>, Self::Error>>;
}
