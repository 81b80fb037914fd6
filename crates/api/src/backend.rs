use std::error::Error;

use crate::error::ErrorKind;
use crate::request::{ChatRequest, HistorySummary, StoredMessage};
use crate::stream::ChatStream;

/// The error type for a backend.
pub trait BackendError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A type that can open a streaming chat request.
///
/// Once the backend is created, it should behave like a stateless object.
/// It can still have internal state, but callers should not rely on it,
/// and the backend should be prepared for being dropped anytime.
pub trait ChatBackend: Send + Sync {
    /// The error type that may be returned by the backend.
    type Error: BackendError;

    /// The stream type for this backend.
    type Stream: ChatStream<Error = Self::Error>;

    /// Opens a streaming chat request.
    ///
    /// A returned error means the stream could not be established; errors
    /// after the first fragment are reported by the stream itself.
    fn send_chat(
        &self,
        req: &ChatRequest,
    ) -> impl Future<Output = Result<Self::Stream, Self::Error>> + Send + 'static;
}

/// A type that serves the persisted history directory.
pub trait HistoryStore: Send + Sync {
    /// The error type that may be returned by the store.
    type Error: BackendError;

    /// Lists the stored conversation summaries.
    fn list(
        &self,
    ) -> impl Future<Output = Result<Vec<HistorySummary>, Self::Error>> + Send + 'static;

    /// Fetches the stored messages of one conversation.
    fn detail(
        &self,
        history_id: &str,
    ) -> impl Future<Output = Result<Vec<StoredMessage>, Self::Error>> + Send + 'static;

    /// Deletes one stored conversation.
    fn delete(
        &self,
        history_id: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static;

    /// Lists the model identifiers the backend can serve.
    fn models(
        &self,
    ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'static;
}
