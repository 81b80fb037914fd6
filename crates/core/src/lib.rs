//! Core logic: session state, the stream ingest engine and the history
//! directory client.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod cancel;
mod history;
mod ingest;
pub mod session;

pub use cancel::CancelToken;
pub use history::{HistoryDirectory, LOAD_ERROR_MESSAGE};
pub use ingest::{
    CANCELLED_MARKER, STREAM_ERROR_MESSAGE, SubmitError, TurnOutcome, submit,
};
pub use session::Session;
