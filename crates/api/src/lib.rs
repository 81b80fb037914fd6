//! An abstraction layer for the chat backend.
//!
//! This crate establishes the protocol between the conversation core and
//! whatever serves the inference stream and the history directory, so the
//! core can run against the real HTTP backend or a scripted one without
//! modification.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod backend;
mod error;
mod request;
mod stream;

pub use backend::*;
pub use error::*;
pub use request::*;
pub use stream::*;
