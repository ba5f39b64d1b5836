//! An abstraction layer for the language model ("brain") behind an agent.
//!
//! This crate establishes a small protocol for the agent to talk to any
//! chat-style model: the agent sends the ordered message history, and the
//! brain answers with the next assistant message or fails.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod message;
mod provider;

pub use error::*;
pub use message::*;
pub use provider::*;
