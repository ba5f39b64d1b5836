//! Core logic of the text-to-action runtime: the orchestration loop, the
//! directive compiler, tool dispatch and session memory.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
mod brain_client;
pub mod directive;
pub mod memory;
pub mod sections;
pub mod tool;

pub use agent::{
    Agent, AgentBuilder, BuildError, ChatError, EXHAUSTED_MESSAGE,
    FAULT_MESSAGE, WeakAgent,
};
