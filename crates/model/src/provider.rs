use std::error::Error;

use crate::error::ErrorKind;
use crate::message::{Message, ModelRequest};

/// The error type for a brain.
pub trait BrainError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A type that represents a language model the agent thinks with.
///
/// Once the brain is created, it should behave like a stateless object.
/// It can still have internal state, but callers should not rely on it,
/// and the brain should be prepared for being dropped anytime.
pub trait Brain: Send + Sync {
    /// The error type that may be returned by the brain.
    type Error: BrainError;

    /// Sends the message history and returns the next assistant message.
    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Message, Self::Error>> + Send + 'static;
}
