//! A local scripted brain for testing purpose.

mod preset;

use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tactic_model::{Brain, BrainError, ErrorKind, Message, ModelRequest};
use tokio::time::sleep;

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for Error {}

impl BrainError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

#[derive(Default)]
struct Shared {
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<Message>>>,
}

/// A local scripted brain for testing purpose.
///
/// The n-th request is answered with the n-th preset reply. Once the script
/// runs out, the last reply is repeated if [`ScriptedBrain::repeat_last`]
/// was set, otherwise the request fails. Every request history is recorded
/// and can be inspected with [`ScriptedBrain::requests`].
///
/// Clones share the call counter and the recorded requests.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct ScriptedBrain {
    script: Vec<PresetReply>,
    repeat_last: bool,
    delay: Option<Duration>,
    shared: Arc<Shared>,
}

impl ScriptedBrain {
    /// Creates a brain that answers with the given replies in order.
    pub fn with_replies(replies: impl IntoIterator<Item = PresetReply>) -> Self {
        Self {
            script: replies.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Appends a text reply to the script.
    #[inline]
    pub fn add_reply<S: Into<String>>(&mut self, text: S) {
        self.script.push(PresetReply::text(text));
    }

    /// Appends a failure to the script.
    #[inline]
    pub fn add_failure<S: Into<String>>(&mut self, message: S) {
        self.script.push(PresetReply::failure(message));
    }

    /// Keeps answering with the last preset once the script runs out.
    #[inline]
    pub fn repeat_last(mut self) -> Self {
        self.repeat_last = true;
        self
    }

    /// Delays every reply by `duration`.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns how many requests have been received.
    #[inline]
    pub fn calls(&self) -> usize {
        self.shared.calls.load(Ordering::SeqCst)
    }

    /// Returns every request history received so far.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.shared
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn preset_for(&self, idx: usize) -> Option<&PresetReply> {
        match self.script.get(idx) {
            Some(preset) => Some(preset),
            None if self.repeat_last => self.script.last(),
            None => None,
        }
    }
}

impl Brain for ScriptedBrain {
    type Error = crate::Error;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Message, Self::Error>> + Send + 'static
    {
        let idx = self.shared.calls.fetch_add(1, Ordering::SeqCst);
        self.shared
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(req.messages.clone());

        let result = match self.preset_for(idx) {
            Some(PresetReply::Text(text)) => Ok(Message::assistant(text)),
            Some(PresetReply::Failure(message)) => Err(Error {
                message: message.clone(),
                kind: ErrorKind::Other,
            }),
            None => Err(Error {
                message: "not enough replies".to_owned(),
                kind: ErrorKind::RateLimitExceeded,
            }),
        };
        let delay = self.delay;
        async move {
            if let Some(delay) = delay {
                sleep(delay).await;
            }
            result
        }
    }
}
