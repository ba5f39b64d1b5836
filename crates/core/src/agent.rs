mod builder;
mod retry;
mod turn;
#[cfg(test)]
mod tests;

use std::any::Any;
use std::error::Error;
use std::fmt::{self, Display};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{Local, SecondsFormat};
use futures_util::FutureExt as _;
use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, Instrument, dispatcher};

use crate::brain_client::BrainClient;
use crate::memory::{Memory, Sweeper};
use crate::tool::Dispatcher;
pub use builder::{AgentBuilder, BuildError};

/// Returned by [`Agent::chat`] when the iteration cap is reached.
pub const EXHAUSTED_MESSAGE: &str = "Unable to process your request.";

/// Returned by [`Agent::chat`] when the turn hit an unexpected fault.
pub const FAULT_MESSAGE: &str = "Sorry, an error occurred. Please try again.";

/// Why a turn ended without an answer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChatError {
    /// The model did not produce an answer within the iteration cap.
    Exhausted {
        /// The cap that was reached.
        iterations: usize,
    },
    /// A fault (a panic in the brain, the memory or the loop itself) was
    /// caught at the turn boundary.
    Fault(String),
}

impl ChatError {
    /// Returns the fixed message shown to the user for this error.
    #[inline]
    pub fn apology(&self) -> &'static str {
        match self {
            ChatError::Exhausted { .. } => EXHAUSTED_MESSAGE,
            ChatError::Fault(_) => FAULT_MESSAGE,
        }
    }
}

impl Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::Exhausted { iterations } => {
                write!(f, "no answer after {iterations} iterations")
            }
            ChatError::Fault(reason) => write!(f, "turn aborted: {reason}"),
        }
    }
}

impl Error for ChatError {}

pub(crate) struct AgentInner {
    name: String,
    prompt: String,
    brain: BrainClient,
    memory: Arc<dyn Memory>,
    dispatcher: Dispatcher,
    max_iterations: usize,
    retry_unit: Duration,
    logger: Option<Dispatch>,
    sweeper: Mutex<Option<Sweeper>>,
}

/// An agent that answers messages by thinking with a brain and calling
/// tools until it reaches a final answer.
///
/// The agent is cheap to clone. Turns of different sessions may run
/// concurrently, each turn runs its iterations sequentially.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

/// A weak handle to an [`Agent`], given to tools when the agent starts.
#[derive(Clone, Default)]
pub struct WeakAgent {
    inner: Weak<AgentInner>,
}

impl WeakAgent {
    /// Returns the agent if it is still alive.
    #[inline]
    pub fn upgrade(&self) -> Option<Agent> {
        self.inner.upgrade().map(|inner| Agent { inner })
    }
}

impl Agent {
    /// Returns the name of the agent.
    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns a weak handle to this agent.
    #[inline]
    pub fn downgrade(&self) -> WeakAgent {
        WeakAgent {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Answers `msg` in the given session.
    ///
    /// This never fails: if the turn cannot produce an answer, one of the
    /// fixed messages [`EXHAUSTED_MESSAGE`] or [`FAULT_MESSAGE`] is
    /// returned instead.
    pub async fn chat(&self, msg: &str, session: &str) -> String {
        match self.try_chat(msg, session).await {
            Ok(answer) => answer,
            Err(err) => err.apology().to_owned(),
        }
    }

    /// Answers `msg` in the given session, reporting why the turn failed
    /// if it did.
    pub async fn try_chat(
        &self,
        msg: &str,
        session: &str,
    ) -> Result<String, ChatError> {
        let input = self.compose_input(msg);
        let inner = &self.inner;
        let turn = async move {
            let result = AssertUnwindSafe(inner.run_turn(input, session))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    Err(ChatError::Fault(panic_message(&*payload)))
                });
            if let Err(err) = &result {
                error!("{err}");
            }
            result
        };
        let span = || info_span!("agent turn", agent = %inner.name, session);

        match &inner.logger {
            Some(logger) => {
                // The span must be registered with the injected logger too.
                let span = dispatcher::with_default(logger, span);
                turn.instrument(span)
                    .with_subscriber(logger.clone())
                    .await
            }
            None => turn.instrument(span()).await,
        }
    }

    /// Stops background work and closes every tool.
    pub fn close(&self) {
        if let Some(sweeper) = &*self.lock_sweeper() {
            sweeper.stop();
        }
        for tool in self.inner.dispatcher.tools() {
            tool.close();
        }
    }

    #[cfg(test)]
    pub(crate) fn sweeper_finished(&self) -> bool {
        self.lock_sweeper().as_ref().is_none_or(Sweeper::is_finished)
    }

    fn lock_sweeper(&self) -> MutexGuard<'_, Option<Sweeper>> {
        self.inner
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn compose_input(&self, msg: &str) -> String {
        let now = Local::now().to_rfc3339_opts(SecondsFormat::Secs, false);
        format!("now:{now}\n{}\nmsg:{msg}", self.inner.prompt)
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_owned()
    }
}
