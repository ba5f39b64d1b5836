//! Tools the model can call with `call:` directives.

mod dispatcher;
mod error;
mod object;

use serde::Serialize;

pub use crate::directive::{Literal, LiteralKind};
use crate::agent::WeakAgent;
pub(crate) use dispatcher::Dispatcher;
pub use error::{Error, ErrorKind};
pub(crate) use object::{AnyTool, Outcome, ToolObject};

/// The result of a tool call.
pub type ToolResult<T> = Result<T, Error>;

/// A tool that can be called by the model.
///
/// A tool is identified by `namespace.name`, which must be unique among the
/// tools registered to one agent. The model calls it with a directive like
/// `call:namespace.name("arg", 1)`, and the tool receives the literals as
/// they were written.
///
/// Implementations should keep their state immutable where possible. The
/// returned future must be independent of `self`, since calls of the same
/// tool may run concurrently.
pub trait Tool: Send + Sync + 'static {
    /// The payload of a successful call.
    ///
    /// A payload that serializes to a JSON string is reported verbatim,
    /// anything else is reported as compact JSON.
    type Output: Serialize + Send + 'static;

    /// Returns the namespace of the tool.
    fn namespace(&self) -> &str;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool, which is shown to the model.
    fn description(&self) -> &str;

    /// Invokes the tool with the arguments in directive order.
    fn invoke(
        &self,
        args: Vec<Literal>,
    ) -> impl Future<Output = ToolResult<Self::Output>> + Send + 'static;

    /// Called once when the owning agent starts.
    ///
    /// Tools that need to talk back to the agent (for example to delegate a
    /// question to it) can keep the handle.
    #[inline]
    fn attach(&self, agent: WeakAgent) {
        let _ = agent;
    }

    /// Called when the owning agent is closed.
    #[inline]
    fn close(&self) {}
}

/// Returns the argument at `index`, or an `InvalidInput` error naming it.
pub fn argument<'a>(
    args: &'a [Literal],
    index: usize,
    name: &str,
) -> ToolResult<&'a Literal> {
    args.get(index).ok_or_else(|| {
        Error::invalid_input()
            .with_reason(format!("missing argument #{}: `{name}`", index + 1))
    })
}
