use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::Instrument;
use tracing::instrument::WithSubscriber;

use crate::agent::{BuildError, panic_message};
use crate::directive::{self, DIRECTIVE_PREFIX};
use crate::tool::{Outcome, ToolObject};

/// The first line of the digest fed back to the model.
pub(crate) const TOOL_RESULTS_HEADER: &str = "Your tool usage results:\n";

/// Runs the directives of an action block against the registered tools.
pub(crate) struct Dispatcher {
    tools: Vec<Arc<dyn ToolObject>>,
    index: HashMap<String, usize>,
}

enum Slot {
    /// The line is not a directive.
    Empty,
    Ready(String),
    Running {
        directive: String,
        task: JoinHandle<Outcome>,
    },
}

impl Dispatcher {
    pub fn with_tools(
        tools: Vec<Arc<dyn ToolObject>>,
    ) -> Result<Self, BuildError> {
        let mut index = HashMap::with_capacity(tools.len());
        for (idx, tool) in tools.iter().enumerate() {
            let key = tool.key();
            if index.contains_key(&key) {
                return Err(BuildError::DuplicateTool(key));
            }
            index.insert(key, idx);
        }
        Ok(Self { tools, index })
    }

    /// Returns the tools in registration order.
    #[inline]
    pub fn tools(&self) -> &[Arc<dyn ToolObject>] {
        &self.tools
    }

    /// Runs every directive in `action` and renders the digest for the
    /// model.
    pub async fn dispatch(&self, action: &str) -> String {
        let mut digest = TOOL_RESULTS_HEADER.to_owned();
        for line in self.run(action).await.into_iter().flatten() {
            digest.push_str(&line);
            digest.push('\n');
        }
        digest
    }

    /// Runs every directive in `action` concurrently and returns one slot
    /// per input line, in line order. Lines that are not directives yield
    /// `None`.
    pub async fn run(&self, action: &str) -> Vec<Option<String>> {
        let span = debug_span!("tool dispatch");
        let slots: Vec<Slot> = span
            .in_scope(|| action.lines().map(|line| self.start(line)).collect());

        let mut results = Vec::with_capacity(slots.len());
        for slot in slots {
            let result = match slot {
                Slot::Empty => None,
                Slot::Ready(line) => Some(line),
                Slot::Running { directive, task } => {
                    Some(join_call(&directive, task).await)
                }
            };
            results.push(result);
        }
        results
    }

    fn start(&self, line: &str) -> Slot {
        let line = line.trim();
        let Some(directive) = line.strip_prefix(DIRECTIVE_PREFIX) else {
            return Slot::Empty;
        };

        let expr = match directive::compile(line) {
            Ok(expr) => expr,
            Err(err) => {
                warn!("failed to parse `{directive}`: {err}");
                return Slot::Ready(format!(
                    "Tool call format error, parsing failed, {directive}, \
                     Error: {err}"
                ));
            }
        };

        let key = expr.key();
        let Some(&idx) = self.index.get(&key) else {
            warn!("tool not found: {key}");
            return Slot::Ready(format!(
                "{directive} Not found, please check if the package name is \
                 provided or if the tool exists"
            ));
        };
        let tool = Arc::clone(&self.tools[idx]);
        let args = expr.arguments;
        trace!("spawning {key} with args: {args:?}");

        let task = tokio::spawn(
            async move { tool.invoke(args).await }
                .instrument(debug_span!("tool call", tool = %key))
                .with_current_subscriber(),
        );
        Slot::Running {
            directive: directive.to_owned(),
            task,
        }
    }
}

async fn join_call(directive: &str, task: JoinHandle<Outcome>) -> String {
    let outcome = match task.await {
        Ok(outcome) => outcome,
        Err(err) => {
            let reason = if err.is_panic() {
                format!("tool panicked: {}", panic_message(&*err.into_panic()))
            } else {
                "tool call was cancelled".to_owned()
            };
            error!("`{directive}` failed: {reason}");
            return format!("{directive} Call error: {reason}");
        }
    };

    match outcome {
        Outcome::Success(text) => format!("{directive} Call success: {text}"),
        Outcome::Unrenderable(err) => format!(
            "{directive} Call success, but result cannot be converted to \
             String: {err}"
        ),
        Outcome::Failure(err) => format!("{directive} Call error: {err}"),
    }
}
