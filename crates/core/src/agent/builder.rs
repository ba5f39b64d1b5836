use std::error::Error;
use std::fmt::{self, Display, Write as _};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tactic_model::Brain;
use tracing::{Dispatch, dispatcher};

use super::{Agent, AgentInner};
use crate::brain_client::BrainClient;
use crate::memory::{
    DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_HISTORY, Memory, SimpleMemory,
};
use crate::tool::{AnyTool, Dispatcher, Tool, ToolObject};

/// Reminds the model of the reply format it must follow.
pub(crate) const RESPONSE_FORMAT: &str = r#"<response>
	<think>
		Your thoughts
	</think>
	<action>
		call:packageName.funcName(args1,args2)
	</action>
	<final-answer>
		If you confirm that you have sufficient information and no tools need to be called, please write the final answer here.
	</final-answer>
</response>
"#;

const TOOL_USAGE: &str = r#"Tools can be used in combination. Use line breaks to separate tool calls and add the prefix "call:", e.g., call:packageName.funcName(args1,args2). String args need "". The tool will return the execution result to you. Note that even if there are many parameters, each tool call must be written on a single line without line breaks.
Your response should follow the format below. If you believe you have completed the task, write the final answer:
"#;

/// Error returned by [`AgentBuilder::build`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BuildError {
    /// Two tools share the same `namespace.name` key.
    DuplicateTool(String),
}

impl Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::DuplicateTool(key) => {
                write!(f, "tool `{key}` is registered more than once")
            }
        }
    }
}

impl Error for BuildError {}

/// [`Agent`] builder.
pub struct AgentBuilder {
    brain: BrainClient,
    name: String,
    system_prompt: String,
    prompt: String,
    tools: Vec<Arc<dyn ToolObject>>,
    memory: Option<Arc<dyn Memory>>,
    max_history: usize,
    max_iterations: usize,
    retry_unit: Duration,
    idle_timeout: Duration,
    logger: Option<Dispatch>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified brain.
    #[inline]
    pub fn with_brain<B: Brain + 'static>(brain: B) -> Self {
        Self {
            brain: BrainClient::new(brain),
            name: "agent".to_owned(),
            system_prompt: String::new(),
            prompt: String::new(),
            tools: vec![],
            memory: None,
            max_history: DEFAULT_MAX_HISTORY,
            max_iterations: 100,
            retry_unit: Duration::from_secs(1),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            logger: None,
        }
    }

    /// Sets the name the agent introduces itself with.
    #[inline]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the system prompt, which is placed in the preamble of every
    /// session.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Sets a prompt that is prepended to every user message.
    #[inline]
    pub fn with_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.tools.push(Arc::new(AnyTool(tool)));
        self
    }

    /// Uses a custom memory.
    ///
    /// By default, the agent creates a [`SimpleMemory`] and sweeps its idle
    /// sessions in the background. A custom memory is not swept.
    #[inline]
    pub fn with_memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Sets the history bound of the default memory (default: 100).
    #[inline]
    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    /// Sets how many replies one turn may classify before giving up
    /// (default: 100).
    #[inline]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the unit of the pause before retrying after a malformed reply
    /// (default: 1 second).
    #[inline]
    pub fn with_retry_unit(mut self, unit: Duration) -> Self {
        self.retry_unit = unit;
        self
    }

    /// Sets after how long an idle session of the default memory is
    /// evicted (default: 15 minutes). The sweep runs on the same period.
    #[inline]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sends the agent's logs to `logger` instead of the global default.
    #[inline]
    pub fn with_logger(mut self, logger: impl Into<Dispatch>) -> Self {
        self.logger = Some(logger.into());
        self
    }

    /// Builds and starts the agent.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime when no custom memory
    /// was given, since the default memory needs a background sweeper.
    pub fn build(self) -> Result<Agent, BuildError> {
        match self.logger.clone() {
            Some(logger) => dispatcher::with_default(&logger, || self.start()),
            None => self.start(),
        }
    }

    fn start(self) -> Result<Agent, BuildError> {
        let dispatcher = Dispatcher::with_tools(self.tools)?;
        info!("agent {} starting...", self.name);

        let preamble =
            compose_preamble(&self.name, &self.system_prompt, dispatcher.tools());
        debug!("initial message: {preamble}");

        let (memory, sweeper) = match self.memory {
            Some(memory) => (memory, None),
            None => {
                let memory = Arc::new(SimpleMemory::new(self.max_history, ""));
                let sweeper =
                    memory.spawn_sweeper(self.idle_timeout, self.idle_timeout);
                (memory as Arc<dyn Memory>, Some(sweeper))
            }
        };
        memory.set_system(&preamble);

        let agent = Agent {
            inner: Arc::new(AgentInner {
                name: self.name,
                prompt: self.prompt,
                brain: self.brain,
                memory,
                dispatcher,
                max_iterations: self.max_iterations,
                retry_unit: self.retry_unit,
                logger: self.logger,
                sweeper: Mutex::new(sweeper),
            }),
        };
        for tool in agent.inner.dispatcher.tools() {
            tool.attach(agent.downgrade());
        }
        Ok(agent)
    }
}

fn compose_preamble(
    name: &str,
    system_prompt: &str,
    tools: &[Arc<dyn ToolObject>],
) -> String {
    let mut tool_prompt = String::from("You have the following tools available:\n");
    for (i, tool) in tools.iter().enumerate() {
        // Writing to a `String` never fails.
        let _ = writeln!(
            tool_prompt,
            "{i}: namespace: {} name: {} description: {} ",
            tool.namespace(),
            tool.name(),
            tool.description().trim(),
        );
    }
    tool_prompt.push_str(TOOL_USAGE);
    tool_prompt.push_str(RESPONSE_FORMAT);

    format!("Your name is: {name}\n {system_prompt} \n {tool_prompt} ")
}
