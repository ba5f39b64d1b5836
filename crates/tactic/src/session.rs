use std::time::Duration;

use tactic_core::tool::Tool;
use tactic_core::{Agent, AgentBuilder, BuildError};
use tactic_model::Brain;
use tracing::Dispatch;

use crate::tools::*;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    agent_builder: AgentBuilder,
    key: String,
}

impl SessionBuilder {
    /// Creates a session builder with a specified brain.
    pub fn with_brain<B: Brain + 'static>(brain: B) -> Self {
        let agent_builder = AgentBuilder::with_brain(brain);
        Self {
            agent_builder,
            key: String::new(),
        }
    }

    /// Sets the name of the agent.
    #[inline]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.agent_builder = self.agent_builder.with_name(name);
        self
    }

    /// Sets the system prompt for the agent.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.agent_builder = self.agent_builder.with_system_prompt(prompt);
        self
    }

    /// Sets the prompt prepended to every message.
    #[inline]
    pub fn with_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.agent_builder = self.agent_builder.with_prompt(prompt);
        self
    }

    /// Registers an extra tool besides the built-in ones.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.agent_builder = self.agent_builder.with_tool(tool);
        self
    }

    /// Sets the memory key of the session (default: the default session).
    #[inline]
    pub fn with_session_key<S: Into<String>>(mut self, key: S) -> Self {
        self.key = key.into();
        self
    }

    /// Sets the unit of the pause before retrying a malformed reply.
    #[inline]
    pub fn with_retry_unit(mut self, unit: Duration) -> Self {
        self.agent_builder = self.agent_builder.with_retry_unit(unit);
        self
    }

    /// Sends the agent's logs to `logger`.
    #[inline]
    pub fn with_logger(mut self, logger: impl Into<Dispatch>) -> Self {
        self.agent_builder = self.agent_builder.with_logger(logger);
        self
    }

    /// Builds a new session with the built-in tools registered.
    pub fn build(self) -> Result<Session, BuildError> {
        let agent = self
            .agent_builder
            .with_tool(ShellTool::new())
            .with_tool(GlobTool::new())
            .with_tool(ReadFileTool::new())
            .build()?;

        Ok(Session {
            agent,
            key: self.key,
        })
    }
}

/// A chat session, like a window that displays messages and has a input box.
///
/// The session holds a fully configured agent that you can use directly, and it
/// is basically a wrapper around [`Agent`] bound to one memory key.
pub struct Session {
    agent: Agent,
    key: String,
}

impl Session {
    /// Returns the agent behind this session.
    #[inline]
    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Sends a message to the session and waits for the answer.
    #[inline]
    pub async fn send_message(&self, message: &str) -> String {
        self.agent.chat(message, &self.key).await
    }

    /// Closes the agent and its tools.
    #[inline]
    pub fn close(&self) {
        self.agent.close();
    }
}
