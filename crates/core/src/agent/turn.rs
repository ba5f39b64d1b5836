use backoff::backoff::Backoff;
use tactic_model::{Message, ModelRequest};
use tokio::time::sleep;

use super::builder::RESPONSE_FORMAT;
use super::retry::RetryPause;
use super::{AgentInner, ChatError};
use crate::sections::{self, ResponseSections};

/// Sent back to the model when its reply has no recognizable section.
pub(crate) const RETRY_PROMPT_PREFIX: &str = "The previous response format was \
    incorrect. Please try again and follow the format below.";

impl AgentInner {
    /// Drives one turn: think, classify, then either call tools and think
    /// again, retry after a malformed reply, or return the answer.
    pub(super) async fn run_turn(
        &self,
        input: String,
        session: &str,
    ) -> Result<String, ChatError> {
        let mut reply = self.think(input, session).await;

        for iteration in 0..self.max_iterations {
            let ResponseSections {
                think,
                action,
                final_answer,
            } = sections::extract(&reply);
            if let Some(think) = &think {
                info!("think: {think}");
            }
            if let Some(action) = &action {
                info!("action: {action}");
            }
            if let Some(final_answer) = &final_answer {
                info!("final answer: {final_answer}");
            }

            if let Some(action) = action {
                let digest = self.dispatcher.dispatch(&action).await;
                debug!("tool results: {digest}");
                reply = self.think(digest, session).await;
                continue;
            }

            // A present final answer wins over the thoughts, and bare
            // thoughts are taken as an implicit answer.
            if let Some(answer) = final_answer.or(think) {
                debug!("answered after {} iterations", iteration + 1);
                return Ok(answer);
            }

            let delay = RetryPause::new(self.retry_unit)
                .at_attempt(iteration)
                .next_backoff()
                .unwrap_or_default();
            warn!("malformed reply, retrying in {delay:?}");
            sleep(delay).await;
            reply = self
                .think(format!("{RETRY_PROMPT_PREFIX}{RESPONSE_FORMAT}"), session)
                .await;
        }

        Err(ChatError::Exhausted {
            iterations: self.max_iterations,
        })
    }

    /// Sends `msg` with the session history and records the reply.
    ///
    /// A failing brain is not special-cased: its error text becomes the
    /// reply and goes through classification like any other.
    async fn think(&self, msg: String, session: &str) -> String {
        let messages = self.memory.append_and_fetch(Message::user(msg), session);
        let reply = match self.brain.send_request(ModelRequest { messages }).await
        {
            Ok(reply) => reply,
            Err(err) => Message::assistant(err.to_string()),
        };
        let content = reply.content.clone();
        self.memory.append(reply, session);
        content
    }
}
