use std::pin::Pin;

use serde::Serialize;
use serde_json::Value;

use super::{Error, Literal, Tool};
use crate::agent::WeakAgent;

/// A type-erased outcome of one tool call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    Success(String),
    /// The call succeeded but its payload could not be rendered as text.
    Unrenderable(String),
    Failure(Error),
}

pub(crate) trait ToolObject: Send + Sync + 'static {
    fn namespace(&self) -> &str;

    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn invoke(
        &self,
        args: Vec<Literal>,
    ) -> Pin<Box<dyn Future<Output = Outcome> + Send>>;

    fn attach(&self, agent: WeakAgent);

    fn close(&self);

    #[inline]
    fn key(&self) -> String {
        format!("{}.{}", self.namespace(), self.name())
    }
}

pub(crate) struct AnyTool<T: Tool>(pub T);

impl<T: Tool> ToolObject for AnyTool<T> {
    #[inline]
    fn namespace(&self) -> &str {
        self.0.namespace()
    }

    #[inline]
    fn name(&self) -> &str {
        self.0.name()
    }

    #[inline]
    fn description(&self) -> &str {
        self.0.description()
    }

    fn invoke(
        &self,
        args: Vec<Literal>,
    ) -> Pin<Box<dyn Future<Output = Outcome> + Send>> {
        let fut = self.0.invoke(args);
        Box::pin(async move {
            match fut.await {
                Ok(output) => match render(&output) {
                    Ok(text) => Outcome::Success(text),
                    Err(err) => Outcome::Unrenderable(err.to_string()),
                },
                Err(err) => Outcome::Failure(err),
            }
        })
    }

    #[inline]
    fn attach(&self, agent: WeakAgent) {
        self.0.attach(agent)
    }

    #[inline]
    fn close(&self) {
        self.0.close()
    }
}

/// Strings pass through verbatim, other payloads become compact JSON.
fn render<O: Serialize>(output: &O) -> Result<String, serde_json::Error> {
    match serde_json::to_value(output)? {
        Value::String(text) => Ok(text),
        value => Ok(value.to_string()),
    }
}
