use std::pin::Pin;
use std::sync::Arc;

use tactic_model::{Brain, BrainError, Message, ModelRequest};
use tracing::Instrument;

type SendRequestResult = Result<Message, Box<dyn BrainError>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
type HandlerFn =
    Arc<dyn Fn(ModelRequest) -> BoxedSendRequestFuture + Send + Sync>;

/// A wrapper around a brain that provides a type-erased interface for the
/// other modules.
#[derive(Clone)]
pub struct BrainClient {
    handler_fn: HandlerFn,
}

impl BrainClient {
    #[inline]
    pub fn new<B: Brain + 'static>(brain: B) -> Self {
        // We have to erase the type `B`, since `BrainClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req| {
            let fut = brain.send_request(&req);
            Box::pin(
                async move {
                    trace!("sending {} messages", req.messages.len());
                    match fut.await {
                        Ok(reply) => {
                            trace!("got a reply: {:?}", reply.content);
                            Ok(reply)
                        }
                        Err(err) => {
                            error!("got an error: {err}");
                            Err(Box::new(err) as Box<dyn BrainError>)
                        }
                    }
                }
                .instrument(trace_span!("brain req")),
            )
        });
        Self { handler_fn }
    }

    /// Sends the history and returns the next assistant message.
    #[inline]
    pub async fn send_request(&self, req: ModelRequest) -> SendRequestResult {
        (self.handler_fn)(req).await
    }
}

#[cfg(test)]
mod tests {
    use tactic_model::ErrorKind;
    use tactic_test_model::ScriptedBrain;

    use super::*;

    fn request() -> ModelRequest {
        ModelRequest {
            messages: vec![Message::system("sys"), Message::user("Hi")],
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut brain = ScriptedBrain::default();
        brain.add_reply("How are you?");
        brain.add_failure("overloaded");

        let client = BrainClient::new(brain.clone());
        let reply = client.send_request(request()).await.unwrap();
        assert_eq!(reply, Message::assistant("How are you?"));

        let err = client.send_request(request()).await.unwrap_err();
        assert_eq!(err.to_string(), "overloaded");
        assert_eq!(err.kind(), ErrorKind::Other);
        assert_eq!(brain.calls(), 2);
    }
}
