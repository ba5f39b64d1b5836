use std::future::ready;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tactic_model::{Brain, BrainError, ErrorKind, Message, ModelRequest, Role};
use tactic_test_model::{PresetReply, ScriptedBrain, structured_reply};
use tokio::time::{Instant, sleep};

use super::turn::RETRY_PROMPT_PREFIX;
use super::*;
use crate::memory::SimpleMemory;
use crate::tool::{Error as ToolError, Literal, Tool, ToolResult, argument};

/// Adds integers and counts its calls.
#[derive(Clone, Default)]
struct AddTool {
    calls: Arc<AtomicUsize>,
}

impl Tool for AddTool {
    type Output = i64;

    fn namespace(&self) -> &str {
        "math"
    }

    fn name(&self) -> &str {
        "add"
    }

    fn description(&self) -> &str {
        "Adds numbers"
    }

    fn invoke(
        &self,
        args: Vec<Literal>,
    ) -> impl Future<Output = ToolResult<i64>> + Send + 'static {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let sum = args.iter().try_fold(0i64, |acc, arg| {
            let value: i64 = arg.parse().map_err(|_| {
                ToolError::invalid_input()
                    .with_reason(format!("`{arg}` is not an integer"))
            })?;
            Ok(acc + value)
        });
        ready(sum)
    }
}

/// Waits for the given number of seconds.
struct WaitTool;

impl Tool for WaitTool {
    type Output = String;

    fn namespace(&self) -> &str {
        "std"
    }

    fn name(&self) -> &str {
        "wait"
    }

    fn description(&self) -> &str {
        "Waits, then reports the label"
    }

    fn invoke(
        &self,
        args: Vec<Literal>,
    ) -> impl Future<Output = ToolResult<String>> + Send + 'static {
        let parsed = argument(&args, 0, "label").and_then(|label| {
            let secs = argument(&args, 1, "seconds")?;
            let secs = secs.parse::<u64>().map_err(|_| {
                ToolError::invalid_input().with_reason("bad seconds")
            })?;
            Ok((label.as_str().to_owned(), secs))
        });
        async move {
            let (label, secs) = parsed?;
            sleep(Duration::from_secs(secs)).await;
            Ok(format!("{label} done"))
        }
    }
}

/// Remembers the agent it was attached to and whether it was closed.
#[derive(Clone, Default)]
struct LifecycleTool {
    agent: Arc<Mutex<Option<WeakAgent>>>,
    closed: Arc<AtomicBool>,
}

impl Tool for LifecycleTool {
    type Output = ();

    fn namespace(&self) -> &str {
        "life"
    }

    fn name(&self) -> &str {
        "cycle"
    }

    fn description(&self) -> &str {
        "Does nothing"
    }

    fn invoke(
        &self,
        _args: Vec<Literal>,
    ) -> impl Future<Output = ToolResult<()>> + Send + 'static {
        ready(Ok(()))
    }

    fn attach(&self, agent: WeakAgent) {
        *self.agent.lock().unwrap() = Some(agent);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct ExplodingError;

impl Display for ExplodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("exploded")
    }
}

impl Error for ExplodingError {}

impl BrainError for ExplodingError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// A brain with a bug.
struct ExplodingBrain;

impl Brain for ExplodingBrain {
    type Error = ExplodingError;

    fn send_request(
        &self,
        _req: &ModelRequest,
    ) -> impl Future<Output = Result<Message, Self::Error>> + Send + 'static
    {
        let explode = true;
        async move {
            if explode {
                panic!("brain exploded");
            }
            Err::<Message, _>(ExplodingError)
        }
    }
}

fn final_answer(answer: &str) -> PresetReply {
    PresetReply::text(structured_reply(None, None, Some(answer)))
}

fn last_message(request: &[Message]) -> &str {
    &request.last().unwrap().content
}

#[tokio::test]
async fn test_final_answer() {
    let brain = ScriptedBrain::with_replies([final_answer("3")]);
    let agent = AgentBuilder::with_brain(brain.clone())
        .with_name("demo")
        .with_system_prompt("You are good at math.")
        .with_prompt("Answer briefly.")
        .with_tool(AddTool::default())
        .build()
        .unwrap();
    assert_eq!(agent.name(), "demo");

    let answer = agent.chat("What is 1+2?", "s1").await;
    assert_eq!(answer, "3");

    let requests = brain.requests();
    assert_eq!(requests.len(), 1);
    let [system, user] = &requests[0][..] else {
        panic!("unexpected history: {:?}", requests[0]);
    };
    assert_eq!(system.role, Role::System);
    assert!(system.content.starts_with("Your name is: demo\n"));
    assert!(system.content.contains("You are good at math."));
    assert!(
        system
            .content
            .contains("0: namespace: math name: add description: Adds numbers")
    );
    assert!(system.content.contains("<final-answer>"));
    assert_eq!(user.role, Role::User);
    assert!(user.content.starts_with("now:"));
    assert!(user.content.ends_with("\nAnswer briefly.\nmsg:What is 1+2?"));
}

#[tokio::test]
async fn test_think_only_is_an_answer() {
    let brain = ScriptedBrain::with_replies([PresetReply::text(
        "<think>I think the answer is 4</think>",
    )]);
    let agent = AgentBuilder::with_brain(brain).build().unwrap();
    assert_eq!(agent.chat("2+2?", "").await, "I think the answer is 4");
}

#[tokio::test(start_paused = true)]
async fn test_malformed_reply_retries_once() {
    let brain = ScriptedBrain::with_replies([
        PresetReply::text("The answer is 3."),
        final_answer("3"),
    ]);
    let agent = AgentBuilder::with_brain(brain.clone()).build().unwrap();

    let start = Instant::now();
    assert_eq!(agent.chat("1+2?", "s").await, "3");
    // The first retry does not pause.
    assert_eq!(start.elapsed(), Duration::ZERO);

    let requests = brain.requests();
    assert_eq!(requests.len(), 2);
    let retry_prompt = last_message(&requests[1]);
    assert!(retry_prompt.starts_with(RETRY_PROMPT_PREFIX));
    assert!(retry_prompt.contains("<response>"));
    // The malformed reply stays in the history.
    assert_eq!(
        requests[1][requests[1].len() - 2],
        Message::assistant("The answer is 3.")
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_pauses_grow_and_cap() {
    let mut replies = vec![PresetReply::text("oops"); 6];
    replies.push(final_answer("finally"));
    let brain = ScriptedBrain::with_replies(replies);
    let agent = AgentBuilder::with_brain(brain.clone())
        .with_retry_unit(Duration::from_secs(1))
        .build()
        .unwrap();

    let start = Instant::now();
    assert_eq!(agent.chat("hi", "s").await, "finally");
    // 0 + 1 + 2 + 3 + 3 + 3 units.
    assert_eq!(start.elapsed(), Duration::from_secs(12));
    assert_eq!(brain.calls(), 7);
}

#[tokio::test(start_paused = true)]
async fn test_retry_pause_counts_tool_rounds() {
    let brain = ScriptedBrain::with_replies([
        PresetReply::text("<action>call:math.add(1)</action>"),
        PresetReply::text("garbage"),
        final_answer("1"),
    ]);
    let agent = AgentBuilder::with_brain(brain.clone())
        .with_tool(AddTool::default())
        .with_retry_unit(Duration::from_secs(1))
        .build()
        .unwrap();

    let start = Instant::now();
    assert_eq!(agent.chat("add", "s").await, "1");
    // The malformed reply arrives on the second iteration.
    assert_eq!(start.elapsed(), Duration::from_secs(1));
    assert_eq!(brain.calls(), 3);
}

#[tokio::test]
async fn test_action_takes_priority_over_final_answer() {
    let brain = ScriptedBrain::with_replies([
        PresetReply::text(structured_reply(
            Some("Let me compute it."),
            Some("call:math.add(1, 2)"),
            Some("premature"),
        )),
        final_answer("It is 3."),
    ]);
    let tool = AddTool::default();
    let agent = AgentBuilder::with_brain(brain.clone())
        .with_tool(tool.clone())
        .build()
        .unwrap();

    assert_eq!(agent.chat("1+2?", "s").await, "It is 3.");
    assert_eq!(tool.calls.load(Ordering::SeqCst), 1);

    let requests = brain.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        last_message(&requests[1]),
        "Your tool usage results:\nmath.add(1, 2) Call success: 3\n"
    );
}

#[tokio::test(start_paused = true)]
async fn test_tool_results_keep_directive_order() {
    let action = "call:wait(\"slow\", 5)\n\
                  call:math.add(1, x)\n\
                  call:std.wait('fast', 1)";
    let brain = ScriptedBrain::with_replies([
        PresetReply::text(structured_reply(None, Some(action), None)),
        final_answer("done"),
    ]);
    let agent = AgentBuilder::with_brain(brain.clone())
        .with_tool(AddTool::default())
        .with_tool(WaitTool)
        .build()
        .unwrap();

    let start = Instant::now();
    assert_eq!(agent.chat("go", "s").await, "done");
    assert_eq!(start.elapsed(), Duration::from_secs(5));

    let requests = brain.requests();
    let digest: Vec<&str> = last_message(&requests[1]).lines().collect();
    assert_eq!(
        digest,
        [
            "Your tool usage results:",
            "wait(\"slow\", 5) Call success: slow done",
            "Tool call format error, parsing failed, math.add(1, x), Error: \
             expected argument, got type: ident value: x, argument should be \
             int, string, bool or float",
            "std.wait('fast', 1) Call success: fast done",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion() {
    let brain = ScriptedBrain::with_replies([PresetReply::text("no tags")])
        .repeat_last();
    let agent = AgentBuilder::with_brain(brain.clone()).build().unwrap();

    assert_eq!(agent.chat("hi", "s").await, EXHAUSTED_MESSAGE);
    // The first reply plus one per iteration.
    assert_eq!(brain.calls(), 101);

    let result = agent.try_chat("hi", "s").await;
    assert_eq!(result, Err(ChatError::Exhausted { iterations: 100 }));
}

#[tokio::test]
async fn test_looping_tool_calls_are_capped() {
    let brain = ScriptedBrain::with_replies([PresetReply::text(
        "<action>call:math.add(1)</action>",
    )])
    .repeat_last();
    let tool = AddTool::default();
    let agent = AgentBuilder::with_brain(brain)
        .with_tool(tool.clone())
        .with_max_iterations(5)
        .build()
        .unwrap();

    assert_eq!(agent.chat("loop", "s").await, EXHAUSTED_MESSAGE);
    assert_eq!(tool.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_brain_failure_is_classified_as_reply() {
    let brain = ScriptedBrain::with_replies([
        PresetReply::failure("service unavailable"),
        PresetReply::failure("<final-answer>from the error</final-answer>"),
    ]);
    let agent = AgentBuilder::with_brain(brain.clone()).build().unwrap();

    assert_eq!(agent.chat("hi", "s").await, "from the error");
    let requests = brain.requests();
    assert_eq!(requests.len(), 2);
    assert!(
        requests[1].contains(&Message::assistant("service unavailable"))
    );
}

#[tokio::test]
async fn test_fault_is_contained() {
    let agent = AgentBuilder::with_brain(ExplodingBrain).build().unwrap();

    assert_eq!(agent.chat("hi", "s").await, FAULT_MESSAGE);
    let result = agent.try_chat("hi", "s").await;
    assert_eq!(result, Err(ChatError::Fault("brain exploded".to_owned())));
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let brain = ScriptedBrain::with_replies([
        final_answer("one"),
        final_answer("two"),
        final_answer("three"),
    ]);
    let memory = Arc::new(SimpleMemory::new(100, ""));
    let agent = AgentBuilder::with_brain(brain.clone())
        .with_memory(memory.clone())
        .build()
        .unwrap();

    assert_eq!(agent.chat("first", "alice").await, "one");
    assert_eq!(agent.chat("second", "bob").await, "two");
    assert_eq!(agent.chat("third", "alice").await, "three");

    let requests = brain.requests();
    assert_eq!(requests[1].len(), 2);
    assert_eq!(requests[2].len(), 4);
    assert_eq!(memory.history("alice").unwrap().len(), 5);
    assert_eq!(memory.history("bob").unwrap().len(), 3);
}

#[tokio::test]
async fn test_duplicate_tools_fail_the_build() {
    let result = AgentBuilder::with_brain(ScriptedBrain::default())
        .with_tool(AddTool::default())
        .with_tool(AddTool::default())
        .build();
    assert!(matches!(
        result,
        Err(BuildError::DuplicateTool(key)) if key == "math.add"
    ));
}

#[tokio::test]
async fn test_tool_lifecycle() {
    let tool = LifecycleTool::default();
    let agent = AgentBuilder::with_brain(ScriptedBrain::default())
        .with_name("host")
        .with_tool(tool.clone())
        .build()
        .unwrap();

    let attached = tool.agent.lock().unwrap().clone().unwrap();
    assert_eq!(attached.upgrade().unwrap().name(), "host");

    agent.close();
    assert!(tool.closed.load(Ordering::SeqCst));

    drop(agent);
    assert!(attached.upgrade().is_none());
}

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_injected_logger() {
    let capture = Capture::default();
    let logger = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .with_writer({
            let capture = capture.clone();
            move || capture.clone()
        })
        .finish();

    let brain = ScriptedBrain::with_replies([final_answer("42")]);
    let agent = AgentBuilder::with_brain(brain)
        .with_name("logged")
        .with_logger(logger)
        .build()
        .unwrap();
    agent.chat("hi", "s").await;

    let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("agent logged starting..."));
    assert!(output.contains("final answer: 42"));
}

#[tokio::test(start_paused = true)]
async fn test_agent_sweeps_idle_sessions() {
    let brain =
        ScriptedBrain::with_replies([final_answer("one"), final_answer("two")]);
    let agent = AgentBuilder::with_brain(brain.clone())
        .with_idle_timeout(Duration::from_secs(60))
        .build()
        .unwrap();

    assert_eq!(agent.chat("first", "s").await, "one");
    sleep(Duration::from_secs(125)).await;
    assert_eq!(agent.chat("second", "s").await, "two");

    // The session was evicted, so it starts over from the preamble.
    let requests = brain.requests();
    let [system, user] = &requests[1][..] else {
        panic!("unexpected history: {:?}", requests[1]);
    };
    assert_eq!(system.role, Role::System);
    assert!(user.content.ends_with("msg:second"));

    assert!(!agent.sweeper_finished());
    agent.close();
    sleep(Duration::from_millis(1)).await;
    assert!(agent.sweeper_finished());
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_logs_to_injected_logger() {
    let capture = Capture::default();
    let logger = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .with_writer({
            let capture = capture.clone();
            move || capture.clone()
        })
        .finish();

    let agent = AgentBuilder::with_brain(ScriptedBrain::default())
        .with_logger(logger)
        .build()
        .unwrap();
    sleep(Duration::from_millis(1)).await;
    agent.close();
    sleep(Duration::from_millis(1)).await;
    assert!(agent.sweeper_finished());

    let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
    let sweeper_lines: Vec<&str> = output
        .lines()
        .filter(|line| line.contains("memory sweeper"))
        .collect();
    assert_eq!(sweeper_lines.len(), 2, "{output}");
    assert!(sweeper_lines[0].ends_with("started"));
    assert!(sweeper_lines[1].ends_with("will terminate"));
}
