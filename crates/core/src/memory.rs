//! Session-scoped conversation history.
//!
//! Every session starts with the system preamble as its first message. That
//! message is never evicted, neither by history bounding nor by clearing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tactic_model::Message;
use tokio::select;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::Instrument;
use tracing::instrument::WithSubscriber;

/// The key of the default session, which holds the system preamble.
pub const DEFAULT_SESSION: &str = "";

/// Default bound of a session history, including the preamble.
pub const DEFAULT_MAX_HISTORY: usize = 100;

/// Default idle time after which a session is evicted.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Storage of conversation histories, keyed by session.
///
/// Implementations must make every operation atomic with respect to the
/// others: no caller may observe a partially updated history.
pub trait Memory: Send + Sync {
    /// Appends `msg` to the session, creating it if needed, and returns the
    /// bounded history including `msg`.
    fn append_and_fetch(&self, msg: Message, session: &str) -> Vec<Message>;

    /// Appends `msg` to the session, creating it if needed.
    fn append(&self, msg: Message, session: &str);

    /// Replaces the system preamble that new sessions start with.
    fn set_system(&self, text: &str);

    /// Truncates the session to its preamble. Clearing the default session
    /// drops every other session.
    fn clear(&self, session: &str);
}

struct SessionBuffer {
    messages: Vec<Message>,
    last_used: Instant,
}

struct Buffers {
    system: Message,
    sessions: HashMap<String, SessionBuffer>,
}

impl Buffers {
    fn new(system: Message) -> Self {
        let mut buffers = Self {
            system,
            sessions: HashMap::new(),
        };
        buffers.reset();
        buffers
    }

    fn reset(&mut self) {
        self.sessions.clear();
        self.sessions.insert(
            DEFAULT_SESSION.to_owned(),
            SessionBuffer {
                messages: vec![self.system.clone()],
                last_used: Instant::now(),
            },
        );
    }

    /// Returns the session, creating it from the current preamble if needed.
    fn session(&mut self, key: &str) -> &mut SessionBuffer {
        let Self { system, sessions } = self;
        let now = Instant::now();
        let session = sessions.entry(key.to_owned()).or_insert_with(|| {
            trace!("creating session {key:?}");
            SessionBuffer {
                messages: vec![system.clone()],
                last_used: now,
            }
        });
        session.last_used = now;
        session
    }
}

/// An in-process [`Memory`] bounded by history length.
///
/// Idle sessions are only evicted when [`SimpleMemory::sweep_idle`] runs,
/// usually from a sweeper started with [`SimpleMemory::spawn_sweeper`].
pub struct SimpleMemory {
    max_history: usize,
    buffers: Mutex<Buffers>,
}

impl SimpleMemory {
    /// Creates a memory whose sessions keep at most `max_history` messages,
    /// including the preamble. `0` disables bounding.
    pub fn new<S: Into<String>>(max_history: usize, system: S) -> Self {
        Self {
            max_history,
            buffers: Mutex::new(Buffers::new(Message::system(system))),
        }
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, Buffers> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push_bounded(&self, session: &mut SessionBuffer, msg: Message) {
        session.messages.push(msg);
        let len = session.messages.len();
        if self.max_history > 0 && len > self.max_history {
            session.messages.drain(1..=len - self.max_history);
        }
    }

    /// Returns the number of live sessions, the default one included.
    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Returns a snapshot of the session history, if the session exists.
    pub fn history(&self, session: &str) -> Option<Vec<Message>> {
        self.lock()
            .sessions
            .get(session)
            .map(|buffer| buffer.messages.clone())
    }

    /// Evicts every session idle for longer than `max_idle`, except the
    /// default one. Returns how many sessions were evicted.
    pub fn sweep_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut buffers = self.lock();
        let before = buffers.sessions.len();
        buffers.sessions.retain(|key, session| {
            key == DEFAULT_SESSION
                || now.duration_since(session.last_used) <= max_idle
        });
        before - buffers.sessions.len()
    }

    /// Starts a background task that calls [`SimpleMemory::sweep_idle`]
    /// every `period`.
    ///
    /// The task only holds a weak reference, so it ends by itself once the
    /// memory is dropped. It also ends when the returned [`Sweeper`] is
    /// stopped or dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        period: Duration,
        max_idle: Duration,
    ) -> Sweeper {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(
            run_sweeper(Arc::downgrade(self), period, max_idle, stop_rx)
                .instrument(debug_span!("memory sweeper"))
                .with_current_subscriber(),
        );
        Sweeper { stop_tx, task }
    }
}

impl Memory for SimpleMemory {
    fn append_and_fetch(&self, msg: Message, session: &str) -> Vec<Message> {
        let mut buffers = self.lock();
        let buffer = buffers.session(session);
        self.push_bounded(buffer, msg);
        buffer.messages.clone()
    }

    fn append(&self, msg: Message, session: &str) {
        let mut buffers = self.lock();
        let buffer = buffers.session(session);
        self.push_bounded(buffer, msg);
    }

    fn set_system(&self, text: &str) {
        let mut buffers = self.lock();
        let system = Message::system(text);
        buffers.system = system.clone();
        let default = buffers.session(DEFAULT_SESSION);
        default.messages[0] = system;
    }

    fn clear(&self, session: &str) {
        let mut buffers = self.lock();
        if session == DEFAULT_SESSION {
            buffers.reset();
        } else if let Some(buffer) = buffers.sessions.get_mut(session) {
            buffer.messages.truncate(1);
        }
    }
}

async fn run_sweeper(
    memory: Weak<SimpleMemory>,
    period: Duration,
    max_idle: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    debug!("started");
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        select! {
            biased;

            _ = stop_rx.changed() => break,
            _ = ticker.tick() => {}
        }

        let Some(memory) = memory.upgrade() else {
            break;
        };
        let evicted = memory.sweep_idle(max_idle);
        if evicted > 0 {
            debug!("evicted {evicted} idle sessions");
        }
    }
    debug!("will terminate");
}

/// Handle to a running sweeper. Dropping it stops the sweeper.
pub struct Sweeper {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Sweeper {
    /// Asks the sweeper to stop. It quits before its next sweep.
    #[inline]
    pub fn stop(&self) {
        self.stop_tx.send(true).ok();
    }

    /// Returns `true` if the sweeper task has ended.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.task.abort();
    }
}
