//! Agent
//!
//! A dedicated OS thread running a prioritized task loop. Everything that
//! touches an environment's VM runs on that environment's agent.
//!
//! # Lifecycle
//!
//! `Created → Running → Stopping → Stopped`. [`Agent::stop`] rejects new
//! submissions, lets the queue drain, then exits the loop. Delayed tasks
//! that are not yet due when the queue drains are discarded.
//!
//! # Ordering
//!
//! Higher [`Priority`] runs first; within a priority, submission order is
//! preserved. A running task is never preempted.

mod queue;
mod state;

pub use queue::Priority;
pub use state::AgentState;

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::sync_channel;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tokio::sync::oneshot;

use crate::error::AgentError;
use crate::platform::ExecutionPlatform;
use crate::ref_counted::{Ref, RefCounted, SelfRef};

use queue::{Task, TaskQueue};

// ─────────────────────────────────────────────────────────────────────────────
// Shared loop state
// ─────────────────────────────────────────────────────────────────────────────

struct Shared {
    name: String,
    queue: Mutex<TaskQueue>,
    wakeup: Condvar,
    /// Written only while `queue` is locked, so submissions and stop
    /// requests are totally ordered
    state: AtomicU8,
}

impl Shared {
    fn state(&self) -> AgentState {
        AgentState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: AgentState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────────────────────────────────────

pub struct Agent {
    self_ref: SelfRef<Agent>,
    shared: Arc<Shared>,
    platform: ExecutionPlatform,
    thread_id: ThreadId,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl RefCounted for Agent {
    fn self_ref(&self) -> &SelfRef<Self> {
        &self.self_ref
    }
}

impl Agent {
    /// Start an agent thread named `name`.
    ///
    /// Returns once the loop is running.
    pub fn spawn(
        name: impl Into<String>,
        platform: ExecutionPlatform,
    ) -> Result<Ref<Agent>, AgentError> {
        let name = name.into();
        tracing::debug!("[agent:{}] Spawning", name);

        let shared = Arc::new(Shared {
            name: name.clone(),
            queue: Mutex::new(TaskQueue::default()),
            wakeup: Condvar::new(),
            state: AtomicU8::new(AgentState::Created as u8),
        });

        let (init_tx, init_rx) = sync_channel::<()>(1);
        let thread_shared = shared.clone();
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                {
                    let _queue = thread_shared.queue.lock();
                    thread_shared.set_state(AgentState::Running);
                }
                let _ = init_tx.send(());
                run_loop(&thread_shared);
            })
            .map_err(|e| AgentError::SpawnFailed(e.to_string()))?;

        init_rx.recv().map_err(|_| {
            AgentError::SpawnFailed(format!("agent '{}' exited during start-up", name))
        })?;

        let thread_id = thread.thread().id();
        tracing::debug!("[agent:{}] Running", name);

        Ok(Ref::create(|self_ref| Agent {
            self_ref,
            shared,
            platform,
            thread_id,
            thread: Mutex::new(Some(thread)),
        }))
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> AgentState {
        self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Whether the calling thread is this agent's thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    pub fn platform(&self) -> &ExecutionPlatform {
        &self.platform
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Submission
    // ─────────────────────────────────────────────────────────────────────────

    fn enqueue(&self, priority: Priority, task: Task) -> Result<(), AgentError> {
        let mut queue = self.shared.queue.lock();
        if !self.shared.state().is_running() {
            return Err(AgentError::NotRunning(self.shared.name.clone()));
        }
        queue.push(priority, task);
        drop(queue);

        tracing::trace!(agent = %self.shared.name, ?priority, "Task queued");
        self.shared.wakeup.notify_one();
        Ok(())
    }

    /// Run `task` on the agent and wait for its result.
    ///
    /// Called from the agent's own thread, the task runs inline. Otherwise
    /// it is queued at [`Priority::Now`]. A panic inside the task is
    /// resumed on the calling thread.
    pub fn run_now_blocking<F, R>(&self, task: F) -> Result<R, AgentError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_current() {
            return Ok(task());
        }

        let (tx, rx) = sync_channel(1);
        self.enqueue(
            Priority::Now,
            Box::new(move || {
                let _ = tx.send(panic::catch_unwind(AssertUnwindSafe(task)));
            }),
        )?;

        match rx.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(_) => Err(AgentError::TaskDropped(self.shared.name.clone())),
        }
    }

    pub fn run_later<F>(&self, task: F) -> Result<(), AgentError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Priority::Normal, Box::new(task))
    }

    pub fn run_with_priority<F>(&self, task: F, priority: Priority) -> Result<(), AgentError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(priority, Box::new(task))
    }

    /// Run `task` at normal priority no earlier than `delay` from now.
    pub fn run_after<F>(&self, task: F, delay: Duration) -> Result<(), AgentError>
    where
        F: FnOnce() + Send + 'static,
    {
        let deadline = Instant::now() + delay;
        let mut queue = self.shared.queue.lock();
        if !self.shared.state().is_running() {
            return Err(AgentError::NotRunning(self.shared.name.clone()));
        }
        queue.push_delayed(deadline, Box::new(task));
        drop(queue);

        tracing::trace!(agent = %self.shared.name, ?delay, "Delayed task queued");
        self.shared.wakeup.notify_one();
        Ok(())
    }

    /// Queue `task` and get a future for its result.
    pub fn run_async<F, R>(
        &self,
        task: F,
    ) -> impl Future<Output = Result<R, AgentError>> + Send + 'static
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let name = self.shared.name.clone();
        let submitted = self.run_later(move || {
            let _ = tx.send(task());
        });

        async move {
            submitted?;
            rx.await.map_err(|_| AgentError::TaskDropped(name))
        }
    }

    /// Run `task` on the shared execution platform, off the agent thread.
    pub fn run_in_background<F, R>(&self, task: F) -> Result<tokio::task::JoinHandle<R>, AgentError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if !self.is_running() {
            return Err(AgentError::NotRunning(self.shared.name.clone()));
        }
        Ok(self.platform.spawn_blocking(task))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Shutdown
    // ─────────────────────────────────────────────────────────────────────────

    /// Stop accepting work and exit once the queue drains.
    pub fn stop(&self) {
        let queue = self.shared.queue.lock();
        if self.shared.state() == AgentState::Running {
            self.shared.set_state(AgentState::Stopping);
            tracing::debug!(
                "[agent:{}] Stopping with {} queued tasks",
                self.shared.name,
                queue.ready_len()
            );
        }
        drop(queue);
        self.shared.wakeup.notify_all();
    }

    /// Wait for the loop to exit. No-op on the agent's own thread.
    pub fn join(&self) {
        if self.is_current() {
            return;
        }
        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("[agent:{}] Thread panicked", self.shared.name);
            }
        }
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        self.stop();
        // Dropped from inside one of its own tasks: the thread exits on its
        // own after draining
        self.join();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loop
// ─────────────────────────────────────────────────────────────────────────────

fn run_loop(shared: &Shared) {
    loop {
        let next = {
            let mut queue = shared.queue.lock();
            loop {
                queue.promote_due(Instant::now());
                if let Some(task) = queue.pop() {
                    break Some(task);
                }
                if shared.state() != AgentState::Running {
                    break None;
                }
                match queue.next_deadline() {
                    Some(deadline) => {
                        shared.wakeup.wait_until(&mut queue, deadline);
                    }
                    None => shared.wakeup.wait(&mut queue),
                }
            }
        };

        let Some(task) = next else { break };
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
            tracing::error!(
                "[agent:{}] Task panicked: {}",
                shared.name,
                panic_message(payload.as_ref())
            );
        }
    }

    let mut queue = shared.queue.lock();
    let discarded = queue.clear_delayed();
    shared.set_state(AgentState::Stopped);
    drop(queue);

    if discarded > 0 {
        tracing::warn!("[agent:{}] Discarded {} delayed tasks on stop", shared.name, discarded);
    }
    tracing::debug!("[agent:{}] Stopped", shared.name);
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic>"
    }
}
