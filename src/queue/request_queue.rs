//! Bounded-concurrency FIFO request queue.

use crate::{Error, ErrorContext, Result};
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub max_concurrency: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { max_concurrency: 5 }
    }
}

impl QueueConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Tasks waiting for a slot.
    pub queued: usize,
    /// Tasks admitted and not yet finished.
    pub processing: usize,
    pub max_concurrency: usize,
    pub completed: u64,
    /// Tasks dropped by `clear`/`close` before they started.
    pub dropped: u64,
}

/// Events that drive dispatch. Each one triggers exactly one dispatch pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueEvent {
    TaskEnqueued,
    /// The admitted task was polled for the first time.
    TaskStarted,
    TaskCompleted,
    /// The admitted task was dropped before its first poll.
    TaskAbandoned,
    /// The admitted task was dropped mid-flight, which only happens when its
    /// runtime shuts down.
    TaskCancelled,
}

struct QueuedTask {
    id: u64,
    /// Runs the caller's work and delivers the outcome through its channel.
    /// Dropping it unstarted closes the channel, which the caller sees as cancellation.
    work: BoxFuture<'static, ()>,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<QueuedTask>,
    in_flight: usize,
    /// An admitted task has been spawned but not yet polled. Nothing else is
    /// admitted until it starts, so start order equals arrival order even on
    /// schedulers that run the newest spawn first.
    starting: bool,
    next_id: u64,
    closed: bool,
    completed: u64,
    dropped: u64,
}

impl QueueState {
    fn drain_pending(&mut self) -> Vec<QueuedTask> {
        let drained: Vec<QueuedTask> = self.pending.drain(..).collect();
        self.dropped += drained.len() as u64;
        drained
    }
}

struct Inner {
    max_concurrency: usize,
    state: Mutex<QueueState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // bookkeeping never panics mid-update, so a poisoned state is still consistent
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply `event` and run one dispatch pass.
    ///
    /// A pass admits at most one task. The next admission happens when that
    /// task reports `TaskStarted`. Spawning and dropping of discarded work
    /// both happen after the lock is released, since either can re-enter
    /// `handle` through a `CompletionGuard`.
    fn handle(self: &Arc<Self>, event: QueueEvent) {
        let runtime = Handle::try_current().ok();
        let (admitted, discarded) = {
            let mut st = self.lock();
            let mut discarded = Vec::new();
            match event {
                QueueEvent::TaskEnqueued => {}
                QueueEvent::TaskStarted => st.starting = false,
                QueueEvent::TaskCompleted => {
                    st.in_flight = st.in_flight.saturating_sub(1);
                    st.completed += 1;
                }
                QueueEvent::TaskAbandoned | QueueEvent::TaskCancelled => {
                    st.in_flight = st.in_flight.saturating_sub(1);
                    if event == QueueEvent::TaskAbandoned {
                        st.starting = false;
                    }
                    // the runtime is going away: stop dispatching for good
                    st.closed = true;
                    discarded = st.drain_pending();
                    debug!(?event, dropped = discarded.len(), "queue halted");
                }
            }

            let mut admitted = None;
            if runtime.is_some()
                && !st.closed
                && !st.starting
                && st.in_flight < self.max_concurrency
            {
                if let Some(task) = st.pending.pop_front() {
                    st.in_flight += 1;
                    st.starting = true;
                    debug!(
                        task_id = task.id,
                        in_flight = st.in_flight,
                        queued = st.pending.len(),
                        ?event,
                        "task admitted"
                    );
                    admitted = Some(task);
                }
            }
            (admitted, discarded)
        };
        drop(discarded);

        if let (Some(task), Some(runtime)) = (admitted, runtime) {
            let mut guard = CompletionGuard {
                inner: Arc::clone(self),
                phase: Phase::Admitted,
            };
            runtime.spawn(async move {
                guard.phase = Phase::Running;
                guard.inner.handle(QueueEvent::TaskStarted);
                task.work.await;
                guard.phase = Phase::Finished;
            });
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Admitted,
    Running,
    Finished,
}

/// Reports how an admitted task ended, including by panic.
struct CompletionGuard {
    inner: Arc<Inner>,
    phase: Phase,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let event = match self.phase {
            Phase::Admitted => QueueEvent::TaskAbandoned,
            Phase::Running if !std::thread::panicking() => QueueEvent::TaskCancelled,
            Phase::Running | Phase::Finished => QueueEvent::TaskCompleted,
        };
        self.inner.handle(event);
    }
}

/// Admits queued work in strict arrival order up to a fixed parallelism ceiling.
///
/// A task's failure is delivered only to its own caller; siblings keep running
/// and dispatch continues. Requires a tokio runtime.
#[derive(Clone)]
pub struct RequestQueue {
    inner: Arc<Inner>,
}

impl RequestQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                max_concurrency: config.max_concurrency.max(1),
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    /// Queue `work` and wait for its outcome.
    pub async fn enqueue<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let id = {
            let mut st = self.inner.lock();
            if st.closed {
                return Err(Error::cancelled("request queue is closed")
                    .with_context(ErrorContext::new().with_source("request_queue")));
            }
            let id = st.next_id;
            st.next_id += 1;
            st.pending.push_back(QueuedTask {
                id,
                work: Box::pin(async move {
                    let _ = tx.send(work.await);
                }),
            });
            id
        };
        self.inner.handle(QueueEvent::TaskEnqueued);

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::cancelled("task dropped before producing a result").with_context(
                ErrorContext::new()
                    .with_source("request_queue")
                    .with_details(format!("task_id: {}", id)),
            )),
        }
    }

    /// Drop every task that has not started yet. In-flight tasks are unaffected.
    pub fn clear(&self) -> usize {
        let dropped = self.inner.lock().drain_pending();
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "dropped pending tasks");
        }
        dropped.len()
    }

    /// Reject further work and drop everything still pending.
    pub fn close(&self) -> usize {
        self.inner.lock().closed = true;
        self.clear()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn stats(&self) -> QueueStats {
        let st = self.inner.lock();
        QueueStats {
            queued: st.pending.len(),
            processing: st.in_flight,
            max_concurrency: self.inner.max_concurrency,
            completed: st.completed,
            dropped: st.dropped,
        }
    }
}
