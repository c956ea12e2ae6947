//! Fixed-size worker pool with completion-order harvesting.
//!
//! Work runs on a `rayon` thread pool. Each segment opens a
//! [`CompletionService`] on the pool: `submit` never blocks, `take` blocks
//! until whichever submitted unit finishes next. Dropping or shutting down the
//! pool waits for every in-flight unit; nothing is ever cancelled.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use pbuild_core::{BuildError, InterruptSignal};
use tracing::{debug, info};

const DEFAULT_HARVEST_POLL: Duration = Duration::from_millis(100);

/// `min(requested, total_modules)`, never below 1.
pub fn degree_of_concurrency(requested: i64, total_modules: usize) -> usize {
    let total = i64::try_from(total_modules).unwrap_or(i64::MAX);
    requested.min(total).max(1) as usize
}

// ── In-flight accounting ──────────────────────────────────────

#[derive(Debug, Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(self: &Arc<Self>) -> InFlightTicket {
        *self.lock() += 1;
        InFlightTicket(Arc::clone(self))
    }

    fn count(&self) -> usize {
        *self.lock()
    }

    fn wait_idle(&self) {
        let mut count = self.lock();
        while *count > 0 {
            count = self
                .idle
                .wait(count)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }
}

/// Held by a queued or running unit; released when the unit is done.
struct InFlightTicket(Arc<InFlight>);

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        let mut count = self.0.lock();
        *count -= 1;
        if *count == 0 {
            self.0.idle.notify_all();
        }
    }
}

// ── Pool ──────────────────────────────────────────────────────

pub struct WorkerPool {
    pool: rayon::ThreadPool,
    threads: usize,
    in_flight: Arc<InFlight>,
    harvest_poll: Duration,
    interrupt: InterruptSignal,
}

impl WorkerPool {
    /// Start `threads` workers (at least one), named `pbuild-worker-{i}`.
    pub fn new(threads: usize) -> Result<Self, BuildError> {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("pbuild-worker-{}", i))
            .build()
            .map_err(|e| BuildError::WorkerPool(e.to_string()))?;
        debug!("Worker pool started with {} threads", threads);
        Ok(Self {
            pool,
            threads,
            in_flight: Arc::new(InFlight::default()),
            harvest_poll: DEFAULT_HARVEST_POLL,
            interrupt: InterruptSignal::new(),
        })
    }

    /// Interval at which a blocked `take` re-checks the interrupt signal.
    pub fn with_harvest_poll(mut self, poll: Duration) -> Self {
        self.harvest_poll = poll.max(Duration::from_millis(1));
        self
    }

    pub fn with_interrupt(mut self, interrupt: InterruptSignal) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Units submitted and not yet finished, across all completion services.
    pub fn in_flight(&self) -> usize {
        self.in_flight.count()
    }

    pub fn completion_service<T: Send + 'static>(&self) -> CompletionService<'_, T> {
        let (tx, rx) = mpsc::channel();
        CompletionService {
            pool: self,
            tx,
            rx,
            next_id: 0,
            pending: 0,
        }
    }

    /// Refuse further work and wait, unbounded, for in-flight units.
    pub fn shutdown(self) {
        let in_flight = self.in_flight();
        if in_flight > 0 {
            info!("Waiting for {} in-flight module builds to finish", in_flight);
        }
        // Drop does the waiting.
    }

    fn await_termination(&self) {
        self.in_flight.wait_idle();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.await_termination();
        debug!("Worker pool terminated");
    }
}

// ── Completion service ────────────────────────────────────────

/// Identifies one submitted unit of a [`CompletionService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(usize);

impl TaskHandle {
    /// Submission index within its completion service.
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug)]
pub enum TaskOutcome<T> {
    Finished(T),
    /// The unit panicked; the worker survived.
    Panicked(String),
}

#[derive(Debug)]
pub struct Completed<T> {
    pub handle: TaskHandle,
    pub outcome: TaskOutcome<T>,
}

/// Submission and completion-order harvesting on top of a [`WorkerPool`].
pub struct CompletionService<'p, T> {
    pool: &'p WorkerPool,
    tx: mpsc::Sender<Completed<T>>,
    rx: mpsc::Receiver<Completed<T>>,
    next_id: usize,
    pending: usize,
}

impl<'p, T: Send + 'static> CompletionService<'p, T> {
    /// Enqueue `task`; returns immediately.
    pub fn submit<F>(&mut self, task: F) -> TaskHandle
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let handle = TaskHandle(self.next_id);
        self.next_id += 1;
        self.pending += 1;

        let ticket = self.pool.in_flight.enter();
        let tx = self.tx.clone();
        self.pool.pool.spawn(move || {
            let _ticket = ticket;
            let outcome = match panic::catch_unwind(AssertUnwindSafe(task)) {
                Ok(value) => TaskOutcome::Finished(value),
                Err(payload) => TaskOutcome::Panicked(panic_message(payload.as_ref())),
            };
            // The receiver may be gone if the segment stopped harvesting.
            let _ = tx.send(Completed { handle, outcome });
        });
        handle
    }

    /// Submitted units not yet returned by `take`.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Block until the next unit finishes, in completion order.
    ///
    /// Returns `Ok(None)` once everything submitted has been harvested, and
    /// [`BuildError::Interrupted`] if the interrupt signal is raised while
    /// waiting.
    pub fn take(&mut self) -> Result<Option<Completed<T>>, BuildError> {
        if self.pending == 0 {
            return Ok(None);
        }
        loop {
            if self.pool.interrupt.is_interrupted() {
                return Err(BuildError::Interrupted);
            }
            match self.rx.recv_timeout(self.pool.harvest_poll) {
                Ok(completed) => {
                    self.pending -= 1;
                    return Ok(Some(completed));
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(BuildError::Interrupted),
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
