//! Shared run state: sessions, the error sink, and halt/interrupt signals.
//!
//! Every type here is handed around explicitly behind an `Arc`; nothing is
//! process-global.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::BuildError;

// ── Signals ───────────────────────────────────────────────────

/// Shared stop flag. Once set, no further work is submitted.
///
/// Clones share the same underlying cell.
#[derive(Debug, Clone, Default)]
pub struct HaltSignal(Arc<AtomicBool>);

impl HaltSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn halt(&self) {
        if !self.0.swap(true, Ordering::SeqCst) {
            debug!("halt signal raised");
        }
    }

    pub fn is_halted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Environment-level shutdown request for the orchestrating thread.
///
/// Unlike [`HaltSignal`] this aborts the blocking wait on results and makes
/// the build return [`BuildError::Interrupted`].
#[derive(Debug, Clone, Default)]
pub struct InterruptSignal(Arc<AtomicBool>);

impl InterruptSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Result sink ───────────────────────────────────────────────

/// Append-only collector of build failures shared by all sessions of a run.
#[derive(Debug, Default)]
pub struct BuildResult {
    exceptions: Mutex<Vec<BuildError>>,
}

impl BuildResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_exception(&self, error: BuildError) {
        warn!(error = %error, "recording build failure");
        self.lock().push(error);
    }

    pub fn has_exceptions(&self) -> bool {
        !self.lock().is_empty()
    }

    pub fn exception_count(&self) -> usize {
        self.lock().len()
    }

    /// Message of the first recorded failure; the build's failure cause.
    pub fn first_failure(&self) -> Option<String> {
        self.lock().first().map(|e| e.to_string())
    }

    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|e| e.to_string()).collect()
    }

    /// Drain all recorded errors.
    pub fn take_exceptions(&self) -> Vec<BuildError> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<BuildError>> {
        // A poisoned sink still holds valid errors.
        self.exceptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ── Sessions ──────────────────────────────────────────────────

/// Execution context handed to the module executor.
///
/// The root session and every per-module session of a run point at the same
/// [`BuildResult`].
#[derive(Debug)]
pub struct Session {
    id: String,
    parallel: AtomicBool,
    result: Arc<BuildResult>,
}

impl Session {
    /// A fresh root session with its own result sink.
    pub fn root() -> Arc<Self> {
        Arc::new(Self {
            id: format!("root-{}", Uuid::new_v4()),
            parallel: AtomicBool::new(false),
            result: Arc::new(BuildResult::new()),
        })
    }

    /// A session derived from this one that shares its result sink.
    pub fn fork(&self, id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            parallel: AtomicBool::new(self.is_parallel()),
            result: Arc::clone(&self.result),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel.load(Ordering::SeqCst)
    }

    /// Informational flag consumed by executors; the scheduler never reads it.
    pub fn set_parallel(&self, parallel: bool) {
        self.parallel.store(parallel, Ordering::SeqCst);
    }

    pub fn result(&self) -> &Arc<BuildResult> {
        &self.result
    }
}

// ── Reactor ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ReactorBuildStatus {
    halt: HaltSignal,
}

impl ReactorBuildStatus {
    pub fn new(halt: HaltSignal) -> Self {
        Self { halt }
    }

    pub fn halt(&self) {
        self.halt.halt();
    }

    pub fn is_halted(&self) -> bool {
        self.halt.is_halted()
    }

    pub fn halt_signal(&self) -> &HaltSignal {
        &self.halt
    }
}

/// Reactor-wide context shared by every unit of work in a run.
#[derive(Debug, Clone, Default)]
pub struct ReactorContext {
    status: ReactorBuildStatus,
    interrupt: InterruptSignal,
}

impl ReactorContext {
    pub fn new(halt: HaltSignal, interrupt: InterruptSignal) -> Self {
        Self {
            status: ReactorBuildStatus::new(halt),
            interrupt,
        }
    }

    pub fn build_status(&self) -> &ReactorBuildStatus {
        &self.status
    }

    pub fn interrupt_signal(&self) -> &InterruptSignal {
        &self.interrupt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleId;

    #[test]
    fn halt_signal_clones_share_state() {
        let halt = HaltSignal::new();
        let other = halt.clone();
        assert!(!other.is_halted());
        halt.halt();
        assert!(other.is_halted());
    }

    #[test]
    fn forked_sessions_share_result_sink() {
        let root = Session::root();
        let child = root.fork("g:a");
        child.result().add_exception(BuildError::ModulePanicked {
            module: ModuleId::new("g", "a"),
            message: "boom".to_string(),
        });
        assert_eq!(root.result().exception_count(), 1);
        assert_eq!(
            root.result().first_failure().as_deref(),
            Some("Build of g:a panicked: boom")
        );
    }

    #[test]
    fn fork_inherits_parallel_flag_but_not_later_changes() {
        let root = Session::root();
        root.set_parallel(true);
        let child = root.fork("child");
        assert!(child.is_parallel());
        root.set_parallel(false);
        assert!(child.is_parallel());
    }

    #[test]
    fn take_exceptions_drains() {
        let result = BuildResult::new();
        result.add_exception(BuildError::Interrupted);
        assert!(result.has_exceptions());
        assert_eq!(result.take_exceptions().len(), 1);
        assert!(!result.has_exceptions());
    }

    #[test]
    fn reactor_status_exposes_shared_halt() {
        let halt = HaltSignal::new();
        let reactor = ReactorContext::new(halt.clone(), InterruptSignal::new());
        reactor.build_status().halt();
        assert!(halt.is_halted());
        assert!(!reactor.interrupt_signal().is_interrupted());
    }
}
