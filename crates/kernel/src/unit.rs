use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::gate::Gate;
use crate::gateway::UserApi;
use crate::trap::Reply;

/// The body a process runs: named, runs once, reaches cooperation points
/// through the [`UserApi`] it is handed.
pub struct Program {
    name: String,
    body: Box<dyn FnOnce(&UserApi) + Send + 'static>,
}

impl Program {
    pub fn new(name: impl Into<String>, body: impl FnOnce(&UserApi) + Send + 'static) -> Self {
        Self {
            name: name.into(),
            body: Box::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_body(self) -> Box<dyn FnOnce(&UserApi) + Send + 'static> {
        self.body
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program").field("name", &self.name).finish()
    }
}

/// Host-thread half of a process: the run-gate the kernel resumes it
/// through, the advisory preemption flag, and the slot a syscall reply is
/// parked in while the caller is suspended.
///
/// The reply lives here rather than in the shared trap relay because the
/// relay is only valid for one trap: a switched-out caller may not be
/// resumed until several other traps have been processed, and by then the
/// relay belongs to someone else.
pub struct ExecutionUnit {
    gate: Gate,
    preempt: AtomicBool,
    done: AtomicBool,
    reply: Mutex<Option<Reply>>,
}

impl ExecutionUnit {
    pub fn new() -> Self {
        Self {
            gate: Gate::new(),
            preempt: AtomicBool::new(false),
            done: AtomicBool::new(false),
            reply: Mutex::new(None),
        }
    }

    /// Open the run-gate so the unit's thread proceeds. Kernel-side only;
    /// this is the single place a process transitions into running.
    pub fn resume(&self) {
        self.gate.signal();
    }

    /// Close our own gate and block until the kernel resumes us.
    pub fn park(&self) {
        self.gate.wait();
    }

    /// Set the preemption-request flag. Advisory: the unit acts on it at
    /// its next cooperation point.
    pub fn request_stop(&self) {
        self.preempt.store(true, Ordering::SeqCst);
    }

    /// Consume the preemption-request flag if set.
    pub fn take_preempt(&self) -> bool {
        self.preempt.swap(false, Ordering::SeqCst)
    }

    /// Whether the unit's underlying execution has permanently ended.
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Mark the unit terminated and wake anyone waiting for it to stop.
    pub fn mark_done(&self) {
        self.done.store(true, Ordering::SeqCst);
        self.gate.notify_observers();
    }

    /// Whether the unit is provably not running: blocked in `park`.
    pub fn is_stopped(&self) -> bool {
        self.gate.is_parked()
    }

    /// Synchronous stop: request preemption, then block until the unit has
    /// voluntarily parked or exited. Does not return while the unit could
    /// still be executing application logic.
    pub fn stop_wait(&self) {
        self.request_stop();
        self.gate.wait_until_parked(|| self.is_done());
    }

    pub(crate) fn post_reply(&self, reply: Reply) {
        *self.reply.lock().expect("reply slot poisoned") = Some(reply);
    }

    pub(crate) fn take_reply(&self) -> Option<Reply> {
        self.reply.lock().expect("reply slot poisoned").take()
    }
}

impl Default for ExecutionUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExecutionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionUnit")
            .field("done", &self.is_done())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
