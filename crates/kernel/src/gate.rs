use std::sync::{Condvar, Mutex};

struct GateState {
    /// Whether the gate currently holds its single permit.
    permit: bool,
    /// Whether the owning thread is blocked inside `wait`.
    parked: bool,
}

/// Binary run-gate: a one-permit semaphore built from a mutex and a condvar.
///
/// Every execution unit owns one. The kernel opens the gate to resume the
/// unit; the unit closes it again by consuming the permit on its way out of
/// `wait`. `parked` makes stopping synchronous: an observer can block until
/// the owning thread is provably inside `wait` and therefore not running
/// any application logic.
///
/// A poisoned mutex or condvar here means a thread died mid-handshake,
/// which is an unrecoverable fault, so every lock is `expect`ed.
pub struct Gate {
    state: Mutex<GateState>,
    cond: Condvar,
}

impl Gate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                permit: false,
                parked: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Open the gate. Saturates at one permit; signalling an already open
    /// gate is a no-op.
    pub fn signal(&self) {
        let mut state = self.state.lock().expect("gate poisoned");
        state.permit = true;
        self.cond.notify_all();
    }

    /// Block until the gate is opened, then consume the permit.
    pub fn wait(&self) {
        let mut state = self.state.lock().expect("gate poisoned");
        state.parked = true;
        self.cond.notify_all();
        while !state.permit {
            state = self.cond.wait(state).expect("gate poisoned");
        }
        state.permit = false;
        state.parked = false;
    }

    /// Whether the gate holds no permit.
    pub fn is_closed(&self) -> bool {
        !self.state.lock().expect("gate poisoned").permit
    }

    /// Whether the owning thread is currently blocked in `wait`.
    pub fn is_parked(&self) -> bool {
        self.state.lock().expect("gate poisoned").parked
    }

    /// Block until the owning thread is parked, or until `released`
    /// reports that the thread has exited and will never park again.
    pub fn wait_until_parked(&self, released: impl Fn() -> bool) {
        let mut state = self.state.lock().expect("gate poisoned");
        while !state.parked && !released() {
            state = self.cond.wait(state).expect("gate poisoned");
        }
    }

    /// Wake observers blocked in `wait_until_parked` so they re-check
    /// their release condition.
    pub(crate) fn notify_observers(&self) {
        let _state = self.state.lock().expect("gate poisoned");
        self.cond.notify_all();
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}
