use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use log::trace;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;

use types::{Pid, Priority, ProcessState};

use crate::process::ProcessTable;
use crate::unit::ExecutionUnit;

/// Chooses which of the three run queues the scheduler draws from next.
///
/// The production picker is uniformly random across the tiers, so a
/// process's priority decides queue membership and order but not its
/// selection odds. The seam exists so tests can pin the choice.
pub trait QueuePicker: Send {
    fn pick(&mut self) -> Priority;
}

/// Uniform pick across the three tiers.
pub struct RandomPicker {
    rng: SmallRng,
}

impl RandomPicker {
    pub fn new() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }
}

impl Default for RandomPicker {
    fn default() -> Self {
        Self::new()
    }
}

impl QueuePicker for RandomPicker {
    fn pick(&mut self) -> Priority {
        Priority::TIERS[self.rng.gen_range(0..Priority::TIERS.len())]
    }
}

/// Always picks the same tier. Test harness picker for the deterministic
/// single-queue scenarios.
pub struct FixedPicker(pub Priority);

impl QueuePicker for FixedPicker {
    fn pick(&mut self) -> Priority {
        self.0
    }
}

/// The process currently allowed to run. Cloned out for the preemption
/// timer, which only touches the unit's advisory flag.
#[derive(Debug, Clone)]
pub struct Current {
    pub pid: Pid,
    pub unit: Arc<ExecutionUnit>,
}

/// Shared view of the single running slot. The scheduler is the only
/// writer; the preemption timer reads it each tick.
#[derive(Debug, Default)]
pub struct CurrentSlot {
    inner: Mutex<Option<Current>>,
}

impl CurrentSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Current> {
        self.inner.lock().expect("current slot poisoned").clone()
    }

    fn set(&self, value: Option<Current>) {
        *self.inner.lock().expect("current slot poisoned") = value;
    }
}

/// Three-tier cooperative scheduler.
///
/// A live process is in exactly one place at a time: one ready queue, the
/// sleep heap, or the current slot. Queues are FIFO; a switched-out process
/// rejoins its own tier at the tail. The sleep heap is ordered by wakeup
/// deadline and scanned opportunistically on every selection.
pub struct Scheduler {
    queues: [VecDeque<Pid>; 3],
    sleepers: BinaryHeap<Reverse<(Instant, Pid)>>,
    current: Arc<CurrentSlot>,
    picker: Box<dyn QueuePicker>,
}

impl Scheduler {
    pub fn new(picker: Box<dyn QueuePicker>) -> Self {
        Self {
            queues: [VecDeque::new(), VecDeque::new(), VecDeque::new()],
            sleepers: BinaryHeap::new(),
            current: Arc::new(CurrentSlot::new()),
            picker,
        }
    }

    /// Handle to the running slot, shared with the preemption timer.
    pub fn current_slot(&self) -> Arc<CurrentSlot> {
        Arc::clone(&self.current)
    }

    pub fn current(&self) -> Option<Current> {
        self.current.get()
    }

    /// Mark a process Ready and put it at the tail of its tier's queue.
    pub fn enqueue_ready(&mut self, table: &mut ProcessTable, pid: Pid) {
        let Some(pcb) = table.get_mut(pid) else {
            return;
        };
        pcb.state = ProcessState::Ready;
        pcb.wakeup = None;
        self.queues[pcb.priority.index()].push_back(pid);
    }

    /// Running to Ready: requeue the current process at the tail of its
    /// own tier and clear the running slot.
    pub fn requeue_current(&mut self, table: &mut ProcessTable) {
        if let Some(cur) = self.current.get() {
            self.enqueue_ready(table, cur.pid);
        }
        self.current.set(None);
    }

    /// Running to Sleeping with a deadline.
    pub fn park_current_sleeping(&mut self, table: &mut ProcessTable, deadline: Instant) {
        if let Some(cur) = self.current.get() {
            if let Some(pcb) = table.get_mut(cur.pid) {
                pcb.state = ProcessState::Sleeping;
                pcb.wakeup = Some(deadline);
            }
            self.sleepers.push(Reverse((deadline, cur.pid)));
        }
        self.current.set(None);
    }

    /// Running to Sleeping with no deadline; the process is woken by the
    /// message bus, not by the clock.
    pub fn park_current_waiting(&mut self, table: &mut ProcessTable) {
        if let Some(cur) = self.current.get() {
            if let Some(pcb) = table.get_mut(cur.pid) {
                pcb.state = ProcessState::Sleeping;
                pcb.wakeup = None;
            }
        }
        self.current.set(None);
    }

    /// Clear the running slot without requeueing (process exit).
    pub fn drop_current(&mut self) {
        self.current.set(None);
    }

    /// Remove a pid from every queue and the sleep heap.
    pub fn purge(&mut self, pid: Pid) {
        for queue in &mut self.queues {
            queue.retain(|&p| p != pid);
        }
        let kept: Vec<_> = self
            .sleepers
            .drain()
            .filter(|Reverse((_, p))| *p != pid)
            .collect();
        self.sleepers = kept.into();
    }

    /// Move every sleeper whose deadline has elapsed back to Ready.
    pub fn wake_sleepers(&mut self, table: &mut ProcessTable) {
        let now = Instant::now();
        while let Some(Reverse((deadline, pid))) = self.sleepers.peek().copied() {
            if deadline > now {
                break;
            }
            self.sleepers.pop();
            let Some(pcb) = table.get(pid) else {
                continue;
            };
            // The entry must still describe this sleep; a process woken
            // some other way no longer carries the deadline.
            if pcb.state == ProcessState::Sleeping && pcb.wakeup == Some(deadline) {
                trace!("waking {pid}");
                self.enqueue_ready(table, pid);
            }
        }
    }

    /// One selection round: wake elapsed sleepers, pick a tier, and take
    /// that queue's head as the new current process. An empty pick leaves
    /// the slot empty; the caller decides whether to roll again.
    pub fn select(&mut self, table: &mut ProcessTable) -> Option<Current> {
        self.wake_sleepers(table);
        let tier = self.picker.pick();
        let queue = &mut self.queues[tier.index()];
        while let Some(pid) = queue.pop_front() {
            let Some(pcb) = table.get_mut(pid) else {
                continue;
            };
            if pcb.unit.is_done() {
                continue;
            }
            pcb.state = ProcessState::Running;
            let current = Current {
                pid,
                unit: Arc::clone(&pcb.unit),
            };
            trace!("selected {pid} from {tier:?} queue");
            self.current.set(Some(current.clone()));
            return Some(current);
        }
        self.current.set(None);
        None
    }

    /// Whether any ready queue is non-empty.
    pub fn has_ready(&self) -> bool {
        self.queues.iter().any(|queue| !queue.is_empty())
    }

    /// Earliest wakeup deadline among the sleepers.
    pub fn next_wakeup(&self) -> Option<Instant> {
        self.sleepers.peek().map(|Reverse((deadline, _))| *deadline)
    }
}
