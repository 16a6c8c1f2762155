use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use types::{Layout, Pid, Priority, ProcessState};

use crate::unit::ExecutionUnit;

/// Kernel-side record of one process: identity, scheduling fields, and the
/// open-handle table mapping process-local handles to VFS ids.
#[derive(Debug)]
pub struct Pcb {
    pub pid: Pid,
    pub name: String,
    pub priority: Priority,
    pub state: ProcessState,
    /// Valid only while `state` is `Sleeping` on a timed sleep; a process
    /// blocked waiting for a message sleeps with no deadline.
    pub wakeup: Option<Instant>,
    pub handles: [Option<usize>; Layout::HANDLE_SLOTS],
    pub unit: Arc<ExecutionUnit>,
}

impl Pcb {
    pub fn new(pid: Pid, name: String, priority: Priority, unit: Arc<ExecutionUnit>) -> Self {
        Self {
            pid,
            name,
            priority,
            state: ProcessState::Ready,
            wakeup: None,
            handles: [None; Layout::HANDLE_SLOTS],
            unit,
        }
    }

    /// First free slot in the handle table, or None when all are taken.
    pub fn find_empty_handle(&self) -> Option<usize> {
        self.handles.iter().position(|slot| slot.is_none())
    }
}

/// All live processes, keyed by pid.
#[derive(Debug, Default)]
pub struct ProcessTable {
    map: HashMap<Pid, Pcb>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pcb: Pcb) {
        self.map.insert(pcb.pid, pcb);
    }

    pub fn remove(&mut self, pid: Pid) -> Option<Pcb> {
        self.map.remove(&pid)
    }

    pub fn get(&self, pid: Pid) -> Option<&Pcb> {
        self.map.get(&pid)
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Pcb> {
        self.map.get_mut(&pid)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.map.contains_key(&pid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pcb> {
        self.map.values()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
