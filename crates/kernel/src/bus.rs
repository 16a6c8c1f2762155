use std::collections::{HashSet, VecDeque};

use log::{debug, trace};

use types::{KernelMessage, Pid};

use crate::process::ProcessTable;

/// Inter-process message queue plus the set of processes blocked in a
/// receive.
///
/// Delivery is strictly FIFO across all senders: a receive dequeues the
/// globally oldest message with no filtering by sender, type, or target.
/// Consumers filter after dequeue.
#[derive(Debug, Default)]
pub struct MessageBus {
    queue: VecDeque<KernelMessage>,
    waiting: HashSet<Pid>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a copy of `message`, stamped with the true sender pid.
    ///
    /// Messages to a pid with no live process are dropped. Returns the
    /// target pid when the target was blocked waiting and should be made
    /// ready again.
    pub fn send(
        &mut self,
        sender: Pid,
        message: &KernelMessage,
        table: &ProcessTable,
    ) -> Option<Pid> {
        if !table.contains(message.target) {
            debug!("dropping message to unknown {}", message.target);
            return None;
        }
        let stamped = message.stamped(sender);
        trace!("enqueue {stamped}");
        let target = stamped.target;
        self.queue.push_back(stamped);
        if self.waiting.remove(&target) {
            return Some(target);
        }
        None
    }

    /// Dequeue the oldest message, if any.
    pub fn receive(&mut self) -> Option<KernelMessage> {
        self.queue.pop_front()
    }

    /// Record that `pid` is blocked until some send arrives for it.
    pub fn mark_waiting(&mut self, pid: Pid) {
        self.waiting.insert(pid);
    }

    /// Forget a process on exit.
    pub fn forget(&mut self, pid: Pid) {
        self.waiting.remove(&pid);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
