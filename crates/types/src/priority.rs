/// Scheduling tier a process is enqueued under.
///
/// Priority decides queue membership only; the scheduler picks between the
/// three tiers uniformly at random, so a higher tier does not raise a
/// process's selection odds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    High,
    Interactive,
    Low,
}

impl Priority {
    pub const TIERS: [Priority; 3] = [Priority::High, Priority::Interactive, Priority::Low];

    /// Index of this tier's run queue.
    pub fn index(self) -> usize {
        match self {
            Priority::High => 0,
            Priority::Interactive => 1,
            Priority::Low => 2,
        }
    }
}

/// Lifecycle state of a process as tracked by the scheduler.
///
/// A live process is in exactly one of these at any instant; `Running`
/// additionally means it occupies the unique current slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Ready,
    Sleeping,
    Running,
}
