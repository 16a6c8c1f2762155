use core::time::Duration;

/// Fixed geometry of the simulated machine.
pub struct Layout;

impl Layout {
    /// Bytes per virtual/physical page.
    pub const PAGE_SIZE: usize = 1024;
    /// Physical arena size: 1 MiB, i.e. 1024 physical pages.
    pub const PHYSICAL_BYTES: usize = 1024 * 1024;
    /// Virtual pages addressable by each process.
    pub const VIRTUAL_PAGES: usize = 100;
    /// Translation cache entries.
    pub const TLB_ENTRIES: usize = 2;
    /// Open-handle slots per process.
    pub const HANDLE_SLOTS: usize = 10;
}

/// Boot-time kernel tuning.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Preemption timer interval; every tick sets the preemption-request
    /// flag on whatever process is current.
    pub quantum: Duration,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            quantum: Duration::from_millis(250),
        }
    }
}
