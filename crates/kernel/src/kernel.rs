use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Instant;

use log::{debug, info, trace};

use types::Pid;

use crate::bus::MessageBus;
use crate::device::{Device, SwapStore};
use crate::memory::MemoryManager;
use crate::process::{Pcb, ProcessTable};
use crate::scheduler::{CurrentSlot, QueuePicker, Scheduler};
use crate::trap::{BootLine, Caller, ProcessInfo, Reply, Syscall, Trap};

/// The single serialized kernel context.
///
/// All queue, page table, and message state is owned here and mutated only
/// on the dispatch thread; traps arrive strictly sequentially over the
/// channel, which is the whole mutual-exclusion story. After each dispatch
/// the kernel resumes whichever process the scheduler holds as current,
/// the only place a process transitions into running.
pub struct Kernel {
    rx: Receiver<Trap>,
    boot: Arc<BootLine>,
    table: ProcessTable,
    sched: Scheduler,
    memory: MemoryManager,
    bus: MessageBus,
    vfs: Box<dyn Device>,
    /// Whether the current process has been resumed and may be executing.
    /// Guards against signalling a gate the owner has not closed yet,
    /// which would hand it a free pass through its next park.
    current_running: bool,
}

impl Kernel {
    pub fn new(
        rx: Receiver<Trap>,
        boot: Arc<BootLine>,
        picker: Box<dyn QueuePicker>,
        vfs: Box<dyn Device>,
        swap: Box<dyn SwapStore>,
    ) -> Self {
        Self {
            rx,
            boot,
            table: ProcessTable::new(),
            sched: Scheduler::new(picker),
            memory: MemoryManager::new(swap),
            bus: MessageBus::new(),
            vfs,
            current_running: false,
        }
    }

    /// Shared handle to the running slot, for the preemption timer.
    pub fn current_slot(&self) -> Arc<CurrentSlot> {
        self.sched.current_slot()
    }

    /// Dispatch loop. Returns when a shutdown trap arrives or every
    /// gateway has been dropped.
    pub fn run(mut self) {
        info!("kernel dispatch loop up");
        let mut pending: Option<Trap> = None;
        loop {
            let trap = match pending.take() {
                Some(trap) => trap,
                None => match self.rx.recv() {
                    Ok(trap) => trap,
                    Err(_) => break,
                },
            };
            if matches!(trap.call, Syscall::Shutdown) {
                break;
            }
            self.dispatch(trap.caller, trap.call);

            // Drive: resume the selected process, re-roll while ready
            // processes exist, or wait out the earliest sleeper deadline.
            loop {
                if let Some(current) = self.sched.current() {
                    if !self.current_running {
                        self.current_running = true;
                        current.unit.resume();
                    }
                    break;
                }
                if self.sched.select(&mut self.table).is_some() {
                    continue;
                }
                if self.sched.has_ready() {
                    continue;
                }
                match self.sched.next_wakeup() {
                    Some(deadline) => {
                        let timeout = deadline.saturating_duration_since(Instant::now());
                        match self.rx.recv_timeout(timeout) {
                            Ok(trap) => {
                                pending = Some(trap);
                                break;
                            }
                            Err(RecvTimeoutError::Timeout) => continue,
                            Err(RecvTimeoutError::Disconnected) => return,
                        }
                    }
                    None => break,
                }
            }
        }
        info!("kernel dispatch loop down");
    }

    fn dispatch(&mut self, caller: Caller, call: Syscall) {
        trace!("dispatch {call:?} from {caller:?}");
        if let Caller::Process(pid) = caller {
            // A trapping process has closed its own gate; it is no longer
            // executing even though it may still be marked current.
            if self.sched.current().map(|c| c.pid) == Some(pid) {
                self.current_running = false;
            }
        }

        match call {
            Syscall::CreateProcess {
                pid,
                name,
                priority,
                unit,
            } => {
                debug!("create {pid} \"{name}\" at {priority:?}");
                self.table.insert(Pcb::new(pid, name, priority, unit));
                self.memory.register_process(pid);
                self.sched.enqueue_ready(&mut self.table, pid);
                if matches!(caller, Caller::Process(_)) {
                    // From a process this is a switch with the new unit
                    // already enqueued; a boot caller has nothing to
                    // requeue and must not displace a running process.
                    self.sched.requeue_current(&mut self.table);
                }
                self.post_reply(caller, Reply::Pid(pid));
            }

            Syscall::SwitchProcess => {
                self.sched.requeue_current(&mut self.table);
            }

            Syscall::Sleep { duration } => {
                let deadline = Instant::now() + duration;
                self.sched.park_current_sleeping(&mut self.table, deadline);
            }

            Syscall::Exit => {
                if let Caller::Process(pid) = caller {
                    self.retire(pid);
                }
            }

            Syscall::AllocateMemory { size } => {
                let address = match caller {
                    Caller::Process(pid) => self.memory.allocate(pid, size),
                    Caller::Boot => None,
                };
                self.post_reply(caller, Reply::Address(address));
            }

            Syscall::FreeMemory { address, size } => {
                let freed = match caller {
                    Caller::Process(pid) => self.memory.free(pid, address, size),
                    Caller::Boot => false,
                };
                self.post_reply(caller, Reply::Freed(freed));
            }

            Syscall::ReadMemory { address } => {
                let value = match caller {
                    Caller::Process(pid) => self.memory.read_byte(pid, address),
                    Caller::Boot => None,
                };
                self.post_reply(caller, Reply::Byte(value));
            }

            Syscall::WriteMemory { address, value } => {
                let wrote = match caller {
                    Caller::Process(pid) => self.memory.write_byte(pid, address, value),
                    Caller::Boot => false,
                };
                self.post_reply(caller, Reply::Wrote(wrote));
            }

            Syscall::SendMessage { message } => {
                if let Caller::Process(sender) = caller {
                    if let Some(woken) = self.bus.send(sender, &message, &self.table) {
                        debug!("send wakes {woken}");
                        self.sched.enqueue_ready(&mut self.table, woken);
                    }
                    trace!("bus holds {} messages", self.bus.len());
                }
            }

            Syscall::WaitForMessage => match self.bus.receive() {
                Some(message) => {
                    self.post_reply(caller, Reply::Message(Some(message)));
                }
                None => {
                    if let Caller::Process(pid) = caller {
                        debug!("{pid} blocks waiting for a message");
                        self.bus.mark_waiting(pid);
                        self.sched.park_current_waiting(&mut self.table);
                    }
                    self.post_reply(caller, Reply::Message(None));
                }
            },

            Syscall::OpenDevice { name } => {
                let handle = match caller {
                    Caller::Process(pid) => self.open_for(pid, &name),
                    Caller::Boot => None,
                };
                self.post_reply(caller, Reply::Handle(handle));
            }

            Syscall::CloseDevice { handle } => {
                if let Caller::Process(pid) = caller {
                    if let Some(vfs_id) = self.resolve_handle(pid, handle) {
                        self.vfs.close(vfs_id);
                        if let Some(pcb) = self.table.get_mut(pid) {
                            pcb.handles[handle] = None;
                        }
                    }
                }
            }

            Syscall::ReadDevice { handle, size } => {
                let data = match caller {
                    Caller::Process(pid) => self
                        .resolve_handle(pid, handle)
                        .map(|vfs_id| self.vfs.read(vfs_id, size))
                        .unwrap_or_default(),
                    Caller::Boot => Vec::new(),
                };
                self.post_reply(caller, Reply::Data(data));
            }

            Syscall::WriteDevice { handle, data } => {
                let written = match caller {
                    Caller::Process(pid) => self
                        .resolve_handle(pid, handle)
                        .map(|vfs_id| self.vfs.write(vfs_id, &data))
                        .unwrap_or(0),
                    Caller::Boot => 0,
                };
                self.post_reply(caller, Reply::Written(written));
            }

            Syscall::SeekDevice { handle, position } => {
                if let Caller::Process(pid) = caller {
                    if let Some(vfs_id) = self.resolve_handle(pid, handle) {
                        self.vfs.seek(vfs_id, position);
                    }
                }
            }

            Syscall::Snapshot => {
                let mut rows: Vec<ProcessInfo> = self
                    .table
                    .iter()
                    .map(|pcb| ProcessInfo {
                        pid: pcb.pid,
                        name: pcb.name.clone(),
                        priority: pcb.priority,
                        state: pcb.state,
                    })
                    .collect();
                rows.sort_by_key(|row| row.pid);
                self.post_reply(caller, Reply::Snapshot(rows));
            }

            Syscall::Shutdown => unreachable!("handled by the run loop"),
        }
    }

    /// Terminal teardown of an exited process: close its handles, free its
    /// memory, forget its bus state, and drop it from the table.
    fn retire(&mut self, pid: Pid) {
        debug!("retire {pid}");
        if let Some(pcb) = self.table.remove(pid) {
            for vfs_id in pcb.handles.into_iter().flatten() {
                self.vfs.close(vfs_id);
            }
        }
        self.memory.release_process(pid);
        self.bus.forget(pid);
        self.sched.purge(pid);
        self.sched.drop_current();
        debug!("{} processes remain", self.table.len());
    }

    fn open_for(&mut self, pid: Pid, name: &str) -> Option<usize> {
        let slot = self.table.get(pid)?.find_empty_handle()?;
        let vfs_id = self.vfs.open(name)?;
        self.table.get_mut(pid)?.handles[slot] = Some(vfs_id);
        Some(slot)
    }

    fn resolve_handle(&self, pid: Pid, handle: usize) -> Option<usize> {
        self.table.get(pid)?.handles.get(handle).copied().flatten()
    }

    fn post_reply(&self, caller: Caller, reply: Reply) {
        match caller {
            Caller::Boot => self.boot.post(reply),
            Caller::Process(pid) => {
                if let Some(pcb) = self.table.get(pid) {
                    pcb.unit.post_reply(reply);
                }
            }
        }
    }
}
