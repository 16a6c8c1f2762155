use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{error, trace};

use types::{KernelMessage, Layout, Pid, Priority, SyscallError};

use crate::trap::{Caller, Reply, Syscall, Trap};
use crate::unit::{ExecutionUnit, Program};

/// Gateway-owned bookkeeping shared by every caller: the pid counter and
/// the name registry used for name-based message addressing. Everything
/// else the kernel owns outright.
pub(crate) struct OsContext {
    names: Mutex<HashMap<String, Pid>>,
    next_pid: AtomicU32,
}

impl OsContext {
    pub(crate) fn new() -> Self {
        Self {
            names: Mutex::new(HashMap::new()),
            next_pid: AtomicU32::new(1),
        }
    }

    fn assign_pid(&self) -> Pid {
        Pid(self.next_pid.fetch_add(1, Ordering::SeqCst))
    }

    fn register_name(&self, name: &str, pid: Pid) {
        self.names
            .lock()
            .expect("name registry poisoned")
            .insert(name.to_string(), pid);
    }

    pub(crate) fn lookup_name(&self, name: &str) -> Option<Pid> {
        self.names
            .lock()
            .expect("name registry poisoned")
            .get(name)
            .copied()
    }
}

pub(crate) struct Spawned {
    pub pid: Pid,
    pub name: String,
    pub unit: Arc<ExecutionUnit>,
}

/// Assign a pid, register the program's name, and launch its host thread.
/// The thread parks on the unit's run-gate until the kernel first resumes
/// it, runs the body, and submits the terminal exit trap on return.
pub(crate) fn spawn_process(
    ctx: &Arc<OsContext>,
    tx: &Sender<Trap>,
    program: Program,
) -> Spawned {
    let pid = ctx.assign_pid();
    let name = program.name().to_string();
    ctx.register_name(&name, pid);

    let unit = Arc::new(ExecutionUnit::new());
    let api = UserApi {
        ctx: Arc::clone(ctx),
        tx: tx.clone(),
        unit: Arc::clone(&unit),
        pid,
    };
    let body = program.into_body();
    thread::spawn(move || {
        api.unit.park();
        // A panicking body must still exit cleanly, or the kernel would
        // wait forever on a unit that can never trap again.
        if catch_unwind(AssertUnwindSafe(|| body(&api))).is_err() {
            error!("{} panicked; retiring it", api.pid);
        }
        api.unit.mark_done();
        api.submit_exit();
    });

    trace!("spawned \"{name}\" as {pid}");
    Spawned { pid, name, unit }
}

/// The syscall surface a process body sees. One instance per process,
/// owned by its host thread.
///
/// Every operation packages its arguments into a trap, signals the kernel,
/// and blocks on the unit's run-gate until the scheduler resumes the
/// caller; results come back through the unit's reply slot. Argument
/// errors (misalignment, empty names) are rejected here, before any trap
/// and therefore before any kernel state changes.
pub struct UserApi {
    ctx: Arc<OsContext>,
    tx: Sender<Trap>,
    unit: Arc<ExecutionUnit>,
    pid: Pid,
}

impl UserApi {
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Pid registered under `name`, or None for an unknown name.
    pub fn pid_by_name(&self, name: &str) -> Option<Pid> {
        self.ctx.lookup_name(name)
    }

    /// Cooperation point: if preemption was requested, clear the flag and
    /// yield; otherwise keep running.
    pub fn cooperate(&self) {
        if self.unit.take_preempt() {
            self.switch_process();
        }
    }

    /// Yield unconditionally; returns when the scheduler next selects us.
    pub fn switch_process(&self) {
        self.trap(Syscall::SwitchProcess);
    }

    /// Block for at least `millis` milliseconds, then until re-selected.
    pub fn sleep(&self, millis: u64) {
        self.trap(Syscall::Sleep {
            duration: Duration::from_millis(millis),
        });
    }

    /// Create a new process and yield to the scheduler.
    pub fn create_process(&self, program: Program, priority: Priority) -> Pid {
        let spawned = spawn_process(&self.ctx, &self.tx, program);
        match self.trap(Syscall::CreateProcess {
            pid: spawned.pid,
            name: spawned.name,
            priority,
            unit: spawned.unit,
        }) {
            Some(Reply::Pid(pid)) => pid,
            other => unexpected("create_process", other),
        }
    }

    /// Allocate `size` bytes of virtual memory. `size` must be a positive
    /// multiple of the page size. None means no space was available.
    pub fn allocate(&self, size: u32) -> Result<Option<u32>, SyscallError> {
        if size == 0 || size as usize % Layout::PAGE_SIZE != 0 {
            return Err(SyscallError::MisalignedSize(size as usize));
        }
        match self.trap(Syscall::AllocateMemory { size }) {
            Some(Reply::Address(address)) => Ok(address),
            other => unexpected("allocate", other),
        }
    }

    /// Free a previously allocated range. Both `address` and `size` must be
    /// page aligned. False means the range was not wholly ours.
    pub fn free(&self, address: u32, size: u32) -> Result<bool, SyscallError> {
        if address as usize % Layout::PAGE_SIZE != 0 {
            return Err(SyscallError::MisalignedAddress(address));
        }
        if size == 0 || size as usize % Layout::PAGE_SIZE != 0 {
            return Err(SyscallError::MisalignedSize(size as usize));
        }
        match self.trap(Syscall::FreeMemory { address, size }) {
            Some(Reply::Freed(freed)) => Ok(freed),
            other => unexpected("free", other),
        }
    }

    /// Read one byte of our virtual memory. None for an unmapped address.
    pub fn read(&self, address: u32) -> Option<u8> {
        match self.trap(Syscall::ReadMemory { address }) {
            Some(Reply::Byte(value)) => value,
            other => unexpected("read", other),
        }
    }

    /// Write one byte of our virtual memory. False for an unmapped address.
    pub fn write(&self, address: u32, value: u8) -> bool {
        match self.trap(Syscall::WriteMemory { address, value }) {
            Some(Reply::Wrote(wrote)) => wrote,
            other => unexpected("write", other),
        }
    }

    /// Fire-and-forget send. The kernel stamps our pid as the sender.
    pub fn send(&self, target: Pid, kind: i32, data: &[u8]) {
        self.trap(Syscall::SendMessage {
            message: KernelMessage::new(target, kind, data),
        });
    }

    /// Blocking receive: the oldest queued message, waiting for a send if
    /// none is queued yet.
    pub fn receive(&self) -> KernelMessage {
        loop {
            match self.trap(Syscall::WaitForMessage) {
                Some(Reply::Message(Some(message))) => return message,
                // Parked and later resumed without a message; retry.
                Some(Reply::Message(None)) | None => continue,
                other => unexpected("receive", other),
            }
        }
    }

    /// Open a device by name ("random <seed>", "file <path>"). None when
    /// the handle table or the device table is full.
    pub fn open(&self, name: &str) -> Result<Option<usize>, SyscallError> {
        if name.trim().is_empty() {
            return Err(SyscallError::EmptyName);
        }
        match self.trap(Syscall::OpenDevice {
            name: name.to_string(),
        }) {
            Some(Reply::Handle(handle)) => Ok(handle),
            other => unexpected("open", other),
        }
    }

    pub fn close(&self, handle: usize) {
        self.trap(Syscall::CloseDevice { handle });
    }

    pub fn read_device(&self, handle: usize, size: usize) -> Vec<u8> {
        match self.trap(Syscall::ReadDevice { handle, size }) {
            Some(Reply::Data(data)) => data,
            other => unexpected("read_device", other),
        }
    }

    pub fn write_device(&self, handle: usize, data: &[u8]) -> usize {
        match self.trap(Syscall::WriteDevice {
            handle,
            data: data.to_vec(),
        }) {
            Some(Reply::Written(written)) => written,
            other => unexpected("write_device", other),
        }
    }

    pub fn seek(&self, handle: usize, position: usize) {
        self.trap(Syscall::SeekDevice { handle, position });
    }

    /// The trap handshake: submit the call, close our own gate, and read
    /// whatever reply the kernel parked for us once it resumes us.
    fn trap(&self, call: Syscall) -> Option<Reply> {
        if self
            .tx
            .send(Trap {
                caller: Caller::Process(self.pid),
                call,
            })
            .is_err()
        {
            self.halt();
        }
        self.unit.park();
        self.unit.take_reply()
    }

    /// Terminal trap submitted after the body returns; the unit is done
    /// and never parks for a resume.
    fn submit_exit(&self) {
        let _ = self.tx.send(Trap {
            caller: Caller::Process(self.pid),
            call: Syscall::Exit,
        });
    }

    /// The kernel is gone; this unit can never be resumed. Park forever.
    fn halt(&self) -> ! {
        loop {
            self.unit.park();
        }
    }
}

fn unexpected(operation: &str, reply: Option<Reply>) -> ! {
    panic!("unexpected {operation} reply: {reply:?}")
}
