use std::sync::Arc;
use std::time::Duration;

use types::{KernelMessage, Pid, Priority, ProcessState};

use crate::unit::ExecutionUnit;

/// Who submitted a trap: the host thread that booted the kernel, or a
/// scheduled process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Boot,
    Process(Pid),
}

/// One trapped system call, fully materialized. The variant is the call
/// kind; its fields are the parameter buffer, rewritten from scratch for
/// every trap.
#[derive(Debug)]
pub enum Syscall {
    CreateProcess {
        pid: Pid,
        name: String,
        priority: Priority,
        unit: Arc<ExecutionUnit>,
    },
    SwitchProcess,
    Sleep {
        duration: Duration,
    },
    /// Submitted by a unit whose body has returned. Terminal; the unit is
    /// never resumed, so no reply is posted.
    Exit,
    AllocateMemory {
        size: u32,
    },
    FreeMemory {
        address: u32,
        size: u32,
    },
    ReadMemory {
        address: u32,
    },
    WriteMemory {
        address: u32,
        value: u8,
    },
    SendMessage {
        message: KernelMessage,
    },
    WaitForMessage,
    OpenDevice {
        name: String,
    },
    CloseDevice {
        handle: usize,
    },
    ReadDevice {
        handle: usize,
        size: usize,
    },
    WriteDevice {
        handle: usize,
        data: Vec<u8>,
    },
    SeekDevice {
        handle: usize,
        position: usize,
    },
    /// Host-side introspection: state of every live process.
    Snapshot,
    /// Host-side teardown: the dispatch loop exits.
    Shutdown,
}

/// Result of a dispatched syscall, posted to the caller's reply slot.
/// Calls without a payload (switch, sleep, send, close, seek, exit) post
/// nothing; their callers only wait to be resumed.
#[derive(Debug)]
pub enum Reply {
    Pid(Pid),
    Address(Option<u32>),
    Freed(bool),
    Byte(Option<u8>),
    Wrote(bool),
    Message(Option<KernelMessage>),
    Handle(Option<usize>),
    Data(Vec<u8>),
    Written(usize),
    Snapshot(Vec<ProcessInfo>),
}

/// Introspection row for one live process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub name: String,
    pub priority: Priority,
    pub state: ProcessState,
}

/// What travels over the trap channel from a gateway to the kernel.
#[derive(Debug)]
pub struct Trap {
    pub caller: Caller,
    pub call: Syscall,
}

/// Reply rendezvous for the boot caller, which has no execution unit to
/// park on: the kernel posts, the boot thread waits.
#[derive(Debug, Default)]
pub struct BootLine {
    slot: std::sync::Mutex<Option<Reply>>,
    cond: std::sync::Condvar,
}

impl BootLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self, reply: Reply) {
        let mut slot = self.slot.lock().expect("boot line poisoned");
        *slot = Some(reply);
        self.cond.notify_all();
    }

    pub fn wait(&self) -> Reply {
        let mut slot = self.slot.lock().expect("boot line poisoned");
        loop {
            match slot.take() {
                Some(reply) => return reply,
                None => slot = self.cond.wait(slot).expect("boot line poisoned"),
            }
        }
    }
}
