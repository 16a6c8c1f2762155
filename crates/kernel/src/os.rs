use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::info;

use types::{KernelConfig, Pid, Priority};

use crate::device::{Device, SwapStore};
use crate::gateway::{OsContext, spawn_process};
use crate::kernel::Kernel;
use crate::scheduler::{CurrentSlot, QueuePicker, RandomPicker};
use crate::trap::{BootLine, Caller, ProcessInfo, Reply, Syscall, Trap};
use crate::unit::Program;

/// Host-side handle to a booted kernel: the thread running the dispatch
/// loop, the preemption timer, and the boot caller's side of the trap
/// channel.
pub struct Os {
    ctx: Arc<OsContext>,
    tx: Sender<Trap>,
    boot: Arc<BootLine>,
    boot_lock: Mutex<()>,
    current: Arc<CurrentSlot>,
    kernel: Option<JoinHandle<()>>,
    timer: Option<JoinHandle<()>>,
    timer_stop: Arc<AtomicBool>,
}

impl Os {
    /// Boot with the production uniformly random queue picker.
    pub fn boot(config: KernelConfig, vfs: Box<dyn Device>, swap: Box<dyn SwapStore>) -> Self {
        Self::boot_with_picker(config, vfs, swap, Box::new(RandomPicker::new()))
    }

    /// Boot with an explicit picker; test harnesses pin the selection here.
    pub fn boot_with_picker(
        config: KernelConfig,
        vfs: Box<dyn Device>,
        swap: Box<dyn SwapStore>,
        picker: Box<dyn QueuePicker>,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        let boot = Arc::new(BootLine::new());
        let kernel = Kernel::new(rx, Arc::clone(&boot), picker, vfs, swap);
        let current = kernel.current_slot();

        let kernel = thread::Builder::new()
            .name("kernel".to_string())
            .spawn(move || kernel.run())
            .expect("failed to spawn the kernel thread");

        let timer_stop = Arc::new(AtomicBool::new(false));
        let timer = {
            let stop = Arc::clone(&timer_stop);
            let slot = Arc::clone(&current);
            let quantum = config.quantum;
            thread::Builder::new()
                .name("preemption-timer".to_string())
                .spawn(move || {
                    loop {
                        thread::sleep(quantum);
                        if stop.load(Ordering::SeqCst) {
                            break;
                        }
                        // Advisory only: flag the current process and let
                        // it switch at its own cooperation point.
                        if let Some(current) = slot.get() {
                            current.unit.request_stop();
                        }
                    }
                })
                .expect("failed to spawn the preemption timer")
        };

        info!("os booted (quantum {:?})", config.quantum);
        Self {
            ctx: Arc::new(OsContext::new()),
            tx,
            boot,
            boot_lock: Mutex::new(()),
            current,
            kernel: Some(kernel),
            timer: Some(timer),
            timer_stop,
        }
    }

    /// Create the init process, then the idle process that keeps reaching
    /// cooperation points so preemption always has a taker.
    pub fn startup(&self, init: Program) -> Pid {
        let pid = self.create_process(init, Priority::Interactive);
        self.create_process(
            Program::new("idle", |api| {
                loop {
                    api.cooperate();
                    api.sleep(50);
                }
            }),
            Priority::Interactive,
        );
        pid
    }

    /// Create a process from the host. The new process is enqueued Ready;
    /// it runs when the scheduler next selects it.
    pub fn create_process(&self, program: Program, priority: Priority) -> Pid {
        let _guard = self.boot_lock.lock().expect("boot lock poisoned");
        let spawned = spawn_process(&self.ctx, &self.tx, program);
        match self.boot_trap(Syscall::CreateProcess {
            pid: spawned.pid,
            name: spawned.name,
            priority,
            unit: spawned.unit,
        }) {
            Reply::Pid(pid) => pid,
            other => panic!("unexpected create_process reply: {other:?}"),
        }
    }

    /// Pid registered under `name`, or None for an unknown name.
    pub fn pid_by_name(&self, name: &str) -> Option<Pid> {
        self.ctx.lookup_name(name)
    }

    /// State of every live process, sorted by pid.
    pub fn snapshot(&self) -> Vec<ProcessInfo> {
        let _guard = self.boot_lock.lock().expect("boot lock poisoned");
        match self.boot_trap(Syscall::Snapshot) {
            Reply::Snapshot(rows) => rows,
            other => panic!("unexpected snapshot reply: {other:?}"),
        }
    }

    /// Quiesce the current process, stop the dispatch loop and the timer,
    /// and join both threads. Parked process threads are abandoned; they
    /// can never be resumed once the kernel is down.
    pub fn shutdown(mut self) {
        if let Some(current) = self.current.get() {
            current.unit.stop_wait();
        }
        self.teardown();
    }

    fn boot_trap(&self, call: Syscall) -> Reply {
        self.tx
            .send(Trap {
                caller: Caller::Boot,
                call,
            })
            .expect("kernel is down");
        self.boot.wait()
    }

    fn teardown(&mut self) {
        self.timer_stop.store(true, Ordering::SeqCst);
        let _ = self.tx.send(Trap {
            caller: Caller::Boot,
            call: Syscall::Shutdown,
        });
        if let Some(handle) = self.kernel.take() {
            let _ = handle.join();
            info!("os shut down");
        }
        if let Some(handle) = self.timer.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Os {
    fn drop(&mut self) {
        self.teardown();
    }
}
