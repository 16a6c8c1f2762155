// exports
pub mod bus;
pub mod device;
pub mod gate;
pub mod gateway;
pub mod kernel;
pub mod memory;
pub mod os;
pub mod process;
pub mod scheduler;
pub mod trap;
pub mod unit;

pub use bus::MessageBus;
pub use device::{Device, InMemorySwap, NullDevice, SwapStore};
pub use gate::Gate;
pub use gateway::UserApi;
pub use kernel::Kernel;
pub use memory::{AllocationRecord, MemoryManager, PageTableEntry};
pub use os::Os;
pub use process::{Pcb, ProcessTable};
pub use scheduler::{Current, CurrentSlot, FixedPicker, QueuePicker, RandomPicker, Scheduler};
pub use trap::{Caller, ProcessInfo, Reply, Syscall, Trap};
pub use unit::{ExecutionUnit, Program};
