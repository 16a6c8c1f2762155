mod programs;

use std::thread;
use std::time::{Duration, Instant};

use log::info;

use devices::{FakeFileSystem, FileSwapStore, RandomDevice, Vfs};
use kernel::Os;
use types::{KernelConfig, Priority};

fn main() {
    env_logger::init();

    let mut vfs = Vfs::new(16);
    vfs.mount("random", Box::new(RandomDevice::new()));
    vfs.mount("file", Box::new(FakeFileSystem::new()));

    let swap = FileSwapStore::open("Swapfile.bin").expect("cannot open the swap file");

    let os = Os::boot(KernelConfig::default(), Box::new(vfs), Box::new(swap));
    os.startup(programs::hello());
    os.create_process(programs::goodbye(), Priority::Interactive);
    os.create_process(programs::pong(5), Priority::Interactive);
    os.create_process(programs::ping(5), Priority::Interactive);
    os.create_process(programs::memory_probe(), Priority::Low);
    os.create_process(programs::entropy_probe(), Priority::High);

    wait_for_quiet(&os, Duration::from_secs(10));

    for row in os.snapshot() {
        info!(
            "{} \"{}\" {:?} {:?}",
            row.pid, row.name, row.priority, row.state
        );
    }
    os.shutdown();
}

/// Wait until only the idle process is left, or the deadline passes.
fn wait_for_quiet(os: &Os, limit: Duration) {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if os.snapshot().iter().all(|row| row.name == "idle") {
            return;
        }
        thread::sleep(Duration::from_millis(100));
    }
    info!("demo deadline passed with processes still live");
}
