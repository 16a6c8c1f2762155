use log::{error, info};

use kernel::Program;

/// Prints a greeting a few times, cooperating between iterations.
pub fn hello() -> Program {
    Program::new("hello", |api| {
        for _ in 0..5 {
            println!("Hello World");
            api.cooperate();
            api.sleep(50);
        }
    })
}

/// The counterpart printer, at the same cadence.
pub fn goodbye() -> Program {
    Program::new("goodbye", |api| {
        for _ in 0..5 {
            println!("Goodbye World");
            api.cooperate();
            api.sleep(50);
        }
    })
}

/// Sends `rounds` tagged messages to the pong process.
pub fn ping(rounds: i32) -> Program {
    Program::new("ping", move |api| {
        let Some(pong) = api.pid_by_name("pong") else {
            error!("pong not found");
            return;
        };
        info!("I am ping, pong = {pong}");
        for round in 0..rounds {
            api.sleep(20);
            api.send(pong, round, b"Ping");
            println!("  ping -> {pong}: {round}");
        }
    })
}

/// Receives `rounds` messages and reports who sent them.
pub fn pong(rounds: i32) -> Program {
    Program::new("pong", move |api| {
        info!("I am pong");
        for _ in 0..rounds {
            let message = api.receive();
            println!("  pong <- {}: {}", message.sender, message.kind);
        }
    })
}

/// Exercises the memory syscalls: allocate, write, read back, free, and
/// re-allocate expecting first-fit reuse of the same address.
pub fn memory_probe() -> Program {
    Program::new("memory-probe", |api| {
        let address = match api.allocate(1024) {
            Ok(Some(address)) => address,
            Ok(None) => {
                error!("memory allocation failed");
                return;
            }
            Err(err) => {
                error!("allocate rejected: {err}");
                return;
            }
        };

        api.write(address, 42);
        match api.read(address) {
            Some(42) => println!("memory probe: read back 42 from {address:#x}"),
            other => error!("memory probe: read back {other:?}"),
        }

        if !api.free(address, 1024).unwrap_or(false) {
            error!("memory probe: free failed");
            return;
        }
        match api.allocate(1024) {
            Ok(Some(again)) if again == address => {
                println!("memory probe: first-fit reuse at {again:#x}")
            }
            other => error!("memory probe: reallocation came back as {other:?}"),
        }
    })
}

/// Pulls a few bytes from the random device through the VFS.
pub fn entropy_probe() -> Program {
    Program::new("entropy-probe", |api| {
        let Ok(Some(handle)) = api.open("random 1337") else {
            error!("entropy probe: open failed");
            return;
        };
        let bytes = api.read_device(handle, 8);
        println!("entropy probe: {bytes:02x?}");
        api.close(handle);
    })
}
