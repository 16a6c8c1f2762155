use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use kernel::process::{Pcb, ProcessTable};
use kernel::scheduler::{FixedPicker, Scheduler};
use kernel::unit::ExecutionUnit;
use types::{Pid, Priority, ProcessState};

fn add_process(table: &mut ProcessTable, sched: &mut Scheduler, pid: Pid, priority: Priority) {
    let unit = Arc::new(ExecutionUnit::new());
    table.insert(Pcb::new(pid, format!("p{}", pid.as_u32()), priority, unit));
    sched.enqueue_ready(table, pid);
}

fn pinned(priority: Priority) -> Scheduler {
    Scheduler::new(Box::new(FixedPicker(priority)))
}

#[test]
fn switch_hands_over_to_the_queue_head() {
    let mut table = ProcessTable::new();
    let mut sched = pinned(Priority::Interactive);
    let (a, b) = (Pid(1), Pid(2));
    add_process(&mut table, &mut sched, a, Priority::Interactive);
    add_process(&mut table, &mut sched, b, Priority::Interactive);

    // A was created first, so it runs first.
    assert_eq!(sched.select(&mut table).unwrap().pid, a);
    assert_eq!(table.get(a).unwrap().state, ProcessState::Running);

    // A yields: it rejoins its own queue at the tail, B takes over.
    sched.requeue_current(&mut table);
    assert_eq!(sched.select(&mut table).unwrap().pid, b);
    assert_eq!(table.get(a).unwrap().state, ProcessState::Ready);
    assert_eq!(table.get(b).unwrap().state, ProcessState::Running);

    sched.requeue_current(&mut table);
    assert_eq!(sched.select(&mut table).unwrap().pid, a);
}

#[test]
fn an_empty_pick_leaves_no_current() {
    let mut table = ProcessTable::new();
    let mut sched = pinned(Priority::High);
    add_process(&mut table, &mut sched, Pid(1), Priority::Interactive);

    assert!(sched.select(&mut table).is_none());
    assert!(sched.current().is_none());
    // The process is still ready; only the pick came up empty.
    assert!(sched.has_ready());
}

#[test]
fn sleepers_wake_after_their_deadline() {
    let mut table = ProcessTable::new();
    let mut sched = pinned(Priority::Interactive);
    let pid = Pid(1);
    add_process(&mut table, &mut sched, pid, Priority::Interactive);

    assert_eq!(sched.select(&mut table).unwrap().pid, pid);
    let deadline = Instant::now() + Duration::from_millis(20);
    sched.park_current_sleeping(&mut table, deadline);
    assert_eq!(table.get(pid).unwrap().state, ProcessState::Sleeping);
    assert_eq!(sched.next_wakeup(), Some(deadline));

    // Not yet due.
    assert!(sched.select(&mut table).is_none());

    thread::sleep(Duration::from_millis(30));
    assert_eq!(sched.select(&mut table).unwrap().pid, pid);
    assert_eq!(table.get(pid).unwrap().state, ProcessState::Running);
    assert_eq!(sched.next_wakeup(), None);
}

#[test]
fn a_process_is_in_exactly_one_state() {
    let mut table = ProcessTable::new();
    let mut sched = pinned(Priority::Interactive);
    let (a, b) = (Pid(1), Pid(2));
    add_process(&mut table, &mut sched, a, Priority::Interactive);
    add_process(&mut table, &mut sched, b, Priority::Interactive);

    sched.select(&mut table);
    let running: Vec<Pid> = table
        .iter()
        .filter(|pcb| pcb.state == ProcessState::Running)
        .map(|pcb| pcb.pid)
        .collect();
    assert_eq!(running, vec![a]);
    assert_eq!(sched.current().unwrap().pid, a);
    assert_eq!(table.get(b).unwrap().state, ProcessState::Ready);
}

#[test]
fn purge_removes_a_pid_everywhere() {
    let mut table = ProcessTable::new();
    let mut sched = pinned(Priority::Interactive);
    let pid = Pid(1);
    add_process(&mut table, &mut sched, pid, Priority::Interactive);

    sched.purge(pid);
    assert!(!sched.has_ready());
    assert!(sched.select(&mut table).is_none());
}

#[test]
fn finished_units_are_skipped_at_selection() {
    let mut table = ProcessTable::new();
    let mut sched = pinned(Priority::Interactive);
    let (dead, live) = (Pid(1), Pid(2));
    add_process(&mut table, &mut sched, dead, Priority::Interactive);
    add_process(&mut table, &mut sched, live, Priority::Interactive);

    table.get(dead).unwrap().unit.mark_done();
    assert_eq!(sched.select(&mut table).unwrap().pid, live);
}
