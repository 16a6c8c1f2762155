use std::sync::{Arc, Mutex};

use kernel::memory::{AllocationRecord, MemoryManager};
use kernel::{InMemorySwap, SwapStore};
use types::{Layout, Pid};

/// Swap store the test can still inspect after handing it to the manager.
#[derive(Clone, Default)]
struct SharedSwap(Arc<Mutex<InMemorySwap>>);

impl SwapStore for SharedSwap {
    fn write_page(&mut self, disk_page: u32, data: &[u8]) {
        self.0.lock().unwrap().write_page(disk_page, data);
    }

    fn read_page(&mut self, disk_page: u32) -> Vec<u8> {
        self.0.lock().unwrap().read_page(disk_page)
    }
}

fn manager() -> MemoryManager {
    MemoryManager::new(Box::new(InMemorySwap::new()))
}

#[test]
fn first_fit_reuse_is_deterministic() {
    let mut memory = manager();
    let pid = Pid(1);
    memory.register_process(pid);

    assert_eq!(memory.allocate(pid, 1024), Some(0));
    assert!(memory.free(pid, 0, 1024));
    assert_eq!(memory.allocate(pid, 1024), Some(0));
}

#[test]
fn allocate_rejects_bad_sizes() {
    let mut memory = manager();
    let pid = Pid(1);
    memory.register_process(pid);

    assert_eq!(memory.allocate(pid, 0), None);
    assert_eq!(memory.allocate(pid, 1000), None);
    assert_eq!(memory.allocate(Pid(99), 1024), None);
}

#[test]
fn write_then_read_round_trips() {
    let mut memory = manager();
    let pid = Pid(1);
    memory.register_process(pid);

    let base = memory.allocate(pid, 2048).unwrap();
    assert!(memory.write_byte(pid, base + 1500, 42));
    assert_eq!(memory.read_byte(pid, base + 1500), Some(42));

    // Outside any allocation, including past the virtual address space.
    assert_eq!(memory.read_byte(pid, 50_000), None);
    let beyond = (Layout::VIRTUAL_PAGES * Layout::PAGE_SIZE) as u32;
    assert_eq!(memory.read_byte(pid, beyond), None);
}

#[test]
fn processes_never_share_a_frame() {
    let mut memory = manager();
    let (a, b) = (Pid(1), Pid(2));
    memory.register_process(a);
    memory.register_process(b);

    assert_eq!(memory.allocate(a, 1024), Some(0));
    assert_eq!(memory.allocate(b, 1024), Some(0));

    let frame_a = memory.page_entry(a, 0).unwrap().physical.unwrap();
    let frame_b = memory.page_entry(b, 0).unwrap().physical.unwrap();
    assert_ne!(frame_a, frame_b);

    assert!(memory.write_byte(a, 0, 1));
    assert!(memory.write_byte(b, 0, 2));
    assert_eq!(memory.read_byte(a, 0), Some(1));
    assert_eq!(memory.read_byte(b, 0), Some(2));
}

#[test]
fn free_is_atomic_over_partially_owned_ranges() {
    let mut memory = manager();
    let pid = Pid(1);
    memory.register_process(pid);

    assert_eq!(memory.allocate(pid, 1024), Some(0));
    // Second page of the range is not ours; nothing must change.
    assert!(!memory.free(pid, 0, 2048));
    assert!(memory.page_entry(pid, 0).unwrap().is_mapped());
    assert_eq!(memory.allocations().len(), 1);

    // Misaligned requests are rejected outright.
    assert!(!memory.free(pid, 100, 1024));
    assert!(!memory.free(pid, 0, 1000));
}

#[test]
fn free_splits_overlapping_allocation_records() {
    let mut memory = manager();
    let pid = Pid(1);
    memory.register_process(pid);

    assert_eq!(memory.allocate(pid, 3072), Some(0));
    assert!(memory.free(pid, 1024, 1024));

    assert_eq!(
        memory.allocations(),
        &[
            AllocationRecord {
                pid,
                base: 0,
                size: 1024
            },
            AllocationRecord {
                pid,
                base: 2048,
                size: 1024
            },
        ]
    );
    // The hole is the first fit for the next page-sized request.
    assert_eq!(memory.allocate(pid, 1024), Some(1024));
}

#[test]
fn swap_out_moves_the_page_image_to_the_store() {
    let swap = SharedSwap::default();
    let mut memory = MemoryManager::new(Box::new(swap.clone()));
    let pid = Pid(1);
    memory.register_process(pid);

    let base = memory.allocate(pid, 1024).unwrap();
    assert!(memory.write_byte(pid, base, 7));

    assert_eq!(memory.swap_out_victim(), Some((pid, 0)));
    let entry = memory.page_entry(pid, 0).unwrap();
    assert_eq!(entry.physical, None);
    assert_eq!(entry.disk, Some(0));

    let image = swap.0.lock().unwrap().read_page(0);
    assert_eq!(image.len(), Layout::PAGE_SIZE);
    assert_eq!(image[0], 7);
    assert_eq!(swap.0.lock().unwrap().page_count(), 1);

    // The page is no longer resident, so byte access fails.
    assert_eq!(memory.read_byte(pid, base), None);

    // Nothing resident is left to evict.
    assert_eq!(memory.swap_out_victim(), None);
}

#[test]
fn stale_translation_cache_lines_are_never_served() {
    let mut memory = manager();
    let (a, b) = (Pid(1), Pid(2));
    memory.register_process(a);
    memory.register_process(b);

    let base = memory.allocate(a, 1024).unwrap();
    assert!(memory.write_byte(a, base, 9));
    // The write above cached (a, page 0); drop the mapping behind its back.
    assert!(memory.free(a, base, 1024));
    assert_eq!(memory.allocate(b, 1024), Some(0));
    assert!(memory.write_byte(b, 0, 3));

    assert_eq!(memory.read_byte(a, base), None);
    assert_eq!(memory.read_byte(b, 0), Some(3));
}

#[test]
fn frame_exhaustion_is_a_sentinel_not_a_panic() {
    let mut memory = manager();
    let full_space = (Layout::VIRTUAL_PAGES * Layout::PAGE_SIZE) as u32;

    // Ten processes soak up 1000 of the 1024 frames.
    for raw in 1..=10u32 {
        let pid = Pid(raw);
        memory.register_process(pid);
        assert_eq!(memory.allocate(pid, full_space), Some(0));
    }

    let eleventh = Pid(11);
    memory.register_process(eleventh);
    assert_eq!(memory.allocate(eleventh, full_space), None);
    // A request that still fits in the remaining 24 frames succeeds.
    assert_eq!(memory.allocate(eleventh, 24 * 1024), Some(0));
}
