use std::collections::{BTreeSet, HashMap};

use log::{debug, trace, warn};

use types::{Layout, Pid};

use crate::device::SwapStore;

/// One virtual page's mapping: at most one of `physical` and `disk` is set
/// once the page has been swapped out; both `None` means unmapped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageTableEntry {
    pub physical: Option<u32>,
    pub disk: Option<u32>,
}

impl PageTableEntry {
    /// Whether the page belongs to anyone, resident or swapped out.
    pub fn is_mapped(&self) -> bool {
        self.physical.is_some() || self.disk.is_some()
    }

    pub fn clear(&mut self) {
        self.physical = None;
        self.disk = None;
    }
}

/// Translation cache line: a (process, virtual page) pair resolved to a
/// physical page. Lines may be stale and are re-validated against the page
/// table on every hit.
#[derive(Debug, Clone, Copy)]
struct TlbEntry {
    pid: Pid,
    virtual_page: u32,
    physical_page: u32,
}

/// One live allocation. Base and size are page multiples; allocations for
/// a process never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationRecord {
    pub pid: Pid,
    pub base: u32,
    pub size: u32,
}

/// Virtual memory subsystem.
///
/// Design at a glance:
/// - Physical memory is a single `Vec<u8>` arena of 1 KiB pages; a frame is
///   owned by at most one (process, virtual page) mapping at a time.
/// - Page tables live in an arena keyed by pid, 100 entries per process,
///   mutated only here.
/// - Free frames sit in a `BTreeSet` and are granted lowest-first, so an
///   allocate/free/allocate round trip is deterministic.
/// - The 2-entry TLB fronts translation; every hit is validated against the
///   page table and every miss refreshes a line round-robin.
/// - Swap-out bookkeeping (victim cursor, append-only disk page counter,
///   the store write) is complete, but allocation is always resident:
///   frame exhaustion is a failure sentinel, not an eviction trigger.
pub struct MemoryManager {
    physical: Vec<u8>,
    tables: HashMap<Pid, Box<[PageTableEntry]>>,
    free_frames: BTreeSet<u32>,
    allocations: Vec<AllocationRecord>,
    tlb: [Option<TlbEntry>; Layout::TLB_ENTRIES],
    tlb_cursor: usize,
    next_victim: usize,
    next_disk_page: u32,
    swap: Box<dyn SwapStore>,
}

impl MemoryManager {
    pub fn new(swap: Box<dyn SwapStore>) -> Self {
        assert!(Layout::PHYSICAL_BYTES % Layout::PAGE_SIZE == 0);
        let total_frames = (Layout::PHYSICAL_BYTES / Layout::PAGE_SIZE) as u32;
        Self {
            physical: vec![0u8; Layout::PHYSICAL_BYTES],
            tables: HashMap::new(),
            free_frames: (0..total_frames).collect(),
            allocations: Vec::new(),
            tlb: [None; Layout::TLB_ENTRIES],
            tlb_cursor: 0,
            next_victim: 0,
            next_disk_page: 0,
            swap,
        }
    }

    /// Give a new process an empty page table.
    pub fn register_process(&mut self, pid: Pid) {
        self.tables.insert(
            pid,
            vec![PageTableEntry::default(); Layout::VIRTUAL_PAGES].into_boxed_slice(),
        );
    }

    /// Tear down a process: return its frames, drop its table, records,
    /// and translation cache lines.
    pub fn release_process(&mut self, pid: Pid) {
        if let Some(table) = self.tables.remove(&pid) {
            for entry in table.iter() {
                if let Some(frame) = entry.physical {
                    self.free_frames.insert(frame);
                }
            }
        }
        self.allocations.retain(|record| record.pid != pid);
        for line in &mut self.tlb {
            if line.map(|l| l.pid == pid).unwrap_or(false) {
                *line = None;
            }
        }
    }

    /// Allocate `size` bytes of virtual memory for `pid`.
    ///
    /// First-fit over the process's virtual pages; every page in the run is
    /// backed by a freshly granted frame. Returns the virtual base address,
    /// or None when no contiguous run or no frame is available.
    pub fn allocate(&mut self, pid: Pid, size: u32) -> Option<u32> {
        let page_size = Layout::PAGE_SIZE as u32;
        if size == 0 || size % page_size != 0 {
            return None;
        }
        let pages = (size / page_size) as usize;
        let table = self.tables.get_mut(&pid)?;
        let start = first_fit(table, pages)?;

        if self.free_frames.len() < pages {
            warn!("allocate: {pid} wants {pages} frames, {} free", self.free_frames.len());
            return None;
        }
        for entry in table[start..start + pages].iter_mut() {
            let frame = self
                .free_frames
                .pop_first()
                .expect("free frame count already checked");
            entry.physical = Some(frame);
        }

        let base = start as u32 * page_size;
        self.allocations.push(AllocationRecord { pid, base, size });
        debug!("allocate: {pid} gets {size} bytes at {base:#x}");
        Some(base)
    }

    /// Free `[address, address + size)` for `pid`.
    ///
    /// The whole range must be mapped to the caller; otherwise nothing is
    /// changed and the call fails. Frames return to the free set; disk
    /// pages are simply abandoned (the store is append-only).
    pub fn free(&mut self, pid: Pid, address: u32, size: u32) -> bool {
        let page_size = Layout::PAGE_SIZE as u32;
        if size == 0 || address % page_size != 0 || size % page_size != 0 {
            return false;
        }
        let start = (address / page_size) as usize;
        let pages = (size / page_size) as usize;
        if start + pages > Layout::VIRTUAL_PAGES {
            return false;
        }
        let Some(table) = self.tables.get_mut(&pid) else {
            return false;
        };
        if !table[start..start + pages].iter().all(|e| e.is_mapped()) {
            debug!("free: {pid} does not own all of {address:#x}+{size:#x}");
            return false;
        }

        for (offset, entry) in table[start..start + pages].iter_mut().enumerate() {
            if let Some(frame) = entry.physical {
                self.free_frames.insert(frame);
            }
            entry.clear();
            let virtual_page = (start + offset) as u32;
            for line in &mut self.tlb {
                if line
                    .map(|l| l.pid == pid && l.virtual_page == virtual_page)
                    .unwrap_or(false)
                {
                    *line = None;
                }
            }
        }
        self.carve_allocations(pid, address, size);
        debug!("free: {pid} released {size} bytes at {address:#x}");
        true
    }

    /// Read one byte of `pid`'s virtual memory. None when the address is
    /// not mapped (or not resident) for this process.
    pub fn read_byte(&mut self, pid: Pid, address: u32) -> Option<u8> {
        let offset = self.translate(pid, address)?;
        Some(self.physical[offset])
    }

    /// Write one byte of `pid`'s virtual memory.
    pub fn write_byte(&mut self, pid: Pid, address: u32, value: u8) -> bool {
        match self.translate(pid, address) {
            Some(offset) => {
                self.physical[offset] = value;
                true
            }
            None => false,
        }
    }

    /// Swap out one resident page: the round-robin victim's bytes go to the
    /// store under a fresh disk page number and its entry flips from
    /// physical to disk. Returns the victim, or None when nothing is
    /// resident. Eviction is not wired into allocation; this is the
    /// bookkeeping end of the extension point.
    pub fn swap_out_victim(&mut self) -> Option<(Pid, u32)> {
        let mut resident: Vec<(Pid, usize)> = Vec::new();
        let mut pids: Vec<Pid> = self.tables.keys().copied().collect();
        pids.sort();
        for pid in pids {
            let table = &self.tables[&pid];
            for (page, entry) in table.iter().enumerate() {
                if entry.physical.is_some() {
                    resident.push((pid, page));
                }
            }
        }
        if resident.is_empty() {
            return None;
        }

        let (pid, page) = resident[self.next_victim % resident.len()];
        self.next_victim = self.next_victim.wrapping_add(1);

        let table = self.tables.get_mut(&pid).expect("victim table exists");
        let frame = table[page].physical.take().expect("victim is resident");
        let disk_page = self.next_disk_page;
        self.next_disk_page += 1;
        table[page].disk = Some(disk_page);

        let start = frame as usize * Layout::PAGE_SIZE;
        self.swap
            .write_page(disk_page, &self.physical[start..start + Layout::PAGE_SIZE]);
        self.free_frames.insert(frame);

        let virtual_page = page as u32;
        for line in &mut self.tlb {
            if line
                .map(|l| l.pid == pid && l.virtual_page == virtual_page)
                .unwrap_or(false)
            {
                *line = None;
            }
        }
        debug!("swapped out {pid} page {page} to disk page {disk_page}");
        Some((pid, virtual_page))
    }

    /// Live allocation records, in allocation order.
    pub fn allocations(&self) -> &[AllocationRecord] {
        &self.allocations
    }

    /// Entry for one of `pid`'s virtual pages, for inspection.
    pub fn page_entry(&self, pid: Pid, virtual_page: usize) -> Option<PageTableEntry> {
        self.tables.get(&pid)?.get(virtual_page).copied()
    }

    /// Resolve a virtual address to an offset into the physical arena.
    ///
    /// TLB first; a hit is validated against the page table and dropped if
    /// stale. A miss falls back to the table and refreshes a line. The
    /// resulting physical address is bounds-checked against the arena; a
    /// failure there is a translation bug and panics rather than letting
    /// an access land in someone else's frame.
    fn translate(&mut self, pid: Pid, address: u32) -> Option<usize> {
        let page_size = Layout::PAGE_SIZE as u32;
        let virtual_page = address / page_size;
        let page_offset = address % page_size;
        if virtual_page as usize >= Layout::VIRTUAL_PAGES {
            return None;
        }

        let table = self.tables.get(&pid)?;
        let mapped = table[virtual_page as usize].physical;

        let mut physical_page = None;
        for line in self.tlb.iter().flatten() {
            if line.pid == pid && line.virtual_page == virtual_page {
                if mapped == Some(line.physical_page) {
                    physical_page = Some(line.physical_page);
                } else {
                    trace!("stale TLB line for {pid} page {virtual_page}");
                }
                break;
            }
        }

        let physical_page = match physical_page {
            Some(page) => page,
            None => {
                let page = mapped?;
                self.tlb[self.tlb_cursor] = Some(TlbEntry {
                    pid,
                    virtual_page,
                    physical_page: page,
                });
                self.tlb_cursor = (self.tlb_cursor + 1) % self.tlb.len();
                page
            }
        };

        let offset = physical_page as usize * Layout::PAGE_SIZE + page_offset as usize;
        if offset >= self.physical.len() {
            panic!("physical address {offset:#x} outside the memory arena");
        }
        Some(offset)
    }

    /// Drop or split allocation records overlapping a freed range.
    fn carve_allocations(&mut self, pid: Pid, base: u32, size: u32) {
        let end = base + size;
        let mut kept = Vec::with_capacity(self.allocations.len());
        for record in self.allocations.drain(..) {
            let record_end = record.base + record.size;
            if record.pid != pid || record_end <= base || record.base >= end {
                kept.push(record);
                continue;
            }
            if record.base < base {
                kept.push(AllocationRecord {
                    pid,
                    base: record.base,
                    size: base - record.base,
                });
            }
            if record_end > end {
                kept.push(AllocationRecord {
                    pid,
                    base: end,
                    size: record_end - end,
                });
            }
        }
        self.allocations = kept;
    }
}

/// First run of `pages` consecutive unmapped entries, as a page index.
fn first_fit(table: &[PageTableEntry], pages: usize) -> Option<usize> {
    if pages == 0 || pages > table.len() {
        return None;
    }
    let mut run = 0usize;
    for (index, entry) in table.iter().enumerate() {
        if entry.is_mapped() {
            run = 0;
        } else {
            run += 1;
            if run == pages {
                return Some(index + 1 - pages);
            }
        }
    }
    None
}
