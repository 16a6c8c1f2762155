use std::collections::HashMap;

use log::debug;

use kernel::Device;

/// One open VFS entry: which mounted device it lives on and the id that
/// device handed out.
#[derive(Debug, Clone, Copy)]
struct VfsSlot {
    device: usize,
    device_id: usize,
}

/// Virtual file system: a name-routed multiplexer over mounted devices.
///
/// Open names have the form `"<mount> <rest>"`, e.g. `"random 42"` or
/// `"file data.bin"`; the first word selects the mounted device and the
/// rest is passed through to it. Each successful open takes one slot in a
/// fixed-capacity table mapping the VFS id to the (device, device id)
/// pair, and every other operation resolves through that table.
pub struct Vfs {
    slots: Vec<Option<VfsSlot>>,
    devices: Vec<Box<dyn Device>>,
    routes: HashMap<String, usize>,
}

impl Vfs {
    pub fn new(max_open: usize) -> Self {
        Self {
            slots: vec![None; max_open],
            devices: Vec::new(),
            routes: HashMap::new(),
        }
    }

    /// Mount a device under a name prefix.
    pub fn mount(&mut self, prefix: impl Into<String>, device: Box<dyn Device>) {
        let index = self.devices.len();
        self.devices.push(device);
        self.routes.insert(prefix.into(), index);
    }

    fn resolve(&self, id: usize) -> Option<VfsSlot> {
        self.slots.get(id).copied().flatten()
    }
}

impl Device for Vfs {
    fn open(&mut self, name: &str) -> Option<usize> {
        let (prefix, rest) = match name.split_once(' ') {
            Some((prefix, rest)) => (prefix, rest.trim()),
            None => (name, ""),
        };
        let device = *self.routes.get(prefix)?;
        let slot = self.slots.iter().position(|entry| entry.is_none())?;
        let device_id = self.devices[device].open(rest)?;
        self.slots[slot] = Some(VfsSlot { device, device_id });
        debug!("vfs open \"{name}\" -> id {slot}");
        Some(slot)
    }

    fn close(&mut self, id: usize) {
        if let Some(entry) = self.resolve(id) {
            self.devices[entry.device].close(entry.device_id);
            self.slots[id] = None;
        }
    }

    fn read(&mut self, id: usize, size: usize) -> Vec<u8> {
        match self.resolve(id) {
            Some(entry) => self.devices[entry.device].read(entry.device_id, size),
            None => Vec::new(),
        }
    }

    fn write(&mut self, id: usize, data: &[u8]) -> usize {
        match self.resolve(id) {
            Some(entry) => self.devices[entry.device].write(entry.device_id, data),
            None => 0,
        }
    }

    fn seek(&mut self, id: usize, position: usize) {
        if let Some(entry) = self.resolve(id) {
            self.devices[entry.device].seek(entry.device_id, position);
        }
    }
}
