use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};

use log::{debug, warn};

use kernel::Device;

const MAX_FILES: usize = 10;

/// File-backed device: each open maps a path to a read/write host file
/// with a cursor. Reads and writes happen at the cursor; seek repositions
/// it from the start of the file.
pub struct FakeFileSystem {
    files: Vec<Option<File>>,
}

impl FakeFileSystem {
    pub fn new() -> Self {
        Self {
            files: (0..MAX_FILES).map(|_| None).collect(),
        }
    }

    fn file(&mut self, id: usize) -> Option<&mut File> {
        self.files.get_mut(id).and_then(|f| f.as_mut())
    }
}

impl Default for FakeFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for FakeFileSystem {
    fn open(&mut self, name: &str) -> Option<usize> {
        if name.is_empty() {
            return None;
        }
        let slot = self.files.iter().position(|f| f.is_none())?;
        match OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(name)
        {
            Ok(file) => {
                debug!("ffs opened \"{name}\"");
                self.files[slot] = Some(file);
                Some(slot)
            }
            Err(err) => {
                warn!("ffs failed to open \"{name}\": {err}");
                None
            }
        }
    }

    fn close(&mut self, id: usize) {
        if let Some(slot) = self.files.get_mut(id) {
            *slot = None;
        }
    }

    fn read(&mut self, id: usize, size: usize) -> Vec<u8> {
        let Some(file) = self.file(id) else {
            return Vec::new();
        };
        let mut buffer = Vec::with_capacity(size);
        match file.take(size as u64).read_to_end(&mut buffer) {
            Ok(_) => buffer,
            Err(err) => {
                warn!("ffs read failed: {err}");
                Vec::new()
            }
        }
    }

    fn write(&mut self, id: usize, data: &[u8]) -> usize {
        let Some(file) = self.file(id) else {
            return 0;
        };
        match file.write(data) {
            Ok(written) => written,
            Err(err) => {
                warn!("ffs write failed: {err}");
                0
            }
        }
    }

    fn seek(&mut self, id: usize, position: usize) {
        if let Some(file) = self.file(id) {
            if let Err(err) = file.seek(SeekFrom::Start(position as u64)) {
                warn!("ffs seek failed: {err}");
            }
        }
    }
}
