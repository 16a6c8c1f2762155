use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::info;

use kernel::SwapStore;
use types::Layout;

/// Swap store backed by a single host file, opened (and created if
/// missing) at boot. Page `n` lives at byte offset `n * PAGE_SIZE`; the
/// file only ever grows, disk page numbers are never reused.
pub struct FileSwapStore {
    file: File,
}

impl FileSwapStore {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let existed = path.exists();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        if existed {
            info!("swap file {} already exists", path.display());
        } else {
            info!("swap file {} created", path.display());
        }
        Ok(Self { file })
    }

    fn offset(disk_page: u32) -> u64 {
        disk_page as u64 * Layout::PAGE_SIZE as u64
    }
}

impl SwapStore for FileSwapStore {
    fn write_page(&mut self, disk_page: u32, data: &[u8]) {
        self.file
            .seek(SeekFrom::Start(Self::offset(disk_page)))
            .and_then(|_| self.file.write_all(data))
            .expect("swap file write failed");
    }

    fn read_page(&mut self, disk_page: u32) -> Vec<u8> {
        let mut page = vec![0u8; Layout::PAGE_SIZE];
        self.file
            .seek(SeekFrom::Start(Self::offset(disk_page)))
            .expect("swap file seek failed");
        let mut filled = 0;
        while filled < page.len() {
            match self.file.read(&mut page[filled..]) {
                // Past the end of the file: the rest stays zero filled.
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) => panic!("swap file read failed: {err}"),
            }
        }
        page
    }
}
