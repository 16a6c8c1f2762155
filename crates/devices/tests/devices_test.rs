use std::fs;
use std::path::PathBuf;

use devices::{FakeFileSystem, FileSwapStore, RandomDevice, Vfs};
use kernel::{Device, SwapStore};
use types::Layout;

fn scratch_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("osdevices-{tag}-{}", std::process::id()))
}

#[test]
fn vfs_routes_by_name_prefix() {
    let mut vfs = Vfs::new(4);
    vfs.mount("random", Box::new(RandomDevice::new()));

    let id = vfs.open("random 42").expect("open failed");
    let bytes = vfs.read(id, 16);
    assert_eq!(bytes.len(), 16);

    // Same seed, fresh stream: identical bytes.
    let other = vfs.open("random 42").expect("open failed");
    assert_eq!(vfs.read(other, 16), bytes);

    assert_eq!(vfs.open("tape 1"), None);
}

#[test]
fn vfs_slots_are_finite_and_reusable() {
    let mut vfs = Vfs::new(1);
    vfs.mount("random", Box::new(RandomDevice::new()));

    let id = vfs.open("random 7").expect("open failed");
    assert_eq!(vfs.open("random 8"), None);

    vfs.close(id);
    assert!(vfs.open("random 8").is_some());
}

#[test]
fn closed_vfs_ids_stop_resolving() {
    let mut vfs = Vfs::new(2);
    vfs.mount("random", Box::new(RandomDevice::new()));

    let id = vfs.open("random 1").unwrap();
    vfs.close(id);
    assert_eq!(vfs.read(id, 8), Vec::<u8>::new());
    assert_eq!(vfs.write(id, b"x"), 0);
}

#[test]
fn random_device_streams_are_independent() {
    let mut device = RandomDevice::new();
    let a = device.open("1").unwrap();
    let b = device.open("2").unwrap();

    let from_a = device.read(a, 8);
    let from_b = device.read(b, 8);
    assert_ne!(from_a, from_b);

    // Writes are unsupported; seeks just advance the stream.
    assert_eq!(device.write(a, b"data"), 0);
    device.seek(a, 4);
    assert_eq!(device.read(a, 8).len(), 8);
}

#[test]
fn fake_file_system_round_trips_through_a_file() {
    let path = scratch_path("ffs");
    let _ = fs::remove_file(&path);

    let mut ffs = FakeFileSystem::new();
    let id = ffs.open(path.to_str().unwrap()).expect("open failed");

    assert_eq!(ffs.write(id, b"hello files"), 11);
    ffs.seek(id, 6);
    assert_eq!(ffs.read(id, 5), b"files");

    ffs.seek(id, 0);
    assert_eq!(ffs.read(id, 5), b"hello");

    ffs.close(id);
    assert_eq!(ffs.read(id, 5), Vec::<u8>::new());
    fs::remove_file(&path).unwrap();
}

#[test]
fn fake_file_system_rejects_empty_names() {
    let mut ffs = FakeFileSystem::new();
    assert_eq!(ffs.open(""), None);
}

#[test]
fn swap_store_keys_pages_by_disk_page_number() {
    let path = scratch_path("swap");
    let _ = fs::remove_file(&path);

    let mut swap = FileSwapStore::open(&path).expect("cannot open swap file");
    let page_a = vec![0xaa; Layout::PAGE_SIZE];
    let page_b = vec![0xbb; Layout::PAGE_SIZE];

    swap.write_page(3, &page_a);
    swap.write_page(1, &page_b);

    assert_eq!(swap.read_page(3), page_a);
    assert_eq!(swap.read_page(1), page_b);
    // Never-written pages come back zero filled.
    assert_eq!(swap.read_page(0), vec![0u8; Layout::PAGE_SIZE]);

    fs::remove_file(&path).unwrap();
}
