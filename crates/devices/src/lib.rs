// exports
pub mod ffs;
pub mod random;
pub mod swap;
pub mod vfs;

pub use ffs::FakeFileSystem;
pub use random::RandomDevice;
pub use swap::FileSwapStore;
pub use vfs::Vfs;
