pub mod buffer;
pub mod common;
pub mod concurrency;
pub mod container;
pub mod storage;

pub use buffer::{BufferPoolManager, ClockReplacer};
pub use common::config::{FrameId, Lsn, PageId, INVALID_PAGE_ID, PAGE_SIZE};
pub use common::Rid;
pub use container::hash::LinearProbeHashTable;
pub use storage::disk::DiskManager;
pub use storage::page::Page;
