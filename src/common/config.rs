// Size of a data page (bytes).
pub const PAGE_SIZE: usize = 4096;
pub const INVALID_PAGE_ID: PageId = u32::MAX;
pub const INVALID_LSN: Lsn = u32::MAX;

// Default number of frames in a buffer pool.
pub const BUFFER_POOL_SIZE: usize = 100;

pub type FrameId = usize;
pub type PageId = u32;
pub type Lsn = u32;
pub type TransactionId = u32;
