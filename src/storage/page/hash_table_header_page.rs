use crate::common::config::{Lsn, PageId, INVALID_PAGE_ID, PAGE_SIZE};

// Hash Table Header Page Layout (little-endian):
//   [0..4)   page_id: u32
//   [4..8)   lsn: u32
//   [8..12)  size: u32       target bucket count at construction
//   [12..16) next_ind: u32   number of registered block page ids
//   [16..)   block_page_ids: u32 each, filled up to next_ind

const OFFSET_PAGE_ID: usize = 0;
const OFFSET_LSN: usize = 4;
const OFFSET_SIZE: usize = 8;
const OFFSET_NEXT_IND: usize = 12;
const OFFSET_BLOCK_PAGE_IDS: usize = 16;

/// The maximum number of block page ids a header page can register.
pub const MAX_NUM_BLOCKS: usize = (PAGE_SIZE - OFFSET_BLOCK_PAGE_IDS) / 4;

/// On-page accessors for the hash table's header page.
///
/// The header owns no storage and no latches; every function reinterprets
/// the byte buffer of the frame holding the page. Callers hold the frame
/// latch through the buffer pool while calling these.
pub struct HashTableHeaderPage;

impl HashTableHeaderPage {
    /// Zeroes the header region and stamps the page id and target size.
    pub fn init(data: &mut [u8], page_id: PageId, size: usize) {
        data[..OFFSET_BLOCK_PAGE_IDS].fill(0);
        Self::set_page_id(data, page_id);
        Self::set_size(data, size);
    }

    pub fn get_page_id(data: &[u8]) -> PageId {
        u32::from_le_bytes(data[OFFSET_PAGE_ID..OFFSET_PAGE_ID + 4].try_into().unwrap())
    }

    pub fn set_page_id(data: &mut [u8], page_id: PageId) {
        data[OFFSET_PAGE_ID..OFFSET_PAGE_ID + 4].copy_from_slice(&page_id.to_le_bytes());
    }

    pub fn get_lsn(data: &[u8]) -> Lsn {
        u32::from_le_bytes(data[OFFSET_LSN..OFFSET_LSN + 4].try_into().unwrap())
    }

    pub fn set_lsn(data: &mut [u8], lsn: Lsn) {
        data[OFFSET_LSN..OFFSET_LSN + 4].copy_from_slice(&lsn.to_le_bytes());
    }

    /// Target number of buckets this table was created with.
    pub fn get_size(data: &[u8]) -> usize {
        u32::from_le_bytes(data[OFFSET_SIZE..OFFSET_SIZE + 4].try_into().unwrap()) as usize
    }

    pub fn set_size(data: &mut [u8], size: usize) {
        data[OFFSET_SIZE..OFFSET_SIZE + 4].copy_from_slice(&(size as u32).to_le_bytes());
    }

    /// Number of block page ids registered so far.
    pub fn num_blocks(data: &[u8]) -> usize {
        u32::from_le_bytes(
            data[OFFSET_NEXT_IND..OFFSET_NEXT_IND + 4]
                .try_into()
                .unwrap(),
        ) as usize
    }

    /// Appends a block page id at the next free index.
    pub fn add_block_page_id(data: &mut [u8], page_id: PageId) {
        let next_ind = Self::num_blocks(data);
        assert!(next_ind < MAX_NUM_BLOCKS, "header page is out of block slots");
        let offset = OFFSET_BLOCK_PAGE_IDS + next_ind * 4;
        data[offset..offset + 4].copy_from_slice(&page_id.to_le_bytes());
        data[OFFSET_NEXT_IND..OFFSET_NEXT_IND + 4]
            .copy_from_slice(&((next_ind + 1) as u32).to_le_bytes());
    }

    /// Returns the block page id at `index`, or INVALID_PAGE_ID when the
    /// index is past the registered range.
    pub fn get_block_page_id(data: &[u8], index: usize) -> PageId {
        if index >= Self::num_blocks(data) {
            return INVALID_PAGE_ID;
        }
        let offset = OFFSET_BLOCK_PAGE_IDS + index * 4;
        u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
    }
}
