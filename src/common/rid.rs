use derive_new::new;

use crate::common::config::PageId;
use crate::common::storable::Storable;

/// Record identifier: the physical position of a tuple, i.e. the id of the
/// page holding it and the slot number within that page. This is the value
/// type indexes store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, new)]
pub struct Rid {
    pub page_id: PageId,
    pub slot_num: u32,
}

impl Storable for Rid {
    const WIDTH: usize = 8;

    fn store(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.page_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.slot_num.to_le_bytes());
    }

    fn load(buf: &[u8]) -> Self {
        Rid {
            page_id: PageId::from_le_bytes(buf[0..4].try_into().unwrap()),
            slot_num: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_load() {
        let rid = Rid::new(42, 7);
        let mut buf = [0u8; Rid::WIDTH];
        rid.store(&mut buf);
        assert_eq!(rid, Rid::load(&buf));
    }
}
