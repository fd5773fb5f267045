use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;

use crate::buffer::BufferPoolManager;
use crate::common::config::PageId;
use crate::common::storable::Storable;
use crate::concurrency::Transaction;
use crate::storage::page::{HashTableBlockPage, HashTableHeaderPage, PageGuard};

use super::hash_function::HashFunction;
use super::KeyComparator;

enum InsertOutcome {
    Inserted,
    Duplicate,
    /// The probe wrapped around to its start; carries the capacity the table
    /// had at that moment.
    Full(usize),
}

/// A linear-probe hash table laid out on disk pages: one header page listing
/// the block pages, each block page a flat array of (key, value) slots with
/// occupied/readable bitmaps.
///
/// Every page access goes through the buffer pool; the table itself holds no
/// entry storage. Probes hash the key to a global slot index, walk forward
/// one slot at a time across block boundaries, wrap from the last block to
/// the first, and stop either at a never-used slot or after a full lap.
///
/// The table latch is taken shared by get_value/insert/remove/get_size and
/// exclusive by resize; it also guards the current header page id, which is
/// exactly the piece of state resize swaps out. Below it, the header frame
/// latch is held in read mode for the whole operation and block frame
/// latches are held one at a time (read for lookups, write for mutations).
pub struct LinearProbeHashTable<K, V, C, H> {
    bpm: Arc<BufferPoolManager>,
    comparator: C,
    hash_fn: H,
    /// Table latch; the guarded value is the current header page id.
    header_page_id: RwLock<PageId>,
    _marker: PhantomData<(K, V)>,
}

impl<K, V, C, H> LinearProbeHashTable<K, V, C, H>
where
    K: Storable,
    V: Storable,
    C: KeyComparator<K>,
    H: HashFunction<K>,
{
    const BLOCK_ARRAY_SIZE: usize = HashTableBlockPage::<K, V>::BLOCK_ARRAY_SIZE;

    /// Creates a table with `num_buckets` block pages: allocates the header
    /// page, then the blocks, registering each in the header.
    ///
    /// Panics if the buffer pool cannot supply the pages; the pool must hold
    /// at least the header plus one block (resize transiently needs four
    /// frames).
    pub fn new(bpm: Arc<BufferPoolManager>, comparator: C, hash_fn: H, num_buckets: usize) -> Self {
        assert!(num_buckets > 0);
        let mut header_guard =
            PageGuard::new_page(&bpm).expect("buffer pool exhausted while creating hash table");
        let header_page_id = header_guard.page_id();
        {
            let mut header = header_guard.write();
            HashTableHeaderPage::init(&mut *header, header_page_id, num_buckets);
            for _ in 0..num_buckets {
                let block_guard = PageGuard::new_page(&bpm)
                    .expect("buffer pool exhausted while creating hash table");
                HashTableHeaderPage::add_block_page_id(&mut *header, block_guard.page_id());
            }
        }
        drop(header_guard);

        Self {
            bpm,
            comparator,
            hash_fn,
            header_page_id: RwLock::new(header_page_id),
            _marker: PhantomData,
        }
    }

    pub fn header_page_id(&self) -> PageId {
        *self.header_page_id.read()
    }

    /// Collects every value stored under `key`, in probe order. An empty
    /// vector means the key is absent.
    pub fn get_value(&self, _transaction: Option<&Transaction>, key: &K) -> Vec<V> {
        let header_page_id = self.header_page_id.read();
        let header_guard = self.fetch(*header_page_id);
        let header = header_guard.read();
        let num_blocks = HashTableHeaderPage::num_blocks(&*header);
        let capacity = num_blocks * Self::BLOCK_ARRAY_SIZE;
        let (start, mut block_ind, mut bucket_ind) = self.get_index(key, num_blocks);

        let mut result = Vec::new();
        'probe: loop {
            let block_page_id = HashTableHeaderPage::get_block_page_id(&*header, block_ind);
            let block_guard = self.fetch(block_page_id);
            let block = block_guard.read();
            while bucket_ind < Self::BLOCK_ARRAY_SIZE {
                if !HashTableBlockPage::<K, V>::is_occupied(&*block, bucket_ind) {
                    break 'probe;
                }
                if HashTableBlockPage::<K, V>::is_readable(&*block, bucket_ind)
                    && self
                        .comparator
                        .compare(&HashTableBlockPage::<K, V>::key_at(&*block, bucket_ind), key)
                        == Ordering::Equal
                {
                    result.push(HashTableBlockPage::<K, V>::value_at(&*block, bucket_ind));
                }
                bucket_ind += 1;
                if (block_ind * Self::BLOCK_ARRAY_SIZE + bucket_ind) % capacity == start {
                    break 'probe;
                }
            }
            bucket_ind = 0;
            block_ind += 1;
            if block_ind == num_blocks {
                block_ind = 0;
            }
        }
        result
    }

    /// Inserts the pair unless it is already present.
    ///
    /// A probe that wraps all the way around means the table is full; the
    /// table latch is released, the table resized to double capacity, and
    /// the probe restarted against the new layout. The release is the one
    /// legal hand-off point: resize needs the exclusive latch this thread
    /// holds shared.
    pub fn insert(&self, _transaction: Option<&Transaction>, key: &K, value: &V) -> bool {
        let mut header_page_id = self.header_page_id.read();
        loop {
            match self.try_insert(*header_page_id, key, value) {
                InsertOutcome::Inserted => return true,
                InsertOutcome::Duplicate => return false,
                InsertOutcome::Full(capacity) => {
                    drop(header_page_id);
                    self.resize(capacity);
                    header_page_id = self.header_page_id.read();
                }
            }
        }
    }

    /// Removes the pair, tombstoning its slot. Returns false when no live
    /// match exists, including when the probe hits the tombstone of this
    /// exact pair.
    pub fn remove(&self, _transaction: Option<&Transaction>, key: &K, value: &V) -> bool {
        let header_page_id = self.header_page_id.read();
        let header_guard = self.fetch(*header_page_id);
        let header = header_guard.read();
        let num_blocks = HashTableHeaderPage::num_blocks(&*header);
        let capacity = num_blocks * Self::BLOCK_ARRAY_SIZE;
        let (start, mut block_ind, mut bucket_ind) = self.get_index(key, num_blocks);

        loop {
            let block_page_id = HashTableHeaderPage::get_block_page_id(&*header, block_ind);
            let mut block_guard = self.fetch(block_page_id);
            let mut block = block_guard.write();
            while bucket_ind < Self::BLOCK_ARRAY_SIZE {
                if !HashTableBlockPage::<K, V>::is_occupied(&*block, bucket_ind) {
                    return false;
                }
                if self
                    .comparator
                    .compare(&HashTableBlockPage::<K, V>::key_at(&*block, bucket_ind), key)
                    == Ordering::Equal
                    && HashTableBlockPage::<K, V>::value_at(&*block, bucket_ind) == *value
                {
                    if !HashTableBlockPage::<K, V>::is_readable(&*block, bucket_ind) {
                        // The pair died here already.
                        return false;
                    }
                    HashTableBlockPage::<K, V>::remove(&mut *block, bucket_ind);
                    return true;
                }
                bucket_ind += 1;
                if (block_ind * Self::BLOCK_ARRAY_SIZE + bucket_ind) % capacity == start {
                    return false;
                }
            }
            bucket_ind = 0;
            block_ind += 1;
            if block_ind == num_blocks {
                block_ind = 0;
            }
        }
    }

    /// Rebuilds the table with `2 * initial_size / BLOCK_ARRAY_SIZE` block
    /// pages under the exclusive table latch, re-inserting every live entry
    /// through the regular probe path and deleting the old pages afterwards.
    pub fn resize(&self, initial_size: usize) {
        let mut header_page_id = self.header_page_id.write();
        let num_buckets = 2 * initial_size / Self::BLOCK_ARRAY_SIZE;
        let old_header_page_id = *header_page_id;
        debug!(
            "resizing hash table {} to {} blocks",
            old_header_page_id, num_buckets
        );

        // Snapshot the old block list before the header moves.
        let old_block_page_ids: Vec<PageId> = {
            let old_header_guard = self.fetch(old_header_page_id);
            let old_header = old_header_guard.read();
            let num_blocks = HashTableHeaderPage::num_blocks(&*old_header);
            (0..num_blocks)
                .map(|i| HashTableHeaderPage::get_block_page_id(&*old_header, i))
                .collect()
        };

        let mut new_header_guard = PageGuard::new_page(&self.bpm)
            .expect("buffer pool exhausted while resizing hash table");
        *header_page_id = new_header_guard.page_id();
        {
            let mut new_header = new_header_guard.write();
            HashTableHeaderPage::init(&mut *new_header, *header_page_id, num_buckets);
            for _ in 0..num_buckets {
                let block_guard = PageGuard::new_page(&self.bpm)
                    .expect("buffer pool exhausted while resizing hash table");
                HashTableHeaderPage::add_block_page_id(&mut *new_header, block_guard.page_id());
            }
        }
        drop(new_header_guard);

        // Drain every live entry of the old layout into the new one, then
        // give the old pages back.
        for old_block_page_id in old_block_page_ids {
            {
                let block_guard = self.fetch(old_block_page_id);
                let block = block_guard.read();
                for bucket_ind in 0..Self::BLOCK_ARRAY_SIZE {
                    if HashTableBlockPage::<K, V>::is_readable(&*block, bucket_ind) {
                        let key = HashTableBlockPage::<K, V>::key_at(&*block, bucket_ind);
                        let value = HashTableBlockPage::<K, V>::value_at(&*block, bucket_ind);
                        let outcome = self.try_insert(*header_page_id, &key, &value);
                        debug_assert!(matches!(outcome, InsertOutcome::Inserted));
                    }
                }
            }
            self.bpm.delete_page(old_block_page_id);
        }
        self.bpm.delete_page(old_header_page_id);
    }

    /// Total slot count of the current layout (capacity, not live entries).
    pub fn get_size(&self) -> usize {
        let header_page_id = self.header_page_id.read();
        let header_guard = self.fetch(*header_page_id);
        let header = header_guard.read();
        Self::BLOCK_ARRAY_SIZE * HashTableHeaderPage::num_blocks(&*header)
    }

    /// One probe pass. The caller holds the table latch (shared for insert,
    /// exclusive for resize); this takes only header and block frame
    /// latches.
    fn try_insert(&self, header_page_id: PageId, key: &K, value: &V) -> InsertOutcome {
        let header_guard = self.fetch(header_page_id);
        let header = header_guard.read();
        let num_blocks = HashTableHeaderPage::num_blocks(&*header);
        let capacity = num_blocks * Self::BLOCK_ARRAY_SIZE;
        let (start, mut block_ind, mut bucket_ind) = self.get_index(key, num_blocks);

        loop {
            let block_page_id = HashTableHeaderPage::get_block_page_id(&*header, block_ind);
            let mut block_guard = self.fetch(block_page_id);
            let mut block = block_guard.write();
            while bucket_ind < Self::BLOCK_ARRAY_SIZE {
                if HashTableBlockPage::<K, V>::insert(&mut *block, bucket_ind, key, value) {
                    return InsertOutcome::Inserted;
                }
                if self
                    .comparator
                    .compare(&HashTableBlockPage::<K, V>::key_at(&*block, bucket_ind), key)
                    == Ordering::Equal
                    && HashTableBlockPage::<K, V>::value_at(&*block, bucket_ind) == *value
                {
                    return InsertOutcome::Duplicate;
                }
                bucket_ind += 1;
                if (block_ind * Self::BLOCK_ARRAY_SIZE + bucket_ind) % capacity == start {
                    return InsertOutcome::Full(capacity);
                }
            }
            bucket_ind = 0;
            block_ind += 1;
            if block_ind == num_blocks {
                block_ind = 0;
            }
        }
    }

    /// Maps a key to its home slot: a global index in
    /// `[0, num_blocks * BLOCK_ARRAY_SIZE)` plus its (block, bucket) split.
    fn get_index(&self, key: &K, num_blocks: usize) -> (usize, usize, usize) {
        let capacity = num_blocks * Self::BLOCK_ARRAY_SIZE;
        let index = (self.hash_fn.get_hash(key) % capacity as u64) as usize;
        (
            index,
            index / Self::BLOCK_ARRAY_SIZE,
            index % Self::BLOCK_ARRAY_SIZE,
        )
    }

    fn fetch(&self, page_id: PageId) -> PageGuard {
        PageGuard::fetch(&self.bpm, page_id)
            .expect("buffer pool exhausted while pinning hash table page")
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use tempdir::TempDir;

    use super::super::hash_function::DefaultHashFunction;
    use super::super::{GenericKey, OrdComparator};
    use super::*;
    use crate::common::Rid;
    use crate::storage::disk::DiskManager;

    type IntTable =
        LinearProbeHashTable<i32, i32, OrdComparator<i32>, DefaultHashFunction<i32>>;

    const BLOCK_ARRAY_SIZE: usize = HashTableBlockPage::<i32, i32>::BLOCK_ARRAY_SIZE;

    /// Collapses every key into bucket 0 so probes are forced through the
    /// whole chain.
    struct ConstantHashFunction;

    impl HashFunction<i32> for ConstantHashFunction {
        fn get_hash(&self, _key: &i32) -> u64 {
            0
        }
    }

    fn make_bpm(pool_size: usize) -> (TempDir, Arc<BufferPoolManager>) {
        let dir = TempDir::new("test").unwrap();
        let disk_manager = Arc::new(DiskManager::new(dir.path().join("test.db")));
        let bpm = Arc::new(BufferPoolManager::new(pool_size, disk_manager));
        (dir, bpm)
    }

    #[test]
    fn test_hash_table_basic() {
        let (_dir, bpm) = make_bpm(10);
        let table = IntTable::new(
            bpm,
            OrdComparator::new(),
            DefaultHashFunction::new(),
            2,
        );

        // Scenario: a fresh table reports its capacity, not a live count.
        assert_eq!(2 * BLOCK_ARRAY_SIZE, table.get_size());

        // Scenario: first insert succeeds, the exact same pair is rejected.
        assert!(table.insert(None, &1, &10));
        assert!(!table.insert(None, &1, &10));
        assert_eq!(vec![10], table.get_value(None, &1));

        // Scenario: a key that was never inserted is absent.
        assert!(table.get_value(None, &2).is_empty());

        // Scenario: removing the pair tombstones it; the second removal
        // reports the pair is gone.
        assert!(table.remove(None, &1, &10));
        assert!(table.get_value(None, &1).is_empty());
        assert!(!table.remove(None, &1, &10));
    }

    #[test]
    fn test_multiple_values_per_key() {
        let (_dir, bpm) = make_bpm(10);
        let table = IntTable::new(
            bpm,
            OrdComparator::new(),
            DefaultHashFunction::new(),
            2,
        );

        // Scenario: the same key may map to several distinct values.
        assert!(table.insert(None, &7, &70));
        assert!(table.insert(None, &7, &71));
        let mut values = table.get_value(None, &7);
        values.sort_unstable();
        assert_eq!(vec![70, 71], values);

        // Scenario: removal is pair-wise, not key-wise.
        assert!(table.remove(None, &7, &70));
        assert_eq!(vec![71], table.get_value(None, &7));
    }

    #[test]
    fn test_collisions_span_blocks() {
        let (_dir, bpm) = make_bpm(10);
        let table = LinearProbeHashTable::new(
            bpm,
            OrdComparator::new(),
            ConstantHashFunction,
            2,
        );

        // Scenario: with every key hashed to bucket 0, one more insert than
        // a block holds must spill into the second block page.
        let num_keys = BLOCK_ARRAY_SIZE as i32 + 1;
        for key in 1..=num_keys {
            assert!(table.insert(None, &key, &(key * 2)));
        }
        for key in 1..=num_keys {
            assert_eq!(vec![key * 2], table.get_value(None, &key));
        }
    }

    #[test]
    fn test_tombstone_probe_and_reuse() {
        let (_dir, bpm) = make_bpm(10);
        let table = LinearProbeHashTable::new(
            bpm,
            OrdComparator::new(),
            ConstantHashFunction,
            2,
        );

        // Slots 0, 1, 2 in probe order.
        assert!(table.insert(None, &1, &10));
        assert!(table.insert(None, &2, &20));
        assert!(table.insert(None, &3, &30));

        // Scenario: tombstoning the middle entry must not cut the probe
        // chain to entries behind it.
        assert!(table.remove(None, &2, &20));
        assert_eq!(vec![30], table.get_value(None, &3));

        // Scenario: an insert walks through and reclaims the tombstone.
        assert!(table.insert(None, &4, &40));
        assert_eq!(vec![40], table.get_value(None, &4));
        assert_eq!(vec![30], table.get_value(None, &3));
    }

    #[test]
    fn test_resize_preserves_entries() {
        let (_dir, bpm) = make_bpm(20);
        let table = LinearProbeHashTable::<i64, i64, _, _>::new(
            bpm,
            OrdComparator::new(),
            DefaultHashFunction::new(),
            2,
        );
        let capacity = table.get_size();

        // Scenario: fill the table to the brim; every insert still succeeds
        // because a free slot remains findable.
        for key in 0..capacity as i64 {
            assert!(table.insert(None, &key, &(key * 3)));
        }
        assert_eq!(capacity, table.get_size());

        // Scenario: one more insert wraps, forcing a resize that doubles
        // capacity and keeps every entry reachable.
        let extra = capacity as i64;
        assert!(table.insert(None, &extra, &(extra * 3)));
        assert_eq!(2 * capacity, table.get_size());
        for key in 0..=extra {
            assert_eq!(vec![key * 3], table.get_value(None, &key));
        }
    }

    #[test]
    fn test_explicit_resize() {
        let (_dir, bpm) = make_bpm(20);
        let table = IntTable::new(
            bpm,
            OrdComparator::new(),
            DefaultHashFunction::new(),
            2,
        );
        let old_header = table.header_page_id();

        for key in 0..100 {
            assert!(table.insert(None, &key, &key));
        }
        table.resize(table.get_size());

        // Scenario: the header moved, capacity doubled, entries survived.
        assert_ne!(old_header, table.header_page_id());
        assert_eq!(4 * BLOCK_ARRAY_SIZE, table.get_size());
        for key in 0..100 {
            assert_eq!(vec![key], table.get_value(None, &key));
        }
    }

    #[test]
    fn test_generic_key_rid_values() {
        let (_dir, bpm) = make_bpm(10);
        let table = LinearProbeHashTable::<GenericKey<8>, Rid, _, _>::new(
            bpm,
            OrdComparator::new(),
            DefaultHashFunction::new(),
            2,
        );

        // Scenario: an index entry maps an opaque key to the record's
        // physical position.
        let key = GenericKey::<8>::from_bytes(b"user42");
        let rid = Rid::new(3, 7);
        assert!(table.insert(None, &key, &rid));
        assert_eq!(vec![rid], table.get_value(None, &key));

        // Scenario: removal needs the exact (key, rid) pair.
        assert!(!table.remove(None, &key, &Rid::new(3, 8)));
        assert!(table.remove(None, &key, &rid));
        assert!(table.get_value(None, &key).is_empty());
    }

    #[test]
    fn test_concurrent_inserts_and_removes() {
        let (_dir, bpm) = make_bpm(20);
        let table = Arc::new(IntTable::new(
            bpm,
            OrdComparator::new(),
            DefaultHashFunction::new(),
            4,
        ));

        // Scenario: four writers insert disjoint key ranges in parallel.
        let mut handles = Vec::new();
        for t in 0..4 {
            let table = table.clone();
            handles.push(thread::spawn(move || {
                let transaction = Transaction::new(t as u32);
                for i in 0..100 {
                    let key = t * 1000 + i;
                    assert!(table.insert(Some(&transaction), &key, &(key * 10)));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        for t in 0..4 {
            for i in 0..100 {
                let key = t * 1000 + i;
                assert_eq!(vec![key * 10], table.get_value(None, &key));
            }
        }

        // Scenario: parallel removers drop the even keys; odd keys survive.
        let mut handles = Vec::new();
        for t in 0..4 {
            let table = table.clone();
            handles.push(thread::spawn(move || {
                for i in (0..100).step_by(2) {
                    let key = t * 1000 + i;
                    assert!(table.remove(None, &key, &(key * 10)));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        for t in 0..4 {
            for i in 0..100 {
                let key = t * 1000 + i;
                let values = table.get_value(None, &key);
                if i % 2 == 0 {
                    assert!(values.is_empty());
                } else {
                    assert_eq!(vec![key * 10], values);
                }
            }
        }
    }
}
