use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Computes the bucket hash for a key.
///
/// Passed to the hash table as configuration so tests (and layers above) can
/// substitute their own distribution, e.g. one that forces collisions.
pub trait HashFunction<K>: Send + Sync {
    fn get_hash(&self, key: &K) -> u64;
}

/// Default hash function backed by the standard library's SipHash.
#[derive(Debug, Clone)]
pub struct DefaultHashFunction<K> {
    _marker: PhantomData<fn(K)>,
}

impl<K> DefaultHashFunction<K> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<K> Default for DefaultHashFunction<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash> HashFunction<K> for DefaultHashFunction<K> {
    fn get_hash(&self, key: &K) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }
}
