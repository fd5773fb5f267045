use crate::common::storable::Storable;

/// Opaque fixed-width key, for index columns whose serialized form fits in
/// `N` bytes. Comparison is lexicographic over the raw bytes, which matches
/// the order of big-endian encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenericKey<const N: usize> {
    data: [u8; N],
}

impl<const N: usize> GenericKey<N> {
    pub fn new(data: [u8; N]) -> Self {
        Self { data }
    }

    /// Builds a key from a prefix of bytes, zero-padding the rest.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        assert!(bytes.len() <= N);
        let mut data = [0u8; N];
        data[..bytes.len()].copy_from_slice(bytes);
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.data
    }
}

impl<const N: usize> Storable for GenericKey<N> {
    const WIDTH: usize = N;

    fn store(&self, buf: &mut [u8]) {
        buf[..N].copy_from_slice(&self.data);
    }

    fn load(buf: &[u8]) -> Self {
        let mut data = [0u8; N];
        data.copy_from_slice(&buf[..N]);
        Self { data }
    }
}
