//! Canonical key hashing.

use crate::error::Result;
use crate::marshal::Marshaller;
use serde::Serialize;
use std::sync::Arc;

/// Computes the cluster-consistent hash of a key.
///
/// Serializes the key with the injected [`Marshaller`] and hashes the
/// resulting bytes with the marshaller's canonical hash. Identical serialized
/// bytes always give the identical hash.
#[derive(Debug)]
pub struct HashComputer<M> {
    marshaller: Arc<M>,
}

impl<M> Clone for HashComputer<M> {
    fn clone(&self) -> Self {
        Self {
            marshaller: self.marshaller.clone(),
        }
    }
}

impl<M: Marshaller> HashComputer<M> {
    /// Create a hash computer over a marshaller.
    pub fn new(marshaller: Arc<M>) -> Self {
        Self { marshaller }
    }

    /// Get the underlying marshaller.
    pub fn marshaller(&self) -> &Arc<M> {
        &self.marshaller
    }

    /// Hash of a key.
    pub fn compute<K: Serialize + ?Sized>(&self, key: &K) -> Result<i32> {
        self.serialize_and_hash(key).map(|(_, hash)| hash)
    }

    /// Serialized key together with its hash, so callers that also need the
    /// key bytes serialize only once.
    pub fn serialize_and_hash<K: Serialize + ?Sized>(&self, key: &K) -> Result<(Vec<u8>, i32)> {
        let bytes = self.marshaller.marshal(key)?;
        let hash = self.marshaller.hash_code(&bytes);
        Ok((bytes, hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::{array_hash_code, BincodeMarshaller};
    use crate::testing::StubMarshaller;

    #[test]
    fn test_compute_is_deterministic() {
        let hasher = HashComputer::new(Arc::new(BincodeMarshaller));

        for key in ["user:1", "user:2", "", "a much longer key with spaces"] {
            let first = hasher.compute(key).unwrap();
            for _ in 0..10 {
                assert_eq!(hasher.compute(key).unwrap(), first);
            }
        }

        assert_eq!(hasher.compute(&42u64).unwrap(), hasher.compute(&42u64).unwrap());
    }

    #[test]
    fn test_compute_hashes_serialized_bytes() {
        let hasher = HashComputer::new(Arc::new(BincodeMarshaller));
        let (bytes, hash) = hasher.serialize_and_hash("key").unwrap();

        assert_eq!(bytes, bincode::serialize("key").unwrap());
        assert_eq!(hash, array_hash_code(&bytes));
    }

    #[test]
    fn test_compute_uses_injected_hash() {
        let hasher = HashComputer::new(Arc::new(StubMarshaller::with_hash(5)));
        assert_eq!(hasher.compute("anything").unwrap(), 5);
        assert_eq!(hasher.compute(&123i32).unwrap(), 5);
    }
}
