//! Serialization capability for keys and values.
//!
//! The routing layer never looks inside keys. It asks a [`Marshaller`] for the
//! canonical bytes of a key and for the hash of those bytes, and it must get
//! the same hash the cluster computes for the same key, otherwise requests are
//! still served but land on a non-owning node.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Converts keys and values to and from their binary form and hashes keys.
pub trait Marshaller: Send + Sync + 'static {
    /// Serialize a value into its canonical binary representation.
    fn marshal<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>>;

    /// Deserialize a value from its binary representation.
    fn unmarshal<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;

    /// Canonical object hash over serialized bytes.
    fn hash_code(&self, bytes: &[u8]) -> i32;
}

/// Default marshaller: bincode encoding and the cluster's array identity hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeMarshaller;

impl Marshaller for BincodeMarshaller {
    fn marshal<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(bincode::serialize(value)?)
    }

    fn unmarshal<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        Ok(bincode::deserialize(bytes)?)
    }

    fn hash_code(&self, bytes: &[u8]) -> i32 {
        array_hash_code(bytes)
    }
}

/// Hash of a byte array as the cluster computes it for binary objects.
///
/// Equivalent to Java's `Arrays.hashCode(byte[])`: bytes are signed and the
/// arithmetic wraps.
pub fn array_hash_code(bytes: &[u8]) -> i32 {
    bytes
        .iter()
        .fold(1i32, |h, &b| h.wrapping_mul(31).wrapping_add(b as i8 as i32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct UserKey {
        tenant: u32,
        name: String,
    }

    #[test]
    fn test_array_hash_code() {
        assert_eq!(array_hash_code(&[]), 1);
        assert_eq!(array_hash_code(&[1]), 32);
        assert_eq!(array_hash_code(&[1, 2]), 32 * 31 + 2);
        // Bytes above 0x7f are negative in the cluster's byte type.
        assert_eq!(array_hash_code(&[0xff]), 31 - 1);
    }

    #[test]
    fn test_bincode_marshaller() {
        let marshaller = BincodeMarshaller;
        let key = UserKey {
            tenant: 7,
            name: "alice".to_string(),
        };

        let bytes = marshaller.marshal(&key).unwrap();
        let decoded: UserKey = marshaller.unmarshal(&bytes).unwrap();
        assert_eq!(decoded, key);
        assert_eq!(marshaller.hash_code(&bytes), array_hash_code(&bytes));
    }

    #[test]
    fn test_unmarshal_garbage_fails() {
        let marshaller = BincodeMarshaller;
        let result: Result<String> = marshaller.unmarshal(&[0xff, 0xff, 0xff]);
        assert!(matches!(result, Err(crate::Error::Serialization(_))));
    }
}
