//! Hashers for tree nodes and leaf preimages

use std::fmt::Debug;

use tiny_keccak::{Hasher, Keccak};

use crate::Fr;

/// Hash function used to commit leaves and inner nodes.
///
/// Every tree and helper in this crate is generic over the hasher so the
/// commitment scheme can be swapped without touching tree logic.
pub trait TreeHasher: Copy + Debug + Default {
    /// Hash an ordered list of field elements.
    fn hash(inputs: &[Fr]) -> Fr;

    /// Hash two child nodes into their parent.
    fn hash_pair(left: Fr, right: Fr) -> Fr {
        Self::hash(&[left, right])
    }
}

/// Keccak256 hasher over big-endian 32-byte encodings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Keccak256Hasher;

impl TreeHasher for Keccak256Hasher {
    fn hash(inputs: &[Fr]) -> Fr {
        let mut hasher = Keccak::v256();
        for input in inputs {
            hasher.update(&input.to_be_bytes::<32>());
        }
        let mut output = [0u8; 32];
        hasher.finalize(&mut output);
        Fr::from_be_bytes(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_pair() {
        let left = Fr::from(1u64);
        let right = Fr::from(2u64);
        let hash = Keccak256Hasher::hash_pair(left, right);
        assert_ne!(hash, Fr::ZERO);
        assert_eq!(hash, Keccak256Hasher::hash(&[left, right]));
        assert_ne!(hash, Keccak256Hasher::hash_pair(right, left));
    }

    #[test]
    fn test_hash_empty_input_is_keccak_of_nothing() {
        // keccak256("")
        let expected = Fr::from_be_bytes([
            0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7,
            0x03, 0xc0, 0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04,
            0x5d, 0x85, 0xa4, 0x70,
        ]);
        assert_eq!(Keccak256Hasher::hash(&[]), expected);
    }
}
