//! Leaf model for indexed trees

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::{Fr, LeafIndex, TreeHasher};

/// Payload stored in an indexed tree leaf.
pub trait LeafValue: Clone + Debug + PartialEq + Eq {
    /// Ordering key of the leaf.
    fn key(&self) -> Fr;

    /// Whether this is the empty (padding) value.
    fn is_empty(&self) -> bool;

    /// Field elements committed for this value, before the linked-list pointers.
    fn hash_inputs(&self) -> Vec<Fr>;

    /// The empty value. Its key is zero.
    fn empty() -> Self;
}

/// Nullifier tree payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NullifierLeafValue {
    /// Siloed nullifier.
    pub nullifier: Fr,
}

impl NullifierLeafValue {
    /// Wrap a siloed nullifier.
    pub const fn new(nullifier: Fr) -> Self {
        Self { nullifier }
    }
}

impl LeafValue for NullifierLeafValue {
    fn key(&self) -> Fr {
        self.nullifier
    }

    fn is_empty(&self) -> bool {
        self.nullifier.is_zero()
    }

    fn hash_inputs(&self) -> Vec<Fr> {
        vec![self.nullifier]
    }

    fn empty() -> Self {
        Self::default()
    }
}

/// Public data tree payload: a siloed storage slot and its value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PublicDataLeafValue {
    /// Siloed leaf slot.
    pub slot: Fr,
    /// Stored value.
    pub value: Fr,
}

impl PublicDataLeafValue {
    /// Build a slot/value pair.
    pub const fn new(slot: Fr, value: Fr) -> Self {
        Self { slot, value }
    }
}

impl LeafValue for PublicDataLeafValue {
    fn key(&self) -> Fr {
        self.slot
    }

    fn is_empty(&self) -> bool {
        self.slot.is_zero() && self.value.is_zero()
    }

    fn hash_inputs(&self) -> Vec<Fr> {
        vec![self.slot, self.value]
    }

    fn empty() -> Self {
        Self::default()
    }
}

/// A leaf of an indexed tree: the payload plus a pointer to the next larger key.
///
/// `next_key == 0` marks the leaf holding the largest key in the tree.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedLeaf<V> {
    /// Leaf payload.
    pub leaf: V,
    /// Index of the leaf holding `next_key`.
    pub next_index: LeafIndex,
    /// Next larger key in the tree, zero for none.
    pub next_key: Fr,
}

impl<V: LeafValue> IndexedLeaf<V> {
    /// Build a leaf preimage.
    pub const fn new(leaf: V, next_index: LeafIndex, next_key: Fr) -> Self {
        Self { leaf, next_index, next_key }
    }

    /// The empty leaf. It hashes to zero.
    pub fn empty() -> Self {
        Self::new(V::empty(), 0, Fr::ZERO)
    }

    /// Whether this is the all-zero leaf: empty payload and no pointers.
    pub fn is_empty(&self) -> bool {
        self.leaf.is_empty() && self.next_index == 0 && self.next_key.is_zero()
    }

    /// Ordering key of the payload.
    pub fn key(&self) -> Fr {
        self.leaf.key()
    }

    /// Leaf commitment. Empty leaves commit to zero.
    pub fn hash<H: TreeHasher>(&self) -> Fr {
        if self.is_empty() {
            return Fr::ZERO;
        }
        let mut inputs = self.leaf.hash_inputs();
        inputs.push(self.next_key);
        inputs.push(Fr::from(self.next_index));
        H::hash(&inputs)
    }

    /// Whether this leaf is a valid low leaf for `key`.
    pub fn is_low_leaf_for(&self, key: Fr) -> bool {
        self.key() <= key && (self.next_key.is_zero() || self.next_key > key)
    }
}
