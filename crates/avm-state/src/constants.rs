//! Protocol constants shared by the state layer.

/// Height of the nullifier tree.
pub const NULLIFIER_TREE_HEIGHT: usize = 40;

/// Height of the note hash tree.
pub const NOTE_HASH_TREE_HEIGHT: usize = 40;

/// Height of the public data tree.
pub const PUBLIC_DATA_TREE_HEIGHT: usize = 40;

/// Height of the L1 to L2 message tree.
pub const L1_TO_L2_MSG_TREE_HEIGHT: usize = 36;

/// Height of the protocol contract registry tree.
pub const PROTOCOL_CONTRACT_TREE_HEIGHT: usize = 4;

/// Canonical protocol contract addresses are `1..=MAX_PROTOCOL_CONTRACTS`.
pub const MAX_PROTOCOL_CONTRACTS: usize = 11;

/// Note hashes a transaction may emit; the note hash tree is padded up to this.
pub const MAX_NOTE_HASHES_PER_TX: u32 = 64;

/// Nullifiers a transaction may emit; the nullifier tree is padded up to this.
pub const MAX_NULLIFIERS_PER_TX: u32 = 64;

/// Domain separators for siloing and uniqueness hashes.
pub(crate) mod separator {
    use crate::Fr;

    pub(crate) const NOTE_HASH_NONCE: Fr = Fr::from_limbs([2, 0, 0, 0]);
    pub(crate) const UNIQUE_NOTE_HASH: Fr = Fr::from_limbs([3, 0, 0, 0]);
    pub(crate) const SILOED_NOTE_HASH: Fr = Fr::from_limbs([4, 0, 0, 0]);
    pub(crate) const OUTER_NULLIFIER: Fr = Fr::from_limbs([7, 0, 0, 0]);
    pub(crate) const PUBLIC_LEAF_INDEX: Fr = Fr::from_limbs([23, 0, 0, 0]);
    pub(crate) const PUBLIC_BYTECODE: Fr = Fr::from_limbs([40, 0, 0, 0]);
}
