//! Configuration

use std::{env, str::FromStr};

use avm_merkle::MAX_TREE_DEPTH;
use serde::{Deserialize, Serialize};

use crate::constants::{
    L1_TO_L2_MSG_TREE_HEIGHT, MAX_NOTE_HASHES_PER_TX, MAX_NULLIFIERS_PER_TX,
    NOTE_HASH_TREE_HEIGHT, NULLIFIER_TREE_HEIGHT, PROTOCOL_CONTRACT_TREE_HEIGHT,
    PUBLIC_DATA_TREE_HEIGHT,
};

/// Depth of each world state tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeHeights {
    /// Nullifier tree.
    pub nullifier: usize,
    /// Note hash tree.
    pub note_hash: usize,
    /// Public data tree.
    pub public_data: usize,
    /// L1 to L2 message tree.
    pub l1_to_l2_message: usize,
}

impl Default for TreeHeights {
    fn default() -> Self {
        Self {
            nullifier: NULLIFIER_TREE_HEIGHT,
            note_hash: NOTE_HASH_TREE_HEIGHT,
            public_data: PUBLIC_DATA_TREE_HEIGHT,
            l1_to_l2_message: L1_TO_L2_MSG_TREE_HEIGHT,
        }
    }
}

/// Simulator state configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Record execution hints for the prover.
    pub collect_hints: bool,
    /// Note hash tree is padded up to this many leaves per transaction.
    pub max_note_hashes_per_tx: u32,
    /// Nullifier tree is padded up to this many leaves per transaction.
    pub max_nullifiers_per_tx: u32,
    /// World state tree depths.
    pub tree_heights: TreeHeights,
    /// Protocol contract registry depth.
    pub protocol_contract_tree_height: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            collect_hints: true,
            max_note_hashes_per_tx: MAX_NOTE_HASHES_PER_TX,
            max_nullifiers_per_tx: MAX_NULLIFIERS_PER_TX,
            tree_heights: TreeHeights::default(),
            protocol_contract_tree_height: PROTOCOL_CONTRACT_TREE_HEIGHT,
        }
    }
}

impl SimulatorConfig {
    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let collect_hints = lookup("AVM_COLLECT_HINTS")
            .map(|s| !matches!(s.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(defaults.collect_hints);

        Self {
            collect_hints,
            max_note_hashes_per_tx: parse_var(&lookup, "AVM_MAX_NOTE_HASHES_PER_TX")
                .unwrap_or(defaults.max_note_hashes_per_tx),
            max_nullifiers_per_tx: parse_var(&lookup, "AVM_MAX_NULLIFIERS_PER_TX")
                .unwrap_or(defaults.max_nullifiers_per_tx),
            tree_heights: TreeHeights {
                nullifier: parse_height(&lookup, "AVM_NULLIFIER_TREE_HEIGHT")
                    .unwrap_or(defaults.tree_heights.nullifier),
                note_hash: parse_height(&lookup, "AVM_NOTE_HASH_TREE_HEIGHT")
                    .unwrap_or(defaults.tree_heights.note_hash),
                public_data: parse_height(&lookup, "AVM_PUBLIC_DATA_TREE_HEIGHT")
                    .unwrap_or(defaults.tree_heights.public_data),
                l1_to_l2_message: parse_height(&lookup, "AVM_L1_TO_L2_MSG_TREE_HEIGHT")
                    .unwrap_or(defaults.tree_heights.l1_to_l2_message),
            },
            protocol_contract_tree_height: parse_height(&lookup, "AVM_PROTOCOL_CONTRACT_TREE_HEIGHT")
                .unwrap_or(defaults.protocol_contract_tree_height),
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}

fn parse_height(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<usize> {
    parse_var(lookup, key).filter(|height| (1..=MAX_TREE_DEPTH).contains(height))
}
