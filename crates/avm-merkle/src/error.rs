//! Tree errors

use crate::LeafIndex;

/// Errors raised by the in-memory trees.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// Depth outside `1..=MAX_TREE_DEPTH`.
    #[error("unsupported tree depth {depth}")]
    UnsupportedDepth {
        /// Requested depth.
        depth: usize,
    },
    /// Index is beyond the tree capacity.
    #[error("leaf index {index} out of range for tree of depth {depth}")]
    IndexOutOfRange {
        /// Requested index.
        index: LeafIndex,
        /// Tree depth.
        depth: usize,
    },
    /// No leaf has been written at the index yet.
    #[error("no leaf at index {index} (tree size {size})")]
    LeafNotFound {
        /// Requested index.
        index: LeafIndex,
        /// Next available leaf index.
        size: LeafIndex,
    },
    /// The tree cannot take the requested number of leaves.
    #[error("tree of depth {depth} is full: cannot add {requested} leaves at size {size}")]
    TreeFull {
        /// Tree depth.
        depth: usize,
        /// Next available leaf index.
        size: LeafIndex,
        /// Leaves requested.
        requested: u64,
    },
}
