//! Sparse Merkle tree over fixed-width claim entries.
//!
//! Nodes are content addressed: a middle node's key is `H(left, right)`, a
//! leaf's key is `H(hi, hv, 1)` and the empty node is the zero hash, which is
//! never stored. Leaves sit at the shallowest depth that separates them from
//! every other leaf, so trees with few claims stay shallow. The root is
//! persisted under [`tree::ROOT_KEY`] and every insertion commits its nodes
//! and the new root in one storage transaction.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

mod dump;
pub mod entry;
pub mod node;
pub mod path;
pub mod proof;
pub mod storage;
pub mod tree;

pub use entry::Entry;
pub use node::{leaf_key, middle_key, Node, NodeType};
pub use proof::{root_from_proof, verify_proof, NodeAux, Proof, MAX_PROOF_DEPTH};
pub use storage::{MemoryStorage, SledStorage, Storage, Tx};
pub use tree::{MerkleTree, ROOT_KEY};
