//! Double-SHA256 Merkle tree for transaction commitment.
//!
//! Level 0 is the ordered sequence of transaction hashes themselves — no
//! leaf domain separation. Each subsequent level double-hashes the
//! concatenation of consecutive pairs; an odd-length level duplicates its
//! final hash before pairing. An empty input yields [`Hash256::ZERO`].

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::Hash256;

/// Double-SHA256 of the concatenation of two hashes.
pub fn node_hash(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(left.as_bytes());
    data.extend_from_slice(right.as_bytes());
    let first = Sha256::digest(&data);
    Hash256(Sha256::digest(first).into())
}

/// Compute the Merkle root from a slice of leaf hashes (transaction IDs).
///
/// Returns [`Hash256::ZERO`] for an empty slice. Cheaper than building a
/// full [`MerkleTree`] when inclusion proofs are not needed.
pub fn merkle_root(leaves: &[Hash256]) -> Hash256 {
    if leaves.is_empty() {
        return Hash256::ZERO;
    }

    let mut current: Vec<Hash256> = leaves.to_vec();
    while current.len() > 1 {
        current = next_layer(&current);
    }
    current[0]
}

/// Pairs adjacent hashes with [`node_hash`], duplicating the last element
/// when the layer has an odd number of entries.
fn next_layer(layer: &[Hash256]) -> Vec<Hash256> {
    let mut next = Vec::with_capacity(layer.len().div_ceil(2));
    let mut i = 0;
    while i < layer.len() {
        let left = &layer[i];
        let right = if i + 1 < layer.len() { &layer[i + 1] } else { left };
        next.push(node_hash(left, right));
        i += 2;
    }
    next
}

/// Full Merkle tree supporting root computation and proof generation.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    leaves: Vec<Hash256>,
    /// `layers[0]` = leaves, `layers[last]` = `[root]`.
    layers: Vec<Vec<Hash256>>,
}

impl MerkleTree {
    pub fn from_leaves(leaves: &[Hash256]) -> Self {
        if leaves.is_empty() {
            return Self { leaves: Vec::new(), layers: Vec::new() };
        }

        let mut layers = vec![leaves.to_vec()];
        while layers.last().unwrap().len() > 1 {
            let prev = layers.last().unwrap();
            layers.push(next_layer(prev));
        }

        Self { leaves: leaves.to_vec(), layers }
    }

    pub fn root(&self) -> Hash256 {
        self.layers
            .last()
            .and_then(|l| l.first())
            .copied()
            .unwrap_or(Hash256::ZERO)
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Generate an inclusion proof for the leaf at `index`.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        if self.leaves.is_empty() || index >= self.leaves.len() {
            return None;
        }

        let mut path = Vec::new();
        let mut pos = index;

        for layer in &self.layers[..self.layers.len() - 1] {
            let sibling_pos = pos ^ 1;
            let sibling = if sibling_pos < layer.len() {
                layer[sibling_pos]
            } else {
                layer[pos]
            };

            let side = if pos % 2 == 0 { Side::Right } else { Side::Left };
            path.push(ProofStep { hash: sibling, side });
            pos /= 2;
        }

        Some(MerkleProof { leaf_index: index, leaf: self.leaves[index], path })
    }
}

/// Which side a sibling hash is on relative to the current node.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub enum Side {
    Left,
    Right,
}

/// A single step in a Merkle inclusion proof.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct ProofStep {
    pub hash: Hash256,
    pub side: Side,
}

/// Merkle inclusion proof for a single leaf.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct MerkleProof {
    pub leaf_index: usize,
    pub leaf: Hash256,
    pub path: Vec<ProofStep>,
}

impl MerkleProof {
    /// Recompute the root from the leaf and sibling path, then compare.
    pub fn verify(&self, expected_root: &Hash256) -> bool {
        let mut current = self.leaf;
        for step in &self.path {
            current = match step.side {
                Side::Left => node_hash(&step.hash, &current),
                Side::Right => node_hash(&current, &step.hash),
            };
        }
        current == *expected_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(byte: u8) -> Hash256 {
        Hash256([byte; 32])
    }

    #[test]
    fn node_hash_deterministic() {
        let a = h(0x01);
        let b = h(0x02);
        assert_eq!(node_hash(&a, &b), node_hash(&a, &b));
    }

    #[test]
    fn node_hash_order_matters() {
        let a = h(0x01);
        let b = h(0x02);
        assert_ne!(node_hash(&a, &b), node_hash(&b, &a));
    }

    #[test]
    fn merkle_root_empty() {
        assert_eq!(merkle_root(&[]), Hash256::ZERO);
    }

    #[test]
    fn merkle_root_single_is_the_leaf_itself() {
        // Level 0 is the leaf sequence directly: one leaf is already the root.
        let a = h(0xAA);
        assert_eq!(merkle_root(&[a]), a);
    }

    #[test]
    fn merkle_root_two() {
        let a = h(0x01);
        let b = h(0x02);
        assert_eq!(merkle_root(&[a, b]), node_hash(&a, &b));
    }

    #[test]
    fn merkle_root_three_odd_duplicates_last() {
        let a = h(0x01);
        let b = h(0x02);
        let c = h(0x03);
        // Layer 1: [node(a,b), node(c,c)] -- c duplicated
        let n01 = node_hash(&a, &b);
        let n22 = node_hash(&c, &c);
        let expected = node_hash(&n01, &n22);
        assert_eq!(merkle_root(&[a, b, c]), expected);
    }

    #[test]
    fn merkle_root_four_balanced() {
        let leaves: Vec<Hash256> = (1..=4).map(h).collect();
        let n01 = node_hash(&leaves[0], &leaves[1]);
        let n23 = node_hash(&leaves[2], &leaves[3]);
        assert_eq!(merkle_root(&leaves), node_hash(&n01, &n23));
    }

    #[test]
    fn merkle_root_deterministic() {
        let leaves: Vec<Hash256> = (0..7).map(h).collect();
        assert_eq!(merkle_root(&leaves), merkle_root(&leaves));
    }

    #[test]
    fn merkle_root_changes_with_leaf() {
        let a = vec![h(1), h(2), h(3)];
        let b = vec![h(1), h(2), h(4)];
        assert_ne!(merkle_root(&a), merkle_root(&b));
    }

    #[test]
    fn merkle_root_order_matters() {
        let a = vec![h(1), h(2)];
        let b = vec![h(2), h(1)];
        assert_ne!(merkle_root(&a), merkle_root(&b));
    }

    #[test]
    fn tree_empty() {
        let tree = MerkleTree::from_leaves(&[]);
        assert_eq!(tree.root(), Hash256::ZERO);
        assert_eq!(tree.leaf_count(), 0);
        assert!(tree.proof(0).is_none());
    }

    #[test]
    fn tree_root_matches_standalone() {
        for count in 1..=10 {
            let leaves: Vec<Hash256> = (0..count).map(|i| h(i as u8)).collect();
            let tree = MerkleTree::from_leaves(&leaves);
            assert_eq!(tree.root(), merkle_root(&leaves), "mismatch at count={count}");
        }
    }

    #[test]
    fn tree_proof_out_of_bounds() {
        let tree = MerkleTree::from_leaves(&[h(1), h(2)]);
        assert!(tree.proof(2).is_none());
        assert!(tree.proof(100).is_none());
    }

    #[test]
    fn proof_single_leaf() {
        let a = h(0xAA);
        let tree = MerkleTree::from_leaves(&[a]);
        let root = tree.root();
        let proof = tree.proof(0).unwrap();
        assert_eq!(proof.leaf, a);
        assert!(proof.path.is_empty());
        assert!(proof.verify(&root));
    }

    #[test]
    fn proof_all_leaves_various_counts() {
        for count in [2, 3, 4, 5, 7, 8, 15, 16, 33] {
            let leaves: Vec<Hash256> = (0..count).map(|i| h(i as u8)).collect();
            let tree = MerkleTree::from_leaves(&leaves);
            let root = tree.root();
            for i in 0..count as usize {
                let proof = tree.proof(i).unwrap();
                assert!(proof.verify(&root), "proof failed for leaf {i} of {count}");
            }
        }
    }

    #[test]
    fn proof_depth_power_of_two() {
        let leaves: Vec<Hash256> = (0..8).map(h).collect();
        let tree = MerkleTree::from_leaves(&leaves);
        assert_eq!(tree.proof(0).unwrap().path.len(), 3);
    }

    #[test]
    fn proof_verify_wrong_root() {
        let leaves = vec![h(1), h(2), h(3), h(4)];
        let tree = MerkleTree::from_leaves(&leaves);
        let proof = tree.proof(0).unwrap();
        assert!(!proof.verify(&Hash256([0xFF; 32])));
    }

    #[test]
    fn proof_verify_tampered_leaf() {
        let leaves = vec![h(1), h(2), h(3), h(4)];
        let tree = MerkleTree::from_leaves(&leaves);
        let root = tree.root();
        let mut proof = tree.proof(0).unwrap();
        proof.leaf = h(0xFF);
        assert!(!proof.verify(&root));
    }

    #[test]
    fn proof_verify_tampered_sibling() {
        let leaves = vec![h(1), h(2), h(3), h(4)];
        let tree = MerkleTree::from_leaves(&leaves);
        let root = tree.root();
        let mut proof = tree.proof(0).unwrap();
        proof.path[0].hash = Hash256([0xFF; 32]);
        assert!(!proof.verify(&root));
    }

    #[test]
    fn proof_from_different_tree_fails() {
        let tree_a = MerkleTree::from_leaves(&[h(1), h(2)]);
        let tree_b = MerkleTree::from_leaves(&[h(3), h(4)]);
        let proof_a = tree_a.proof(0).unwrap();
        assert!(!proof_a.verify(&tree_b.root()));
    }

    #[test]
    fn proof_bincode_roundtrip() {
        let leaves: Vec<Hash256> = (1..=5).map(h).collect();
        let tree = MerkleTree::from_leaves(&leaves);
        let proof = tree.proof(2).unwrap();

        let encoded = bincode::encode_to_vec(&proof, bincode::config::standard()).unwrap();
        let (decoded, _): (MerkleProof, usize) =
            bincode::decode_from_slice(&encoded, bincode::config::standard()).unwrap();

        assert_eq!(proof, decoded);
        assert!(decoded.verify(&tree.root()));
    }

    #[test]
    fn odd_tree_last_leaf_proof_uses_duplication() {
        let leaves = vec![h(1), h(2), h(3)];
        let tree = MerkleTree::from_leaves(&leaves);
        let root = tree.root();
        let proof = tree.proof(2).unwrap();
        assert!(proof.verify(&root));
        assert_eq!(proof.path[0].hash, h(3));
        assert_eq!(proof.path[0].side, Side::Right);
    }

    #[test]
    fn single_leaf_differs_from_two_identical() {
        let a = h(0xAA);
        assert_ne!(merkle_root(&[a]), merkle_root(&[a, a]));
    }
}
