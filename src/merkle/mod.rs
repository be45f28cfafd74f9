//! Binary Merkle tree over an ordered list of serializable elements.
//!
//! Leaves are `sha256(0x00 ‖ json(element))`, interior nodes are
//! `sha256(0x01 ‖ left ‖ right)`. When a level has an odd number of nodes
//! the last node is promoted to the next level unchanged, so appending a
//! copy of the tail never reproduces a root. An empty tree has the all-zero
//! root.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::crypto::{Hash, ZERO_HASH, sha256_concat};

const LEAF_PREFIX: [u8; 1] = [0x00];
const NODE_PREFIX: [u8; 1] = [0x01];

/// Which side of the running hash a proof sibling sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofNode {
    pub hash: Hash,
    pub side: Side,
}

/// Inclusion proof: siblings ordered from the leaf level up to the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub siblings: Vec<ProofNode>,
}

/// Tree built once from its elements; immutable afterwards.
#[derive(Debug, Clone)]
pub struct MerkleTree<T> {
    elements: Vec<T>,
    // levels[0] holds the leaves, the last level holds the root
    levels: Vec<Vec<Hash>>,
}

impl<T: Serialize> MerkleTree<T> {
    pub fn new(elements: Vec<T>) -> Self {
        let leaves: Vec<Hash> = elements.iter().map(leaf_hash).collect();
        let levels = build_levels(leaves);
        Self { elements, levels }
    }

    pub fn root(&self) -> Hash {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or(ZERO_HASH)
    }

    pub fn elements(&self) -> &[T] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Build the inclusion proof for `element`, or `None` if it is not a leaf.
    pub fn proof(&self, element: &T) -> Option<MerkleProof> {
        let target = leaf_hash(element);
        let leaves = self.levels.first()?;
        let mut index = leaves.iter().position(|h| *h == target)?;

        let mut siblings = Vec::with_capacity(self.levels.len().saturating_sub(1));
        for level in &self.levels[..self.levels.len() - 1] {
            if index % 2 == 1 {
                siblings.push(ProofNode {
                    hash: level[index - 1],
                    side: Side::Left,
                });
            } else if let Some(right) = level.get(index + 1) {
                siblings.push(ProofNode {
                    hash: *right,
                    side: Side::Right,
                });
            }
            // a promoted odd tail contributes no sibling at this level
            index /= 2;
        }

        Some(MerkleProof { siblings })
    }

    /// Recompute the root from `element` and `proof` and compare with `root`.
    pub fn verify(element: &T, proof: &MerkleProof, root: &Hash) -> bool {
        let mut current = leaf_hash(element);
        for sibling in &proof.siblings {
            current = match sibling.side {
                Side::Left => node_hash(&sibling.hash, &current),
                Side::Right => node_hash(&current, &sibling.hash),
            };
        }
        current == *root
    }
}

fn leaf_hash<T: Serialize>(element: &T) -> Hash {
    let bytes = serde_json::to_vec(element).expect("serialize merkle element");
    sha256_concat(&[&LEAF_PREFIX, &bytes])
}

fn node_hash(left: &Hash, right: &Hash) -> Hash {
    sha256_concat(&[&NODE_PREFIX, left, right])
}

fn build_levels(leaves: Vec<Hash>) -> Vec<Vec<Hash>> {
    if leaves.is_empty() {
        return Vec::new();
    }
    let mut levels = vec![leaves];
    while levels[levels.len() - 1].len() > 1 {
        let current = &levels[levels.len() - 1];
        let next: Vec<Hash> = current
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => node_hash(left, right),
                [single] => *single,
                _ => unreachable!("chunks(2) yields one or two nodes"),
            })
            .collect();
        levels.push(next);
    }
    levels
}

// Only the elements travel on the wire; the hash levels are rebuilt on load.
impl<T: Serialize> Serialize for MerkleTree<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.elements.serialize(serializer)
    }
}

impl<'de, T: Serialize + Deserialize<'de>> Deserialize<'de> for MerkleTree<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<T>::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("supply-{i}")).collect()
    }

    #[test]
    fn every_element_verifies_for_many_sizes() {
        for n in 1..=9 {
            let tree = MerkleTree::new(items(n));
            let root = tree.root();
            for e in tree.elements() {
                let proof = tree.proof(e).expect("element is a leaf");
                assert!(MerkleTree::verify(e, &proof, &root), "n={n} e={e}");
            }
        }
    }

    #[test]
    fn absent_element_has_no_proof_and_does_not_verify() {
        let tree = MerkleTree::new(items(5));
        let outsider = "supply-99".to_string();
        assert!(tree.proof(&outsider).is_none());

        let proof = tree.proof(&"supply-1".to_string()).unwrap();
        assert!(!MerkleTree::verify(&outsider, &proof, &tree.root()));
    }

    #[test]
    fn flipped_proof_bit_fails() {
        let tree = MerkleTree::new(items(6));
        let e = "supply-2".to_string();
        let proof = tree.proof(&e).unwrap();
        for i in 0..proof.siblings.len() {
            let mut bad = proof.clone();
            bad.siblings[i].hash[7] ^= 0x01;
            assert!(!MerkleTree::verify(&e, &bad, &tree.root()));
        }
    }

    #[test]
    fn root_changes_when_an_element_changes() {
        let a = MerkleTree::new(items(4));
        let mut changed = items(4);
        changed[3].push('!');
        let b = MerkleTree::new(changed);
        assert_ne!(a.root(), b.root());
        assert_eq!(a.root(), MerkleTree::new(items(4)).root());
    }

    #[test]
    fn order_matters() {
        let mut reversed = items(3);
        reversed.reverse();
        assert_ne!(MerkleTree::new(items(3)).root(), MerkleTree::new(reversed).root());
    }

    #[test]
    fn empty_and_single_trees() {
        let empty: MerkleTree<String> = MerkleTree::new(Vec::new());
        assert_eq!(empty.root(), ZERO_HASH);

        let single = MerkleTree::new(items(1));
        let proof = single.proof(&"supply-0".to_string()).unwrap();
        assert!(proof.siblings.is_empty());
        assert_eq!(single.root(), leaf_hash(&"supply-0".to_string()));
    }

    #[test]
    fn odd_tail_is_promoted() {
        let tree = MerkleTree::new(items(3));
        let l = items(3).iter().map(leaf_hash).collect::<Vec<_>>();
        let expected = node_hash(&node_hash(&l[0], &l[1]), &l[2]);
        assert_eq!(tree.root(), expected);

        let proof = tree.proof(&"supply-2".to_string()).unwrap();
        assert_eq!(proof.siblings.len(), 1);
    }

    #[test]
    fn duplicated_tail_changes_the_root() {
        for n in [1, 3, 5, 7] {
            let mut padded = items(n);
            padded.push(padded[n - 1].clone());
            assert_ne!(
                MerkleTree::new(items(n)).root(),
                MerkleTree::new(padded).root(),
                "n={n}"
            );
        }
    }

    #[test]
    fn serde_rebuilds_the_same_root() {
        let tree = MerkleTree::new(items(5));
        let json = serde_json::to_string(&tree).unwrap();
        let back: MerkleTree<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.root(), tree.root());
        assert_eq!(back.elements(), tree.elements());
    }
}
