//! Merkle proofs over `(claimant, amount)` leaves.
//!
//! Leaves and inner nodes are domain separated by a one-byte prefix, and
//! inner nodes hash their children in sorted order so a proof is just the
//! list of siblings. A lone node at the end of a level is paired with itself.

use {
    crate::constants::{INTERMEDIATE_PREFIX, LEAF_PREFIX},
    solana_pubkey::Pubkey,
    solana_sha256_hasher::hashv,
};

pub type Node = [u8; 32];

pub fn hash_leaf(claimant: &Pubkey, amount: u64) -> Node {
    let inner = hashv(&[claimant.as_ref(), &amount.to_le_bytes()[..]]);
    hashv(&[LEAF_PREFIX, inner.as_ref()]).to_bytes()
}

pub fn hash_intermediate(a: &Node, b: &Node) -> Node {
    let (min, max) = if a <= b { (a, b) } else { (b, a) };
    hashv(&[INTERMEDIATE_PREFIX, min.as_slice(), max.as_slice()]).to_bytes()
}

pub fn verify(proof: &[Node], root: &Node, leaf: Node) -> bool {
    let computed = proof
        .iter()
        .fold(leaf, |node, sibling| hash_intermediate(&node, sibling));
    computed == *root
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    levels: Vec<Vec<Node>>,
}

impl MerkleTree {
    pub fn new(leaves: Vec<Node>) -> Self {
        let mut levels = vec![leaves];
        while let Some(level) = levels.last().filter(|level| level.len() > 1) {
            let next = level
                .chunks(2)
                .map(|pair| hash_intermediate(&pair[0], pair.get(1).unwrap_or(&pair[0])))
                .collect();
            levels.push(next);
        }
        Self { levels }
    }

    pub fn from_claims<'a>(claims: impl IntoIterator<Item = &'a (Pubkey, u64)>) -> Self {
        Self::new(
            claims
                .into_iter()
                .map(|(claimant, amount)| hash_leaf(claimant, *amount))
                .collect(),
        )
    }

    /// `None` for an empty tree.
    pub fn root(&self) -> Option<Node> {
        self.levels.last().and_then(|level| level.first()).copied()
    }

    pub fn proof(&self, leaf_index: usize) -> Option<Vec<Node>> {
        let leaves = self.levels.first()?;
        if leaf_index >= leaves.len() {
            return None;
        }

        let mut proof = Vec::with_capacity(self.levels.len().saturating_sub(1));
        let mut index = leaf_index;
        for level in self.levels.iter().take(self.levels.len().saturating_sub(1)) {
            let sibling = index ^ 1;
            proof.push(*level.get(sibling).unwrap_or(&level[index]));
            index /= 2;
        }
        Some(proof)
    }
}
