//! Merkle proofs of existence and non-existence.
//!
//! Serialized layout:
//!
//! | bytes | content |
//! |---|---|
//! | 0 | flags: `0x01` non-existence, `0x02` aux node present |
//! | 1 | depth |
//! | 2..32 | bitmap of levels with a non-empty sibling |
//! | 32.. | non-empty siblings, 32 bytes each, root side first |
//! | tail | aux `hi ‖ hv` when flag `0x02` is set |

use crate::node::{leaf_key, middle_key};
use crate::path::{set_bit, test_bit};
use iden_types::{Hash, IdenError, IdenResult, HASH_LEN};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Bytes of the sibling bitmap.
pub const NOT_EMPTIES_LEN: usize = 30;

/// Deepest level a proof can describe.
pub const MAX_PROOF_DEPTH: usize = NOT_EMPTIES_LEN * 8;

const PROOF_HEADER_LEN: usize = 2 + NOT_EMPTIES_LEN;
const FLAG_NON_EXISTENCE: u8 = 0x01;
const FLAG_NODE_AUX: u8 = 0x02;

/// A different leaf met on the path of a non-existence proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAux {
    pub h_index: Hash,
    pub h_value: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    pub existence: bool,
    depth: usize,
    not_empties: [u8; NOT_EMPTIES_LEN],
    siblings: Vec<Hash>,
    pub node_aux: Option<NodeAux>,
}

impl Proof {
    pub(crate) fn builder() -> ProofBuilder {
        ProofBuilder {
            depth: 0,
            not_empties: [0u8; NOT_EMPTIES_LEN],
            siblings: Vec::new(),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Non-empty siblings only, root side first.
    pub fn siblings(&self) -> &[Hash] {
        &self.siblings
    }

    /// One sibling per level with empty levels filled in.
    pub fn all_siblings(&self) -> Vec<Hash> {
        let mut out = Vec::with_capacity(self.depth);
        let mut next = self.siblings.iter();
        for lvl in 0..self.depth {
            if test_bit(&self.not_empties, lvl) {
                out.push(next.next().copied().unwrap_or_default());
            } else {
                out.push(Hash::zero());
            }
        }
        out
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let aux_len = if self.node_aux.is_some() { 2 * HASH_LEN } else { 0 };
        let mut out = Vec::with_capacity(PROOF_HEADER_LEN + self.siblings.len() * HASH_LEN + aux_len);

        let mut flags = 0u8;
        if !self.existence {
            flags |= FLAG_NON_EXISTENCE;
        }
        if self.node_aux.is_some() {
            flags |= FLAG_NODE_AUX;
        }
        out.push(flags);
        out.push(self.depth as u8);
        out.extend_from_slice(&self.not_empties);
        for sibling in &self.siblings {
            out.extend_from_slice(sibling.as_bytes());
        }
        if let Some(aux) = &self.node_aux {
            out.extend_from_slice(aux.h_index.as_bytes());
            out.extend_from_slice(aux.h_value.as_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> IdenResult<Self> {
        if bytes.len() < PROOF_HEADER_LEN {
            return Err(IdenError::InvalidProof("proof shorter than header".into()));
        }
        let flags = bytes[0];
        if flags & !(FLAG_NON_EXISTENCE | FLAG_NODE_AUX) != 0 {
            return Err(IdenError::InvalidProof(format!("unknown flags {:#04x}", flags)));
        }
        let existence = flags & FLAG_NON_EXISTENCE == 0;
        let has_aux = flags & FLAG_NODE_AUX != 0;
        if existence && has_aux {
            return Err(IdenError::InvalidProof("existence proof with aux node".into()));
        }

        let depth = bytes[1] as usize;
        if depth > MAX_PROOF_DEPTH {
            return Err(IdenError::InvalidProof(format!("depth {} too large", depth)));
        }

        let mut not_empties = [0u8; NOT_EMPTIES_LEN];
        not_empties.copy_from_slice(&bytes[2..PROOF_HEADER_LEN]);
        if (depth..MAX_PROOF_DEPTH).any(|lvl| test_bit(&not_empties, lvl)) {
            return Err(IdenError::InvalidProof("sibling marked below proof depth".into()));
        }

        let n_siblings = (0..depth).filter(|lvl| test_bit(&not_empties, *lvl)).count();
        let aux_len = if has_aux { 2 * HASH_LEN } else { 0 };
        let expected = PROOF_HEADER_LEN + n_siblings * HASH_LEN + aux_len;
        if bytes.len() != expected {
            return Err(IdenError::InvalidProof(format!(
                "expected {} bytes, got {}",
                expected,
                bytes.len()
            )));
        }

        let sibling_bytes = &bytes[PROOF_HEADER_LEN..PROOF_HEADER_LEN + n_siblings * HASH_LEN];
        let siblings = sibling_bytes
            .chunks_exact(HASH_LEN)
            .map(Hash::from_slice)
            .collect::<IdenResult<Vec<_>>>()?;

        let node_aux = if has_aux {
            let tail = &bytes[bytes.len() - aux_len..];
            Some(NodeAux {
                h_index: Hash::from_slice(&tail[..HASH_LEN])?,
                h_value: Hash::from_slice(&tail[HASH_LEN..])?,
            })
        } else {
            None
        };

        Ok(Self {
            existence,
            depth,
            not_empties,
            siblings,
            node_aux,
        })
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    pub fn from_hex(s: &str) -> IdenResult<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| IdenError::Serialization(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl Serialize for Proof {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Proof {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

pub(crate) struct ProofBuilder {
    depth: usize,
    not_empties: [u8; NOT_EMPTIES_LEN],
    siblings: Vec<Hash>,
}

impl ProofBuilder {
    /// Records the sibling seen at the current depth and moves one level down.
    pub(crate) fn descend(&mut self, sibling: Hash) {
        if !sibling.is_zero() {
            set_bit(&mut self.not_empties, self.depth);
            self.siblings.push(sibling);
        }
        self.depth += 1;
    }

    pub(crate) fn finish(self, existence: bool, node_aux: Option<NodeAux>) -> Proof {
        Proof {
            existence,
            depth: self.depth,
            not_empties: self.not_empties,
            siblings: self.siblings,
            node_aux,
        }
    }
}

/// Recomputes the root implied by `proof` for the pair `(hi, hv)`.
///
/// For non-existence proofs `hv` is not used: the bottom of the path is
/// either empty or the aux leaf.
pub fn root_from_proof(proof: &Proof, h_index: &Hash, h_value: &Hash) -> IdenResult<Hash> {
    let mut mid = if proof.existence {
        leaf_key(h_index, h_value)?
    } else if let Some(aux) = &proof.node_aux {
        if aux.h_index == *h_index {
            return Err(IdenError::InvalidProof(
                "non-existence proof with aux node at the same index".into(),
            ));
        }
        leaf_key(&aux.h_index, &aux.h_value)?
    } else {
        Hash::zero()
    };

    let mut remaining = proof.siblings.len();
    for lvl in (0..proof.depth).rev() {
        let sibling = if test_bit(&proof.not_empties, lvl) {
            if remaining == 0 {
                return Err(IdenError::InvalidProof("not enough siblings".into()));
            }
            remaining -= 1;
            proof.siblings[remaining]
        } else {
            Hash::zero()
        };

        mid = if test_bit(h_index.as_bytes(), lvl) {
            middle_key(&sibling, &mid)?
        } else {
            middle_key(&mid, &sibling)?
        };
    }

    if remaining != 0 {
        return Err(IdenError::InvalidProof("unused siblings".into()));
    }
    Ok(mid)
}

/// True if `proof` links `(hi, hv)` to `root`. Malformed proofs verify false.
pub fn verify_proof(root: &Hash, proof: &Proof, h_index: &Hash, h_value: &Hash) -> bool {
    match root_from_proof(proof, h_index, h_value) {
        Ok(computed) => computed == *root,
        Err(_) => false,
    }
}
