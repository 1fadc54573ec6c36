use crate::entry::Entry;
use iden_crypto::hash_hashes;
use iden_types::{Hash, IdenError, IdenResult, ENTRY_BYTES_LEN, HASH_LEN, INDEX_SLOTS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeType {
    Middle = 0,
    Leaf = 1,
    Empty = 2,
}

impl TryFrom<u8> for NodeType {
    type Error = IdenError;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        match b {
            0 => Ok(NodeType::Middle),
            1 => Ok(NodeType::Leaf),
            2 => Ok(NodeType::Empty),
            other => Err(IdenError::Storage(format!("unknown node type {}", other))),
        }
    }
}

/// Stored value header: node type byte plus index length (u32, LE).
const NODE_HEADER_LEN: usize = 5;

/// A tree node.
///
/// A leaf sits at the shallowest depth where its path no longer collides
/// with any other leaf, so a subtree holding one claim is a single node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Empty,
    Middle { left: Hash, right: Hash },
    Leaf(Entry),
}

/// Key of a leaf: `H(hi, hv, 1)`.
pub fn leaf_key(h_index: &Hash, h_value: &Hash) -> IdenResult<Hash> {
    hash_hashes(&[*h_index, *h_value, Hash::from_u64(1)])
}

/// Key of a middle node: `H(left, right)`.
pub fn middle_key(left: &Hash, right: &Hash) -> IdenResult<Hash> {
    hash_hashes(&[*left, *right])
}

impl Node {
    pub fn node_type(&self) -> NodeType {
        match self {
            Node::Empty => NodeType::Empty,
            Node::Middle { .. } => NodeType::Middle,
            Node::Leaf(_) => NodeType::Leaf,
        }
    }

    pub fn key(&self) -> IdenResult<Hash> {
        match self {
            Node::Empty => Ok(Hash::zero()),
            Node::Middle { left, right } => middle_key(left, right),
            Node::Leaf(entry) => {
                let (hi, hv) = entry.hi_hv()?;
                leaf_key(&hi, &hv)
            }
        }
    }

    pub fn to_value(&self) -> Vec<u8> {
        let (index_len, payload): (u32, Vec<u8>) = match self {
            Node::Empty => (0, Vec::new()),
            Node::Middle { left, right } => {
                let mut p = Vec::with_capacity(2 * HASH_LEN);
                p.extend_from_slice(left.as_bytes());
                p.extend_from_slice(right.as_bytes());
                (0, p)
            }
            Node::Leaf(entry) => (INDEX_SLOTS as u32, entry.to_bytes()),
        };

        let mut out = Vec::with_capacity(NODE_HEADER_LEN + payload.len());
        out.push(self.node_type() as u8);
        out.extend_from_slice(&index_len.to_le_bytes());
        out.extend_from_slice(&payload);
        out
    }

    pub fn from_value(bytes: &[u8]) -> IdenResult<Self> {
        if bytes.len() < NODE_HEADER_LEN {
            return Err(IdenError::Storage("node value too short".into()));
        }
        let payload = &bytes[NODE_HEADER_LEN..];

        match NodeType::try_from(bytes[0])? {
            NodeType::Empty => Ok(Node::Empty),
            NodeType::Middle => {
                if payload.len() != 2 * HASH_LEN {
                    return Err(IdenError::Storage("invalid middle node length".into()));
                }
                Ok(Node::Middle {
                    left: Hash::from_slice(&payload[..HASH_LEN])?,
                    right: Hash::from_slice(&payload[HASH_LEN..])?,
                })
            }
            NodeType::Leaf => {
                if payload.len() != ENTRY_BYTES_LEN {
                    return Err(IdenError::Storage("invalid leaf node length".into()));
                }
                Ok(Node::Leaf(Entry::from_bytes(payload)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iden_types::ElemBytes;

    fn leaf() -> Node {
        let mut index = [ElemBytes::zero(); 4];
        index[0] = ElemBytes::from_u64(42);
        Node::Leaf(Entry::new(index, [ElemBytes::zero(); 4]))
    }

    #[test]
    fn test_value_roundtrip() {
        for node in [
            leaf(),
            Node::Middle {
                left: Hash::from_u64(1),
                right: Hash::zero(),
            },
        ] {
            let value = node.to_value();
            assert_eq!(Node::from_value(&value).unwrap(), node);
        }
    }

    #[test]
    fn test_leaf_header() {
        let value = leaf().to_value();
        assert_eq!(value[0], NodeType::Leaf as u8);
        assert_eq!(u32::from_le_bytes([value[1], value[2], value[3], value[4]]), 4);
        assert_eq!(value.len(), NODE_HEADER_LEN + ENTRY_BYTES_LEN);
    }

    #[test]
    fn test_empty_key_is_zero() {
        assert!(Node::Empty.key().unwrap().is_zero());
    }

    #[test]
    fn test_leaf_and_middle_keys_differ() {
        let a = Hash::from_u64(5);
        let b = Hash::from_u64(6);
        assert_ne!(leaf_key(&a, &b).unwrap(), middle_key(&a, &b).unwrap());
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(Node::from_value(&[9, 0, 0, 0, 0]).is_err());
    }
}
