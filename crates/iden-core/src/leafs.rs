//! Leaves of the revocations tree and the roots tree.

use crate::claims::{I0, V0};
use iden_merkletree::Entry;
use iden_types::{ElemBytes, Hash, IdenError, IdenResult, DATA_LEN};

/// Version recorded for a nonce that is revoked for good.
pub const MAX_VERSION: u32 = 0xFFFF_FFFF;

fn u64_slot(elem: &ElemBytes) -> IdenResult<u64> {
    if elem.0[..24].iter().any(|b| *b != 0) {
        return Err(IdenError::Serialization("slot does not hold a u64".into()));
    }
    let mut n = [0u8; 8];
    n.copy_from_slice(&elem.0[24..]);
    Ok(u64::from_be_bytes(n))
}

/// Revocation tree leaf: the claim nonce in the index, the last valid
/// version in the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevocationLeaf {
    pub nonce: u64,
    pub version: u32,
}

impl RevocationLeaf {
    pub fn new(nonce: u64, version: u32) -> Self {
        Self { nonce, version }
    }

    pub fn revoked(nonce: u64) -> Self {
        Self::new(nonce, MAX_VERSION)
    }

    pub fn entry(&self) -> Entry {
        let mut data = [ElemBytes::zero(); DATA_LEN];
        data[I0] = ElemBytes::from_u64(self.nonce);
        data[V0] = ElemBytes::from_u64(u64::from(self.version));
        Entry::from_data(data)
    }

    pub fn from_entry(entry: &Entry) -> IdenResult<Self> {
        let data = entry.data();
        let version = u32::try_from(u64_slot(&data[V0])?)
            .map_err(|_| IdenError::Serialization("revocation version out of range".into()))?;
        Ok(Self {
            nonce: u64_slot(&data[I0])?,
            version,
        })
    }
}

/// Roots tree leaf: one claims tree root that has been committed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootLeaf {
    pub root: Hash,
}

impl RootLeaf {
    pub fn new(root: Hash) -> Self {
        Self { root }
    }

    pub fn entry(&self) -> Entry {
        let mut data = [ElemBytes::zero(); DATA_LEN];
        data[I0] = self.root.into();
        Entry::from_data(data)
    }

    pub fn from_entry(entry: &Entry) -> IdenResult<Self> {
        Ok(Self {
            root: entry.data()[I0].to_hash()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revocation_leaf_roundtrip() {
        let leaf = RevocationLeaf::revoked(42);
        assert_eq!(leaf.version, MAX_VERSION);
        assert_eq!(RevocationLeaf::from_entry(&leaf.entry()).unwrap(), leaf);
    }

    #[test]
    fn test_revocation_leaf_index_only_nonce() {
        let a = RevocationLeaf::new(7, 1).entry();
        let b = RevocationLeaf::revoked(7).entry();
        assert_eq!(a.h_index().unwrap(), b.h_index().unwrap());
        assert_ne!(a.h_value().unwrap(), b.h_value().unwrap());
    }

    #[test]
    fn test_root_leaf_roundtrip() {
        let leaf = RootLeaf::new(Hash::from_u64(99));
        assert_eq!(RootLeaf::from_entry(&leaf.entry()).unwrap(), leaf);
    }
}
