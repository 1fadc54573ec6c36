use super::{
    capacity, read_flat, write_flat, ClaimHeader, ClaimVariant, Metadata, Subject, SubjectKind,
    CLAIM_TYPE_BASIC, INDEX_FLAT, VALUE_FLAT,
};
use iden_merkletree::Entry;
use iden_types::{ElemBytes, IdenError, IdenResult, DATA_LEN};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

pub const BASIC_INDEX_LEN: usize = capacity(INDEX_FLAT);
pub const BASIC_VALUE_LEN: usize = capacity(VALUE_FLAT);

/// Opaque index and value payload about the issuer itself.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimBasic {
    metadata: Metadata,
    #[serde_as(as = "serde_with::Bytes")]
    index: [u8; BASIC_INDEX_LEN],
    #[serde_as(as = "serde_with::Bytes")]
    value: [u8; BASIC_VALUE_LEN],
}

impl ClaimBasic {
    pub const HEADER: ClaimHeader = ClaimHeader::new(CLAIM_TYPE_BASIC, SubjectKind::SelfIden, true);

    /// Payloads shorter than the slots are zero padded on the right.
    pub fn new(index: &[u8], value: &[u8]) -> IdenResult<Self> {
        if index.len() > BASIC_INDEX_LEN || value.len() > BASIC_VALUE_LEN {
            return Err(IdenError::FieldOverflow(format!(
                "basic claim payload {}+{} bytes exceeds {}+{}",
                index.len(),
                value.len(),
                BASIC_INDEX_LEN,
                BASIC_VALUE_LEN
            )));
        }
        let mut claim = Self {
            metadata: Metadata::unchecked(Self::HEADER, Subject::SelfIden),
            index: [0u8; BASIC_INDEX_LEN],
            value: [0u8; BASIC_VALUE_LEN],
        };
        claim.index[..index.len()].copy_from_slice(index);
        claim.value[..value.len()].copy_from_slice(value);
        Ok(claim)
    }

    pub fn index_data(&self) -> &[u8; BASIC_INDEX_LEN] {
        &self.index
    }

    pub fn value_data(&self) -> &[u8; BASIC_VALUE_LEN] {
        &self.value
    }
}

impl ClaimVariant for ClaimBasic {
    fn header() -> ClaimHeader {
        Self::HEADER
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    fn entry(&self) -> Entry {
        let mut data = [ElemBytes::zero(); DATA_LEN];
        write_flat(&mut data, INDEX_FLAT, &self.index);
        write_flat(&mut data, VALUE_FLAT, &self.value);
        self.metadata.marshal(&mut data);
        Entry::from_data(data)
    }

    fn from_entry(entry: &Entry) -> IdenResult<Self> {
        let metadata = Metadata::decode_as(entry, &Self::HEADER)?;
        let mut index = [0u8; BASIC_INDEX_LEN];
        let mut value = [0u8; BASIC_VALUE_LEN];
        read_flat(entry.data(), INDEX_FLAT, &mut index)?;
        read_flat(entry.data(), VALUE_FLAT, &mut value)?;
        Ok(Self {
            metadata,
            index,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::Claim;
    use proptest::prelude::*;

    #[test]
    fn test_basic_roundtrip_through_dispatch() {
        let mut claim = ClaimBasic::new(b"c1", b"hello").unwrap();
        claim.metadata_mut().version = 3;
        claim.metadata_mut().rev_nonce = 77;

        let entry = claim.entry();
        assert!(entry.in_field());
        match Claim::from_entry(&entry).unwrap() {
            Claim::Basic(back) => assert_eq!(back, claim),
            other => panic!("unexpected variant {:?}", other),
        }
    }

    #[test]
    fn test_payload_too_large() {
        assert!(ClaimBasic::new(&[1u8; BASIC_INDEX_LEN], &[]).is_ok());
        let err = ClaimBasic::new(&[1u8; BASIC_INDEX_LEN + 1], &[]).unwrap_err();
        assert!(matches!(err, IdenError::FieldOverflow(_)));
    }

    #[test]
    fn test_index_payload_changes_hi_not_version() {
        let a = ClaimBasic::new(b"c1", b"").unwrap();
        let mut b = a.clone();
        b.metadata_mut().version = 1;
        let c = ClaimBasic::new(b"c2", b"").unwrap();
        let hi = |x: &ClaimBasic| x.entry().h_index().unwrap();
        assert_ne!(hi(&a), hi(&b));
        assert_ne!(hi(&a), hi(&c));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_basic_roundtrip(
            index in proptest::collection::vec(any::<u8>(), 0..=BASIC_INDEX_LEN),
            value in proptest::collection::vec(any::<u8>(), 0..=BASIC_VALUE_LEN),
            version in any::<u32>(),
            nonce in any::<u64>(),
            expiration in proptest::option::of(any::<i64>()),
        ) {
            let mut claim = ClaimBasic::new(&index, &value).unwrap();
            claim.metadata_mut().version = version;
            claim.metadata_mut().rev_nonce = nonce;
            claim.metadata_mut().expiration = expiration;
            let entry = claim.entry();
            prop_assert!(entry.in_field());
            prop_assert_eq!(ClaimBasic::from_entry(&entry).unwrap(), claim);
        }
    }
}
