use super::{
    full_elem, get_array, put_bytes, ClaimHeader, ClaimVariant, Metadata, Subject, SubjectKind,
    CLAIM_TYPE_LINK_OBJECT_IDENTITY, I0, I2, INDEX_PAYLOAD_AT, V2,
};
use iden_merkletree::Entry;
use iden_types::{ElemBytes, Id, IdenError, IdenResult, DATA_LEN};
use serde::{Deserialize, Serialize};

const OBJECT_TYPE_AT: usize = INDEX_PAYLOAD_AT;
const OBJECT_INDEX_AT: usize = INDEX_PAYLOAD_AT + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ObjectType {
    Passport = 0,
    Address = 1,
    Phone = 2,
    Dob = 3,
    GivenName = 4,
    FamilyName = 5,
    Certificate = 6,
    Storage = 7,
}

impl TryFrom<u32> for ObjectType {
    type Error = IdenError;

    fn try_from(n: u32) -> IdenResult<Self> {
        Ok(match n {
            0 => Self::Passport,
            1 => Self::Address,
            2 => Self::Phone,
            3 => Self::Dob,
            4 => Self::GivenName,
            5 => Self::FamilyName,
            6 => Self::Certificate,
            7 => Self::Storage,
            other => return Err(IdenError::Serialization(format!("unknown object type {}", other))),
        })
    }
}

/// Links an off-tree object (passport, phone, ...) to an identity by hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimLinkObjectIdentity {
    metadata: Metadata,
    object_type: ObjectType,
    object_index: u16,
    object_hash: ElemBytes,
    aux_data: ElemBytes,
}

impl ClaimLinkObjectIdentity {
    pub const HEADER: ClaimHeader =
        ClaimHeader::new(CLAIM_TYPE_LINK_OBJECT_IDENTITY, SubjectKind::OtherIdenIndex, true);

    pub fn new(
        id: Id,
        object_type: ObjectType,
        object_index: u16,
        object_hash: ElemBytes,
        aux_data: ElemBytes,
    ) -> IdenResult<Self> {
        for elem in [&object_hash, &aux_data] {
            if !elem.in_field() {
                return Err(IdenError::FieldOverflow(elem.to_hex()));
            }
        }
        Ok(Self {
            metadata: Metadata::unchecked(Self::HEADER, Subject::OtherIdenIndex(id)),
            object_type,
            object_index,
            object_hash,
            aux_data,
        })
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn object_index(&self) -> u16 {
        self.object_index
    }

    pub fn object_hash(&self) -> &ElemBytes {
        &self.object_hash
    }

    pub fn aux_data(&self) -> &ElemBytes {
        &self.aux_data
    }
}

impl ClaimVariant for ClaimLinkObjectIdentity {
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
        put_bytes(&mut data[I0], OBJECT_TYPE_AT, &(self.object_type as u32).to_be_bytes());
        put_bytes(&mut data[I0], OBJECT_INDEX_AT, &self.object_index.to_be_bytes());
        data[I2] = self.object_hash;
        data[V2] = self.aux_data;
        self.metadata.marshal(&mut data);
        Entry::from_data(data)
    }

    fn from_entry(entry: &Entry) -> IdenResult<Self> {
        let metadata = Metadata::decode_as(entry, &Self::HEADER)?;
        let data = entry.data();
        Ok(Self {
            metadata,
            object_type: u32::from_be_bytes(get_array(&data[I0], OBJECT_TYPE_AT)).try_into()?,
            object_index: u16::from_be_bytes(get_array(&data[I0], OBJECT_INDEX_AT)),
            object_hash: full_elem(data, I2)?,
            aux_data: full_elem(data, V2)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::Claim;
    use iden_types::ID_TYPE_BJP0;

    fn sample() -> ClaimLinkObjectIdentity {
        ClaimLinkObjectIdentity::new(
            Id::new(ID_TYPE_BJP0, [4u8; 27]),
            ObjectType::Phone,
            2,
            ElemBytes::from_u64(0x1234),
            ElemBytes::from_u64(0x5678),
        )
        .unwrap()
    }

    #[test]
    fn test_link_roundtrip() {
        let claim = sample();
        let back = Claim::from_entry(&claim.entry()).unwrap();
        assert_eq!(back, Claim::LinkObjectIdentity(claim));
    }

    #[test]
    fn test_aux_data_not_in_index() {
        let a = sample();
        let b = ClaimLinkObjectIdentity::new(
            Id::new(ID_TYPE_BJP0, [4u8; 27]),
            ObjectType::Phone,
            2,
            ElemBytes::from_u64(0x1234),
            ElemBytes::from_u64(0x9999),
        )
        .unwrap();
        assert_eq!(a.entry().h_index().unwrap(), b.entry().h_index().unwrap());
    }

    #[test]
    fn test_unknown_object_type_rejected() {
        let mut data = *sample().entry().data();
        put_bytes(&mut data[I0], OBJECT_TYPE_AT, &99u32.to_be_bytes());
        assert!(ClaimLinkObjectIdentity::from_entry(&Entry::from_data(data)).is_err());
    }
}
