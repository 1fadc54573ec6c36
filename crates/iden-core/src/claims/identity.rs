use super::{
    capacity, elem_payload, full_elem, get_array, put_bytes, read_flat, write_flat, ClaimHeader,
    ClaimVariant, Metadata, Subject, SubjectKind, CLAIM_TYPE_ASSIGN_NAME, CLAIM_TYPE_OTHER_IDEN,
    CLAIM_TYPE_SET_ROOT_KEY, I0, I2, INDEX_FLAT_NO_SUBJECT, INDEX_PAYLOAD_AT, V2, VALUE_FLAT,
};
use iden_crypto::hash_string;
use iden_merkletree::Entry;
use iden_types::{ElemBytes, Hash, Id, IdenError, IdenResult, DATA_LEN, ELEM_PAYLOAD_LEN};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

pub const OTHER_IDEN_INDEX_LEN: usize = capacity(INDEX_FLAT_NO_SUBJECT);
pub const OTHER_IDEN_VALUE_LEN: usize = capacity(VALUE_FLAT);

fn other_subject(metadata: &Metadata) -> IdenResult<Id> {
    metadata
        .subject()
        .id()
        .ok_or_else(|| IdenError::HeaderMismatch("claim has no identity subject".into()))
}

/// Opaque payload about another identity, named in index slot 1.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimOtherIden {
    metadata: Metadata,
    #[serde_as(as = "serde_with::Bytes")]
    index: [u8; OTHER_IDEN_INDEX_LEN],
    #[serde_as(as = "serde_with::Bytes")]
    value: [u8; OTHER_IDEN_VALUE_LEN],
}

impl ClaimOtherIden {
    pub const HEADER: ClaimHeader =
        ClaimHeader::new(CLAIM_TYPE_OTHER_IDEN, SubjectKind::OtherIdenIndex, true);

    pub fn new(id: Id, index: &[u8], value: &[u8]) -> IdenResult<Self> {
        if index.len() > OTHER_IDEN_INDEX_LEN || value.len() > OTHER_IDEN_VALUE_LEN {
            return Err(IdenError::FieldOverflow(format!(
                "other-identity payload {}+{} bytes exceeds {}+{}",
                index.len(),
                value.len(),
                OTHER_IDEN_INDEX_LEN,
                OTHER_IDEN_VALUE_LEN
            )));
        }
        let mut claim = Self {
            metadata: Metadata::unchecked(Self::HEADER, Subject::OtherIdenIndex(id)),
            index: [0u8; OTHER_IDEN_INDEX_LEN],
            value: [0u8; OTHER_IDEN_VALUE_LEN],
        };
        claim.index[..index.len()].copy_from_slice(index);
        claim.value[..value.len()].copy_from_slice(value);
        Ok(claim)
    }

    pub fn id(&self) -> IdenResult<Id> {
        other_subject(&self.metadata)
    }

    pub fn index_data(&self) -> &[u8; OTHER_IDEN_INDEX_LEN] {
        &self.index
    }

    pub fn value_data(&self) -> &[u8; OTHER_IDEN_VALUE_LEN] {
        &self.value
    }
}

impl ClaimVariant for ClaimOtherIden {
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
        write_flat(&mut data, INDEX_FLAT_NO_SUBJECT, &self.index);
        write_flat(&mut data, VALUE_FLAT, &self.value);
        self.metadata.marshal(&mut data);
        Entry::from_data(data)
    }

    fn from_entry(entry: &Entry) -> IdenResult<Self> {
        let metadata = Metadata::decode_as(entry, &Self::HEADER)?;
        let mut index = [0u8; OTHER_IDEN_INDEX_LEN];
        let mut value = [0u8; OTHER_IDEN_VALUE_LEN];
        read_flat(entry.data(), INDEX_FLAT_NO_SUBJECT, &mut index)?;
        read_flat(entry.data(), VALUE_FLAT, &mut value)?;
        Ok(Self {
            metadata,
            index,
            value,
        })
    }
}

/// Binds a name to an identity. Only the name hash is stored, in index slot 2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimAssignName {
    metadata: Metadata,
    name_hash: [u8; ELEM_PAYLOAD_LEN],
}

impl ClaimAssignName {
    pub const HEADER: ClaimHeader =
        ClaimHeader::new(CLAIM_TYPE_ASSIGN_NAME, SubjectKind::OtherIdenValue, false);

    pub fn new(name: &str, id: Id) -> Self {
        Self::from_name_hash(hash_string(name), id)
    }

    pub fn from_name_hash(name_hash: [u8; ELEM_PAYLOAD_LEN], id: Id) -> Self {
        Self {
            metadata: Metadata::unchecked(Self::HEADER, Subject::OtherIdenValue(id)),
            name_hash,
        }
    }

    pub fn name_hash(&self) -> &[u8; ELEM_PAYLOAD_LEN] {
        &self.name_hash
    }

    pub fn id(&self) -> IdenResult<Id> {
        other_subject(&self.metadata)
    }
}

impl ClaimVariant for ClaimAssignName {
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
        put_bytes(&mut data[I2], 1, &self.name_hash);
        self.metadata.marshal(&mut data);
        Entry::from_data(data)
    }

    fn from_entry(entry: &Entry) -> IdenResult<Self> {
        let metadata = Metadata::decode_as(entry, &Self::HEADER)?;
        Ok(Self {
            metadata,
            name_hash: elem_payload(entry.data(), I2)?,
        })
    }
}

/// Root key of another identity for a given era. The era is part of the
/// index so each era gets its own claim, and the key in value slot 2 can
/// be rotated by bumping the version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSetRootKey {
    metadata: Metadata,
    era: u32,
    root_key: Hash,
}

impl ClaimSetRootKey {
    pub const HEADER: ClaimHeader =
        ClaimHeader::new(CLAIM_TYPE_SET_ROOT_KEY, SubjectKind::OtherIdenIndex, true);

    pub fn new(id: Id, root_key: Hash, era: u32) -> IdenResult<Self> {
        Ok(Self {
            metadata: Metadata::unchecked(Self::HEADER, Subject::OtherIdenIndex(id)),
            era,
            root_key: Hash::from_bytes(root_key.0)?,
        })
    }

    pub fn id(&self) -> IdenResult<Id> {
        other_subject(&self.metadata)
    }

    pub fn era(&self) -> u32 {
        self.era
    }

    pub fn root_key(&self) -> &Hash {
        &self.root_key
    }
}

impl ClaimVariant for ClaimSetRootKey {
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
        put_bytes(&mut data[I0], INDEX_PAYLOAD_AT, &self.era.to_be_bytes());
        data[V2] = self.root_key.into();
        self.metadata.marshal(&mut data);
        Entry::from_data(data)
    }

    fn from_entry(entry: &Entry) -> IdenResult<Self> {
        let metadata = Metadata::decode_as(entry, &Self::HEADER)?;
        let data = entry.data();
        Ok(Self {
            metadata,
            era: u32::from_be_bytes(get_array(&data[I0], INDEX_PAYLOAD_AT)),
            root_key: full_elem(data, V2)?.to_hash()?,
        })
    }
}
