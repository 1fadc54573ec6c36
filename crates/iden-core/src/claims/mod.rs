//! Claim codec.
//!
//! Every claim is eight big-endian slots, four index and four value. Byte 0
//! of each slot is reserved and stays zero so the slot is always a field
//! element. Slot 0 of each half carries the metadata header:
//!
//! | slot | bytes | content |
//! |---|---|---|
//! | index 0 | 1..9 | claim type |
//! | index 0 | 9 | flags: bits 0-2 subject kind, bit 3 expiration, bit 4 updatable |
//! | index 0 | 10..14 | version (u32) |
//! | index 0 | 14..32 | variant payload |
//! | value 0 | 1..9 | revocation nonce (u64) |
//! | value 0 | 9..17 | expiration (i64 unix seconds) |
//! | value 0 | 17..32 | variant payload |
//!
//! The subject identity (or object hash) sits in index 1 or value 1
//! depending on the subject kind. All other slots are variant payload.

mod basic;
mod eth;
mod identity;
mod key;
mod link;
mod service;

pub use basic::{ClaimBasic, BASIC_INDEX_LEN, BASIC_VALUE_LEN};
pub use eth::{ClaimAuthEthKey, ClaimEthId, EthKeyType, ETH_ADDRESS_LEN};
pub use identity::{ClaimAssignName, ClaimOtherIden, ClaimSetRootKey, OTHER_IDEN_INDEX_LEN, OTHER_IDEN_VALUE_LEN};
pub use key::{ClaimAuthorizeKSignSecp256k1, ClaimKeyBabyJub};
pub use link::{ClaimLinkObjectIdentity, ObjectType};
pub use service::{ClaimAuthorizeService, ServiceType};

use iden_merkletree::Entry;
use iden_types::{ElemBytes, Id, IdenError, IdenResult, DATA_LEN, ELEM_BYTES_LEN};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const CLAIM_TYPE_LEN: usize = 8;

const TYPE_AT: usize = 1;
const FLAGS_AT: usize = 9;
const VERSION_AT: usize = 10;
const NONCE_AT: usize = 1;
const EXPIRATION_AT: usize = 9;

/// First payload byte of index slot 0.
pub(crate) const INDEX_PAYLOAD_AT: usize = 14;
/// First payload byte of value slot 0.
pub(crate) const VALUE_PAYLOAD_AT: usize = 17;

const FLAG_SUBJECT_MASK: u8 = 0b0000_0111;
const FLAG_EXPIRATION: u8 = 0b0000_1000;
const FLAG_UPDATABLE: u8 = 0b0001_0000;
const FLAG_RESERVED: u8 = !(FLAG_SUBJECT_MASK | FLAG_EXPIRATION | FLAG_UPDATABLE);

pub(crate) const I0: usize = 0;
pub(crate) const I1: usize = 1;
pub(crate) const I2: usize = 2;
pub(crate) const I3: usize = 3;
pub(crate) const V0: usize = 4;
pub(crate) const V1: usize = 5;
pub(crate) const V2: usize = 6;
pub(crate) const V3: usize = 7;

/// Runs of `(slot, first byte)` a flat payload is spread over. Each run
/// ends at the last byte of its slot.
pub(crate) type Segments = &'static [(usize, usize)];

pub(crate) const INDEX_FLAT: Segments = &[(I0, INDEX_PAYLOAD_AT), (I1, 1), (I2, 1), (I3, 1)];
pub(crate) const INDEX_FLAT_NO_SUBJECT: Segments = &[(I0, INDEX_PAYLOAD_AT), (I2, 1), (I3, 1)];
pub(crate) const VALUE_FLAT: Segments = &[(V0, VALUE_PAYLOAD_AT), (V1, 1), (V2, 1), (V3, 1)];
pub(crate) const VALUE_FLAT_NO_SUBJECT: Segments = &[(V0, VALUE_PAYLOAD_AT), (V2, 1), (V3, 1)];

pub(crate) const fn capacity(segments: Segments) -> usize {
    let mut total = 0;
    let mut i = 0;
    while i < segments.len() {
        total += ELEM_BYTES_LEN - segments[i].1;
        i += 1;
    }
    total
}

/// Copies `payload` across `segments`, zero-filling whatever is left.
pub(crate) fn write_flat(data: &mut [ElemBytes; DATA_LEN], segments: Segments, payload: &[u8]) {
    let mut rest = payload;
    for &(slot, start) in segments {
        let room = &mut data[slot].0[start..];
        let n = rest.len().min(room.len());
        room[..n].copy_from_slice(&rest[..n]);
        room[n..].fill(0);
        rest = &rest[n..];
    }
}

pub(crate) fn read_flat(data: &[ElemBytes; DATA_LEN], segments: Segments, out: &mut [u8]) -> IdenResult<()> {
    let mut filled = 0;
    for &(slot, start) in segments {
        check_reserved(data, slot)?;
        let room = &data[slot].0[start..];
        let n = (out.len() - filled).min(room.len());
        out[filled..filled + n].copy_from_slice(&room[..n]);
        filled += n;
    }
    Ok(())
}

pub(crate) fn check_reserved(data: &[ElemBytes; DATA_LEN], slot: usize) -> IdenResult<()> {
    if data[slot].0[0] != 0 {
        return Err(IdenError::Serialization(format!("reserved byte set in slot {}", slot)));
    }
    Ok(())
}

pub(crate) fn put_bytes(elem: &mut ElemBytes, at: usize, bytes: &[u8]) {
    elem.0[at..at + bytes.len()].copy_from_slice(bytes);
}

pub(crate) fn get_array<const N: usize>(elem: &ElemBytes, at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&elem.0[at..at + N]);
    out
}

/// Slot payload with the reserved byte checked.
pub(crate) fn elem_payload(data: &[ElemBytes; DATA_LEN], slot: usize) -> IdenResult<[u8; 31]> {
    check_reserved(data, slot)?;
    Ok(get_array(&data[slot], 1))
}

pub(crate) fn full_elem(data: &[ElemBytes; DATA_LEN], slot: usize) -> IdenResult<ElemBytes> {
    ElemBytes::from_bytes(data[slot].0)
}

/// Eight-byte claim type tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClaimType(pub [u8; CLAIM_TYPE_LEN]);

impl ClaimType {
    pub const fn from_num(n: u64) -> Self {
        Self(n.to_be_bytes())
    }

    /// Tag for claim types defined outside this crate.
    pub fn from_name(name: &str) -> Self {
        Self(iden_crypto::claim_type_tag(name))
    }

    pub fn as_u64(&self) -> u64 {
        u64::from_be_bytes(self.0)
    }

    pub fn name(&self) -> Option<&'static str> {
        let name = match *self {
            CLAIM_TYPE_BASIC => "basic",
            CLAIM_TYPE_KEY_BABYJUB => "key_babyjub",
            CLAIM_TYPE_OTHER_IDEN => "other_iden",
            CLAIM_TYPE_AUTHORIZE_KSIGN_SECP256K1 => "authorize_ksign_secp256k1",
            CLAIM_TYPE_ASSIGN_NAME => "assign_name",
            CLAIM_TYPE_SET_ROOT_KEY => "set_root_key",
            CLAIM_TYPE_LINK_OBJECT_IDENTITY => "link_object_identity",
            CLAIM_TYPE_ETH_ID => "eth_id",
            CLAIM_TYPE_AUTH_ETH_KEY => "auth_eth_key",
            CLAIM_TYPE_AUTHORIZE_SERVICE => "authorize_service",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Debug for ClaimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClaimType({})", self)
    }
}

impl fmt::Display for ClaimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "0x{}", hex::encode(self.0)),
        }
    }
}

pub const CLAIM_TYPE_BASIC: ClaimType = ClaimType::from_num(0);
pub const CLAIM_TYPE_KEY_BABYJUB: ClaimType = ClaimType::from_num(1);
pub const CLAIM_TYPE_OTHER_IDEN: ClaimType = ClaimType::from_num(2);
pub const CLAIM_TYPE_AUTHORIZE_KSIGN_SECP256K1: ClaimType = ClaimType::from_num(3);
pub const CLAIM_TYPE_ASSIGN_NAME: ClaimType = ClaimType::from_num(4);
pub const CLAIM_TYPE_SET_ROOT_KEY: ClaimType = ClaimType::from_num(5);
pub const CLAIM_TYPE_LINK_OBJECT_IDENTITY: ClaimType = ClaimType::from_num(6);
pub const CLAIM_TYPE_ETH_ID: ClaimType = ClaimType::from_num(7);
pub const CLAIM_TYPE_AUTH_ETH_KEY: ClaimType = ClaimType::from_num(8);
pub const CLAIM_TYPE_AUTHORIZE_SERVICE: ClaimType = ClaimType::from_num(9);

/// Who a claim is about, and which slot names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SubjectKind {
    SelfIden = 0,
    OtherIdenIndex = 1,
    OtherIdenValue = 2,
    ObjectIndex = 3,
    ObjectValue = 4,
}

impl SubjectKind {
    fn from_flags(flags: u8) -> IdenResult<Self> {
        Ok(match flags & FLAG_SUBJECT_MASK {
            0 => Self::SelfIden,
            1 => Self::OtherIdenIndex,
            2 => Self::OtherIdenValue,
            3 => Self::ObjectIndex,
            4 => Self::ObjectValue,
            other => {
                return Err(IdenError::HeaderMismatch(format!("unknown subject kind {}", other)))
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Subject {
    SelfIden,
    OtherIdenIndex(Id),
    OtherIdenValue(Id),
    ObjectIndex(ElemBytes),
    ObjectValue(ElemBytes),
}

impl Subject {
    pub fn kind(&self) -> SubjectKind {
        match self {
            Self::SelfIden => SubjectKind::SelfIden,
            Self::OtherIdenIndex(_) => SubjectKind::OtherIdenIndex,
            Self::OtherIdenValue(_) => SubjectKind::OtherIdenValue,
            Self::ObjectIndex(_) => SubjectKind::ObjectIndex,
            Self::ObjectValue(_) => SubjectKind::ObjectValue,
        }
    }

    pub fn id(&self) -> Option<Id> {
        match self {
            Self::OtherIdenIndex(id) | Self::OtherIdenValue(id) => Some(*id),
            _ => None,
        }
    }
}

/// The fixed part of a claim header. Version and expiration vary per
/// instance and live in [`Metadata`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimHeader {
    pub claim_type: ClaimType,
    pub subject: SubjectKind,
    pub updatable: bool,
}

impl ClaimHeader {
    pub const fn new(claim_type: ClaimType, subject: SubjectKind, updatable: bool) -> Self {
        Self {
            claim_type,
            subject,
            updatable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    header: ClaimHeader,
    subject: Subject,
    pub expiration: Option<i64>,
    pub version: u32,
    pub rev_nonce: u64,
}

impl Metadata {
    pub fn new(header: ClaimHeader, subject: Subject) -> IdenResult<Self> {
        if header.subject != subject.kind() {
            return Err(IdenError::HeaderMismatch(format!(
                "subject {:?} does not match header {:?}",
                subject.kind(),
                header.subject
            )));
        }
        Ok(Self::unchecked(header, subject))
    }

    pub(crate) fn unchecked(header: ClaimHeader, subject: Subject) -> Self {
        Self {
            header,
            subject,
            expiration: None,
            version: 0,
            rev_nonce: 0,
        }
    }

    pub fn header(&self) -> &ClaimHeader {
        &self.header
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Writes the header slots and the subject slot, leaving payload bytes alone.
    pub fn marshal(&self, data: &mut [ElemBytes; DATA_LEN]) {
        let mut flags = self.header.subject as u8;
        if self.expiration.is_some() {
            flags |= FLAG_EXPIRATION;
        }
        if self.header.updatable {
            flags |= FLAG_UPDATABLE;
        }

        let index0 = &mut data[I0];
        index0.0[0] = 0;
        put_bytes(index0, TYPE_AT, &self.header.claim_type.0);
        index0.0[FLAGS_AT] = flags;
        put_bytes(index0, VERSION_AT, &self.version.to_be_bytes());

        let value0 = &mut data[V0];
        value0.0[0] = 0;
        put_bytes(value0, NONCE_AT, &self.rev_nonce.to_be_bytes());
        put_bytes(value0, EXPIRATION_AT, &self.expiration.unwrap_or(0).to_be_bytes());

        match self.subject {
            Subject::SelfIden => {}
            Subject::OtherIdenIndex(id) => data[I1] = id.to_elem(),
            Subject::OtherIdenValue(id) => data[V1] = id.to_elem(),
            Subject::ObjectIndex(obj) => data[I1] = obj,
            Subject::ObjectValue(obj) => data[V1] = obj,
        }
    }

    pub fn unmarshal(entry: &Entry) -> IdenResult<Self> {
        let data = entry.data();
        check_reserved(data, I0)?;
        check_reserved(data, V0)?;

        let flags = data[I0].0[FLAGS_AT];
        if flags & FLAG_RESERVED != 0 {
            return Err(IdenError::HeaderMismatch(format!("reserved flags set: {:#04x}", flags)));
        }
        let kind = SubjectKind::from_flags(flags)?;
        let header = ClaimHeader {
            claim_type: ClaimType(get_array(&data[I0], TYPE_AT)),
            subject: kind,
            updatable: flags & FLAG_UPDATABLE != 0,
        };

        let subject = match kind {
            SubjectKind::SelfIden => Subject::SelfIden,
            SubjectKind::OtherIdenIndex => {
                check_reserved(data, I1)?;
                Subject::OtherIdenIndex(Id::from_elem(&data[I1])?)
            }
            SubjectKind::OtherIdenValue => {
                check_reserved(data, V1)?;
                Subject::OtherIdenValue(Id::from_elem(&data[V1])?)
            }
            SubjectKind::ObjectIndex => Subject::ObjectIndex(full_elem(data, I1)?),
            SubjectKind::ObjectValue => Subject::ObjectValue(full_elem(data, V1)?),
        };

        let expiration = if flags & FLAG_EXPIRATION != 0 {
            Some(i64::from_be_bytes(get_array(&data[V0], EXPIRATION_AT)))
        } else {
            None
        };

        Ok(Self {
            header,
            subject,
            expiration,
            version: u32::from_be_bytes(get_array(&data[I0], VERSION_AT)),
            rev_nonce: u64::from_be_bytes(get_array(&data[V0], NONCE_AT)),
        })
    }

    /// Reads the metadata and checks it against a variant's fixed header.
    pub(crate) fn decode_as(entry: &Entry, expected: &ClaimHeader) -> IdenResult<Self> {
        let metadata = Self::unmarshal(entry)?;
        if metadata.header != *expected {
            return Err(IdenError::HeaderMismatch(format!(
                "expected {} ({:?}, updatable {}), found {} ({:?}, updatable {})",
                expected.claim_type,
                expected.subject,
                expected.updatable,
                metadata.header.claim_type,
                metadata.header.subject,
                metadata.header.updatable
            )));
        }
        Ok(metadata)
    }
}

/// Type tag of any claim entry, without decoding the rest.
pub fn claim_type_of(entry: &Entry) -> ClaimType {
    ClaimType(get_array(&entry.data()[I0], TYPE_AT))
}

pub fn version_of(entry: &Entry) -> u32 {
    u32::from_be_bytes(get_array(&entry.data()[I0], VERSION_AT))
}

pub fn rev_nonce_of(entry: &Entry) -> u64 {
    u64::from_be_bytes(get_array(&entry.data()[V0], NONCE_AT))
}

/// Copy of `entry` with its version field replaced.
pub fn with_version(entry: &Entry, version: u32) -> Entry {
    let mut data = *entry.data();
    put_bytes(&mut data[I0], VERSION_AT, &version.to_be_bytes());
    Entry::from_data(data)
}

/// Behaviour shared by every concrete claim type.
pub trait ClaimVariant: Sized {
    fn header() -> ClaimHeader;
    fn metadata(&self) -> &Metadata;
    fn metadata_mut(&mut self) -> &mut Metadata;
    fn entry(&self) -> Entry;
    fn from_entry(entry: &Entry) -> IdenResult<Self>;
}

/// Any known claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "claim", rename_all = "snake_case")]
pub enum Claim {
    Basic(ClaimBasic),
    KeyBabyJub(ClaimKeyBabyJub),
    OtherIden(ClaimOtherIden),
    AuthorizeKSignSecp256k1(ClaimAuthorizeKSignSecp256k1),
    AssignName(ClaimAssignName),
    SetRootKey(ClaimSetRootKey),
    LinkObjectIdentity(ClaimLinkObjectIdentity),
    EthId(ClaimEthId),
    AuthEthKey(ClaimAuthEthKey),
    AuthorizeService(ClaimAuthorizeService),
}

macro_rules! each_variant {
    ($self:expr, $c:ident => $body:expr) => {
        match $self {
            Claim::Basic($c) => $body,
            Claim::KeyBabyJub($c) => $body,
            Claim::OtherIden($c) => $body,
            Claim::AuthorizeKSignSecp256k1($c) => $body,
            Claim::AssignName($c) => $body,
            Claim::SetRootKey($c) => $body,
            Claim::LinkObjectIdentity($c) => $body,
            Claim::EthId($c) => $body,
            Claim::AuthEthKey($c) => $body,
            Claim::AuthorizeService($c) => $body,
        }
    };
}

impl Claim {
    /// Decodes an entry into the variant its type tag names.
    pub fn from_entry(entry: &Entry) -> IdenResult<Self> {
        if !entry.in_field() {
            return Err(IdenError::FieldOverflow("claim entry slot out of field".into()));
        }
        let claim = match claim_type_of(entry) {
            CLAIM_TYPE_BASIC => Self::Basic(ClaimBasic::from_entry(entry)?),
            CLAIM_TYPE_KEY_BABYJUB => Self::KeyBabyJub(ClaimKeyBabyJub::from_entry(entry)?),
            CLAIM_TYPE_OTHER_IDEN => Self::OtherIden(ClaimOtherIden::from_entry(entry)?),
            CLAIM_TYPE_AUTHORIZE_KSIGN_SECP256K1 => {
                Self::AuthorizeKSignSecp256k1(ClaimAuthorizeKSignSecp256k1::from_entry(entry)?)
            }
            CLAIM_TYPE_ASSIGN_NAME => Self::AssignName(ClaimAssignName::from_entry(entry)?),
            CLAIM_TYPE_SET_ROOT_KEY => Self::SetRootKey(ClaimSetRootKey::from_entry(entry)?),
            CLAIM_TYPE_LINK_OBJECT_IDENTITY => {
                Self::LinkObjectIdentity(ClaimLinkObjectIdentity::from_entry(entry)?)
            }
            CLAIM_TYPE_ETH_ID => Self::EthId(ClaimEthId::from_entry(entry)?),
            CLAIM_TYPE_AUTH_ETH_KEY => Self::AuthEthKey(ClaimAuthEthKey::from_entry(entry)?),
            CLAIM_TYPE_AUTHORIZE_SERVICE => {
                Self::AuthorizeService(ClaimAuthorizeService::from_entry(entry)?)
            }
            other => return Err(IdenError::InvalidClaimType(other.to_string())),
        };
        Ok(claim)
    }

    pub fn entry(&self) -> Entry {
        each_variant!(self, c => c.entry())
    }

    pub fn metadata(&self) -> &Metadata {
        each_variant!(self, c => c.metadata())
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        each_variant!(self, c => c.metadata_mut())
    }

    pub fn claim_type(&self) -> ClaimType {
        self.metadata().header().claim_type
    }
}

macro_rules! impl_from_variant {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Claim {
                fn from(c: $ty) -> Self {
                    Claim::$variant(c)
                }
            }
        )*
    };
}

impl_from_variant!(
    Basic(ClaimBasic),
    KeyBabyJub(ClaimKeyBabyJub),
    OtherIden(ClaimOtherIden),
    AuthorizeKSignSecp256k1(ClaimAuthorizeKSignSecp256k1),
    AssignName(ClaimAssignName),
    SetRootKey(ClaimSetRootKey),
    LinkObjectIdentity(ClaimLinkObjectIdentity),
    EthId(ClaimEthId),
    AuthEthKey(ClaimAuthEthKey),
    AuthorizeService(ClaimAuthorizeService),
);

#[cfg(test)]
mod tests {
    use super::*;
    use iden_types::ID_TYPE_BJP0;

    fn sample_id() -> Id {
        Id::new(ID_TYPE_BJP0, [7u8; 27])
    }

    #[test]
    fn test_capacities() {
        assert_eq!(capacity(INDEX_FLAT), 18 + 3 * 31);
        assert_eq!(capacity(INDEX_FLAT_NO_SUBJECT), 18 + 2 * 31);
        assert_eq!(capacity(VALUE_FLAT), 15 + 3 * 31);
        assert_eq!(capacity(VALUE_FLAT_NO_SUBJECT), 15 + 2 * 31);
    }

    #[test]
    fn test_flat_roundtrip() {
        let payload: Vec<u8> = (0..capacity(INDEX_FLAT) as u32).map(|i| i as u8).collect();
        let mut data = [ElemBytes::zero(); DATA_LEN];
        write_flat(&mut data, INDEX_FLAT, &payload);
        assert!(data.iter().all(|e| e.0[0] == 0));

        let mut out = vec![0u8; payload.len()];
        read_flat(&data, INDEX_FLAT, &mut out).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn test_metadata_roundtrip() {
        let header = ClaimHeader::new(ClaimType::from_num(42), SubjectKind::OtherIdenValue, true);
        let mut metadata = Metadata::new(header, Subject::OtherIdenValue(sample_id())).unwrap();
        metadata.version = 9;
        metadata.rev_nonce = 0xdead_beef;
        metadata.expiration = Some(1_700_000_000);

        let mut data = [ElemBytes::zero(); DATA_LEN];
        metadata.marshal(&mut data);
        let entry = Entry::from_data(data);
        assert!(entry.in_field());

        assert_eq!(Metadata::unmarshal(&entry).unwrap(), metadata);
        assert_eq!(claim_type_of(&entry), ClaimType::from_num(42));
        assert_eq!(version_of(&entry), 9);
        assert_eq!(rev_nonce_of(&entry), 0xdead_beef);
        assert_eq!(version_of(&with_version(&entry, 10)), 10);
    }

    #[test]
    fn test_metadata_subject_must_match_header() {
        let header = ClaimHeader::new(ClaimType::from_num(1), SubjectKind::SelfIden, false);
        let err = Metadata::new(header, Subject::OtherIdenIndex(sample_id())).unwrap_err();
        assert!(matches!(err, IdenError::HeaderMismatch(_)));
    }

    #[test]
    fn test_unknown_claim_type() {
        let header = ClaimHeader::new(ClaimType::from_name("custom"), SubjectKind::SelfIden, false);
        let mut data = [ElemBytes::zero(); DATA_LEN];
        Metadata::unchecked(header, Subject::SelfIden).marshal(&mut data);
        let err = Claim::from_entry(&Entry::from_data(data)).unwrap_err();
        assert!(matches!(err, IdenError::InvalidClaimType(_)));
    }

    #[test]
    fn test_reserved_flags_rejected() {
        let mut data = [ElemBytes::zero(); DATA_LEN];
        data[I0].0[FLAGS_AT] = 0x80;
        let err = Metadata::unmarshal(&Entry::from_data(data)).unwrap_err();
        assert!(matches!(err, IdenError::HeaderMismatch(_)));
    }

    #[test]
    fn test_out_of_field_entry_rejected() {
        let mut data = [ElemBytes::zero(); DATA_LEN];
        data[V3] = ElemBytes([0xff; 32]);
        let err = Claim::from_entry(&Entry::from_data(data)).unwrap_err();
        assert!(matches!(err, IdenError::FieldOverflow(_)));
    }

    #[test]
    fn test_claim_type_display() {
        assert_eq!(CLAIM_TYPE_ASSIGN_NAME.to_string(), "assign_name");
        assert!(ClaimType::from_num(1000).to_string().starts_with("0x"));
    }
}
