use super::{
    full_elem, get_array, put_bytes, read_flat, write_flat, ClaimHeader, ClaimVariant, Metadata,
    Subject, SubjectKind, CLAIM_TYPE_AUTHORIZE_KSIGN_SECP256K1, CLAIM_TYPE_KEY_BABYJUB, I0, I2,
    INDEX_FLAT_NO_SUBJECT, INDEX_PAYLOAD_AT,
};
use iden_crypto::{validate_compressed_public_key, SECP256K1_PUBLIC_KEY_SIZE};
use iden_merkletree::Entry;
use iden_types::{ElemBytes, IdenError, IdenResult, DATA_LEN};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

const KEY_TYPE_AT: usize = INDEX_PAYLOAD_AT;
const SIGN_AT: usize = INDEX_PAYLOAD_AT + 8;

/// Authorizes a Baby Jubjub key, stored as the sign of `x` plus `y`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimKeyBabyJub {
    metadata: Metadata,
    key_type: u64,
    sign: bool,
    ay: ElemBytes,
}

impl ClaimKeyBabyJub {
    pub const HEADER: ClaimHeader =
        ClaimHeader::new(CLAIM_TYPE_KEY_BABYJUB, SubjectKind::SelfIden, false);

    pub fn new(ay: ElemBytes, sign: bool, key_type: u64) -> IdenResult<Self> {
        if !ay.in_field() {
            return Err(IdenError::FieldOverflow(ay.to_hex()));
        }
        Ok(Self {
            metadata: Metadata::unchecked(Self::HEADER, Subject::SelfIden),
            key_type,
            sign,
            ay,
        })
    }

    /// From the 32-byte compressed point: little-endian `y` with the sign
    /// of `x` in the top bit.
    pub fn from_public_key_comp(comp: &[u8; 32], key_type: u64) -> IdenResult<Self> {
        let mut le = *comp;
        let sign = le[31] & 0x80 != 0;
        le[31] &= 0x7f;
        le.reverse();
        Self::new(ElemBytes::from_bytes(le)?, sign, key_type)
    }

    pub fn public_key_comp(&self) -> [u8; 32] {
        let mut le = self.ay.0;
        le.reverse();
        if self.sign {
            le[31] |= 0x80;
        }
        le
    }

    pub fn key_type(&self) -> u64 {
        self.key_type
    }

    pub fn sign(&self) -> bool {
        self.sign
    }

    pub fn ay(&self) -> &ElemBytes {
        &self.ay
    }
}

impl ClaimVariant for ClaimKeyBabyJub {
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
        put_bytes(&mut data[I0], KEY_TYPE_AT, &self.key_type.to_be_bytes());
        data[I0].0[SIGN_AT] = u8::from(self.sign);
        data[I2] = self.ay;
        self.metadata.marshal(&mut data);
        Entry::from_data(data)
    }

    fn from_entry(entry: &Entry) -> IdenResult<Self> {
        let metadata = Metadata::decode_as(entry, &Self::HEADER)?;
        let data = entry.data();
        let sign = match data[I0].0[SIGN_AT] {
            0 => false,
            1 => true,
            other => {
                return Err(IdenError::Serialization(format!("invalid key sign byte {}", other)))
            }
        };
        Ok(Self {
            metadata,
            key_type: u64::from_be_bytes(get_array(&data[I0], KEY_TYPE_AT)),
            sign,
            ay: full_elem(data, I2)?,
        })
    }
}

/// Authorizes a compressed secp256k1 signing key.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimAuthorizeKSignSecp256k1 {
    metadata: Metadata,
    #[serde_as(as = "serde_with::Bytes")]
    pub_key: [u8; SECP256K1_PUBLIC_KEY_SIZE],
}

impl ClaimAuthorizeKSignSecp256k1 {
    pub const HEADER: ClaimHeader =
        ClaimHeader::new(CLAIM_TYPE_AUTHORIZE_KSIGN_SECP256K1, SubjectKind::SelfIden, false);

    pub fn new(pub_key: [u8; SECP256K1_PUBLIC_KEY_SIZE]) -> IdenResult<Self> {
        validate_compressed_public_key(&pub_key)?;
        Ok(Self {
            metadata: Metadata::unchecked(Self::HEADER, Subject::SelfIden),
            pub_key,
        })
    }

    pub fn pub_key(&self) -> &[u8; SECP256K1_PUBLIC_KEY_SIZE] {
        &self.pub_key
    }
}

impl ClaimVariant for ClaimAuthorizeKSignSecp256k1 {
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
        write_flat(&mut data, INDEX_FLAT_NO_SUBJECT, &self.pub_key);
        self.metadata.marshal(&mut data);
        Entry::from_data(data)
    }

    fn from_entry(entry: &Entry) -> IdenResult<Self> {
        let metadata = Metadata::decode_as(entry, &Self::HEADER)?;
        let mut pub_key = [0u8; SECP256K1_PUBLIC_KEY_SIZE];
        read_flat(entry.data(), INDEX_FLAT_NO_SUBJECT, &mut pub_key)?;
        validate_compressed_public_key(&pub_key)?;
        Ok(Self { metadata, pub_key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::Claim;
    use iden_crypto::{derive_public_key, Secp256k1SecretKey};
    use proptest::prelude::*;

    #[test]
    fn test_babyjub_comp_roundtrip() {
        let mut comp = [0x11u8; 32];
        comp[31] = 0x85;
        let claim = ClaimKeyBabyJub::from_public_key_comp(&comp, 1).unwrap();
        assert!(claim.sign());
        assert_eq!(claim.ay().0[0], 0x05);
        assert_eq!(claim.public_key_comp(), comp);
    }

    #[test]
    fn test_babyjub_entry_roundtrip() {
        let claim = ClaimKeyBabyJub::new(ElemBytes::from_u64(12345), true, 7).unwrap();
        let entry = claim.entry();
        assert_eq!(Claim::from_entry(&entry).unwrap(), Claim::KeyBabyJub(claim));
    }

    #[test]
    fn test_babyjub_rejects_out_of_field_y() {
        let err = ClaimKeyBabyJub::new(ElemBytes([0xff; 32]), false, 0).unwrap_err();
        assert!(matches!(err, IdenError::FieldOverflow(_)));
    }

    #[test]
    fn test_babyjub_bad_sign_byte() {
        let claim = ClaimKeyBabyJub::new(ElemBytes::from_u64(1), false, 0).unwrap();
        let mut data = *claim.entry().data();
        data[I0].0[SIGN_AT] = 2;
        assert!(ClaimKeyBabyJub::from_entry(&Entry::from_data(data)).is_err());
    }

    #[test]
    fn test_secp256k1_roundtrip() {
        let sk = Secp256k1SecretKey::generate();
        let pk = derive_public_key(&sk).unwrap();
        let mut claim = ClaimAuthorizeKSignSecp256k1::new(pk).unwrap();
        claim.metadata_mut().rev_nonce = 5;

        let entry = claim.entry();
        assert!(entry.in_field());
        let back = ClaimAuthorizeKSignSecp256k1::from_entry(&entry).unwrap();
        assert_eq!(back.pub_key(), &pk);
        assert_eq!(back, claim);
    }

    #[test]
    fn test_secp256k1_rejects_invalid_key() {
        assert!(ClaimAuthorizeKSignSecp256k1::new([0u8; 33]).is_err());
    }

    #[test]
    fn test_header_mismatch_between_key_types() {
        let claim = ClaimKeyBabyJub::new(ElemBytes::from_u64(1), false, 0).unwrap();
        let err = ClaimAuthorizeKSignSecp256k1::from_entry(&claim.entry()).unwrap_err();
        assert!(matches!(err, IdenError::HeaderMismatch(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_babyjub_roundtrip(
            y in proptest::collection::vec(any::<u8>(), 31),
            sign in any::<bool>(),
            key_type in any::<u64>(),
            version in any::<u32>(),
        ) {
            let ay = ElemBytes::from_payload(&y).unwrap();
            let mut claim = ClaimKeyBabyJub::new(ay, sign, key_type).unwrap();
            claim.metadata_mut().version = version;
            prop_assert_eq!(ClaimKeyBabyJub::from_entry(&claim.entry()).unwrap(), claim);
        }
    }
}
