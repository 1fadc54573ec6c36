use super::{
    check_reserved, get_array, put_bytes, ClaimHeader, ClaimVariant, Metadata, Subject,
    SubjectKind, CLAIM_TYPE_AUTH_ETH_KEY, CLAIM_TYPE_ETH_ID, I2, V2,
};
use iden_merkletree::Entry;
use iden_types::{ElemBytes, IdenError, IdenResult, DATA_LEN};
use serde::{Deserialize, Serialize};

pub const ETH_ADDRESS_LEN: usize = 20;

fn read_address(data: &[ElemBytes; DATA_LEN], slot: usize) -> IdenResult<[u8; ETH_ADDRESS_LEN]> {
    check_reserved(data, slot)?;
    Ok(get_array(&data[slot], 1))
}

/// Ties the issuer to an Ethereum address and the factory that deployed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimEthId {
    metadata: Metadata,
    address: [u8; ETH_ADDRESS_LEN],
    identity_factory: [u8; ETH_ADDRESS_LEN],
}

impl ClaimEthId {
    pub const HEADER: ClaimHeader = ClaimHeader::new(CLAIM_TYPE_ETH_ID, SubjectKind::SelfIden, false);

    pub fn new(address: [u8; ETH_ADDRESS_LEN], identity_factory: [u8; ETH_ADDRESS_LEN]) -> Self {
        Self {
            metadata: Metadata::unchecked(Self::HEADER, Subject::SelfIden),
            address,
            identity_factory,
        }
    }

    pub fn address(&self) -> &[u8; ETH_ADDRESS_LEN] {
        &self.address
    }

    pub fn identity_factory(&self) -> &[u8; ETH_ADDRESS_LEN] {
        &self.identity_factory
    }
}

impl ClaimVariant for ClaimEthId {
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
        put_bytes(&mut data[I2], 1, &self.address);
        put_bytes(&mut data[V2], 1, &self.identity_factory);
        self.metadata.marshal(&mut data);
        Entry::from_data(data)
    }

    fn from_entry(entry: &Entry) -> IdenResult<Self> {
        let metadata = Metadata::decode_as(entry, &Self::HEADER)?;
        let data = entry.data();
        Ok(Self {
            metadata,
            address: read_address(data, I2)?,
            identity_factory: read_address(data, V2)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum EthKeyType {
    Disable = 0,
    Reenable = 1,
    Upgrade = 2,
    UpdateRoot = 3,
}

impl TryFrom<u32> for EthKeyType {
    type Error = IdenError;

    fn try_from(n: u32) -> IdenResult<Self> {
        Ok(match n {
            0 => Self::Disable,
            1 => Self::Reenable,
            2 => Self::Upgrade,
            3 => Self::UpdateRoot,
            other => return Err(IdenError::Serialization(format!("unknown eth key type {}", other))),
        })
    }
}

/// Authorizes an Ethereum key. The key type lives in the value half so
/// a key is disabled or re-enabled by issuing a new version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimAuthEthKey {
    metadata: Metadata,
    eth_key: [u8; ETH_ADDRESS_LEN],
    key_type: EthKeyType,
}

impl ClaimAuthEthKey {
    pub const HEADER: ClaimHeader =
        ClaimHeader::new(CLAIM_TYPE_AUTH_ETH_KEY, SubjectKind::SelfIden, true);

    pub fn new(eth_key: [u8; ETH_ADDRESS_LEN], key_type: EthKeyType) -> Self {
        Self {
            metadata: Metadata::unchecked(Self::HEADER, Subject::SelfIden),
            eth_key,
            key_type,
        }
    }

    pub fn eth_key(&self) -> &[u8; ETH_ADDRESS_LEN] {
        &self.eth_key
    }

    pub fn key_type(&self) -> EthKeyType {
        self.key_type
    }

    pub fn set_key_type(&mut self, key_type: EthKeyType) {
        self.key_type = key_type;
    }
}

impl ClaimVariant for ClaimAuthEthKey {
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
        put_bytes(&mut data[I2], 1, &self.eth_key);
        put_bytes(&mut data[V2], 1, &(self.key_type as u32).to_be_bytes());
        self.metadata.marshal(&mut data);
        Entry::from_data(data)
    }

    fn from_entry(entry: &Entry) -> IdenResult<Self> {
        let metadata = Metadata::decode_as(entry, &Self::HEADER)?;
        let data = entry.data();
        check_reserved(data, V2)?;
        Ok(Self {
            metadata,
            eth_key: read_address(data, I2)?,
            key_type: u32::from_be_bytes(get_array(&data[V2], 1)).try_into()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::Claim;

    #[test]
    fn test_eth_id_roundtrip() {
        let claim = ClaimEthId::new([0xaa; 20], [0xbb; 20]);
        let back = Claim::from_entry(&claim.entry()).unwrap();
        assert_eq!(back, Claim::EthId(claim));
    }

    #[test]
    fn test_auth_eth_key_update_keeps_index() {
        let mut claim = ClaimAuthEthKey::new([0x42; 20], EthKeyType::Upgrade);
        let before = claim.entry();

        claim.set_key_type(EthKeyType::Disable);
        claim.metadata_mut().version = 1;
        let after = claim.entry();

        assert_ne!(before.h_value().unwrap(), after.h_value().unwrap());
        let decoded = ClaimAuthEthKey::from_entry(&after).unwrap();
        assert_eq!(decoded.key_type(), EthKeyType::Disable);
        assert_eq!(decoded, claim);
    }

    #[test]
    fn test_unknown_eth_key_type() {
        assert!(EthKeyType::try_from(4).is_err());
        assert_eq!(EthKeyType::try_from(3).unwrap(), EthKeyType::UpdateRoot);
    }
}
