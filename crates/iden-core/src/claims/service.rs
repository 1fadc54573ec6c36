use super::{
    elem_payload, get_array, put_bytes, ClaimHeader, ClaimVariant, Metadata, Subject, SubjectKind,
    CLAIM_TYPE_AUTHORIZE_SERVICE, I0, I2, I3, INDEX_PAYLOAD_AT, V2,
};
use iden_crypto::hash_string;
use iden_merkletree::Entry;
use iden_types::{ElemBytes, IdenError, IdenResult, DATA_LEN, ELEM_PAYLOAD_LEN};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u64)]
pub enum ServiceType {
    Relay = 0,
    NotificationsServer = 1,
    DiscoveryNode = 2,
}

impl TryFrom<u64> for ServiceType {
    type Error = IdenError;

    fn try_from(n: u64) -> IdenResult<Self> {
        Ok(match n {
            0 => Self::Relay,
            1 => Self::NotificationsServer,
            2 => Self::DiscoveryNode,
            other => return Err(IdenError::Serialization(format!("unknown service type {}", other))),
        })
    }
}

/// Authorizes a service endpoint to act for the issuer.
///
/// Address and public key are part of the index; the URL can change by
/// issuing a new claim with a different value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimAuthorizeService {
    metadata: Metadata,
    service_type: ServiceType,
    address_hash: [u8; ELEM_PAYLOAD_LEN],
    pub_key_hash: [u8; ELEM_PAYLOAD_LEN],
    url_hash: [u8; ELEM_PAYLOAD_LEN],
}

impl ClaimAuthorizeService {
    pub const HEADER: ClaimHeader =
        ClaimHeader::new(CLAIM_TYPE_AUTHORIZE_SERVICE, SubjectKind::SelfIden, false);

    pub fn new(service_type: ServiceType, address: &str, pub_key: &str, url: &str) -> Self {
        Self {
            metadata: Metadata::unchecked(Self::HEADER, Subject::SelfIden),
            service_type,
            address_hash: hash_string(address),
            pub_key_hash: hash_string(pub_key),
            url_hash: hash_string(url),
        }
    }

    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    pub fn address_hash(&self) -> &[u8; ELEM_PAYLOAD_LEN] {
        &self.address_hash
    }

    pub fn pub_key_hash(&self) -> &[u8; ELEM_PAYLOAD_LEN] {
        &self.pub_key_hash
    }

    pub fn url_hash(&self) -> &[u8; ELEM_PAYLOAD_LEN] {
        &self.url_hash
    }

    /// True if `url` is the one this claim was issued for.
    pub fn matches_url(&self, url: &str) -> bool {
        hash_string(url) == self.url_hash
    }
}

impl ClaimVariant for ClaimAuthorizeService {
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
        put_bytes(&mut data[I0], INDEX_PAYLOAD_AT, &(self.service_type as u64).to_be_bytes());
        put_bytes(&mut data[I2], 1, &self.address_hash);
        put_bytes(&mut data[I3], 1, &self.pub_key_hash);
        put_bytes(&mut data[V2], 1, &self.url_hash);
        self.metadata.marshal(&mut data);
        Entry::from_data(data)
    }

    fn from_entry(entry: &Entry) -> IdenResult<Self> {
        let metadata = Metadata::decode_as(entry, &Self::HEADER)?;
        let data = entry.data();
        Ok(Self {
            metadata,
            service_type: u64::from_be_bytes(get_array(&data[I0], INDEX_PAYLOAD_AT)).try_into()?,
            address_hash: elem_payload(data, I2)?,
            pub_key_hash: elem_payload(data, I3)?,
            url_hash: elem_payload(data, V2)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::Claim;

    #[test]
    fn test_service_roundtrip() {
        let claim = ClaimAuthorizeService::new(
            ServiceType::Relay,
            "0x66d0c2f85f1b717168cbb508afd1c46e07227130",
            "0x036d94c84a7096c572b83d44df576e1ffb3573123f62099f8d4fa19de806bd4d59",
            "https://relay.iden3.io/api/v1",
        );
        let back = Claim::from_entry(&claim.entry()).unwrap();
        assert_eq!(back, Claim::AuthorizeService(claim.clone()));
        assert!(claim.matches_url("https://relay.iden3.io/api/v1"));
        assert!(!claim.matches_url("https://evil.example"));
    }

    #[test]
    fn test_service_type_in_index() {
        let a = ClaimAuthorizeService::new(ServiceType::Relay, "a", "k", "u");
        let b = ClaimAuthorizeService::new(ServiceType::DiscoveryNode, "a", "k", "u");
        assert_ne!(a.entry().h_index().unwrap(), b.entry().h_index().unwrap());
    }
}
