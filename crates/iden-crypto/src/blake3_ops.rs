use iden_types::ELEM_PAYLOAD_LEN;

const CLAIM_TYPE_CONTEXT: &str = "iden3 v1 claim type";

pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

pub fn blake3_hash_domain(domain: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(domain);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

/// Last 31 bytes of the BLAKE3 digest of `s`, sized to fit one claim slot.
pub fn hash_string(s: &str) -> [u8; ELEM_PAYLOAD_LEN] {
    let digest = blake3_hash(s.as_bytes());
    let mut out = [0u8; ELEM_PAYLOAD_LEN];
    out.copy_from_slice(&digest[digest.len() - ELEM_PAYLOAD_LEN..]);
    out
}

/// Eight-byte claim type tag derived from a human readable name.
pub fn claim_type_tag(name: &str) -> [u8; 8] {
    let digest = blake3_hash_domain(CLAIM_TYPE_CONTEXT, name.as_bytes());
    let mut tag = [0u8; 8];
    tag.copy_from_slice(&digest[digest.len() - 8..]);
    tag
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_string_is_digest_suffix() {
        let full = blake3_hash(b"example.eth");
        let short = hash_string("example.eth");
        assert_eq!(&full[1..], &short[..]);
    }

    #[test]
    fn test_claim_type_tag_separates_names() {
        assert_eq!(claim_type_tag("Basic"), claim_type_tag("Basic"));
        assert_ne!(claim_type_tag("Basic"), claim_type_tag("KeyBabyJub"));
    }
}
