use sha3::{Digest, Keccak256};

use crate::types::Address;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// EIP-191 "personal sign" digest: prefix with the byte length of the
/// payload, then keccak. The prefix counts bytes, not chars.
pub fn personal_sign_digest(payload: &[u8]) -> [u8; 32] {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", payload.len());
    let mut hasher = Keccak256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(payload);
    hasher.finalize().into()
}

pub fn digest_hex(digest: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(digest))
}

/// Address = low 20 bytes of keccak over the uncompressed SEC1 point body
/// (the 64 bytes after the 0x04 tag).
pub fn address_from_uncompressed_pubkey(pubkey_sec1: &[u8]) -> Option<Address> {
    if pubkey_sec1.len() != 65 || pubkey_sec1[0] != 0x04 {
        return None;
    }
    let hash = keccak256(&pubkey_sec1[1..]);
    Some(Address::from_slice(&hash[12..]))
}

/// First 4 bytes of keccak over the canonical function signature text.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}
