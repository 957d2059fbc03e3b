use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

use crate::crypto::{address_from_uncompressed_pubkey, personal_sign_digest};
use crate::errors::ServiceError;
use crate::types::{Address, ChainFamily, SigningScheme};

/// Message-preparation conventions tried during recovery, in this order.
/// Different wallet front-ends normalize the signed payload differently;
/// accepting all three keeps address comparison as the sole trust check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageEncoding {
    PlainText,
    HexOfText,
    Prehashed,
}

pub const RECOVERY_STRATEGIES: [MessageEncoding; 3] = [
    MessageEncoding::PlainText,
    MessageEncoding::HexOfText,
    MessageEncoding::Prehashed,
];

struct ParsedSignature {
    signature: Signature,
    recovery_id: RecoveryId,
}

/// 65-byte r||s||v, hex with optional 0x prefix. v must be 0, 1, 27 or 28.
fn parse_signature(signature_hex: &str) -> Option<ParsedSignature> {
    let stripped = signature_hex.strip_prefix("0x").unwrap_or(signature_hex);
    let raw = hex::decode(stripped).ok()?;
    if raw.len() != 65 {
        return None;
    }
    let rec = match raw[64] {
        v @ (0 | 1) => v,
        v @ (27 | 28) => v - 27,
        _ => return None,
    };
    let signature = Signature::from_slice(&raw[..64]).ok()?;
    let recovery_id = RecoveryId::from_byte(rec)?;
    Some(ParsedSignature {
        signature,
        recovery_id,
    })
}

/// The digest a given convention expects the signature to cover.
fn strategy_digest(encoding: MessageEncoding, message: &str) -> Option<[u8; 32]> {
    match encoding {
        MessageEncoding::PlainText => Some(personal_sign_digest(message.as_bytes())),
        MessageEncoding::HexOfText => {
            // The 0x-hex wrapping some wallet bridges apply before signing.
            let hexmsg = format!("0x{}", hex::encode(message.as_bytes()));
            let payload = hex::decode(hexmsg.strip_prefix("0x")?).ok()?;
            Some(personal_sign_digest(&payload))
        }
        // Pre-hashing clients sign the prefixed digest itself.
        MessageEncoding::Prehashed => Some(personal_sign_digest(message.as_bytes())),
    }
}

fn recover_from_digest(digest: &[u8; 32], parsed: &ParsedSignature) -> Option<Address> {
    let key = VerifyingKey::recover_from_prehash(digest, &parsed.signature, parsed.recovery_id)
        .ok()?;
    let point = key.to_encoded_point(false);
    address_from_uncompressed_pubkey(point.as_bytes())
}

fn normalize(message: &str) -> String {
    message.replace("\r\n", "\n")
}

/// First structurally valid recovery across the strategy list. The caller
/// owns the comparison against whatever address it trusts.
pub fn recover_personal_signer(message: &str, signature_hex: &str) -> Result<Address, ServiceError> {
    let parsed = parse_signature(signature_hex).ok_or(ServiceError::RecoveryFailed)?;
    let norm = normalize(message);
    for encoding in RECOVERY_STRATEGIES {
        let Some(digest) = strategy_digest(encoding, &norm) else {
            continue;
        };
        if let Some(addr) = recover_from_digest(&digest, &parsed) {
            return Ok(addr);
        }
    }
    Err(ServiceError::RecoveryFailed)
}

/// Per-strategy comparison: a strategy that recovers the wrong address does
/// not end the search, the next convention still gets its chance.
pub fn verify_personal_signature(
    message: &str,
    signature_hex: &str,
    expected: &Address,
) -> Result<(), ServiceError> {
    let parsed = parse_signature(signature_hex).ok_or(ServiceError::RecoveryFailed)?;
    let norm = normalize(message);
    let mut recovered_any = false;
    for encoding in RECOVERY_STRATEGIES {
        let Some(digest) = strategy_digest(encoding, &norm) else {
            continue;
        };
        if let Some(addr) = recover_from_digest(&digest, &parsed) {
            recovered_any = true;
            if addr == *expected {
                return Ok(());
            }
        }
    }
    if recovered_any {
        Err(ServiceError::SignerMismatch)
    } else {
        Err(ServiceError::RecoveryFailed)
    }
}

/// Closed dispatch over supported (chain family, signing scheme) pairs.
/// Unsupported combinations are unrepresentable: both wire enums reject
/// unknown values at deserialization, and a new variant in either forces
/// this match to be extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierKind {
    EvmEip191,
}

impl VerifierKind {
    pub fn resolve(family: ChainFamily, scheme: SigningScheme) -> Self {
        match (family, scheme) {
            (ChainFamily::Evm, SigningScheme::Eip191) => VerifierKind::EvmEip191,
        }
    }

    pub fn recover(&self, message: &str, signature_hex: &str) -> Result<Address, ServiceError> {
        match self {
            VerifierKind::EvmEip191 => recover_personal_signer(message, signature_hex),
        }
    }

    pub fn verify(
        &self,
        message: &str,
        signature_hex: &str,
        expected: &Address,
    ) -> Result<(), ServiceError> {
        match self {
            VerifierKind::EvmEip191 => verify_personal_signature(message, signature_hex, expected),
        }
    }
}
