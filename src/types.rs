use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub use primitive_types::{H160, U256};

pub const NONCE_TTL_SECS: u64 = 300;
pub const NONCE_BYTES: usize = 16;
pub const CLAIM_CODE_BYTES: usize = 8;

// Challenge issuance throttle per subject
pub const CHALLENGE_RATE_MAX: usize = 5;
pub const CHALLENGE_RATE_WINDOW_SECS: u64 = 60;

pub const RPC_TIMEOUT_SECS: u64 = 10;

// First line of the signed text. Versioned contracts: any change invalidates
// signatures already issued against them.
pub const SIGN_IN_HEADER: &str = "Sign in to Atlas Directory";
pub const REVIEW_SIGN_HEADER: &str = "Sign review on Atlas Directory";

pub type UserId = u64;
pub type ReviewId = u64;
pub type BusinessId = u64;
pub type PromotionId = u64;
pub type Address = H160;

/// Strict wire form: `0x` + 40 hex chars. Anything else is rejected rather
/// than normalized.
pub fn parse_address(s: &str) -> Option<Address> {
    let hex_part = s.strip_prefix("0x")?;
    if hex_part.len() != 40 || !hex_part.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let raw = hex::decode(hex_part).ok()?;
    Some(Address::from_slice(&raw))
}

/// Canonical lowercase presentation, `0x`-prefixed.
pub fn address_hex(addr: &Address) -> String {
    format!("{:#x}", addr)
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    #[default]
    Evm,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SigningScheme {
    #[default]
    Eip191,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GateKind {
    Erc20,
    Erc721,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletLink {
    pub user_id: UserId,
    pub address: Address,
    pub chain_family: ChainFamily,
    pub scheme: SigningScheme,
    pub linked_at_unix_s: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub author_user_id: UserId,
    pub business_id: BusinessId,
    pub body: String,
    pub created_at_unix_s: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentSignature {
    pub review_id: ReviewId,
    pub user_id: UserId,
    pub address: Address,
    pub message: String,
    /// 0x-hex of the EIP-191 digest the signature was checked against.
    pub message_hash: String,
    pub signature_hex: String,
    pub created_at_unix_s: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenGate {
    /// Config key selecting the RPC endpoint, e.g. "eth".
    pub chain: String,
    pub contract: Address,
    pub kind: GateKind,
    /// ERC-20 only; exact integer comparison, no decimals scaling here.
    pub min_balance: U256,
    /// ERC-721 only; when set, ownership of this exact token is required.
    pub required_token_id: Option<U256>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Promotion {
    pub id: PromotionId,
    pub business_id: BusinessId,
    pub title: String,
    pub gate: Option<TokenGate>,
    pub starts_at_unix_s: u64,
    pub ends_at_unix_s: Option<u64>,
    pub is_active: bool,
    /// 0 means unlimited.
    pub max_claims: u32,
    pub total_claimed: u32,
    pub generate_codes: bool,
}

impl Promotion {
    /// Active and inside the time window, ignoring capacity.
    pub fn in_window(&self, now_unix_s: u64) -> bool {
        if !self.is_active || now_unix_s < self.starts_at_unix_s {
            return false;
        }
        match self.ends_at_unix_s {
            Some(ends) => now_unix_s <= ends,
            None => true,
        }
    }

    pub fn is_open(&self, now_unix_s: u64) -> bool {
        self.in_window(now_unix_s) && (self.max_claims == 0 || self.total_claimed < self.max_claims)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromoClaim {
    pub promotion_id: PromotionId,
    pub wallet: Address,
    pub signed_message: String,
    pub signature_hex: String,
    pub code: Option<String>,
    pub created_at_unix_s: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActivityKind {
    WalletLinked,
    ReviewSigned,
    PromotionClaimed,
}

/// Append-only audit trail of successful wallet actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub kind: ActivityKind,
    pub user_id: Option<UserId>,
    pub address: Address,
    pub subject_id: u64,
    pub created_at_unix_s: u64,
}
