use std::sync::Mutex;

use rand_core::{OsRng, RngCore};
use tracing::{info, warn};

use crate::chain::ChainReader;
use crate::errors::ServiceError;
use crate::gate::{self, GateOutcome};
use crate::recover::verify_personal_signature;
use crate::state::ServiceState;
use crate::types::{
    address_hex, parse_address, ActivityKind, Address, PromoClaim, PromotionId, TokenGate,
    CLAIM_CODE_BYTES,
};

pub fn random_claim_code() -> String {
    let mut bytes = [0u8; CLAIM_CODE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(Debug, Clone)]
pub struct ClaimAttempt<'a> {
    pub promotion_id: PromotionId,
    pub wallet: &'a str,
    pub message: &'a str,
    pub signature: &'a str,
}

/// Pre-flight check under the state lock. Returns the gate so the chain read
/// can run after the lock is dropped. A promotion already at capacity reads
/// as closed here; `SoldOut` is reserved for losing a race inside
/// `commit_claim`.
pub fn ensure_claimable(
    state: &ServiceState,
    promotion_id: PromotionId,
    wallet: &Address,
    now_unix_s: u64,
) -> Result<Option<TokenGate>, ServiceError> {
    let promo = state
        .promotion_by_id
        .get(&promotion_id)
        .ok_or(ServiceError::PromotionNotFound)?;
    if !promo.is_open(now_unix_s) {
        return Err(ServiceError::PromotionClosed);
    }
    if state
        .claim_by_promo_wallet
        .contains_key(&(promotion_id, *wallet))
    {
        return Err(ServiceError::AlreadyClaimed);
    }
    Ok(promo.gate.clone())
}

/// Commit section. Everything is re-checked because the lock was dropped
/// while the chain read ran; this is where concurrent claimants are settled.
pub fn commit_claim(
    state: &mut ServiceState,
    promotion_id: PromotionId,
    wallet: &Address,
    message: &str,
    signature_hex: &str,
    now_unix_s: u64,
) -> Result<PromoClaim, ServiceError> {
    let promo = state
        .promotion_by_id
        .get_mut(&promotion_id)
        .ok_or(ServiceError::PromotionNotFound)?;
    if !promo.in_window(now_unix_s) {
        return Err(ServiceError::PromotionClosed);
    }
    if state
        .claim_by_promo_wallet
        .contains_key(&(promotion_id, *wallet))
    {
        return Err(ServiceError::AlreadyClaimed);
    }
    if promo.max_claims != 0 && promo.total_claimed >= promo.max_claims {
        return Err(ServiceError::SoldOut);
    }

    let code = promo.generate_codes.then(random_claim_code);
    promo.total_claimed += 1;

    let claim = PromoClaim {
        promotion_id,
        wallet: *wallet,
        signed_message: message.to_string(),
        signature_hex: signature_hex.to_string(),
        code,
        created_at_unix_s: now_unix_s,
    };
    state
        .claim_by_promo_wallet
        .insert((promotion_id, *wallet), claim.clone());
    state.record_activity(
        ActivityKind::PromotionClaimed,
        None,
        *wallet,
        promotion_id,
        now_unix_s,
    );
    state.counters.claims_granted += 1;
    Ok(claim)
}

/// Gate check for a wallet without claiming. Mirrors the claim pre-flight:
/// a closed promotion or a wallet that already claimed fails closed before
/// any chain read, so a passing answer means a claim would reach the gate.
pub async fn check_eligibility(
    service: &Mutex<ServiceState>,
    reader: &ChainReader,
    promotion_id: PromotionId,
    wallet_text: &str,
    now_unix_s: u64,
) -> Result<GateOutcome, ServiceError> {
    let wallet = parse_address(wallet_text).ok_or(ServiceError::BadAddress)?;
    let gate = {
        let state = service.lock().expect("state lock");
        ensure_claimable(&state, promotion_id, &wallet, now_unix_s)?
    };
    gate::evaluate(reader, gate.as_ref(), &wallet).await
}

/// Full claim flow. The chain read runs with no lock held; only the final
/// commit re-acquires it, so slow RPC endpoints never serialize other
/// requests behind a claimant.
pub async fn claim(
    service: &Mutex<ServiceState>,
    reader: &ChainReader,
    attempt: &ClaimAttempt<'_>,
    now_unix_s: u64,
) -> Result<PromoClaim, ServiceError> {
    let wallet = parse_address(attempt.wallet).ok_or(ServiceError::BadAddress)?;

    let gate = {
        let state = service.lock().expect("state lock");
        ensure_claimable(&state, attempt.promotion_id, &wallet, now_unix_s)?
    };

    verify_personal_signature(attempt.message, attempt.signature, &wallet)?;

    let outcome = gate::evaluate(reader, gate.as_ref(), &wallet).await?;
    if !outcome.eligible {
        warn!(
            promotion = attempt.promotion_id,
            wallet = %address_hex(&wallet),
            "Claim rejected, gate not satisfied"
        );
        return Err(ServiceError::NotEligible);
    }

    let mut state = service.lock().expect("state lock");
    let claim = commit_claim(
        &mut state,
        attempt.promotion_id,
        &wallet,
        attempt.message,
        attempt.signature,
        now_unix_s,
    )?;
    info!(
        promotion = attempt.promotion_id,
        wallet = %address_hex(&wallet),
        "Promotion claimed"
    );
    Ok(claim)
}
