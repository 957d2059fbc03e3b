use tracing::info;

use crate::errors::ServiceError;
use crate::nonce::{ChallengeStore, IssuedChallenge};
use crate::recover::VerifierKind;
use crate::state::ServiceState;
use crate::types::{
    address_hex, parse_address, ActivityKind, ChainFamily, SigningScheme, UserId, WalletLink,
};

#[derive(Debug, Clone)]
pub struct LinkAttempt<'a> {
    pub user_id: UserId,
    pub address: &'a str,
    pub message: &'a str,
    pub signature: &'a str,
    pub chain_family: ChainFamily,
    pub scheme: SigningScheme,
}

pub fn start_challenge(
    state: &mut ServiceState,
    store: &mut ChallengeStore,
    user_id: UserId,
    now_unix_s: u64,
) -> Result<IssuedChallenge, ServiceError> {
    let challenge = store.issue(user_id, now_unix_s)?;
    state.counters.challenges_issued += 1;
    Ok(challenge)
}

/// Verifies a signed challenge and links the wallet. The challenge slot is
/// consumed only once everything else has passed, so a bad signature or an
/// address conflict leaves it live for another attempt.
pub fn complete_challenge(
    state: &mut ServiceState,
    store: &mut ChallengeStore,
    attempt: &LinkAttempt<'_>,
    now_unix_s: u64,
) -> Result<WalletLink, ServiceError> {
    let address = parse_address(attempt.address).ok_or(ServiceError::BadAddress)?;
    store.check(attempt.user_id, attempt.message, now_unix_s)?;

    let verifier = VerifierKind::resolve(attempt.chain_family, attempt.scheme);
    verifier.verify(attempt.message, attempt.signature, &address)?;

    let link = state.link_wallet(
        attempt.user_id,
        address,
        attempt.chain_family,
        attempt.scheme,
        now_unix_s,
    )?;
    store.consume(attempt.user_id, attempt.message, now_unix_s)?;

    state.record_activity(
        ActivityKind::WalletLinked,
        Some(attempt.user_id),
        address,
        attempt.user_id,
        now_unix_s,
    );
    state.counters.wallets_verified += 1;
    info!(user = attempt.user_id, address = %address_hex(&address), "Wallet linked");
    Ok(link)
}
