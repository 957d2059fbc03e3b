use std::collections::BTreeMap;

use rand_core::{OsRng, RngCore};

use crate::errors::ServiceError;
use crate::types::{
    UserId, CHALLENGE_RATE_MAX, CHALLENGE_RATE_WINDOW_SECS, NONCE_BYTES, NONCE_TTL_SECS,
    SIGN_IN_HEADER,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedChallenge {
    pub nonce: String,
    pub message: String,
    pub issued_at_unix_s: u64,
    pub expires_at_unix_s: u64,
}

pub fn random_nonce_hex() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// One live challenge per subject; issuing again overwrites the slot, so only
/// the most recent challenge can ever verify. Expired slots are purged lazily
/// on access. All operations take `now` explicitly.
#[derive(Default)]
pub struct ChallengeStore {
    pub slots: BTreeMap<UserId, IssuedChallenge>,
    pub issue_log: BTreeMap<UserId, Vec<u64>>,
}

impl ChallengeStore {
    pub fn issue(
        &mut self,
        user_id: UserId,
        now_unix_s: u64,
    ) -> Result<IssuedChallenge, ServiceError> {
        let log = self.issue_log.entry(user_id).or_default();
        log.retain(|t| now_unix_s.saturating_sub(*t) < CHALLENGE_RATE_WINDOW_SECS);
        if log.len() >= CHALLENGE_RATE_MAX {
            return Err(ServiceError::RateLimited);
        }
        log.push(now_unix_s);

        let nonce = random_nonce_hex();
        let message = format!(
            "{}\nUser:{}\nNonce:{}\nTs:{}",
            SIGN_IN_HEADER, user_id, nonce, now_unix_s
        );
        let challenge = IssuedChallenge {
            nonce,
            message,
            issued_at_unix_s: now_unix_s,
            expires_at_unix_s: now_unix_s + NONCE_TTL_SECS,
        };
        self.slots.insert(user_id, challenge.clone());
        Ok(challenge)
    }

    /// Validates the live slot against a submitted message without consuming
    /// it. The literal text `Nonce:{value}` must appear in the message.
    pub fn check(
        &mut self,
        user_id: UserId,
        message: &str,
        now_unix_s: u64,
    ) -> Result<(), ServiceError> {
        let (expires_at, nonce) = match self.slots.get(&user_id) {
            Some(slot) => (slot.expires_at_unix_s, slot.nonce.clone()),
            None => return Err(ServiceError::ChallengeMissing),
        };
        if now_unix_s >= expires_at {
            self.slots.remove(&user_id);
            return Err(ServiceError::ChallengeExpired);
        }
        if !message.contains(&format!("Nonce:{}", nonce)) {
            return Err(ServiceError::ChallengeMismatch);
        }
        Ok(())
    }

    /// Single-use: drops the slot. Called only after the signature check
    /// passed, so a failed verification leaves the challenge intact until it
    /// expires or is reissued.
    pub fn consume(
        &mut self,
        user_id: UserId,
        message: &str,
        now_unix_s: u64,
    ) -> Result<(), ServiceError> {
        self.check(user_id, message, now_unix_s)?;
        self.slots.remove(&user_id);
        Ok(())
    }
}
