use tracing::info;

use crate::crypto::{digest_hex, personal_sign_digest};
use crate::errors::ServiceError;
use crate::recover::verify_personal_signature;
use crate::state::ServiceState;
use crate::types::{
    address_hex, parse_address, ActivityKind, ContentSignature, Review, ReviewId, UserId,
    REVIEW_SIGN_HEADER,
};

/// Canonical text a reviewer signs. Field order is part of the contract:
/// rewording or reordering invalidates every signature already on record.
pub fn review_message(review: &Review) -> String {
    format!(
        "{}\nReview:{}\nUser:{}\nBusiness:{}\nCreated:{}",
        REVIEW_SIGN_HEADER,
        review.id,
        review.author_user_id,
        review.business_id,
        review.created_at_unix_s
    )
}

pub fn review_message_hash(message: &str) -> String {
    digest_hex(&personal_sign_digest(message.as_bytes()))
}

/// Message and hash for the author to sign, without recording anything.
pub fn review_digest(
    state: &ServiceState,
    review_id: ReviewId,
    user_id: UserId,
) -> Result<(String, String), ServiceError> {
    let review = state.ensure_review_author(review_id, user_id)?;
    let message = review_message(review);
    let hash = review_message_hash(&message);
    Ok((message, hash))
}

/// Attaches a wallet signature to a review. Idempotent: once a review carries
/// a signature, later submissions get the stored record back unchanged.
pub fn sign_review(
    state: &mut ServiceState,
    review_id: ReviewId,
    user_id: UserId,
    address_text: &str,
    signature_hex: &str,
    now_unix_s: u64,
) -> Result<ContentSignature, ServiceError> {
    let review = state.ensure_review_author(review_id, user_id)?.clone();
    let address = parse_address(address_text).ok_or(ServiceError::BadAddress)?;

    let message = review_message(&review);
    verify_personal_signature(&message, signature_hex, &address)?;

    if let Some(existing) = state.signature_by_review.get(&review_id) {
        return Ok(existing.clone());
    }

    let record = ContentSignature {
        review_id,
        user_id,
        address,
        message_hash: review_message_hash(&message),
        message,
        signature_hex: signature_hex.to_string(),
        created_at_unix_s: now_unix_s,
    };
    state.signature_by_review.insert(review_id, record.clone());
    state.record_activity(
        ActivityKind::ReviewSigned,
        Some(user_id),
        address,
        review_id,
        now_unix_s,
    );
    info!(review = review_id, address = %address_hex(&address), "Review signed");
    Ok(record)
}
