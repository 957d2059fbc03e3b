use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::types::*;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MetricCounters {
    pub challenges_issued: u64,
    pub wallets_verified: u64,
    pub claims_granted: u64,
}

#[derive(Default, Clone, Serialize, Deserialize)]
pub struct ServiceState {
    pub wallet_link_by_user_address: BTreeMap<(UserId, Address), WalletLink>,
    // Global uniqueness index: an address belongs to at most one account.
    pub user_by_address: BTreeMap<Address, UserId>,
    pub review_by_id: BTreeMap<ReviewId, Review>,
    pub signature_by_review: BTreeMap<ReviewId, ContentSignature>,
    pub promotion_by_id: BTreeMap<PromotionId, Promotion>,
    pub claim_by_promo_wallet: BTreeMap<(PromotionId, Address), PromoClaim>,

    // append-only audit trail of successful wallet actions
    pub activity_log: Vec<ActivityRecord>,

    pub counters: MetricCounters,
}

impl ServiceState {
    /// Creates the link, or returns the existing one when the same
    /// (user, address) pair is already linked. An address held by a
    /// different account is a hard conflict.
    pub fn link_wallet(
        &mut self,
        user_id: UserId,
        address: Address,
        chain_family: ChainFamily,
        scheme: SigningScheme,
        now_unix_s: u64,
    ) -> Result<WalletLink, ServiceError> {
        if let Some(owner) = self.user_by_address.get(&address) {
            if *owner != user_id {
                return Err(ServiceError::AddressLinkedElsewhere);
            }
        }

        if let Some(existing) = self.wallet_link_by_user_address.get(&(user_id, address)) {
            return Ok(existing.clone());
        }

        let link = WalletLink {
            user_id,
            address,
            chain_family,
            scheme,
            linked_at_unix_s: now_unix_s,
        };
        self.wallet_link_by_user_address
            .insert((user_id, address), link.clone());
        self.user_by_address.insert(address, user_id);
        Ok(link)
    }

    pub fn linked_addresses(&self, user_id: UserId) -> Vec<Address> {
        self.wallet_link_by_user_address
            .range((user_id, Address::zero())..=(user_id, Address::repeat_byte(0xff)))
            .map(|((_, addr), _)| *addr)
            .collect()
    }

    pub fn has_link(&self, user_id: UserId) -> bool {
        self.wallet_link_by_user_address
            .range((user_id, Address::zero())..=(user_id, Address::repeat_byte(0xff)))
            .next()
            .is_some()
    }

    pub fn ensure_review_author(
        &self,
        review_id: ReviewId,
        user_id: UserId,
    ) -> Result<&Review, ServiceError> {
        let review = self
            .review_by_id
            .get(&review_id)
            .ok_or(ServiceError::ReviewNotFound)?;
        if review.author_user_id != user_id {
            return Err(ServiceError::NotReviewAuthor);
        }
        Ok(review)
    }

    pub fn record_activity(
        &mut self,
        kind: ActivityKind,
        user_id: Option<UserId>,
        address: Address,
        subject_id: u64,
        now_unix_s: u64,
    ) {
        self.activity_log.push(ActivityRecord {
            kind,
            user_id,
            address,
            subject_id,
            created_at_unix_s: now_unix_s,
        });
    }
}
