pub mod chain;
pub mod config;
pub mod content;
pub mod crypto;
pub mod errors;
pub mod gate;
pub mod nonce;
pub mod persistence;
pub mod promo;
pub mod recover;
pub mod state;
pub mod storage;
pub mod types;
pub mod wallet;
pub mod web_api;

pub use errors::{ErrorCode, ServiceError};
pub use recover::{recover_personal_signer, verify_personal_signature};
pub use state::ServiceState;
pub use types::*;

#[cfg(test)]
mod tests {
    use crate::*;
    use k256::ecdsa::SigningKey;
    use sha3::{Digest, Keccak256};

    fn signing_key(seed: u8) -> SigningKey {
        SigningKey::from_slice(&[seed; 32]).unwrap()
    }

    fn evm_address(sk: &SigningKey) -> Address {
        let point = sk.verifying_key().to_encoded_point(false);
        let pk = point.as_bytes();
        let mut h = Keccak256::new();
        h.update(&pk[1..]);
        let out = h.finalize();
        Address::from_slice(&out[12..])
    }

    fn sign_text(sk: &SigningKey, message: &str) -> String {
        let digest = crypto::personal_sign_digest(message.as_bytes());
        let (sig, recid) = sk.sign_prehash_recoverable(&digest).unwrap();
        let mut bytes = sig.to_vec();
        bytes.push(recid.to_byte() + 27);
        format!("0x{}", hex::encode(bytes))
    }

    fn sign_text_raw_v(sk: &SigningKey, message: &str) -> String {
        let digest = crypto::personal_sign_digest(message.as_bytes());
        let (sig, recid) = sk.sign_prehash_recoverable(&digest).unwrap();
        let mut bytes = sig.to_vec();
        bytes.push(recid.to_byte());
        format!("0x{}", hex::encode(bytes))
    }

    fn link_wallet_for(state: &mut ServiceState, store: &mut nonce::ChallengeStore, user_id: UserId, sk: &SigningKey, now: u64) -> WalletLink {
        let ch = wallet::start_challenge(state, store, user_id, now).unwrap();
        let addr = address_hex(&evm_address(sk));
        let sig = sign_text(sk, &ch.message);
        let attempt = wallet::LinkAttempt {
            user_id,
            address: &addr,
            message: &ch.message,
            signature: &sig,
            chain_family: ChainFamily::Evm,
            scheme: SigningScheme::Eip191,
        };
        wallet::complete_challenge(state, store, &attempt, now + 1).unwrap()
    }

    fn mk_review(id: ReviewId, author: UserId) -> Review {
        Review {
            id,
            author_user_id: author,
            business_id: 40,
            body: "great coffee, dog friendly".to_string(),
            created_at_unix_s: 1_700_000_000,
        }
    }

    fn mk_promotion(id: PromotionId, max_claims: u32, generate_codes: bool) -> Promotion {
        Promotion {
            id,
            business_id: 40,
            title: "free espresso".to_string(),
            gate: None,
            starts_at_unix_s: 1_000,
            ends_at_unix_s: Some(10_000),
            is_active: true,
            max_claims,
            total_claimed: 0,
            generate_codes,
        }
    }

    #[test]
    fn personal_sign_digest_matches_manual_prefix() {
        let message = "Sign in to Atlas Directory\nUser:7\nNonce:abc\nTs:1700000000";
        let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());
        let mut h = Keccak256::new();
        h.update(prefix.as_bytes());
        h.update(message.as_bytes());
        let expected: [u8; 32] = h.finalize().into();
        assert_eq!(crypto::personal_sign_digest(message.as_bytes()), expected);
    }

    #[test]
    fn pinned_selectors_match_computed() {
        let (balance_of, owner_of) = chain::computed_selectors();
        assert_eq!(balance_of, chain::BALANCE_OF_SELECTOR);
        assert_eq!(owner_of, chain::OWNER_OF_SELECTOR);
    }

    #[test]
    fn calldata_is_selector_plus_padded_word() {
        let wallet = parse_address("0x00000000000000000000000000000000000000aa").unwrap();
        let data = chain::balance_of_calldata(&wallet);
        assert_eq!(
            data,
            "0x70a0823100000000000000000000000000000000000000000000000000000000000000aa"
        );

        let data = chain::owner_of_calldata(U256::from(1u64));
        assert_eq!(
            data,
            "0x6352211e0000000000000000000000000000000000000000000000000000000000000001"
        );
    }

    #[test]
    fn eth_call_word_decoding() {
        assert_eq!(chain::decode_u256("0x").unwrap_err().code(), ErrorCode::ErrChainUnavailable as u16);
        assert_eq!(chain::decode_u256("0x05").unwrap(), U256::from(5u64));
        let word = format!("0x{}", "00".repeat(31) + "2a");
        assert_eq!(chain::decode_u256(&word).unwrap(), U256::from(42u64));

        let owner_word = format!("0x{}{}", "00".repeat(12), "aa".repeat(20));
        let owner = chain::decode_owner(&owner_word).unwrap();
        assert_eq!(owner, Address::repeat_byte(0xaa));
        assert!(chain::decode_owner("0xdead").is_err());
    }

    #[test]
    fn address_parsing_is_strict() {
        assert!(parse_address("0x00000000000000000000000000000000000000aa").is_some());
        // case-insensitive hex, byte-wise identity
        assert_eq!(
            parse_address("0x00000000000000000000000000000000000000AA"),
            parse_address("0x00000000000000000000000000000000000000aa")
        );
        assert!(parse_address("00000000000000000000000000000000000000aa").is_none());
        assert!(parse_address("0x0000000000000000000000000000000000000aa").is_none());
        assert!(parse_address("0x00000000000000000000000000000000000000ag").is_none());
        assert!(parse_address("").is_none());
    }

    #[test]
    fn recovery_accepts_both_v_conventions() {
        let sk = signing_key(11);
        let addr = evm_address(&sk);
        let message = "Sign in to Atlas Directory\nUser:1\nNonce:deadbeef\nTs:1000";

        for sig in [sign_text(&sk, message), sign_text_raw_v(&sk, message)] {
            let recovered = recover_personal_signer(message, &sig).unwrap();
            assert_eq!(recovered, addr);
            verify_personal_signature(message, &sig, &addr).unwrap();
        }
    }

    #[test]
    fn recovery_distinguishes_mismatch_from_garbage() {
        let sk = signing_key(11);
        let other = evm_address(&signing_key(12));
        let message = "hello";
        let sig = sign_text(&sk, message);

        let err = verify_personal_signature(message, &sig, &other).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ErrSignerMismatch as u16);

        let err = verify_personal_signature(message, "0x1234", &other).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ErrRecoveryFailed as u16);

        // v outside {0,1,27,28}
        let mut raw = hex::decode(sig.trim_start_matches("0x")).unwrap();
        raw[64] = 9;
        let bad_v = format!("0x{}", hex::encode(raw));
        let err = verify_personal_signature(message, &bad_v, &other).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ErrRecoveryFailed as u16);
    }

    #[test]
    fn crlf_is_normalized_before_recovery() {
        let sk = signing_key(7);
        let addr = evm_address(&sk);
        let signed = "line one\nline two";
        let submitted = "line one\r\nline two";
        let sig = sign_text(&sk, signed);
        verify_personal_signature(submitted, &sig, &addr).unwrap();
    }

    #[test]
    fn unsupported_verifier_pairs_are_unrepresentable() {
        // Closed dispatch: the only (family, scheme) pair resolves.
        let v = recover::VerifierKind::resolve(ChainFamily::Evm, SigningScheme::Eip191);
        assert_eq!(v, recover::VerifierKind::EvmEip191);
    }

    #[test]
    fn challenge_message_embeds_subject_and_nonce() {
        let mut store = nonce::ChallengeStore::default();
        let ch = store.issue(42, 1_000).unwrap();
        assert!(ch.message.starts_with(SIGN_IN_HEADER));
        assert!(ch.message.contains("User:42"));
        assert!(ch.message.contains(&format!("Nonce:{}", ch.nonce)));
        assert_eq!(ch.nonce.len(), NONCE_BYTES * 2);
        assert_eq!(ch.expires_at_unix_s, 1_000 + NONCE_TTL_SECS);
    }

    #[test]
    fn challenge_slot_is_single_and_overwritten() {
        let mut store = nonce::ChallengeStore::default();
        let first = store.issue(1, 1_000).unwrap();
        let second = store.issue(1, 1_001).unwrap();
        assert_ne!(first.nonce, second.nonce);

        let err = store.consume(1, &first.message, 1_002).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ErrChallengeMismatch as u16);
        store.consume(1, &second.message, 1_002).unwrap();

        let err = store.consume(1, &second.message, 1_003).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ErrChallengeMissing as u16);
    }

    #[test]
    fn expired_challenge_is_purged_on_access() {
        let mut store = nonce::ChallengeStore::default();
        let ch = store.issue(5, 1_000).unwrap();

        let err = store
            .consume(5, &ch.message, 1_000 + NONCE_TTL_SECS)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ErrChallengeExpired as u16);

        let err = store.consume(5, &ch.message, 1_000 + NONCE_TTL_SECS).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ErrChallengeMissing as u16);
    }

    #[test]
    fn challenge_issue_rate_is_limited_per_subject() {
        let mut store = nonce::ChallengeStore::default();
        for _ in 0..CHALLENGE_RATE_MAX {
            store.issue(9, 1_000).unwrap();
        }
        let err = store.issue(9, 1_000).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ErrRateLimited as u16);

        // other subjects are unaffected, and the window slides
        store.issue(10, 1_000).unwrap();
        store.issue(9, 1_000 + CHALLENGE_RATE_WINDOW_SECS).unwrap();
    }

    #[test]
    fn wallet_link_happy_path_consumes_challenge() {
        let sk = signing_key(11);
        let mut state = ServiceState::default();
        let mut store = nonce::ChallengeStore::default();

        let ch = wallet::start_challenge(&mut state, &mut store, 7, 1_000).unwrap();
        let addr = address_hex(&evm_address(&sk));
        let sig = sign_text(&sk, &ch.message);
        let attempt = wallet::LinkAttempt {
            user_id: 7,
            address: &addr,
            message: &ch.message,
            signature: &sig,
            chain_family: ChainFamily::Evm,
            scheme: SigningScheme::Eip191,
        };

        let link = wallet::complete_challenge(&mut state, &mut store, &attempt, 1_001).unwrap();
        assert_eq!(link.user_id, 7);
        assert_eq!(link.address, evm_address(&sk));
        assert_eq!(state.counters.challenges_issued, 1);
        assert_eq!(state.counters.wallets_verified, 1);
        assert_eq!(state.activity_log.len(), 1);

        // replay of the consumed challenge
        let err = wallet::complete_challenge(&mut state, &mut store, &attempt, 1_002).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ErrChallengeMissing as u16);
    }

    #[test]
    fn failed_signature_leaves_challenge_live() {
        let sk = signing_key(11);
        let wrong = signing_key(12);
        let mut state = ServiceState::default();
        let mut store = nonce::ChallengeStore::default();

        let ch = wallet::start_challenge(&mut state, &mut store, 3, 1_000).unwrap();
        let addr = address_hex(&evm_address(&sk));

        let bad_sig = sign_text(&wrong, &ch.message);
        let attempt = wallet::LinkAttempt {
            user_id: 3,
            address: &addr,
            message: &ch.message,
            signature: &bad_sig,
            chain_family: ChainFamily::Evm,
            scheme: SigningScheme::Eip191,
        };
        let err = wallet::complete_challenge(&mut state, &mut store, &attempt, 1_001).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ErrSignerMismatch as u16);

        // same challenge, correct key
        let good_sig = sign_text(&sk, &ch.message);
        let attempt = wallet::LinkAttempt {
            signature: &good_sig,
            ..attempt
        };
        wallet::complete_challenge(&mut state, &mut store, &attempt, 1_002).unwrap();
    }

    #[test]
    fn address_owned_by_other_user_is_conflict() {
        let sk = signing_key(11);
        let mut state = ServiceState::default();
        let mut store = nonce::ChallengeStore::default();

        link_wallet_for(&mut state, &mut store, 1, &sk, 1_000);

        let ch = wallet::start_challenge(&mut state, &mut store, 2, 2_000).unwrap();
        let addr = address_hex(&evm_address(&sk));
        let sig = sign_text(&sk, &ch.message);
        let attempt = wallet::LinkAttempt {
            user_id: 2,
            address: &addr,
            message: &ch.message,
            signature: &sig,
            chain_family: ChainFamily::Evm,
            scheme: SigningScheme::Eip191,
        };
        let err = wallet::complete_challenge(&mut state, &mut store, &attempt, 2_001).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ErrAddressLinkedElsewhere as u16);

        // the conflict did not burn user 2's challenge
        let sk2 = signing_key(13);
        let addr2 = address_hex(&evm_address(&sk2));
        let sig2 = sign_text(&sk2, &ch.message);
        let attempt2 = wallet::LinkAttempt {
            address: &addr2,
            signature: &sig2,
            ..attempt
        };
        wallet::complete_challenge(&mut state, &mut store, &attempt2, 2_002).unwrap();
    }

    #[test]
    fn relinking_same_pair_is_idempotent() {
        let sk = signing_key(11);
        let mut state = ServiceState::default();
        let mut store = nonce::ChallengeStore::default();

        let first = link_wallet_for(&mut state, &mut store, 1, &sk, 1_000);
        let second = link_wallet_for(&mut state, &mut store, 1, &sk, 5_000);
        assert_eq!(first, second);
        assert_eq!(state.wallet_link_by_user_address.len(), 1);
        assert!(state.has_link(1));
        assert_eq!(state.linked_addresses(1), vec![evm_address(&sk)]);
    }

    #[test]
    fn review_message_is_a_versioned_contract() {
        let review = mk_review(3, 9);
        assert_eq!(
            content::review_message(&review),
            "Sign review on Atlas Directory\nReview:3\nUser:9\nBusiness:40\nCreated:1700000000"
        );
    }

    #[test]
    fn review_signing_is_author_only_and_idempotent() {
        let sk = signing_key(11);
        let mut state = ServiceState::default();
        state.review_by_id.insert(3, mk_review(3, 9));

        let err = content::review_digest(&state, 3, 8).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ErrNotReviewAuthor as u16);
        let err = content::review_digest(&state, 99, 9).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ErrReviewNotFound as u16);

        let (message, hash) = content::review_digest(&state, 3, 9).unwrap();
        let addr = address_hex(&evm_address(&sk));
        let sig = sign_text(&sk, &message);

        let first = content::sign_review(&mut state, 3, 9, &addr, &sig, 1_000).unwrap();
        assert_eq!(first.message_hash, hash);
        assert_eq!(first.address, evm_address(&sk));

        // second submission returns the stored record unchanged
        let sig_again = sign_text(&sk, &message);
        let second = content::sign_review(&mut state, 3, 9, &addr, &sig_again, 2_000).unwrap();
        assert_eq!(first, second);
        assert_eq!(state.activity_log.len(), 1);
    }

    #[test]
    fn review_signature_must_recover_to_submitted_address() {
        let sk = signing_key(11);
        let other = signing_key(12);
        let mut state = ServiceState::default();
        state.review_by_id.insert(3, mk_review(3, 9));

        let (message, _) = content::review_digest(&state, 3, 9).unwrap();
        let addr = address_hex(&evm_address(&sk));
        let sig = sign_text(&other, &message);
        let err = content::sign_review(&mut state, 3, 9, &addr, &sig, 1_000).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ErrSignerMismatch as u16);
        assert!(state.signature_by_review.is_empty());
    }

    #[test]
    fn promotion_window_and_capacity() {
        let mut promo = mk_promotion(1, 2, false);
        assert!(promo.is_open(1_000));
        assert!(!promo.is_open(999));
        assert!(!promo.is_open(10_001));

        promo.total_claimed = 2;
        assert!(promo.in_window(5_000));
        assert!(!promo.is_open(5_000));

        promo.max_claims = 0;
        assert!(promo.is_open(5_000));

        promo.is_active = false;
        assert!(!promo.in_window(5_000));
    }

    #[test]
    fn claim_commit_enforces_order_closed_duplicate_capacity() {
        let mut state = ServiceState::default();
        state.promotion_by_id.insert(1, mk_promotion(1, 1, true));
        let a = Address::repeat_byte(0x0a);
        let b = Address::repeat_byte(0x0b);

        let claim = promo::commit_claim(&mut state, 1, &a, "msg", "0xsig", 2_000).unwrap();
        let code = claim.code.expect("code generated");
        assert_eq!(code.len(), CLAIM_CODE_BYTES * 2);
        assert_eq!(state.promotion_by_id[&1].total_claimed, 1);
        assert_eq!(state.counters.claims_granted, 1);

        let err = promo::commit_claim(&mut state, 1, &a, "msg", "0xsig", 2_001).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ErrAlreadyClaimed as u16);

        let err = promo::commit_claim(&mut state, 1, &b, "msg", "0xsig", 2_002).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ErrSoldOut as u16);
        assert_eq!(state.promotion_by_id[&1].total_claimed, 1);

        let err = promo::commit_claim(&mut state, 1, &b, "msg", "0xsig", 20_000).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ErrPromotionClosed as u16);

        let err = promo::commit_claim(&mut state, 99, &b, "msg", "0xsig", 2_003).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ErrPromotionNotFound as u16);
    }

    #[test]
    fn claim_codes_only_when_requested() {
        let mut state = ServiceState::default();
        state.promotion_by_id.insert(2, mk_promotion(2, 0, false));
        let claim = promo::commit_claim(
            &mut state,
            2,
            &Address::repeat_byte(0x0c),
            "msg",
            "0xsig",
            2_000,
        )
        .unwrap();
        assert!(claim.code.is_none());
    }
}
