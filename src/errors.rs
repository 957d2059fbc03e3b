use thiserror::Error;

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ErrBadAddress = 1001,

    ErrChallengeMissing = 1101,
    ErrChallengeMismatch = 1102,
    ErrChallengeExpired = 1103,
    ErrRateLimited = 1104,

    ErrRecoveryFailed = 1201,
    ErrSignerMismatch = 1202,

    ErrAddressLinkedElsewhere = 1301,

    ErrReviewNotFound = 1401,
    ErrNotReviewAuthor = 1402,

    ErrChainUnavailable = 1501,
    ErrUnsupportedChain = 1502,

    ErrPromotionNotFound = 1601,
    ErrPromotionClosed = 1602,
    ErrNotEligible = 1603,
    ErrAlreadyClaimed = 1604,
    ErrSoldOut = 1605,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("bad address")]
    BadAddress,
    #[error("no active challenge")]
    ChallengeMissing,
    #[error("challenge mismatch")]
    ChallengeMismatch,
    #[error("challenge expired")]
    ChallengeExpired,
    #[error("too many challenge requests")]
    RateLimited,
    // Deliberately does not say why recovery failed.
    #[error("signature recovery failed")]
    RecoveryFailed,
    #[error("signer mismatch")]
    SignerMismatch,
    #[error("address already linked to another account")]
    AddressLinkedElsewhere,
    #[error("review not found")]
    ReviewNotFound,
    #[error("not the review author")]
    NotReviewAuthor,
    #[error("chain read failed: {0}")]
    ChainUnavailable(&'static str),
    #[error("unsupported chain")]
    UnsupportedChain,
    #[error("promotion not found")]
    PromotionNotFound,
    #[error("promotion closed")]
    PromotionClosed,
    #[error("not eligible")]
    NotEligible,
    #[error("already claimed")]
    AlreadyClaimed,
    #[error("sold out")]
    SoldOut,
}

impl ServiceError {
    pub fn code(&self) -> u16 {
        match self {
            ServiceError::BadAddress => ErrorCode::ErrBadAddress as u16,
            ServiceError::ChallengeMissing => ErrorCode::ErrChallengeMissing as u16,
            ServiceError::ChallengeMismatch => ErrorCode::ErrChallengeMismatch as u16,
            ServiceError::ChallengeExpired => ErrorCode::ErrChallengeExpired as u16,
            ServiceError::RateLimited => ErrorCode::ErrRateLimited as u16,
            ServiceError::RecoveryFailed => ErrorCode::ErrRecoveryFailed as u16,
            ServiceError::SignerMismatch => ErrorCode::ErrSignerMismatch as u16,
            ServiceError::AddressLinkedElsewhere => ErrorCode::ErrAddressLinkedElsewhere as u16,
            ServiceError::ReviewNotFound => ErrorCode::ErrReviewNotFound as u16,
            ServiceError::NotReviewAuthor => ErrorCode::ErrNotReviewAuthor as u16,
            ServiceError::ChainUnavailable(_) => ErrorCode::ErrChainUnavailable as u16,
            ServiceError::UnsupportedChain => ErrorCode::ErrUnsupportedChain as u16,
            ServiceError::PromotionNotFound => ErrorCode::ErrPromotionNotFound as u16,
            ServiceError::PromotionClosed => ErrorCode::ErrPromotionClosed as u16,
            ServiceError::NotEligible => ErrorCode::ErrNotEligible as u16,
            ServiceError::AlreadyClaimed => ErrorCode::ErrAlreadyClaimed as u16,
            ServiceError::SoldOut => ErrorCode::ErrSoldOut as u16,
        }
    }
}
