use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::chain::ChainReader;
use crate::content;
use crate::errors::ServiceError;
use crate::gate::{GateDetail, GateOutcome};
use crate::nonce::ChallengeStore;
use crate::promo::{self, ClaimAttempt};
use crate::state::ServiceState;
use crate::types::{address_hex, unix_now, ChainFamily, SigningScheme, UserId};
use crate::wallet::{self, LinkAttempt};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<Mutex<ServiceState>>,
    pub challenges: Arc<Mutex<ChallengeStore>>,
    pub reader: Arc<ChainReader>,
}

impl AppState {
    pub fn new(service: ServiceState, reader: ChainReader) -> Self {
        Self {
            service: Arc::new(Mutex::new(service)),
            challenges: Arc::new(Mutex::new(ChallengeStore::default())),
            reader: Arc::new(reader),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    product: &'static str,
}

#[derive(Serialize)]
struct MetricsBody {
    challenges_issued: u64,
    wallets_verified: u64,
    claims_granted: u64,
}

#[derive(Serialize)]
struct MetricsResponse {
    ok: bool,
    metrics: MetricsBody,
}

#[derive(Deserialize)]
struct ChallengeRequest {
    user_id: UserId,
}

#[derive(Serialize)]
struct ChallengeResponse {
    message: String,
    nonce: String,
    expires_at_unix_s: u64,
}

#[derive(Deserialize)]
struct VerifyRequest {
    user_id: UserId,
    address: String,
    message: String,
    signature: String,
    #[serde(default)]
    chain: ChainFamily,
    #[serde(default)]
    scheme: SigningScheme,
}

#[derive(Serialize)]
struct VerifyResponse {
    ok: bool,
    address: String,
    chain: ChainFamily,
    scheme: SigningScheme,
}

#[derive(Deserialize)]
struct UserQuery {
    user_id: UserId,
}

#[derive(Serialize)]
struct WalletStatusResponse {
    linked: bool,
    addresses: Vec<String>,
}

#[derive(Serialize)]
struct ReviewDigestResponse {
    review_id: u64,
    message: String,
    message_hash: String,
}

#[derive(Deserialize)]
struct SignReviewRequest {
    user_id: UserId,
    address: String,
    signature: String,
}

#[derive(Serialize)]
struct SignReviewResponse {
    ok: bool,
    signed: bool,
    review_id: u64,
    address: String,
}

#[derive(Deserialize)]
struct EligibilityQuery {
    wallet: String,
}

#[derive(Serialize)]
struct EligibilityResponse {
    eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    balance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
}

#[derive(Deserialize)]
struct ClaimRequest {
    wallet: String,
    message: String,
    signature: String,
}

#[derive(Serialize)]
struct ClaimResponse {
    ok: bool,
    code: Option<String>,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    ok: bool,
    error: ErrorDetail,
}

fn error_code_str(err: &ServiceError) -> &'static str {
    match err {
        ServiceError::BadAddress => "BAD_ADDRESS",
        ServiceError::ChallengeMissing => "AUTH_CHALLENGE_MISSING",
        ServiceError::ChallengeMismatch => "AUTH_CHALLENGE_MISMATCH",
        ServiceError::ChallengeExpired => "AUTH_CHALLENGE_EXPIRED",
        ServiceError::RateLimited => "RATE_LIMITED",
        ServiceError::RecoveryFailed => "SIGNATURE_INVALID",
        ServiceError::SignerMismatch => "SIGNER_MISMATCH",
        ServiceError::AddressLinkedElsewhere => "ADDRESS_LINKED_ELSEWHERE",
        ServiceError::ReviewNotFound => "REVIEW_NOT_FOUND",
        ServiceError::NotReviewAuthor => "NOT_REVIEW_AUTHOR",
        ServiceError::ChainUnavailable(_) => "CHAIN_UNAVAILABLE",
        ServiceError::UnsupportedChain => "UNSUPPORTED_CHAIN",
        ServiceError::PromotionNotFound => "PROMOTION_NOT_FOUND",
        ServiceError::PromotionClosed => "PROMOTION_CLOSED",
        ServiceError::NotEligible => "NOT_ELIGIBLE",
        ServiceError::AlreadyClaimed => "ALREADY_CLAIMED",
        ServiceError::SoldOut => "SOLD_OUT",
    }
}

fn error_status(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::BadAddress => StatusCode::BAD_REQUEST,
        ServiceError::ChallengeMissing
        | ServiceError::ChallengeMismatch
        | ServiceError::ChallengeExpired
        | ServiceError::RecoveryFailed
        | ServiceError::SignerMismatch => StatusCode::UNAUTHORIZED,
        ServiceError::NotReviewAuthor | ServiceError::NotEligible => StatusCode::FORBIDDEN,
        ServiceError::ReviewNotFound | ServiceError::PromotionNotFound => StatusCode::NOT_FOUND,
        ServiceError::AddressLinkedElsewhere
        | ServiceError::PromotionClosed
        | ServiceError::AlreadyClaimed
        | ServiceError::SoldOut => StatusCode::CONFLICT,
        ServiceError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ServiceError::ChainUnavailable(_) | ServiceError::UnsupportedChain => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

fn error_response(err: ServiceError) -> Response {
    (
        error_status(&err),
        Json(ErrorEnvelope {
            ok: false,
            error: ErrorDetail {
                code: error_code_str(&err),
                message: err.to_string(),
            },
        }),
    )
        .into_response()
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        ok: true,
        product: "Atlas Directory",
    })
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let service = state.service.lock().expect("state lock");
    Json(MetricsResponse {
        ok: true,
        metrics: MetricsBody {
            challenges_issued: service.counters.challenges_issued,
            wallets_verified: service.counters.wallets_verified,
            claims_granted: service.counters.claims_granted,
        },
    })
}

async fn auth_challenge(
    State(state): State<AppState>,
    Json(req): Json<ChallengeRequest>,
) -> impl IntoResponse {
    let now = unix_now();
    let mut service = state.service.lock().expect("state lock");
    let mut challenges = state.challenges.lock().expect("challenge lock");
    let challenge =
        match wallet::start_challenge(&mut service, &mut challenges, req.user_id, now) {
            Ok(v) => v,
            Err(e) => return error_response(e),
        };

    (
        StatusCode::OK,
        Json(ChallengeResponse {
            message: challenge.message,
            nonce: challenge.nonce,
            expires_at_unix_s: challenge.expires_at_unix_s,
        }),
    )
        .into_response()
}

async fn auth_verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> impl IntoResponse {
    let now = unix_now();
    let attempt = LinkAttempt {
        user_id: req.user_id,
        address: &req.address,
        message: &req.message,
        signature: &req.signature,
        chain_family: req.chain,
        scheme: req.scheme,
    };

    let mut service = state.service.lock().expect("state lock");
    let mut challenges = state.challenges.lock().expect("challenge lock");
    let link = match wallet::complete_challenge(&mut service, &mut challenges, &attempt, now) {
        Ok(v) => v,
        Err(e) => return error_response(e),
    };

    (
        StatusCode::OK,
        Json(VerifyResponse {
            ok: true,
            address: address_hex(&link.address),
            chain: link.chain_family,
            scheme: link.scheme,
        }),
    )
        .into_response()
}

async fn wallet_status(
    State(state): State<AppState>,
    Query(q): Query<UserQuery>,
) -> impl IntoResponse {
    let service = state.service.lock().expect("state lock");
    let addresses: Vec<String> = service
        .linked_addresses(q.user_id)
        .iter()
        .map(address_hex)
        .collect();

    Json(WalletStatusResponse {
        linked: !addresses.is_empty(),
        addresses,
    })
}

async fn review_digest(
    State(state): State<AppState>,
    Path(review_id): Path<u64>,
    Query(q): Query<UserQuery>,
) -> impl IntoResponse {
    let service = state.service.lock().expect("state lock");
    match content::review_digest(&service, review_id, q.user_id) {
        Ok((message, message_hash)) => (
            StatusCode::OK,
            Json(ReviewDigestResponse {
                review_id,
                message,
                message_hash,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn review_sign(
    State(state): State<AppState>,
    Path(review_id): Path<u64>,
    Json(req): Json<SignReviewRequest>,
) -> impl IntoResponse {
    let now = unix_now();
    let mut service = state.service.lock().expect("state lock");
    match content::sign_review(
        &mut service,
        review_id,
        req.user_id,
        &req.address,
        &req.signature,
        now,
    ) {
        Ok(record) => (
            StatusCode::OK,
            Json(SignReviewResponse {
                ok: true,
                signed: true,
                review_id,
                address: address_hex(&record.address),
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

fn eligibility_body(outcome: GateOutcome) -> EligibilityResponse {
    let (balance, owner, reason) = match outcome.detail {
        GateDetail::Balance(b) => (Some(b.to_string()), None, None),
        GateDetail::Owner(o) => (None, Some(address_hex(&o)), None),
        GateDetail::NotConfigured => (None, None, Some("not_configured")),
    };
    EligibilityResponse {
        eligible: outcome.eligible,
        balance,
        owner,
        reason,
    }
}

async fn promotion_eligibility(
    State(state): State<AppState>,
    Path(promotion_id): Path<u64>,
    Query(q): Query<EligibilityQuery>,
) -> impl IntoResponse {
    let now = unix_now();
    match promo::check_eligibility(&state.service, &state.reader, promotion_id, &q.wallet, now)
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(eligibility_body(outcome))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn promotion_claim(
    State(state): State<AppState>,
    Path(promotion_id): Path<u64>,
    Json(req): Json<ClaimRequest>,
) -> impl IntoResponse {
    let now = unix_now();
    let attempt = ClaimAttempt {
        promotion_id,
        wallet: &req.wallet,
        message: &req.message,
        signature: &req.signature,
    };
    match promo::claim(&state.service, &state.reader, &attempt, now).await {
        Ok(claim) => (
            StatusCode::OK,
            Json(ClaimResponse {
                ok: true,
                code: claim.code,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn apply_security_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/metrics", get(metrics))
        .route("/v1/auth/challenge", post(auth_challenge))
        .route("/v1/auth/verify", post(auth_verify))
        .route("/v1/wallet/status", get(wallet_status))
        .route("/v1/reviews/:id/digest", get(review_digest))
        .route("/v1/reviews/:id/sign", post(review_sign))
        .route("/v1/promotions/:id/eligibility", get(promotion_eligibility))
        .route("/v1/promotions/:id/claim", post(promotion_claim))
        .layer(middleware::map_response(apply_security_headers))
        .with_state(state)
}

pub async fn run_http_server(addr: SocketAddr, state: AppState) {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind api listener");
    axum::serve(listener, build_router(state))
        .await
        .expect("run api server");
}
