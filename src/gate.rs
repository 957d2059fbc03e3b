use crate::chain::ChainReader;
use crate::errors::ServiceError;
use crate::types::{Address, GateKind, TokenGate, U256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDetail {
    Balance(U256),
    Owner(Address),
    NotConfigured,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateOutcome {
    pub eligible: bool,
    pub detail: GateDetail,
}

/// Decides whether a wallet satisfies the gate. `Err` is reserved for reads
/// that could not complete (`ChainUnavailable`, `UnsupportedChain`);
/// ineligibility is always an `Ok` outcome so callers can tell a permanent
/// rejection from a retryable outage.
pub async fn evaluate(
    reader: &ChainReader,
    gate: Option<&TokenGate>,
    wallet: &Address,
) -> Result<GateOutcome, ServiceError> {
    let Some(gate) = gate else {
        // No rule configured: permanently ineligible, not an outage.
        return Ok(GateOutcome {
            eligible: false,
            detail: GateDetail::NotConfigured,
        });
    };

    match gate.kind {
        GateKind::Erc20 => {
            let balance = reader
                .erc20_balance_of(&gate.chain, &gate.contract, wallet)
                .await?;
            Ok(GateOutcome {
                eligible: balance >= gate.min_balance,
                detail: GateDetail::Balance(balance),
            })
        }
        GateKind::Erc721 => match gate.required_token_id {
            Some(token_id) => {
                let owner = reader
                    .erc721_owner_of(&gate.chain, &gate.contract, token_id)
                    .await?;
                Ok(GateOutcome {
                    eligible: owner == *wallet,
                    detail: GateDetail::Owner(owner),
                })
            }
            None => {
                let balance = reader
                    .erc721_balance_of(&gate.chain, &gate.contract, wallet)
                    .await?;
                Ok(GateOutcome {
                    eligible: balance > U256::zero(),
                    detail: GateDetail::Balance(balance),
                })
            }
        },
    }
}
