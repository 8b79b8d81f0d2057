use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::aliases::U160;
use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use rust_decimal::Decimal;

use super::{
    call_request, decimal_to_units, submit_with_fresh_nonce, uint24, AmountConversionError,
    SubmitError, APPROVAL_GAS, SWAP_GAS,
};
use crate::chain::{Chain, PoolContext};
use crate::contracts::{ISwapRouter, IERC20};
use crate::metrics::MetricsRecord;

pub const SWAP_DEADLINE_SECS: u64 = 600;
pub const DEFAULT_SWAP_PACING: Duration = Duration::from_millis(500);

/// Direction of the fee-generation swaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwapScenario {
    /// token0 -> token1.
    #[default]
    Bullish,
    /// token1 -> token0.
    Bearish,
}

impl FromStr for SwapScenario {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "0" | "auto" | "bullish" => Ok(Self::Bullish),
            "1" | "bearish" => Ok(Self::Bearish),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwapSuccessPolicy {
    /// More than half of the attempted swaps succeeded.
    #[default]
    Majority,
    /// At least one swap succeeded.
    AnySuccess,
}

impl SwapSuccessPolicy {
    pub fn is_met(self, result: SwapBatchResult) -> bool {
        match self {
            Self::Majority => result.succeeded > result.attempted / 2,
            Self::AnySuccess => result.succeeded > 0,
        }
    }
}

impl FromStr for SwapSuccessPolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "majority" | "strict" => Ok(Self::Majority),
            "any" | "lenient" => Ok(Self::AnySuccess),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwapBatchResult {
    pub attempted: u32,
    pub succeeded: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapPlan {
    pub scenario: SwapScenario,
    pub num_swaps: u32,
    /// Readable amount sold per swap when selling token0.
    pub amount_token0: Decimal,
    /// Readable amount sold per swap when selling token1.
    pub amount_token1: Decimal,
    pub policy: SwapSuccessPolicy,
    pub pacing: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapSimError {
    Amount(AmountConversionError),
    InvalidPoolFee(u32),
    Approval(SubmitError),
    BelowThreshold {
        result: SwapBatchResult,
        policy: SwapSuccessPolicy,
    },
}

impl fmt::Display for SwapSimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Amount(err) => write!(f, "invalid swap amount: {err}"),
            Self::InvalidPoolFee(fee) => write!(f, "pool fee {fee} does not fit uint24"),
            Self::Approval(err) => write!(f, "router approval failed: {err}"),
            Self::BelowThreshold { result, policy } => write!(
                f,
                "only {}/{} swaps succeeded ({policy:?} policy)",
                result.succeeded, result.attempted
            ),
        }
    }
}

impl std::error::Error for SwapSimError {}

struct SwapLeg {
    token_in: Address,
    token_out: Address,
    amount_in: U256,
}

/// Generates trading fees against the position by swapping through the router.
pub struct FeeGenerationSimulator<'a, C: ?Sized> {
    chain: &'a C,
    router: Address,
    confirmation_timeout: Duration,
}

impl<'a, C> FeeGenerationSimulator<'a, C>
where
    C: Chain + ?Sized,
{
    pub fn new(chain: &'a C, router: Address, confirmation_timeout: Duration) -> Self {
        Self {
            chain,
            router,
            confirmation_timeout,
        }
    }

    /// Approves the router once for the whole batch, then runs the swaps in
    /// sequence. Individual swap failures are logged and counted; only a
    /// failed approval or a batch below `plan.policy` is an error.
    /// `swaps_executed` is recorded in both cases.
    pub async fn simulate(
        &self,
        pool: &PoolContext,
        plan: &SwapPlan,
        metrics: &mut MetricsRecord,
    ) -> Result<SwapBatchResult, SwapSimError> {
        let leg = swap_leg(pool, plan).map_err(SwapSimError::Amount)?;
        let fee = uint24(pool.fee).ok_or(SwapSimError::InvalidPoolFee(pool.fee))?;
        tracing::info!(
            scenario = ?plan.scenario,
            num_swaps = plan.num_swaps,
            token_in = %leg.token_in,
            amount_in = %leg.amount_in,
            "starting swap batch"
        );

        self.approve_batch(&leg, plan.num_swaps).await?;

        let recipient = self.chain.sender();
        let mut result = SwapBatchResult::default();
        for index in 0..plan.num_swaps {
            if index > 0 && !plan.pacing.is_zero() {
                tokio::time::sleep(plan.pacing).await;
            }
            result.attempted += 1;

            let params = ISwapRouter::ExactInputSingleParams {
                tokenIn: leg.token_in,
                tokenOut: leg.token_out,
                fee,
                recipient,
                deadline: U256::from(swap_deadline()),
                amountIn: leg.amount_in,
                amountOutMinimum: U256::ZERO,
                sqrtPriceLimitX96: U160::ZERO,
            };
            let calldata = ISwapRouter::exactInputSingleCall { params }.abi_encode();
            let tx = call_request(recipient, self.router, calldata);
            match submit_with_fresh_nonce(self.chain, tx, SWAP_GAS, self.confirmation_timeout).await
            {
                Ok(receipt) => {
                    result.succeeded += 1;
                    tracing::debug!(
                        swap = index + 1,
                        tx_hash = %receipt.transaction_hash,
                        "swap confirmed"
                    );
                }
                Err(err) => {
                    tracing::warn!(swap = index + 1, error = %err, "swap failed");
                }
            }
        }

        metrics.swaps_executed = result.succeeded;
        tracing::info!(
            attempted = result.attempted,
            succeeded = result.succeeded,
            "swap batch finished"
        );

        if plan.policy.is_met(result) {
            Ok(result)
        } else {
            Err(SwapSimError::BelowThreshold {
                result,
                policy: plan.policy,
            })
        }
    }

    async fn approve_batch(&self, leg: &SwapLeg, num_swaps: u32) -> Result<(), SwapSimError> {
        let total = leg
            .amount_in
            .checked_mul(U256::from(num_swaps))
            .ok_or(SwapSimError::Amount(AmountConversionError::Overflow))?;
        let calldata = IERC20::approveCall {
            spender: self.router,
            amount: total,
        }
        .abi_encode();
        let tx = call_request(self.chain.sender(), leg.token_in, calldata);
        let receipt = submit_with_fresh_nonce(self.chain, tx, APPROVAL_GAS, self.confirmation_timeout)
            .await
            .map_err(SwapSimError::Approval)?;
        tracing::info!(
            token = %leg.token_in,
            amount = %total,
            tx_hash = %receipt.transaction_hash,
            "router approved for swap batch"
        );
        Ok(())
    }
}

fn swap_leg(pool: &PoolContext, plan: &SwapPlan) -> Result<SwapLeg, AmountConversionError> {
    Ok(match plan.scenario {
        SwapScenario::Bullish => SwapLeg {
            token_in: pool.token0,
            token_out: pool.token1,
            amount_in: decimal_to_units(plan.amount_token0, pool.token0_decimals)?,
        },
        SwapScenario::Bearish => SwapLeg {
            token_in: pool.token1,
            token_out: pool.token0,
            amount_in: decimal_to_units(plan.amount_token1, pool.token1_decimals)?,
        },
    })
}

fn swap_deadline() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp())
        .unwrap_or_default()
        .saturating_add(SWAP_DEADLINE_SECS)
}
