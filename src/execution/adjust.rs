use std::fmt;
use std::time::Duration;

use alloy::primitives::aliases::I24;
use alloy::primitives::Address;
use alloy::sol_types::SolCall;

use super::{
    call_request, gas_limit_with_margin, submit_with_fresh_nonce, uint24, SubmitError,
    FALLBACK_ADJUSTMENT_GAS, RANGE_UPDATE_GAS,
};
use crate::chain::{Chain, PoolContext, TxReceipt};
use crate::contracts::{IAutomationTrigger, ISentinelAmm};
use crate::metrics::MetricsRecord;
use crate::pricing::{convert, CalculationError, ReconciledPrice};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxError {
    Calculation(CalculationError),
    TickOutOfRange(i32),
    Submit(SubmitError),
}

impl TxError {
    /// True when the chain saw the transaction and did not confirm it.
    pub fn is_revert(&self) -> bool {
        matches!(
            self,
            Self::Submit(
                SubmitError::Rejected(_)
                    | SubmitError::NoReceipt
                    | SubmitError::TimedOut(_)
                    | SubmitError::Reverted { .. }
            )
        )
    }
}

impl fmt::Display for TxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Calculation(err) => write!(f, "tick calculation failed: {err}"),
            Self::TickOutOfRange(tick) => write!(f, "tick {tick} does not fit int24"),
            Self::Submit(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for TxError {}

impl From<CalculationError> for TxError {
    fn from(value: CalculationError) -> Self {
        Self::Calculation(value)
    }
}

impl From<SubmitError> for TxError {
    fn from(value: SubmitError) -> Self {
        Self::Submit(value)
    }
}

/// Submits `manualTrigger` on the automation trigger contract.
pub struct AdjustmentDriver<'a, C: ?Sized> {
    chain: &'a C,
    trigger: Address,
    confirmation_timeout: Duration,
}

impl<'a, C> AdjustmentDriver<'a, C>
where
    C: Chain + ?Sized,
{
    pub fn new(chain: &'a C, trigger: Address, confirmation_timeout: Duration) -> Self {
        Self {
            chain,
            trigger,
            confirmation_timeout,
        }
    }

    /// Converts the predicted price, submits the trigger and records the
    /// outcome. A reverted or unconfirmed transaction leaves
    /// `transaction_hash` and `gas_used` untouched.
    pub async fn trigger(
        &self,
        pool: &PoolContext,
        reconciled: ReconciledPrice,
        stage_label: &str,
        metrics: &mut MetricsRecord,
    ) -> Result<TxReceipt, TxError> {
        let conversion = convert(
            reconciled.predicted,
            pool.token0_decimals,
            pool.token1_decimals,
        )?;
        metrics.predicted_tick = Some(conversion.tick);
        tracing::info!(
            stage = stage_label,
            tick = conversion.tick,
            price_fixed_point = %conversion.price_fixed_point,
            "calculated predicted tick"
        );

        let predicted_tick =
            I24::try_from(conversion.tick).map_err(|_| TxError::TickOutOfRange(conversion.tick))?;
        let calldata = IAutomationTrigger::manualTriggerCall {
            predictedTick: predicted_tick,
            predictedPrice: conversion.price_fixed_point,
        }
        .abi_encode();
        let tx = call_request(self.chain.sender(), self.trigger, calldata);

        let gas = gas_limit_with_margin(self.chain, &tx, FALLBACK_ADJUSTMENT_GAS).await;
        tracing::debug!(stage = stage_label, ?gas, "adjustment gas limit");

        let receipt =
            submit_with_fresh_nonce(self.chain, tx, gas.limit(), self.confirmation_timeout)
                .await
                .inspect_err(|err| {
                    tracing::error!(stage = stage_label, error = %err, "adjustment transaction failed")
                })?;

        metrics.transaction_hash = Some(receipt.transaction_hash);
        metrics.gas_used = Some(receipt.gas_used);
        tracing::info!(
            stage = stage_label,
            tx_hash = %receipt.transaction_hash,
            gas_used = receipt.gas_used,
            "adjustment transaction confirmed"
        );
        Ok(receipt)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeUpdateError {
    OutOfRange(u32),
    Submit(SubmitError),
}

impl fmt::Display for RangeUpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange(value) => {
                write!(f, "range width multiplier {value} does not fit uint24")
            }
            Self::Submit(err) => write!(f, "range width update failed: {err}"),
        }
    }
}

impl std::error::Error for RangeUpdateError {}

/// Sets the AMM's range width multiplier.
pub async fn set_range_width_multiplier<C>(
    chain: &C,
    amm: Address,
    multiplier: u32,
    confirmation_timeout: Duration,
) -> Result<TxReceipt, RangeUpdateError>
where
    C: Chain + ?Sized,
{
    let value = uint24(multiplier).ok_or(RangeUpdateError::OutOfRange(multiplier))?;
    let calldata = ISentinelAmm::setRangeWidthMultiplierCall { multiplier: value }.abi_encode();
    let tx = call_request(chain.sender(), amm, calldata);
    let receipt = submit_with_fresh_nonce(chain, tx, RANGE_UPDATE_GAS, confirmation_timeout)
        .await
        .map_err(RangeUpdateError::Submit)?;
    tracing::info!(multiplier, tx_hash = %receipt.transaction_hash, "range width multiplier updated");
    Ok(receipt)
}
