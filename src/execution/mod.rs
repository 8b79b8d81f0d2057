use std::fmt;
use std::time::Duration;

use alloy::primitives::aliases::U24;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use rust_decimal::Decimal;

use crate::chain::{Chain, ChainError, TxReceipt};

pub mod adjust;
pub mod fees;
pub mod swaps;

/// Estimates are padded by 30% before submission.
pub const GAS_MARGIN_PERCENT: u64 = 130;
pub const FALLBACK_ADJUSTMENT_GAS: u64 = 1_500_000;
pub const APPROVAL_GAS: u64 = 100_000;
pub const SWAP_GAS: u64 = 300_000;
pub const FEE_COLLECTION_GAS: u64 = 500_000;
pub const TRANSFER_GAS: u64 = 100_000;
pub const RANGE_UPDATE_GAS: u64 = 200_000;
pub const MAX_UINT24: u32 = (1 << 24) - 1;
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasLimit {
    Estimated { estimate: u64, limit: u64 },
    Fallback { limit: u64 },
}

impl GasLimit {
    pub fn limit(self) -> u64 {
        match self {
            Self::Estimated { limit, .. } | Self::Fallback { limit } => limit,
        }
    }
}

/// `estimate * 1.3`, never below `estimate`.
pub fn with_gas_margin(estimate: u64) -> u64 {
    let padded = u128::from(estimate) * u128::from(GAS_MARGIN_PERCENT) / 100;
    u64::try_from(padded).unwrap_or(u64::MAX)
}

/// Best-effort gas estimate; a node that refuses to simulate yields `fallback`.
pub async fn gas_limit_with_margin<C>(chain: &C, tx: &TransactionRequest, fallback: u64) -> GasLimit
where
    C: Chain + ?Sized,
{
    match chain.estimate_gas(tx).await {
        Ok(estimate) => GasLimit::Estimated {
            estimate,
            limit: with_gas_margin(estimate),
        },
        Err(err) => {
            tracing::warn!(error = %err, fallback, "gas estimation failed; using fallback limit");
            GasLimit::Fallback { limit: fallback }
        }
    }
}

/// `uint24` argument, or `None` when `value` does not fit.
pub fn uint24(value: u32) -> Option<U24> {
    (value <= MAX_UINT24).then(|| U24::from(value))
}

pub fn call_request(from: Address, to: Address, calldata: Vec<u8>) -> TransactionRequest {
    TransactionRequest::default()
        .from(from)
        .to(to)
        .input(Bytes::from(calldata).into())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    Nonce(ChainError),
    Rejected(ChainError),
    NoReceipt,
    TimedOut(Duration),
    Reverted { tx_hash: TxHash, gas_used: u64 },
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nonce(err) => write!(f, "failed to fetch nonce: {err}"),
            Self::Rejected(err) => write!(f, "submission rejected: {err}"),
            Self::NoReceipt => write!(f, "no receipt returned"),
            Self::TimedOut(timeout) => {
                write!(f, "no confirmation within {}s", timeout.as_secs())
            }
            Self::Reverted { tx_hash, gas_used } => {
                write!(f, "tx {tx_hash} reverted (gas_used={gas_used})")
            }
        }
    }
}

impl std::error::Error for SubmitError {}

/// Stamps `tx` with a nonce fetched right now and `gas_limit`, submits it, and
/// waits at most `timeout` for a successful receipt.
pub async fn submit_with_fresh_nonce<C>(
    chain: &C,
    tx: TransactionRequest,
    gas_limit: u64,
    timeout: Duration,
) -> Result<TxReceipt, SubmitError>
where
    C: Chain + ?Sized,
{
    let nonce = chain.next_nonce().await.map_err(SubmitError::Nonce)?;
    let tx = tx.nonce(nonce).gas_limit(gas_limit);

    let receipt = match tokio::time::timeout(timeout, chain.submit(tx)).await {
        Err(_) => return Err(SubmitError::TimedOut(timeout)),
        Ok(Err(err)) => return Err(SubmitError::Rejected(err)),
        Ok(Ok(None)) => return Err(SubmitError::NoReceipt),
        Ok(Ok(Some(receipt))) => receipt,
    };

    if !receipt.status {
        return Err(SubmitError::Reverted {
            tx_hash: receipt.transaction_hash,
            gas_used: receipt.gas_used,
        });
    }
    Ok(receipt)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountConversionError {
    Negative,
    Overflow,
}

impl fmt::Display for AmountConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Negative => write!(f, "amount is negative"),
            Self::Overflow => write!(f, "amount overflows 256 bits"),
        }
    }
}

impl std::error::Error for AmountConversionError {}

/// Converts a human-readable token amount to base units, rounding down.
pub fn decimal_to_units(amount: Decimal, decimals: u8) -> Result<U256, AmountConversionError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(AmountConversionError::Negative);
    }
    // 10^78 no longer fits in 256 bits.
    if decimals > 77 {
        return Err(AmountConversionError::Overflow);
    }
    let mantissa = U256::from(amount.mantissa().unsigned_abs());
    let scale = U256::from(10u8).pow(U256::from(amount.scale()));
    let unit = U256::from(10u8).pow(U256::from(decimals));
    let scaled = mantissa
        .checked_mul(unit)
        .ok_or(AmountConversionError::Overflow)?;
    Ok(scaled / scale)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::chain::mock::{MockChain, SubmitOutcome};

    #[test]
    fn gas_margin_pads_estimate_by_thirty_percent() {
        assert_eq!(with_gas_margin(100_000), 130_000);
        assert_eq!(with_gas_margin(0), 0);
    }

    #[test]
    fn gas_margin_saturates_instead_of_shrinking() {
        let large = u64::MAX / 100;
        assert_eq!(with_gas_margin(large), u64::MAX);
        assert_eq!(with_gas_margin(u64::MAX), u64::MAX);
        assert!(with_gas_margin(u64::MAX / 130) >= u64::MAX / 130);
    }

    #[tokio::test]
    async fn submission_stamps_nonce_and_gas_limit() {
        let chain = MockChain::default();
        let tx = call_request(chain.sender(), Address::ZERO, vec![0xde, 0xad, 0xbe, 0xef]);
        let receipt = submit_with_fresh_nonce(&chain, tx, 77_000, DEFAULT_CONFIRMATION_TIMEOUT)
            .await
            .expect("submission should succeed");
        assert!(receipt.status);
        let submitted = chain.submitted();
        assert_eq!(submitted[0].nonce, Some(0));
        assert_eq!(submitted[0].gas_limit, Some(77_000));
    }

    #[tokio::test]
    async fn submission_failures_are_classified() {
        let selector = [0xde, 0xad, 0xbe, 0xef];
        let chain = MockChain::default().with_outcomes(
            selector,
            vec![
                SubmitOutcome::Reverted,
                SubmitOutcome::NoReceipt,
                SubmitOutcome::Rejected("nonce too low".into()),
            ],
        );
        let mut errors = Vec::new();
        for _ in 0..3 {
            let tx = call_request(chain.sender(), Address::ZERO, selector.to_vec());
            errors.push(
                submit_with_fresh_nonce(&chain, tx, 21_000, DEFAULT_CONFIRMATION_TIMEOUT)
                    .await
                    .expect_err("submission should fail"),
            );
        }
        assert!(matches!(errors[0], SubmitError::Reverted { .. }));
        assert_eq!(errors[1], SubmitError::NoReceipt);
        assert!(matches!(errors[2], SubmitError::Rejected(_)));
    }

    #[tokio::test]
    async fn unconfirmed_submission_times_out() {
        let selector = [0xde, 0xad, 0xbe, 0xef];
        let chain = MockChain::default().with_outcomes(selector, vec![SubmitOutcome::Stall]);
        let tx = call_request(chain.sender(), Address::ZERO, selector.to_vec());
        let timeout = Duration::from_millis(20);
        assert_eq!(
            submit_with_fresh_nonce(&chain, tx, 21_000, timeout).await,
            Err(SubmitError::TimedOut(timeout))
        );
    }

    #[tokio::test]
    async fn estimation_failure_yields_the_fallback() {
        let chain = MockChain::default().with_gas_estimate_error(ChainError::Provider("revert".into()));
        let tx = call_request(chain.sender(), Address::ZERO, Vec::new());
        assert_eq!(
            gas_limit_with_margin(&chain, &tx, FALLBACK_ADJUSTMENT_GAS).await,
            GasLimit::Fallback {
                limit: FALLBACK_ADJUSTMENT_GAS,
            }
        );

        let chain = MockChain::default();
        assert_eq!(
            gas_limit_with_margin(&chain, &tx, FALLBACK_ADJUSTMENT_GAS).await,
            GasLimit::Estimated {
                estimate: 400_000,
                limit: 520_000,
            }
        );
    }

    #[test]
    fn uint24_rejects_values_above_24_bits() {
        assert_eq!(uint24(3_000), Some(U24::from(3_000u32)));
        assert_eq!(uint24(MAX_UINT24 + 1), None);
    }

    #[test]
    fn converts_usdc_and_weth_amounts_to_base_units() {
        let usdc = Decimal::from_str("500").expect("decimal should parse");
        assert_eq!(
            decimal_to_units(usdc, 6).expect("conversion should succeed"),
            U256::from(500_000_000u64)
        );

        let weth = Decimal::from_str("0.1").expect("decimal should parse");
        assert_eq!(
            decimal_to_units(weth, 18).expect("conversion should succeed"),
            U256::from(100_000_000_000_000_000u64)
        );
    }

    #[test]
    fn conversion_rounds_down_sub_unit_remainders() {
        let amount = Decimal::from_str("1.2345679").expect("decimal should parse");
        assert_eq!(
            decimal_to_units(amount, 6).expect("conversion should succeed"),
            U256::from(1_234_567u64)
        );
    }

    #[test]
    fn rejects_negative_amounts() {
        let amount = Decimal::from_str("-0.1").expect("decimal should parse");
        assert_eq!(
            decimal_to_units(amount, 18),
            Err(AmountConversionError::Negative)
        );
    }

    #[test]
    fn rejects_amounts_that_overflow() {
        assert_eq!(
            decimal_to_units(Decimal::MAX, 77),
            Err(AmountConversionError::Overflow)
        );
    }
}
