use alloy::primitives::{Address, U256};
use alloy::sol_types::SolEvent;

use crate::chain::TxReceipt;
use crate::contracts::ISentinelAmm::{FeesOnlyCollected, LiquidityOperation};
use crate::metrics::{LiquidityAmounts, MetricsRecord};

const MINT_OPERATION: &str = "MINT";
const REMOVE_OPERATION: &str = "REMOVE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeCollection {
    pub amount0: U256,
    pub amount1: U256,
}

/// AMM events found in one receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedEvents {
    pub minted: Option<LiquidityAmounts>,
    /// Principal and accrued fees together; the event does not split them.
    pub removed: Option<LiquidityAmounts>,
    pub fee_collections: Vec<FeeCollection>,
}

impl ParsedEvents {
    pub fn is_empty(&self) -> bool {
        self.minted.is_none() && self.removed.is_none() && self.fee_collections.is_empty()
    }

    /// Overwrites mint/remove amounts and adds fee collections to the running totals.
    pub fn apply_to(&self, metrics: &mut MetricsRecord) {
        if let Some(minted) = self.minted {
            metrics.minted = Some(minted);
        }
        if let Some(removed) = self.removed {
            metrics.removed = Some(removed);
        }
        for fees in &self.fee_collections {
            metrics.add_fees(fees.amount0, fees.amount1);
        }
    }
}

/// Decodes `LiquidityOperation` and `FeesOnlyCollected` logs emitted by `amm`.
///
/// Never fails: receipts differ by the code path the contract took, so a
/// missing or undecodable event only gets logged.
pub fn parse_receipt(receipt: &TxReceipt, amm: Address) -> ParsedEvents {
    let mut parsed = ParsedEvents::default();

    for log in receipt.logs.iter().filter(|log| log.address == amm) {
        match log.topics().first() {
            Some(topic) if *topic == LiquidityOperation::SIGNATURE_HASH => {
                match LiquidityOperation::decode_log(log) {
                    Ok(event) => record_liquidity_operation(&mut parsed, &event.data),
                    Err(err) => {
                        tracing::warn!(error = %err, "could not decode LiquidityOperation event")
                    }
                }
            }
            Some(topic) if *topic == FeesOnlyCollected::SIGNATURE_HASH => {
                match FeesOnlyCollected::decode_log(log) {
                    Ok(event) => {
                        tracing::info!(
                            fees0 = %event.amount0Fees,
                            fees1 = %event.amount1Fees,
                            "found FeesOnlyCollected event"
                        );
                        parsed.fee_collections.push(FeeCollection {
                            amount0: event.amount0Fees,
                            amount1: event.amount1Fees,
                        });
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "could not decode FeesOnlyCollected event")
                    }
                }
            }
            _ => {}
        }
    }

    if parsed.is_empty() {
        tracing::info!(tx_hash = %receipt.transaction_hash, "no amm events in receipt");
    }
    parsed
}

fn record_liquidity_operation(parsed: &mut ParsedEvents, event: &LiquidityOperation) {
    let amounts = LiquidityAmounts {
        amount0: event.amount0,
        amount1: event.amount1,
    };
    match event.operationType.as_str() {
        // First mint in the receipt wins.
        MINT_OPERATION if parsed.minted.is_none() => {
            tracing::info!(amount0 = %amounts.amount0, amount1 = %amounts.amount1, "found MINT operation");
            parsed.minted = Some(amounts);
        }
        REMOVE_OPERATION => {
            tracing::info!(
                amount0 = %amounts.amount0,
                amount1 = %amounts.amount1,
                "found REMOVE operation (principal plus fees)"
            );
            parsed.removed = Some(amounts);
        }
        other => tracing::debug!(operation = other, "ignoring liquidity operation"),
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, Bytes, LogData, TxHash, B256};

    use super::*;
    use crate::chain::mock::{fees_collected_log, liquidity_operation_log};

    const AMM: Address = address!("1111111111111111111111111111111111111111");
    const OTHER: Address = address!("2222222222222222222222222222222222222222");

    fn receipt(logs: Vec<alloy::primitives::Log>) -> TxReceipt {
        TxReceipt {
            status: true,
            transaction_hash: TxHash::repeat_byte(0xab),
            gas_used: 210_000,
            logs,
        }
    }

    #[test]
    fn extracts_mint_and_remove_amounts() {
        let parsed = parse_receipt(
            &receipt(vec![
                liquidity_operation_log(AMM, "REMOVE", 11, 12),
                liquidity_operation_log(AMM, "MINT", 21, 22),
                liquidity_operation_log(AMM, "MINT", 99, 99),
            ]),
            AMM,
        );
        assert_eq!(
            parsed.removed,
            Some(LiquidityAmounts {
                amount0: U256::from(11u8),
                amount1: U256::from(12u8),
            })
        );
        assert_eq!(
            parsed.minted,
            Some(LiquidityAmounts {
                amount0: U256::from(21u8),
                amount1: U256::from(22u8),
            })
        );
    }

    #[test]
    fn fee_events_accumulate_onto_metrics() {
        let mut metrics = MetricsRecord::new();
        parse_receipt(&receipt(vec![fees_collected_log(AMM, 5, 2)]), AMM).apply_to(&mut metrics);
        parse_receipt(&receipt(vec![fees_collected_log(AMM, 3, 1)]), AMM).apply_to(&mut metrics);
        assert_eq!(metrics.fees_collected.token0, U256::from(8u8));
        assert_eq!(metrics.fees_collected.token1, U256::from(3u8));
    }

    #[test]
    fn missing_events_contribute_nothing() {
        let mut metrics = MetricsRecord::new();
        metrics.add_fees(U256::from(4u8), U256::from(4u8));
        let parsed = parse_receipt(&receipt(Vec::new()), AMM);
        assert!(parsed.is_empty());
        parsed.apply_to(&mut metrics);
        assert_eq!(metrics.fees_collected.token0, U256::from(4u8));
        assert_eq!(metrics.minted, None);
    }

    #[test]
    fn ignores_logs_from_other_contracts_and_unknown_topics() {
        let mut unknown = liquidity_operation_log(AMM, "MINT", 1, 1);
        unknown.data = LogData::new_unchecked(vec![B256::repeat_byte(0x01)], Bytes::new());
        let parsed = parse_receipt(
            &receipt(vec![
                liquidity_operation_log(OTHER, "MINT", 5, 5),
                fees_collected_log(OTHER, 5, 5),
                unknown,
            ]),
            AMM,
        );
        assert!(parsed.is_empty());
    }

    #[test]
    fn malformed_event_payload_is_skipped() {
        let mut broken = fees_collected_log(AMM, 5, 5);
        let topics = broken.data.topics().to_vec();
        broken.data = LogData::new_unchecked(topics, Bytes::from(vec![0u8; 3]));
        let parsed = parse_receipt(&receipt(vec![broken, fees_collected_log(AMM, 1, 2)]), AMM);
        assert_eq!(
            parsed.fee_collections,
            vec![FeeCollection {
                amount0: U256::from(1u8),
                amount1: U256::from(2u8),
            }]
        );
    }

    #[test]
    fn unknown_operation_types_are_ignored() {
        let parsed = parse_receipt(
            &receipt(vec![liquidity_operation_log(AMM, "REBALANCE", 1, 1)]),
            AMM,
        );
        assert!(parsed.is_empty());
    }
}
