use std::time::Duration;

use alloy::primitives::Address;
use alloy::sol_types::SolCall;

use super::{call_request, submit_with_fresh_nonce, SubmitError, FEE_COLLECTION_GAS};
use crate::chain::Chain;
use crate::contracts::ISentinelAmm;
use crate::events::{parse_receipt, ParsedEvents};
use crate::metrics::MetricsRecord;

/// Calls `collectCurrentFeesOnly` and folds any `FeesOnlyCollected` events
/// into the running fee totals.
pub async fn collect_fees_only<C>(
    chain: &C,
    amm: Address,
    confirmation_timeout: Duration,
    metrics: &mut MetricsRecord,
) -> Result<ParsedEvents, SubmitError>
where
    C: Chain + ?Sized,
{
    let calldata = ISentinelAmm::collectCurrentFeesOnlyCall {}.abi_encode();
    let tx = call_request(chain.sender(), amm, calldata);
    let receipt =
        submit_with_fresh_nonce(chain, tx, FEE_COLLECTION_GAS, confirmation_timeout).await?;

    let events = parse_receipt(&receipt, amm);
    events.apply_to(metrics);
    tracing::info!(
        tx_hash = %receipt.transaction_hash,
        fees0 = %metrics.fees_collected.token0,
        fees1 = %metrics.fees_collected.token1,
        "fee-only collection confirmed"
    );
    Ok(events)
}
