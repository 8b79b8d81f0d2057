use alloy::eips::BlockId;
use alloy::network::{Ethereum, ReceiptResponse};
use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;

use super::{Chain, ChainError, OracleRound, PoolContext, PositionInfo, TxReceipt};
use crate::contracts::{IAggregatorV3, IERC20, ISentinelAmm};

/// Nonces include transactions still in the mempool, e.g. one whose
/// confirmation wait timed out.
const NONCE_BLOCK: BlockId = BlockId::pending();

/// [`Chain`] backed by an alloy provider whose wallet signs for `sender`.
#[derive(Debug, Clone)]
pub struct RpcChain<P> {
    provider: P,
    sender: Address,
}

impl<P> RpcChain<P>
where
    P: Provider<Ethereum> + Clone,
{
    pub fn new(provider: P, sender: Address) -> Self {
        Self { provider, sender }
    }

    async fn token_decimals(&self, token: Address) -> Result<u8, ChainError> {
        IERC20::new(token, self.provider.clone())
            .decimals()
            .call()
            .await
            .map_err(provider_error)
    }
}

fn provider_error(err: impl std::fmt::Display) -> ChainError {
    ChainError::Provider(err.to_string())
}

#[async_trait]
impl<P> Chain for RpcChain<P>
where
    P: Provider<Ethereum> + Clone + Send + Sync,
{
    fn sender(&self) -> Address {
        self.sender
    }

    async fn pool_context(&self, amm: Address) -> Result<PoolContext, ChainError> {
        let contract = ISentinelAmm::new(amm, self.provider.clone());
        let token0 = contract.token0().call().await.map_err(provider_error)?;
        let token1 = contract.token1().call().await.map_err(provider_error)?;
        let fee = contract.fee().call().await.map_err(provider_error)?;
        let price_feed = contract.priceFeed().call().await.map_err(provider_error)?;
        let range_width_multiplier = contract
            .rangeWidthMultiplier()
            .call()
            .await
            .map_err(provider_error)?;

        Ok(PoolContext {
            token0,
            token1,
            token0_decimals: self.token_decimals(token0).await?,
            token1_decimals: self.token_decimals(token1).await?,
            fee: fee.to::<u32>(),
            price_feed,
            range_width_multiplier: range_width_multiplier.to::<u32>(),
        })
    }

    async fn oracle_round(&self, feed: Address) -> Result<OracleRound, ChainError> {
        let data = IAggregatorV3::new(feed, self.provider.clone())
            .latestRoundData()
            .call()
            .await
            .map_err(provider_error)?;

        Ok(OracleRound {
            round_id: data.roundId.to::<u128>(),
            answer: data.answer,
            updated_at: data.updatedAt.saturating_to::<u64>(),
            answered_in_round: data.answeredInRound.to::<u128>(),
        })
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        IERC20::new(token, self.provider.clone())
            .balanceOf(owner)
            .call()
            .await
            .map_err(provider_error)
    }

    async fn next_nonce(&self) -> Result<u64, ChainError> {
        self.provider
            .get_transaction_count(self.sender)
            .block_id(NONCE_BLOCK)
            .await
            .map_err(provider_error)
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64, ChainError> {
        self.provider
            .estimate_gas(tx.clone())
            .await
            .map_err(provider_error)
    }

    async fn submit(&self, tx: TransactionRequest) -> Result<Option<TxReceipt>, ChainError> {
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(provider_error)?;
        let tx_hash = *pending.tx_hash();

        match pending.get_receipt().await {
            Ok(receipt) => Ok(Some(TxReceipt {
                status: receipt.status(),
                transaction_hash: receipt.transaction_hash(),
                gas_used: receipt.gas_used(),
                logs: receipt
                    .inner
                    .logs()
                    .iter()
                    .map(|log| log.inner.clone())
                    .collect(),
            })),
            Err(err) => {
                tracing::warn!(tx_hash = %tx_hash, error = %err, "no receipt for submitted tx");
                Ok(None)
            }
        }
    }

    async fn position_info(&self, amm: Address) -> Result<PositionInfo, ChainError> {
        let position = ISentinelAmm::new(amm, self.provider.clone())
            .currentPosition()
            .call()
            .await
            .map_err(provider_error)?;

        Ok(PositionInfo {
            token_id: position.tokenId,
            liquidity: position.liquidity,
            tick_lower: position.tickLower.as_i32(),
            tick_upper: position.tickUpper.as_i32(),
            active: position.active,
        })
    }
}
