use std::fmt;

use alloy::primitives::{Address, Log, TxHash, I256, U256};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;

pub mod funding;
pub mod rpc;

#[cfg(test)]
pub(crate) mod mock;

pub use funding::{ChainFunder, Funder};
pub use rpc::RpcChain;

/// Static facts about the AMM's pool, read once during setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolContext {
    pub token0: Address,
    pub token1: Address,
    pub token0_decimals: u8,
    pub token1_decimals: u8,
    pub fee: u32,
    pub price_feed: Address,
    pub range_width_multiplier: u32,
}

/// Latest round of a Chainlink-style aggregator. `answer` is scaled by 10^8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleRound {
    pub round_id: u128,
    pub answer: I256,
    pub updated_at: u64,
    pub answered_in_round: u128,
}

impl OracleRound {
    pub fn is_stale(&self) -> bool {
        self.updated_at == 0 || self.answered_in_round < self.round_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionInfo {
    pub token_id: U256,
    pub liquidity: u128,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub active: bool,
}

/// Chain-agnostic view of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub status: bool,
    pub transaction_hash: TxHash,
    pub gas_used: u64,
    pub logs: Vec<Log>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    Provider(String),
    StaleOracle { round_id: u128, updated_at: u64 },
    InvalidData(String),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider(message) => write!(f, "provider error: {message}"),
            Self::StaleOracle {
                round_id,
                updated_at,
            } => write!(
                f,
                "stale oracle round {round_id} (updated_at={updated_at})"
            ),
            Self::InvalidData(message) => write!(f, "invalid chain data: {message}"),
        }
    }
}

impl std::error::Error for ChainError {}

/// Blocking-in-sequence access to the chain under test.
///
/// Implementations sign with the funding account returned by [`Chain::sender`].
/// `submit` resolves to `Ok(None)` when the node accepted the transaction but
/// no receipt could be obtained.
#[async_trait]
pub trait Chain: Send + Sync {
    fn sender(&self) -> Address;

    async fn pool_context(&self, amm: Address) -> Result<PoolContext, ChainError>;

    async fn oracle_round(&self, feed: Address) -> Result<OracleRound, ChainError>;

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError>;

    async fn next_nonce(&self) -> Result<u64, ChainError>;

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64, ChainError>;

    async fn submit(&self, tx: TransactionRequest) -> Result<Option<TxReceipt>, ChainError>;

    async fn position_info(&self, amm: Address) -> Result<PositionInfo, ChainError>;
}
