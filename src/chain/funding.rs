use std::time::Duration;

use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{Chain, ChainError, PoolContext};
use crate::contracts::IERC20;
use crate::execution::{call_request, decimal_to_units, submit_with_fresh_nonce, TRANSFER_GAS};

/// Brings the AMM's token balances to the requested readable amounts.
#[async_trait]
pub trait Funder: Send + Sync {
    /// `Ok(false)` means the targets could not be reached.
    async fn ensure_balances(
        &self,
        pool: &PoolContext,
        target0: Decimal,
        target1: Decimal,
    ) -> Result<bool, ChainError>;
}

/// Tops up the AMM from the funding account with plain ERC20 transfers.
/// Balances above target are left untouched.
pub struct ChainFunder<'a, C: ?Sized> {
    chain: &'a C,
    amm: Address,
    confirmation_timeout: Duration,
}

impl<'a, C> ChainFunder<'a, C>
where
    C: Chain + ?Sized,
{
    pub fn new(chain: &'a C, amm: Address, confirmation_timeout: Duration) -> Self {
        Self {
            chain,
            amm,
            confirmation_timeout,
        }
    }

    async fn top_up(&self, token: Address, target: U256) -> Result<bool, ChainError> {
        let balance = self.chain.token_balance(token, self.amm).await?;
        if balance >= target {
            tracing::debug!(token = %token, %balance, %target, "balance already at target");
            return Ok(true);
        }

        let shortfall = target - balance;
        let calldata = IERC20::transferCall {
            to: self.amm,
            amount: shortfall,
        }
        .abi_encode();
        let tx = call_request(self.chain.sender(), token, calldata);
        match submit_with_fresh_nonce(self.chain, tx, TRANSFER_GAS, self.confirmation_timeout).await
        {
            Ok(receipt) => {
                tracing::info!(
                    token = %token,
                    %shortfall,
                    tx_hash = %receipt.transaction_hash,
                    "topped up amm balance"
                );
            }
            Err(err) => {
                tracing::warn!(token = %token, %shortfall, error = %err, "top-up transfer failed");
                return Ok(false);
            }
        }

        let after = self.chain.token_balance(token, self.amm).await?;
        Ok(after >= target)
    }
}

#[async_trait]
impl<'a, C> Funder for ChainFunder<'a, C>
where
    C: Chain + ?Sized,
{
    async fn ensure_balances(
        &self,
        pool: &PoolContext,
        target0: Decimal,
        target1: Decimal,
    ) -> Result<bool, ChainError> {
        let target0_units = decimal_to_units(target0, pool.token0_decimals)
            .map_err(|err| ChainError::InvalidData(format!("token0 target: {err}")))?;
        let target1_units = decimal_to_units(target1, pool.token1_decimals)
            .map_err(|err| ChainError::InvalidData(format!("token1 target: {err}")))?;

        let token0_ok = self.top_up(pool.token0, target0_units).await?;
        let token1_ok = self.top_up(pool.token1, target1_units).await?;
        Ok(token0_ok && token1_ok)
    }
}
