use std::fmt;

use alloy::primitives::{TxHash, U256};
use chrono::{DateTime, Local};
use rust_decimal::Decimal;

use crate::chain::PositionInfo;

pub mod recorder;
pub mod state;

pub use recorder::{MetricsRecorder, RecorderError, METRICS_COLUMNS, METRICS_SCHEMA_VERSION};
pub use state::{ActionState, StateKind};

pub const CONTRACT_TYPE: &str = "Sentinel";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LiquidityAmounts {
    pub amount0: U256,
    pub amount1: U256,
}

/// Running fee totals in token base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeeTotals {
    pub token0: U256,
    pub token1: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: ActionState,
    pub to: ActionState,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid action state transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransition {}

/// Outcome of a single harness run; persisted once as one CSV row.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsRecord {
    pub timestamp: DateTime<Local>,
    pub contract_type: &'static str,
    action_state: ActionState,
    pub transaction_hash: Option<TxHash>,
    pub gas_used: Option<u64>,
    pub predicted_price: Option<Decimal>,
    pub oracle_price: Option<Decimal>,
    pub predicted_tick: Option<i32>,
    pub minted: Option<LiquidityAmounts>,
    pub removed: Option<LiquidityAmounts>,
    pub fees_collected: FeeTotals,
    pub swaps_executed: u32,
    pub error_message: Option<String>,
    pub position: Option<PositionInfo>,
}

impl Default for MetricsRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecord {
    pub fn new() -> Self {
        Self {
            timestamp: Local::now(),
            contract_type: CONTRACT_TYPE,
            action_state: ActionState::Init,
            transaction_hash: None,
            gas_used: None,
            predicted_price: None,
            oracle_price: None,
            predicted_tick: None,
            minted: None,
            removed: None,
            fees_collected: FeeTotals::default(),
            swaps_executed: 0,
            error_message: None,
            position: None,
        }
    }

    pub fn action_state(&self) -> ActionState {
        self.action_state
    }

    pub fn advance(&mut self, next: ActionState) -> Result<(), InvalidTransition> {
        if !self.action_state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.action_state,
                to: next,
            });
        }
        tracing::debug!(from = %self.action_state, to = %next, "action state advanced");
        self.action_state = next;
        Ok(())
    }

    /// Records a failure. A more specific diagnosis already in place is kept,
    /// and so is its message.
    pub fn record_failure(&mut self, state: ActionState, message: impl Into<String>) {
        let message = message.into();
        match self.advance(state) {
            Ok(()) => self.error_message = Some(message),
            Err(err) => {
                tracing::debug!(error = %err, dropped = %message, "keeping earlier failure");
                if self.error_message.is_none() {
                    self.error_message = Some(message);
                }
            }
        }
    }

    pub fn add_fees(&mut self, amount0: U256, amount1: U256) {
        self.fees_collected.token0 = self.fees_collected.token0.saturating_add(amount0);
        self.fees_collected.token1 = self.fees_collected.token1.saturating_add(amount1);
    }
}
