//! Sequences one full harness run and guarantees a persisted record.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use alloy::primitives::Address;
use chrono::Local;
use futures_util::FutureExt;
use rust_decimal::Decimal;

use crate::chain::{Chain, ChainError, Funder, PoolContext};
use crate::events::parse_receipt;
use crate::execution::adjust::{set_range_width_multiplier, AdjustmentDriver, RangeUpdateError, TxError};
use crate::execution::fees::collect_fees_only;
use crate::execution::swaps::{
    FeeGenerationSimulator, SwapPlan, SwapScenario, SwapSimError, SwapSuccessPolicy,
    DEFAULT_SWAP_PACING,
};
use crate::execution::DEFAULT_CONFIRMATION_TIMEOUT;
use crate::metrics::{ActionState, InvalidTransition, MetricsRecord, MetricsRecorder};
use crate::pricing::{reconcile, PricePredictor, ReconcileError};

pub const DEFAULT_NUM_SWAPS: u32 = 20;
pub const DEFAULT_RANGE_WIDTH_MULTIPLIER: u32 = 100;

/// Contract addresses the run talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deployment {
    pub amm: Address,
    pub trigger: Address,
    pub router: Address,
}

/// Tunables for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSettings {
    pub target_token0: Decimal,
    pub target_token1: Decimal,
    pub range_width_multiplier: u32,
    pub swaps: SwapPlan,
    pub collect_fees_only: bool,
    pub confirmation_timeout: Duration,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            target_token0: Decimal::from(25_000),
            target_token1: Decimal::from(10),
            range_width_multiplier: DEFAULT_RANGE_WIDTH_MULTIPLIER,
            swaps: SwapPlan {
                scenario: SwapScenario::Bullish,
                num_swaps: DEFAULT_NUM_SWAPS,
                amount_token0: Decimal::from(500),
                amount_token1: Decimal::new(1, 1),
                policy: SwapSuccessPolicy::Majority,
                pacing: DEFAULT_SWAP_PACING,
            },
            collect_fees_only: true,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustmentStage {
    Initial,
    Final,
}

impl AdjustmentStage {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Initial => "initial adjustment",
            Self::Final => "final adjustment",
        }
    }

    const fn success_state(self) -> ActionState {
        match self {
            Self::Initial => ActionState::InitialAdjustSuccess,
            Self::Final => ActionState::FinalAdjustSuccess,
        }
    }
}

impl fmt::Display for AdjustmentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundingStage {
    Initial,
    Refund,
}

impl FundingStage {
    const fn success_state(self) -> ActionState {
        match self {
            Self::Initial => ActionState::Funded,
            Self::Refund => ActionState::ReFunded,
        }
    }
}

impl fmt::Display for FundingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => f.write_str("initial funding"),
            Self::Refund => f.write_str("re-funding"),
        }
    }
}

/// Why a run stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    PoolContext(ChainError),
    RangeWidth(RangeUpdateError),
    Funding {
        stage: FundingStage,
        source: Option<ChainError>,
    },
    Reconcile {
        stage: AdjustmentStage,
        source: ReconcileError,
    },
    Adjustment {
        stage: AdjustmentStage,
        source: TxError,
    },
    Swaps(SwapSimError),
    Transition(InvalidTransition),
}

impl StageError {
    /// Terminal state recorded for this failure.
    pub fn action_state(&self) -> ActionState {
        match self {
            Self::PoolContext(_) | Self::RangeWidth(_) => ActionState::SetupFailed,
            Self::Funding { .. } => ActionState::FundingFailed,
            Self::Reconcile { source, .. } if source.is_oracle_failure() => {
                ActionState::UnexpectedError
            }
            Self::Reconcile { .. } => ActionState::ApiFailed,
            Self::Adjustment { source, .. } if source.is_revert() => ActionState::TxReverted,
            Self::Adjustment { .. } => ActionState::UnexpectedError,
            Self::Swaps(_) => ActionState::SwapSimFailed,
            Self::Transition(_) => ActionState::UnexpectedError,
        }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PoolContext(err) => write!(f, "setup: failed to read pool context: {err}"),
            Self::RangeWidth(err) => write!(f, "setup: {err}"),
            Self::Funding {
                stage,
                source: Some(err),
            } => write!(f, "{stage}: {err}"),
            Self::Funding {
                stage,
                source: None,
            } => write!(f, "{stage}: balances below target after top-up"),
            Self::Reconcile { stage, source } => write!(f, "{stage}: {source}"),
            Self::Adjustment { stage, source } => write!(f, "{stage}: {source}"),
            Self::Swaps(err) => write!(f, "swap simulation: {err}"),
            Self::Transition(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for StageError {}

impl From<InvalidTransition> for StageError {
    fn from(value: InvalidTransition) -> Self {
        Self::Transition(value)
    }
}

/// Drives one run: setup, funding, initial adjustment, swap batch, optional
/// fee collection, re-funding and final adjustment.
pub struct StageOrchestrator<'a, C: ?Sized, P: ?Sized, F: ?Sized> {
    chain: &'a C,
    predictor: &'a P,
    funder: &'a F,
    recorder: &'a MetricsRecorder,
    deployment: Deployment,
    settings: CycleSettings,
}

impl<'a, C, P, F> StageOrchestrator<'a, C, P, F>
where
    C: Chain + ?Sized,
    P: PricePredictor + ?Sized,
    F: Funder + ?Sized,
{
    pub fn new(
        chain: &'a C,
        predictor: &'a P,
        funder: &'a F,
        recorder: &'a MetricsRecorder,
        deployment: Deployment,
        settings: CycleSettings,
    ) -> Self {
        Self {
            chain,
            predictor,
            funder,
            recorder,
            deployment,
            settings,
        }
    }

    /// Runs the cycle to a terminal state and persists exactly one record.
    /// Never fails and never unwinds past this call.
    pub async fn run(&self) -> MetricsRecord {
        let mut metrics = MetricsRecord::new();
        tracing::info!(
            amm = %self.deployment.amm,
            trigger = %self.deployment.trigger,
            "starting harness run"
        );

        let outcome = AssertUnwindSafe(self.run_cycle(&mut metrics))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!(error = %err, state = %err.action_state(), "run aborted");
                metrics.record_failure(err.action_state(), err.to_string());
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(panic = %message, "run panicked");
                metrics.record_failure(
                    ActionState::UnexpectedError,
                    format!("unexpected error: {message}"),
                );
            }
        }

        self.finalize(&mut metrics).await;
        metrics
    }

    async fn run_cycle(&self, metrics: &mut MetricsRecord) -> Result<(), StageError> {
        let pool = self.setup().await?;

        self.fund(&pool, FundingStage::Initial, metrics).await?;
        self.adjust(&pool, AdjustmentStage::Initial, metrics).await?;

        FeeGenerationSimulator::new(
            self.chain,
            self.deployment.router,
            self.settings.confirmation_timeout,
        )
        .simulate(&pool, &self.settings.swaps, metrics)
        .await
        .map_err(StageError::Swaps)?;
        metrics.advance(ActionState::SwapSimSuccess)?;

        if self.settings.collect_fees_only {
            self.collect_fees(metrics).await?;
        }

        self.fund(&pool, FundingStage::Refund, metrics).await?;
        self.adjust(&pool, AdjustmentStage::Final, metrics).await
    }

    async fn setup(&self) -> Result<PoolContext, StageError> {
        let pool = self
            .chain
            .pool_context(self.deployment.amm)
            .await
            .map_err(StageError::PoolContext)?;
        tracing::info!(
            token0 = %pool.token0,
            token1 = %pool.token1,
            decimals0 = pool.token0_decimals,
            decimals1 = pool.token1_decimals,
            fee = pool.fee,
            "loaded pool context"
        );

        let wanted = self.settings.range_width_multiplier;
        if pool.range_width_multiplier != wanted {
            tracing::info!(
                current = pool.range_width_multiplier,
                wanted,
                "updating range width multiplier"
            );
            set_range_width_multiplier(
                self.chain,
                self.deployment.amm,
                wanted,
                self.settings.confirmation_timeout,
            )
            .await
            .map_err(StageError::RangeWidth)?;
        }
        Ok(pool)
    }

    async fn fund(
        &self,
        pool: &PoolContext,
        stage: FundingStage,
        metrics: &mut MetricsRecord,
    ) -> Result<(), StageError> {
        tracing::info!(
            %stage,
            target0 = %self.settings.target_token0,
            target1 = %self.settings.target_token1,
            "ensuring amm balances"
        );
        let funded = self
            .funder
            .ensure_balances(pool, self.settings.target_token0, self.settings.target_token1)
            .await
            .map_err(|err| StageError::Funding {
                stage,
                source: Some(err),
            })?;
        if !funded {
            return Err(StageError::Funding {
                stage,
                source: None,
            });
        }
        metrics.advance(stage.success_state())?;
        Ok(())
    }

    /// Reconcile, trigger and parse; identical for both adjustments apart from `stage`.
    async fn adjust(
        &self,
        pool: &PoolContext,
        stage: AdjustmentStage,
        metrics: &mut MetricsRecord,
    ) -> Result<(), StageError> {
        tracing::info!(%stage, "starting adjustment");
        let reconciled = reconcile(self.predictor, self.chain, pool.price_feed, metrics)
            .await
            .map_err(|source| StageError::Reconcile { stage, source })?;

        let receipt = AdjustmentDriver::new(
            self.chain,
            self.deployment.trigger,
            self.settings.confirmation_timeout,
        )
        .trigger(pool, reconciled, stage.label(), metrics)
        .await
        .map_err(|source| StageError::Adjustment { stage, source })?;

        parse_receipt(&receipt, self.deployment.amm).apply_to(metrics);
        metrics.advance(stage.success_state())?;
        Ok(())
    }

    /// A failed collection is logged and the run continues; the final
    /// adjustment collects fees as part of its removal anyway.
    async fn collect_fees(&self, metrics: &mut MetricsRecord) -> Result<(), StageError> {
        let next = match collect_fees_only(
            self.chain,
            self.deployment.amm,
            self.settings.confirmation_timeout,
            metrics,
        )
        .await
        {
            Ok(_) => ActionState::FeesCollectOnlySuccess,
            Err(err) => {
                tracing::warn!(error = %err, "fee-only collection failed; continuing");
                ActionState::FeesCollectOnlyFailed
            }
        };
        metrics.advance(next)?;
        Ok(())
    }

    async fn finalize(&self, metrics: &mut MetricsRecord) {
        match self.chain.position_info(self.deployment.amm).await {
            Ok(position) => metrics.position = Some(position),
            Err(err) => tracing::warn!(error = %err, "could not read final position"),
        }
        metrics.timestamp = Local::now();

        if let Err(err) = self.recorder.persist(metrics) {
            tracing::error!(
                path = %self.recorder.path().display(),
                error = %err,
                "failed to persist run metrics"
            );
        }

        let error = metrics.error_message.as_deref().unwrap_or("none");
        if metrics.action_state().is_failure() {
            tracing::error!(state = %metrics.action_state(), error, "harness run finished");
        } else {
            tracing::info!(
                state = %metrics.action_state(),
                swaps = metrics.swaps_executed,
                fees0 = %metrics.fees_collected.token0,
                fees1 = %metrics.fees_collected.token1,
                "harness run finished"
            );
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
