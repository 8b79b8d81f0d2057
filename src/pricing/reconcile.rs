use std::fmt;

use alloy::primitives::{Address, I256};
use rust_decimal::Decimal;

use super::predictor::{PredictorError, PricePredictor};
use super::tick::ORACLE_PRICE_DECIMALS;
use crate::chain::{Chain, ChainError};
use crate::metrics::MetricsRecord;

/// Predicted and on-chain prices fetched for one adjustment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciledPrice {
    pub predicted: Decimal,
    pub oracle: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    Api(PredictorError),
    NonPositivePrediction(Decimal),
    Oracle(ChainError),
    InvalidOracleAnswer(I256),
}

impl ReconcileError {
    pub fn is_oracle_failure(&self) -> bool {
        matches!(self, Self::Oracle(_) | Self::InvalidOracleAnswer(_))
    }
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api(err) => write!(f, "prediction api failure: {err}"),
            Self::NonPositivePrediction(price) => {
                write!(f, "prediction api returned non-positive price {price}")
            }
            Self::Oracle(err) => write!(f, "failed to read on-chain oracle price: {err}"),
            Self::InvalidOracleAnswer(answer) => {
                write!(f, "oracle returned unusable answer {answer}")
            }
        }
    }
}

impl std::error::Error for ReconcileError {}

/// Fetches the predicted price, then the oracle price. Each value is written
/// to `metrics` as soon as it is known, so a failed oracle read still leaves
/// the prediction recorded. A stale round counts as a failed read.
///
/// No divergence check is applied here; the AMM enforces its own tolerance.
pub async fn reconcile<P, C>(
    predictor: &P,
    chain: &C,
    price_feed: Address,
    metrics: &mut MetricsRecord,
) -> Result<ReconciledPrice, ReconcileError>
where
    P: PricePredictor + ?Sized,
    C: Chain + ?Sized,
{
    let predicted = predictor
        .predicted_price()
        .await
        .map_err(ReconcileError::Api)?;
    metrics.predicted_price = Some(predicted);
    if predicted <= Decimal::ZERO {
        return Err(ReconcileError::NonPositivePrediction(predicted));
    }

    let round = chain
        .oracle_round(price_feed)
        .await
        .map_err(ReconcileError::Oracle)?;
    if round.is_stale() {
        return Err(ReconcileError::Oracle(ChainError::StaleOracle {
            round_id: round.round_id,
            updated_at: round.updated_at,
        }));
    }
    let oracle = oracle_answer_to_price(round.answer)?;
    metrics.oracle_price = Some(oracle);

    tracing::info!(%predicted, %oracle, "reconciled predicted and oracle prices");
    Ok(ReconciledPrice { predicted, oracle })
}

fn oracle_answer_to_price(answer: I256) -> Result<Decimal, ReconcileError> {
    if answer <= I256::ZERO {
        return Err(ReconcileError::InvalidOracleAnswer(answer));
    }
    let raw = i128::try_from(answer).map_err(|_| ReconcileError::InvalidOracleAnswer(answer))?;
    Decimal::try_from_i128_with_scale(raw, u32::from(ORACLE_PRICE_DECIMALS))
        .map_err(|_| ReconcileError::InvalidOracleAnswer(answer))
}
