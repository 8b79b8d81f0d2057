use std::fmt;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use super::MetricsRecord;

pub const METRICS_SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_RESULTS_PATH: &str = "position_results_sentinel.csv";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column order of the results file. Appending a column requires bumping
/// [`METRICS_SCHEMA_VERSION`].
pub const METRICS_COLUMNS: [&str; 20] = [
    "timestamp",
    "contract_type",
    "action_taken",
    "tx_hash",
    "gas_used",
    "predictedPrice_api",
    "chainlink_price_onchain",
    "predictedTick_calculated",
    "liquidity",
    "tickLower",
    "tickUpper",
    "amount0_provided_to_mint",
    "amount1_provided_to_mint",
    "amount0_collected_on_remove",
    "amount1_collected_on_remove",
    "fees_collected_token0",
    "fees_collected_token1",
    "error_message",
    "num_swaps_executed",
    "schema_version",
];

#[derive(Debug)]
pub enum RecorderError {
    Io(io::Error),
    Csv(csv::Error),
}

impl fmt::Display for RecorderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Csv(err) => write!(f, "csv error: {err}"),
        }
    }
}

impl std::error::Error for RecorderError {}

impl From<io::Error> for RecorderError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<csv::Error> for RecorderError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

impl MetricsRecord {
    /// Value of one results-file column; `None` is written as an empty cell.
    pub fn column_value(&self, column: &str) -> Option<String> {
        let position = self.position.as_ref();
        match column {
            "timestamp" => Some(self.timestamp.format(TIMESTAMP_FORMAT).to_string()),
            "contract_type" => Some(self.contract_type.to_string()),
            "action_taken" => Some(self.action_state().as_str().to_string()),
            "tx_hash" => self.transaction_hash.map(|hash| hash.to_string()),
            "gas_used" => self.gas_used.map(|gas| gas.to_string()),
            "predictedPrice_api" => self.predicted_price.map(|price| price.to_string()),
            "chainlink_price_onchain" => self.oracle_price.map(|price| price.to_string()),
            "predictedTick_calculated" => self.predicted_tick.map(|tick| tick.to_string()),
            "liquidity" => position.map(|p| p.liquidity.to_string()),
            "tickLower" => position.map(|p| p.tick_lower.to_string()),
            "tickUpper" => position.map(|p| p.tick_upper.to_string()),
            "amount0_provided_to_mint" => self.minted.map(|m| m.amount0.to_string()),
            "amount1_provided_to_mint" => self.minted.map(|m| m.amount1.to_string()),
            "amount0_collected_on_remove" => self.removed.map(|r| r.amount0.to_string()),
            "amount1_collected_on_remove" => self.removed.map(|r| r.amount1.to_string()),
            "fees_collected_token0" => Some(self.fees_collected.token0.to_string()),
            "fees_collected_token1" => Some(self.fees_collected.token1.to_string()),
            "error_message" => self.error_message.clone(),
            "num_swaps_executed" => Some(self.swaps_executed.to_string()),
            "schema_version" => Some(METRICS_SCHEMA_VERSION.to_string()),
            _ => None,
        }
    }

    pub fn to_row(&self) -> Vec<String> {
        METRICS_COLUMNS
            .iter()
            .map(|column| self.column_value(column).unwrap_or_default())
            .collect()
    }
}

/// Appends run records to a CSV file.
#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    path: PathBuf,
}

impl MetricsRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row, writing the header first when the file is absent or empty.
    pub fn persist(&self, record: &MetricsRecord) -> Result<(), RecorderError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let needs_header = match fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(err) if err.kind() == io::ErrorKind::NotFound => true,
            Err(err) => return Err(err.into()),
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if needs_header {
            writer.write_record(METRICS_COLUMNS)?;
        }
        writer.write_record(record.to_row())?;
        writer.flush()?;

        tracing::info!(path = %self.path.display(), "metrics saved");
        Ok(())
    }
}
