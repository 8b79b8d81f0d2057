use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::contracts::UNISWAP_V3_ROUTER_ADDRESS;
use crate::execution::swaps::{SwapScenario, SwapSuccessPolicy};
use crate::execution::MAX_UINT24;
use crate::metrics::recorder::DEFAULT_RESULTS_PATH;
use crate::orchestrator::{CycleSettings, Deployment};
use crate::pricing::predictor::DEFAULT_PREDICTOR_URL;

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
pub const DEFAULT_ADDRESS_FILE: &str = "sentinel_addresses.json";

#[derive(Debug)]
pub enum ConfigError {
    MissingEnv(&'static str),
    InvalidEnvValue { name: &'static str, value: String },
    Io { path: PathBuf, source: std::io::Error },
    Json { path: PathBuf, source: serde_json::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingEnv(name) => write!(f, "required env var {name} is not set"),
            Self::InvalidEnvValue { name, value } => write!(f, "invalid env var {name}={value}"),
            Self::Io { path, source } => write!(f, "failed to read {}: {source}", path.display()),
            Self::Json { path, source } => {
                write!(f, "failed to parse {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Everything the binary needs, read once at startup.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub private_key: String,
    pub rpc_url: String,
    pub predictor_url: String,
    pub address_file: PathBuf,
    pub results_file: PathBuf,
    pub swap_router: Address,
    pub cycle: CycleSettings,
}

impl HarnessConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any name -> value source.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let private_key = env
            .raw("PRIVATE_KEY")
            .ok_or(ConfigError::MissingEnv("PRIVATE_KEY"))?;
        let rpc_url = env.raw("RPC").unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
        let predictor_url = env
            .raw("LSTM_API_URL")
            .unwrap_or_else(|| DEFAULT_PREDICTOR_URL.to_string());
        let address_file = PathBuf::from(
            env.raw("ADDRESS_FILE")
                .unwrap_or_else(|| DEFAULT_ADDRESS_FILE.to_string()),
        );
        let results_file = results_path(|name| env.raw(name));
        let swap_router = env.parse("SWAP_ROUTER", UNISWAP_V3_ROUTER_ADDRESS)?;

        let defaults = CycleSettings::default();
        let num_swaps = env.parse("PREDICTIVE_NUM_SWAPS", defaults.swaps.num_swaps)?;
        if num_swaps == 0 {
            return Err(invalid("PREDICTIVE_NUM_SWAPS", "0"));
        }
        let range_width_multiplier =
            env.parse("PREDICTIVE_RWM", defaults.range_width_multiplier)?;
        if range_width_multiplier == 0 || range_width_multiplier > MAX_UINT24 {
            return Err(invalid("PREDICTIVE_RWM", range_width_multiplier));
        }
        let target_token0 = env.non_negative("PREDICTIVE_TARGET_TOKEN0", defaults.target_token0)?;
        let target_token1 = env.non_negative("PREDICTIVE_TARGET_TOKEN1", defaults.target_token1)?;
        let amount_token0 = env.non_negative("SWAP_AMOUNT_TOKEN0", defaults.swaps.amount_token0)?;
        let amount_token1 = env.non_negative("SWAP_AMOUNT_TOKEN1", defaults.swaps.amount_token1)?;
        let scenario: SwapScenario = env.parse("SWAP_SCENARIO", defaults.swaps.scenario)?;
        let policy: SwapSuccessPolicy = env.parse("SWAP_SUCCESS_POLICY", defaults.swaps.policy)?;
        let pacing_ms = env.parse(
            "SWAP_PACING_MS",
            u64::try_from(defaults.swaps.pacing.as_millis()).unwrap_or(u64::MAX),
        )?;
        let collect_fees_only = env.flag("COLLECT_FEES_ONLY", defaults.collect_fees_only)?;
        let confirmation_secs = env.parse(
            "TX_CONFIRMATION_TIMEOUT_SECS",
            defaults.confirmation_timeout.as_secs(),
        )?;
        if confirmation_secs == 0 {
            return Err(invalid("TX_CONFIRMATION_TIMEOUT_SECS", "0"));
        }

        let mut cycle = defaults;
        cycle.target_token0 = target_token0;
        cycle.target_token1 = target_token1;
        cycle.range_width_multiplier = range_width_multiplier;
        cycle.swaps.scenario = scenario;
        cycle.swaps.num_swaps = num_swaps;
        cycle.swaps.amount_token0 = amount_token0;
        cycle.swaps.amount_token1 = amount_token1;
        cycle.swaps.policy = policy;
        cycle.swaps.pacing = Duration::from_millis(pacing_ms);
        cycle.collect_fees_only = collect_fees_only;
        cycle.confirmation_timeout = Duration::from_secs(confirmation_secs);

        Ok(Self {
            private_key,
            rpc_url,
            predictor_url,
            address_file,
            results_file,
            swap_router,
            cycle,
        })
    }

    pub fn load_deployment(&self) -> Result<Deployment, ConfigError> {
        load_deployment(&self.address_file, self.swap_router)
    }
}

/// Results path from `RESULTS_FILE`; usable even when the rest of the config is invalid.
pub fn results_path<L>(lookup: L) -> PathBuf
where
    L: Fn(&str) -> Option<String>,
{
    PathBuf::from(
        lookup("RESULTS_FILE")
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .unwrap_or_else(|| DEFAULT_RESULTS_PATH.to_string()),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddressFile {
    sentinel_amm_address: Address,
    automation_trigger_address: Address,
}

/// Reads the deployment addresses written by the contract deploy script.
pub fn load_deployment(path: &Path, router: Address) -> Result<Deployment, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let addresses: AddressFile =
        serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(Deployment {
        amm: addresses.sentinel_amm_address,
        trigger: addresses.automation_trigger_address,
        router,
    })
}

fn invalid(name: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidEnvValue {
        name,
        value: value.to_string(),
    }
}

struct Env<L> {
    lookup: L,
}

impl<L> Env<L>
where
    L: Fn(&str) -> Option<String>,
{
    /// Trimmed value; blank counts as unset.
    fn raw(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
    }

    fn parse<T: FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.raw(name) {
            Some(raw) => raw.parse::<T>().map_err(|_| invalid(name, raw)),
            None => Ok(default),
        }
    }

    fn non_negative(&self, name: &'static str, default: Decimal) -> Result<Decimal, ConfigError> {
        let value: Decimal = self.parse(name, default)?;
        if value.is_sign_negative() && !value.is_zero() {
            return Err(invalid(name, value));
        }
        Ok(value)
    }

    fn flag(&self, name: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.raw(name).map(|raw| raw.to_ascii_lowercase()).as_deref() {
            None => Ok(default),
            Some("1" | "true" | "yes" | "on") => Ok(true),
            Some("0" | "false" | "no" | "off") => Ok(false),
            Some(other) => Err(invalid(name, other)),
        }
    }
}
