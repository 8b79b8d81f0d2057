//! In-memory capabilities for unit and scenario tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use alloy::primitives::aliases::I24;
use alloy::primitives::{address, Address, Log, TxHash, I256, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{Chain, ChainError, Funder, OracleRound, PoolContext, PositionInfo, TxReceipt};
use crate::contracts::ISentinelAmm::{FeesOnlyCollected, LiquidityOperation};
use crate::contracts::IERC20;
use crate::pricing::PredictorError;

pub(crate) const SENDER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
pub(crate) const TOKEN0: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
pub(crate) const TOKEN1: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
pub(crate) const PRICE_FEED: Address = address!("5f4eC3Df9cbd43714FE2740f5E3616155c5b8419");

pub(crate) fn usdc_weth_pool() -> PoolContext {
    PoolContext {
        token0: TOKEN0,
        token1: TOKEN1,
        token0_decimals: 6,
        token1_decimals: 18,
        fee: 3_000,
        price_feed: PRICE_FEED,
        range_width_multiplier: 100,
    }
}

fn oracle_round(answer: I256) -> OracleRound {
    OracleRound {
        round_id: 110,
        answer,
        updated_at: 1_700_000_000,
        answered_in_round: 110,
    }
}

/// What the mock chain does with one submitted transaction.
#[derive(Debug, Clone)]
pub(crate) enum SubmitOutcome {
    Mined(Vec<Log>),
    Reverted,
    NoReceipt,
    Rejected(String),
    /// Never confirms within any realistic test timeout.
    Stall,
    Panic(&'static str),
}

#[derive(Debug, Clone)]
pub(crate) struct SubmittedTx {
    pub to: Option<Address>,
    pub selector: Option<[u8; 4]>,
    pub nonce: Option<u64>,
    pub gas_limit: Option<u64>,
    pub input: Vec<u8>,
}

#[derive(Debug)]
pub(crate) struct MockChain {
    sender: Address,
    pool: Result<PoolContext, ChainError>,
    oracle: Result<OracleRound, ChainError>,
    gas_estimate: Result<u64, ChainError>,
    nonce_error: Option<ChainError>,
    position: Result<PositionInfo, ChainError>,
    outcomes: Mutex<HashMap<[u8; 4], VecDeque<SubmitOutcome>>>,
    balances: Mutex<HashMap<(Address, Address), U256>>,
    submitted: Mutex<Vec<SubmittedTx>>,
    oracle_reads: Mutex<usize>,
    nonce: Mutex<u64>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self {
            sender: SENDER,
            pool: Ok(usdc_weth_pool()),
            oracle: Ok(oracle_round(I256::from_raw(U256::from(2_000_00000000u64)))),
            gas_estimate: Ok(400_000),
            nonce_error: None,
            position: Ok(PositionInfo {
                token_id: U256::from(1u8),
                liquidity: 1_000_000,
                tick_lower: -201_000,
                tick_upper: -199_000,
                active: true,
            }),
            outcomes: Mutex::new(HashMap::new()),
            balances: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            oracle_reads: Mutex::new(0),
            nonce: Mutex::new(0),
        }
    }
}

impl MockChain {
    pub fn with_pool(mut self, pool: PoolContext) -> Self {
        self.pool = Ok(pool);
        self
    }

    pub fn with_pool_error(mut self, err: ChainError) -> Self {
        self.pool = Err(err);
        self
    }

    pub fn with_oracle_price(self, price: Decimal) -> Self {
        let mut scaled = price;
        scaled.rescale(8);
        self.with_oracle_answer(I256::try_from(scaled.mantissa()).expect("oracle answer fits"))
    }

    pub fn with_oracle_answer(mut self, answer: I256) -> Self {
        self.oracle = Ok(oracle_round(answer));
        self
    }

    pub fn with_oracle_round(mut self, round: OracleRound) -> Self {
        self.oracle = Ok(round);
        self
    }

    pub fn with_oracle_error(mut self, err: ChainError) -> Self {
        self.oracle = Err(err);
        self
    }

    pub fn with_gas_estimate_error(mut self, err: ChainError) -> Self {
        self.gas_estimate = Err(err);
        self
    }

    pub fn with_nonce_error(mut self, err: ChainError) -> Self {
        self.nonce_error = Some(err);
        self
    }

    pub fn with_position_error(mut self, err: ChainError) -> Self {
        self.position = Err(err);
        self
    }

    pub fn with_balance(self, token: Address, owner: Address, balance: U256) -> Self {
        self.balances
            .lock()
            .expect("balances lock")
            .insert((token, owner), balance);
        self
    }

    /// Queues outcomes for calls with `selector`; once drained, calls are mined
    /// without logs.
    pub fn with_outcomes(self, selector: [u8; 4], outcomes: Vec<SubmitOutcome>) -> Self {
        self.outcomes
            .lock()
            .expect("outcomes lock")
            .entry(selector)
            .or_default()
            .extend(outcomes);
        self
    }

    pub fn oracle_reads(&self) -> usize {
        *self.oracle_reads.lock().expect("oracle reads lock")
    }

    pub fn submitted(&self) -> Vec<SubmittedTx> {
        self.submitted.lock().expect("submitted lock").clone()
    }

    pub fn submissions(&self) -> usize {
        self.submitted.lock().expect("submitted lock").len()
    }

    pub fn submissions_to(&self, selector: [u8; 4]) -> usize {
        self.submitted
            .lock()
            .expect("submitted lock")
            .iter()
            .filter(|tx| tx.selector == Some(selector))
            .count()
    }

    pub fn balance(&self, token: Address, owner: Address) -> U256 {
        self.balances
            .lock()
            .expect("balances lock")
            .get(&(token, owner))
            .copied()
            .unwrap_or_default()
    }

    fn apply_transfer(&self, token: Option<Address>, input: &[u8]) {
        let (Some(token), Ok(call)) = (token, IERC20::transferCall::abi_decode(input)) else {
            return;
        };
        let mut balances = self.balances.lock().expect("balances lock");
        let entry = balances.entry((token, call.to)).or_default();
        *entry += call.amount;
    }
}

#[async_trait]
impl Chain for MockChain {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn pool_context(&self, _amm: Address) -> Result<PoolContext, ChainError> {
        self.pool.clone()
    }

    async fn oracle_round(&self, _feed: Address) -> Result<OracleRound, ChainError> {
        *self.oracle_reads.lock().expect("oracle reads lock") += 1;
        self.oracle.clone()
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        Ok(self.balance(token, owner))
    }

    async fn next_nonce(&self) -> Result<u64, ChainError> {
        if let Some(err) = &self.nonce_error {
            return Err(err.clone());
        }
        Ok(*self.nonce.lock().expect("nonce lock"))
    }

    async fn estimate_gas(&self, _tx: &TransactionRequest) -> Result<u64, ChainError> {
        self.gas_estimate.clone()
    }

    async fn submit(&self, tx: TransactionRequest) -> Result<Option<TxReceipt>, ChainError> {
        let input = tx
            .input
            .input()
            .map(|bytes| bytes.to_vec())
            .unwrap_or_default();
        let selector = input.get(..4).and_then(|head| <[u8; 4]>::try_from(head).ok());
        let to = tx.to.and_then(|kind| kind.to().copied());

        let index = {
            let mut submitted = self.submitted.lock().expect("submitted lock");
            submitted.push(SubmittedTx {
                to,
                selector,
                nonce: tx.nonce,
                gas_limit: tx.gas,
                input: input.clone(),
            });
            submitted.len()
        };

        let outcome = selector
            .and_then(|selector| {
                self.outcomes
                    .lock()
                    .expect("outcomes lock")
                    .get_mut(&selector)
                    .and_then(VecDeque::pop_front)
            })
            .unwrap_or(SubmitOutcome::Mined(Vec::new()));

        let transaction_hash = TxHash::from(U256::from(index).to_be_bytes::<32>());
        let receipt = |status: bool, logs: Vec<Log>| TxReceipt {
            status,
            transaction_hash,
            gas_used: 150_000,
            logs,
        };

        match outcome {
            SubmitOutcome::Mined(logs) => {
                *self.nonce.lock().expect("nonce lock") += 1;
                if selector == Some(IERC20::transferCall::SELECTOR) {
                    self.apply_transfer(to, &input);
                }
                Ok(Some(receipt(true, logs)))
            }
            SubmitOutcome::Reverted => {
                *self.nonce.lock().expect("nonce lock") += 1;
                Ok(Some(receipt(false, Vec::new())))
            }
            SubmitOutcome::NoReceipt => Ok(None),
            SubmitOutcome::Rejected(message) => Err(ChainError::Provider(message)),
            SubmitOutcome::Stall => {
                tokio::time::sleep(std::time::Duration::from_secs(3_600)).await;
                Ok(None)
            }
            SubmitOutcome::Panic(message) => panic!("{message}"),
        }
    }

    async fn position_info(&self, _amm: Address) -> Result<PositionInfo, ChainError> {
        self.position.clone()
    }
}

/// Replays a list of responses; the last one repeats forever.
#[derive(Debug)]
struct Script<T> {
    responses: Mutex<VecDeque<T>>,
    calls: Mutex<usize>,
}

impl<T: Clone> Script<T> {
    fn new(responses: Vec<T>) -> Self {
        assert!(!responses.is_empty(), "script needs at least one response");
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(0),
        }
    }

    fn next(&self) -> T {
        *self.calls.lock().expect("calls lock") += 1;
        let mut responses = self.responses.lock().expect("responses lock");
        if responses.len() > 1 {
            responses.pop_front().expect("non-empty script")
        } else {
            responses.front().cloned().expect("non-empty script")
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().expect("calls lock")
    }
}

#[derive(Debug)]
pub(crate) struct MockPredictor {
    script: Script<Result<Decimal, PredictorError>>,
}

impl MockPredictor {
    pub fn returning(price: Decimal) -> Self {
        Self::sequence(vec![Ok(price)])
    }

    pub fn failing(err: PredictorError) -> Self {
        Self::sequence(vec![Err(err)])
    }

    pub fn sequence(responses: Vec<Result<Decimal, PredictorError>>) -> Self {
        Self {
            script: Script::new(responses),
        }
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

#[async_trait]
impl crate::pricing::PricePredictor for MockPredictor {
    async fn predicted_price(&self) -> Result<Decimal, PredictorError> {
        self.script.next()
    }
}

#[derive(Debug)]
pub(crate) struct MockFunder {
    script: Script<Result<bool, ChainError>>,
}

impl MockFunder {
    pub fn succeeding() -> Self {
        Self::sequence(vec![Ok(true)])
    }

    pub fn sequence(responses: Vec<Result<bool, ChainError>>) -> Self {
        Self {
            script: Script::new(responses),
        }
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

#[async_trait]
impl Funder for MockFunder {
    async fn ensure_balances(
        &self,
        _pool: &PoolContext,
        _target0: Decimal,
        _target1: Decimal,
    ) -> Result<bool, ChainError> {
        self.script.next()
    }
}

pub(crate) fn liquidity_operation_log(
    emitter: Address,
    operation: &str,
    amount0: u64,
    amount1: u64,
) -> Log {
    let event = LiquidityOperation {
        operationType: operation.to_string(),
        tokenId: U256::from(1u8),
        tickLower: I24::try_from(-201_000).expect("tick fits in int24"),
        tickUpper: I24::try_from(-199_000).expect("tick fits in int24"),
        liquidity: 1_000_000,
        amount0: U256::from(amount0),
        amount1: U256::from(amount1),
    };
    Log {
        address: emitter,
        data: event.encode_log_data(),
    }
}

pub(crate) fn fees_collected_log(emitter: Address, amount0: u64, amount1: u64) -> Log {
    let event = FeesOnlyCollected {
        tokenId: U256::from(1u8),
        amount0Fees: U256::from(amount0),
        amount1Fees: U256::from(amount1),
        success: true,
    };
    Log {
        address: emitter,
        data: event.encode_log_data(),
    }
}
