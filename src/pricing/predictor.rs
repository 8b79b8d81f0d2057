use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

pub const DEFAULT_PREDICTOR_URL: &str =
    "http://95.216.156.73:5000/predict_price?symbol=ETHUSDT&interval=4h";
pub const PREDICTOR_TIMEOUT: Duration = Duration::from_secs(25);
const PREDICTED_PRICE_FIELD: &str = "predicted_price";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredictorError {
    Http(String),
    MissingField(&'static str),
    InvalidNumber(String),
}

impl fmt::Display for PredictorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(message) => write!(f, "predictor request failed: {message}"),
            Self::MissingField(field) => write!(f, "predictor payload missing '{field}'"),
            Self::InvalidNumber(raw) => write!(f, "predictor returned non-numeric price: {raw}"),
        }
    }
}

impl std::error::Error for PredictorError {}

/// Off-chain price prediction source.
#[async_trait]
pub trait PricePredictor: Send + Sync {
    async fn predicted_price(&self) -> Result<Decimal, PredictorError>;
}

#[derive(Debug, Clone)]
pub struct HttpPredictor {
    client: reqwest::Client,
    url: String,
}

impl HttpPredictor {
    pub fn new(url: impl Into<String>) -> Result<Self, PredictorError> {
        let client = reqwest::Client::builder()
            .timeout(PREDICTOR_TIMEOUT)
            .build()
            .map_err(|err| PredictorError::Http(err.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl PricePredictor for HttpPredictor {
    async fn predicted_price(&self) -> Result<Decimal, PredictorError> {
        let payload: serde_json::Value = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| PredictorError::Http(err.to_string()))?
            .json()
            .await
            .map_err(|err| PredictorError::Http(err.to_string()))?;
        parse_prediction_payload(&payload)
    }
}

/// Extracts `predicted_price` keeping the decimal digits the API sent.
pub fn parse_prediction_payload(payload: &serde_json::Value) -> Result<Decimal, PredictorError> {
    let value = payload
        .get(PREDICTED_PRICE_FIELD)
        .filter(|value| !value.is_null())
        .ok_or(PredictorError::MissingField(PREDICTED_PRICE_FIELD))?;

    let raw = match value {
        serde_json::Value::Number(number) => number.to_string(),
        serde_json::Value::String(text) => text.trim().to_string(),
        other => return Err(PredictorError::InvalidNumber(other.to_string())),
    };

    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|_| PredictorError::InvalidNumber(raw))
}
