//! Reference exchange rates relative to USD.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Why a rate table could not be obtained.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RatesError {
    #[error("{0}")]
    Transport(String),
    #[error("rate service answered with HTTP status {0}")]
    Status(u16),
    #[error("could not decode rate response: {0}")]
    Decode(String),
    #[error("API returned no rates.")]
    Empty,
}

/// The outcome of fetching rates for a batch run.
///
/// A failed fetch is still a valid input to grading; rate-dependent rows
/// then score zero and report the cause.
pub type RateSnapshot = Result<ExchangeRateTable, RatesError>;

/// Mapping from three-letter currency code to units per USD.
///
/// Only positive, finite rates are kept; a table is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRateTable {
    rates: BTreeMap<String, f64>,
}

impl ExchangeRateTable {
    pub fn new<K: AsRef<str>>(rates: impl IntoIterator<Item = (K, f64)>) -> Result<Self, RatesError> {
        let rates: BTreeMap<String, f64> = rates
            .into_iter()
            .filter(|(_, rate)| rate.is_finite() && *rate > 0.0)
            .map(|(code, rate)| (code.as_ref().trim().to_uppercase(), rate))
            .filter(|(code, _)| !code.is_empty())
            .collect();

        if rates.is_empty() {
            return Err(RatesError::Empty);
        }
        Ok(Self { rates })
    }

    /// Reads a rate service response (`{"rates": {...}}`) or a bare
    /// code → rate object.
    ///
    /// # Examples
    ///
    /// ```
    /// use sheetgrade::domain::ExchangeRateTable;
    ///
    /// let table = ExchangeRateTable::from_json_str(
    ///     r#"{"result": "success", "rates": {"USD": 1, "MXN": 18.2}}"#,
    /// ).unwrap();
    /// assert_eq!(table.get("mxn"), Some(18.2));
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self, RatesError> {
        let value: Value = serde_json::from_str(json).map_err(|err| RatesError::Decode(err.to_string()))?;
        Self::from_json_value(&value)
    }

    pub fn from_json_value(value: &Value) -> Result<Self, RatesError> {
        let object = value
            .get("rates")
            .unwrap_or(value)
            .as_object()
            .ok_or_else(|| RatesError::Decode("expected an object of rates".to_string()))?;

        Self::new(
            object
                .iter()
                .filter_map(|(code, rate)| rate.as_f64().map(|rate| (code.as_str(), rate))),
        )
    }

    /// Rate for a code, matched case-insensitively.
    pub fn get(&self, code: &str) -> Option<f64> {
        self.rates.get(&code.trim().to_uppercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}
