//! Live exchange-rate fetch.

use std::time::Duration;

use serde_json::Value;

use crate::domain::{ExchangeRateTable, RateSnapshot, RatesError};

use super::config::GraderConfig;

/// Blocking client for a USD-based rate endpoint that answers with
/// `{"rates": {"CODE": rate, ...}}`.
#[derive(Debug, Clone)]
pub struct RatesClient {
    url: String,
    timeout: Duration,
}

impl RatesClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    pub fn from_config(config: &GraderConfig) -> Self {
        Self::new(&config.rates_url, Duration::from_secs(config.rates_timeout_secs))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetches the table once. Every failure becomes a [`RatesError`] so the
    /// caller can grade with it rather than abort.
    pub fn fetch(&self) -> RateSnapshot {
        tracing::debug!(url = %self.url, "fetching exchange rates");

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|err| RatesError::Transport(err.to_string()))?;

        let response = client
            .get(&self.url)
            .send()
            .map_err(|err| RatesError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RatesError::Status(status.as_u16()));
        }

        let body: Value = response.json().map_err(|err| RatesError::Decode(err.to_string()))?;
        let table = ExchangeRateTable::from_json_value(&body)?;
        tracing::info!(currencies = table.len(), "fetched exchange rates");
        Ok(table)
    }
}
