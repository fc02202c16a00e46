use crate::config::Settings;
use crate::domain::symbol::{Period, Symbol};
use crate::ingest::types::{CompanyProfile, Quote, RawPeriodRecord};
use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;
/// Backoff doubles from 1s and stops growing at 64s.
const MAX_BACKOFF_SHIFT: u32 = 6;

/// Source of raw statements and market data. Implementations return fully materialized
/// responses; the valuation pipeline never consumes partial data.
#[async_trait::async_trait]
pub trait FinancialDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Income statements, most recent period first.
    async fn income_statements(
        &self,
        symbol: &Symbol,
        period: Period,
        limit: u32,
    ) -> Result<Vec<RawPeriodRecord>>;

    /// Cash-flow statements, most recent period first.
    async fn cash_flow_statements(
        &self,
        symbol: &Symbol,
        period: Period,
        limit: u32,
    ) -> Result<Vec<RawPeriodRecord>>;

    async fn quote(&self, symbol: &Symbol) -> Result<Option<Quote>>;

    async fn company_profile(&self, symbol: &Symbol) -> Result<Option<CompanyProfile>>;
}

/// Financial Modeling Prep REST client.
#[derive(Debug, Clone)]
pub struct FmpDataProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    retries: u32,
}

impl FmpDataProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.require_fmp_api_key()?.to_string();

        let timeout_secs = settings
            .data_provider_timeout_secs
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let retries = settings.data_provider_retries.unwrap_or(DEFAULT_RETRIES).max(1);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build data provider http client")?;

        Ok(Self {
            http,
            base_url: settings.fmp_base_url().to_string(),
            api_key,
            retries,
        })
    }

    fn url(&self, path: &str) -> String {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn fetch_once(&self, path: &str, query: &[(&str, String)]) -> Result<Value, FetchError> {
        let res = self
            .http
            .get(self.url(path))
            .query(&[("apikey", self.api_key.as_str())])
            .query(query)
            .send()
            .await
            .map_err(|e| FetchError::Retryable(anyhow::Error::new(e).context("FMP request failed")))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| FetchError::Retryable(anyhow::Error::new(e).context("failed to read FMP response")))?;

        if !status.is_success() {
            let err = anyhow::anyhow!("FMP HTTP {status} for {path}: {}", truncate(&text, 300));
            return Err(if is_retryable(status) {
                FetchError::Retryable(err)
            } else {
                FetchError::Fatal(err)
            });
        }

        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("FMP response for {path} is not valid JSON: {}", truncate(&text, 300)))
            .map_err(FetchError::Fatal)?;

        if let Some(msg) = provider_error_message(&raw_json) {
            return Err(FetchError::Fatal(anyhow::anyhow!("FMP error for {path}: {msg}")));
        }

        Ok(raw_json)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let mut attempt: u32 = 0;
        let raw = loop {
            attempt += 1;
            match self.fetch_once(path, query).await {
                Ok(v) => break v,
                Err(FetchError::Fatal(err)) => return Err(err),
                Err(FetchError::Retryable(err)) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = backoff_delay(attempt);
                    tracing::warn!(attempt, ?backoff, path, error = %err, "FMP fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        };

        serde_json::from_value::<T>(raw)
            .with_context(|| format!("failed to decode FMP response for {path}"))
    }

    async fn statements(
        &self,
        kind: &str,
        symbol: &Symbol,
        period: Period,
        limit: u32,
    ) -> Result<Vec<RawPeriodRecord>> {
        let path = format!("/{kind}/{symbol}");
        let query = [
            ("period", period.as_query().to_string()),
            ("limit", limit.to_string()),
        ];
        let records: Vec<RawPeriodRecord> = self.get_json(&path, &query).await?;
        tracing::debug!(%symbol, %period, kind, records = records.len(), "fetched statements");
        Ok(records)
    }
}

#[async_trait::async_trait]
impl FinancialDataProvider for FmpDataProvider {
    fn provider_name(&self) -> &'static str {
        "financial_modeling_prep"
    }

    async fn income_statements(
        &self,
        symbol: &Symbol,
        period: Period,
        limit: u32,
    ) -> Result<Vec<RawPeriodRecord>> {
        self.statements("income-statement", symbol, period, limit).await
    }

    async fn cash_flow_statements(
        &self,
        symbol: &Symbol,
        period: Period,
        limit: u32,
    ) -> Result<Vec<RawPeriodRecord>> {
        self.statements("cash-flow-statement", symbol, period, limit).await
    }

    async fn quote(&self, symbol: &Symbol) -> Result<Option<Quote>> {
        let quotes: Vec<Quote> = self.get_json(&format!("/quote-short/{symbol}"), &[]).await?;
        Ok(quotes.into_iter().next())
    }

    async fn company_profile(&self, symbol: &Symbol) -> Result<Option<CompanyProfile>> {
        let profiles: Vec<CompanyProfile> = self.get_json(&format!("/profile/{symbol}"), &[]).await?;
        Ok(profiles.into_iter().next())
    }
}

#[derive(Debug)]
enum FetchError {
    Retryable(anyhow::Error),
    Fatal(anyhow::Error),
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT))
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// FMP reports some failures (bad key, plan limits) as a 200 with an error object.
fn provider_error_message(v: &Value) -> Option<String> {
    let obj = v.as_object()?;
    obj.get("Error Message")
        .or_else(|| obj.get("error"))
        .map(|m| match m {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
