use crate::config::env_parse;
use crate::domain::pairing::{pair_statements, PairingMode};
use crate::domain::statement::{normalize, PeriodMetrics, StatementKind};
use crate::domain::symbol::{Period, Symbol};
use crate::domain::ufcf::{compute_series, UfcfEntry};
use crate::domain::valuation::{
    valuate, Assumptions, DiscountAnchor, MarketInputs, ShareCount, ValuationResult,
    DEFAULT_DISCOUNT_RATE, DEFAULT_TERMINAL_GROWTH_RATE,
};
use crate::ingest::provider::FinancialDataProvider;
use crate::ingest::types::{CompanyProfile, Quote, RawPeriodRecord};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_YEARS: u32 = 5;
pub const MAX_YEARS: u32 = 40;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceOptions {
    pub assumptions: Assumptions,
    pub pairing: PairingMode,
    pub years: u32,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            assumptions: Assumptions::default(),
            pairing: PairingMode::default(),
            years: DEFAULT_YEARS,
        }
    }
}

impl ServiceOptions {
    pub fn from_env() -> Result<Self> {
        let out = Self {
            assumptions: Assumptions {
                discount_rate: env_parse("DCF_DISCOUNT_RATE")?.unwrap_or(DEFAULT_DISCOUNT_RATE),
                terminal_growth_rate: env_parse("DCF_TERMINAL_GROWTH_RATE")?
                    .unwrap_or(DEFAULT_TERMINAL_GROWTH_RATE),
                anchor: env_parse::<DiscountAnchor>("DCF_DISCOUNT_ANCHOR")?.unwrap_or_default(),
            },
            pairing: env_parse::<PairingMode>("DCF_PAIRING")?.unwrap_or_default(),
            years: env_parse("DCF_YEARS")?.unwrap_or(DEFAULT_YEARS),
        };

        // Rates are checked once per-call overrides are applied.
        validate_years(out.years)?;
        Ok(out)
    }
}

pub fn validate_years(years: u32) -> Result<()> {
    anyhow::ensure!(
        (1..=MAX_YEARS).contains(&years),
        "years must be 1..={MAX_YEARS} (got {years})"
    );
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DcfData {
    pub symbol: Symbol,
    pub period: Period,
    pub years_of_data: usize,
    pub data: Vec<PeriodMetrics>,
}

impl DcfData {
    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UfcfData {
    pub symbol: Symbol,
    pub period: Period,
    pub ufcf_calculations: Vec<UfcfEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DcfValuation {
    pub symbol: Symbol,
    pub period: Period,
    pub valuation_date: NaiveDate,
    pub valuation: ValuationResult,
    pub company_profile: Option<CompanyProfile>,
}

/// Provider statement rows, passed through unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementsData {
    pub symbol: Symbol,
    pub period: Period,
    pub kind: StatementKind,
    pub statements: Vec<RawPeriodRecord>,
}

/// Runs the fetch → normalize → UFCF → valuation pipeline for one ticker. Holds no per-call
/// state, so one instance can serve concurrent requests.
#[derive(Clone)]
pub struct DcfService {
    provider: Arc<dyn FinancialDataProvider>,
    options: ServiceOptions,
}

impl std::fmt::Debug for DcfService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DcfService")
            .field("provider", &self.provider.provider_name())
            .field("options", &self.options)
            .finish()
    }
}

impl DcfService {
    pub fn new(provider: Arc<dyn FinancialDataProvider>, options: ServiceOptions) -> Self {
        Self { provider, options }
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    pub async fn statements(
        &self,
        symbol: &Symbol,
        period: Period,
        years: u32,
        kind: StatementKind,
    ) -> Result<StatementsData> {
        validate_years(years)?;

        let statements = match kind {
            StatementKind::Income => self.provider.income_statements(symbol, period, years).await,
            StatementKind::CashFlow => {
                self.provider.cash_flow_statements(symbol, period, years).await
            }
        }
        .with_context(|| format!("failed to fetch {kind} statements for {symbol}"))?;

        tracing::info!(%symbol, %period, %kind, records = statements.len(), "fetched raw statements");

        Ok(StatementsData {
            symbol: symbol.clone(),
            period,
            kind,
            statements,
        })
    }

    /// Per-period metrics. Missing statements on either side give an empty `data` list.
    pub async fn dcf_data(&self, symbol: &Symbol, period: Period, years: u32) -> Result<DcfData> {
        validate_years(years)?;

        let (income, cashflow) = tokio::try_join!(
            self.provider.income_statements(symbol, period, years),
            self.provider.cash_flow_statements(symbol, period, years),
        )
        .with_context(|| format!("failed to fetch statements for {symbol}"))?;

        let pairs = pair_statements(&income, &cashflow, self.options.pairing)
            .with_context(|| format!("cannot pair statements for {symbol}"))?;
        let data: Vec<PeriodMetrics> = pairs.into_iter().map(|(i, c)| normalize(i, c)).collect();

        if data.is_empty() {
            tracing::warn!(%symbol, %period, "no computable statement periods");
        } else {
            tracing::info!(
                %symbol,
                %period,
                periods = data.len(),
                provider = self.provider.provider_name(),
                "normalized statements"
            );
        }

        Ok(DcfData {
            symbol: symbol.clone(),
            period,
            years_of_data: data.len(),
            data,
        })
    }

    pub async fn ufcf(&self, symbol: &Symbol, period: Period, years: u32) -> Result<UfcfData> {
        let dcf = self.dcf_data(symbol, period, years).await?;
        Ok(UfcfData {
            symbol: dcf.symbol,
            period,
            ufcf_calculations: compute_series(&dcf.data),
        })
    }

    /// Full valuation. Quote or profile failures are logged and treated as missing market
    /// data; statement failures and invalid assumptions are errors.
    pub async fn valuation(
        &self,
        symbol: &Symbol,
        period: Period,
        years: u32,
        assumptions: &Assumptions,
        net_debt: Option<f64>,
    ) -> Result<DcfValuation> {
        assumptions.validate()?;

        let (ufcf, quote, profile) = tokio::join!(
            self.ufcf(symbol, period, years),
            self.provider.quote(symbol),
            self.provider.company_profile(symbol),
        );
        let ufcf = ufcf?;
        let quote = optional_market_data(symbol, "quote", quote);
        let profile = optional_market_data(symbol, "profile", profile);

        let price = current_price(quote.as_ref(), profile.as_ref());
        let shares = match &profile {
            Some(p) => ShareCount::Profile(p.clone()),
            None => ShareCount::Unknown,
        };
        let market = MarketInputs::new(price, shares);

        let series: Vec<f64> = ufcf.ufcf_calculations.iter().map(|e| e.ufcf).collect();
        let valuation = valuate(&series, &market, assumptions, net_debt)
            .with_context(|| format!("valuation failed for {symbol}"))?;

        tracing::info!(
            %symbol,
            years = series.len(),
            enterprise_value = valuation.valuation_summary.enterprise_value,
            intrinsic_value = ?valuation.valuation_summary.intrinsic_value_per_share,
            current_price = ?price,
            recommendation = %valuation.market_comparison.recommendation,
            "dcf valuation complete"
        );

        Ok(DcfValuation {
            symbol: symbol.clone(),
            period,
            valuation_date: chrono::Utc::now().date_naive(),
            valuation,
            company_profile: profile,
        })
    }
}

fn optional_market_data<T>(symbol: &Symbol, what: &'static str, res: Result<Option<T>>) -> Option<T> {
    match res {
        Ok(v) => {
            if v.is_none() {
                tracing::warn!(%symbol, what, "market data not available");
            }
            v
        }
        Err(err) => {
            tracing::warn!(%symbol, what, error = %err, "market data fetch failed; continuing without it");
            None
        }
    }
}

/// Quote price first, then the price carried on the profile.
fn current_price(quote: Option<&Quote>, profile: Option<&CompanyProfile>) -> Option<f64> {
    quote
        .and_then(|q| q.price)
        .or_else(|| profile.and_then(|p| p.price))
}
