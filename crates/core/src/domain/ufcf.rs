use crate::domain::statement::PeriodMetrics;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UfcfEntry {
    pub date: Option<NaiveDate>,
    pub year: Option<i32>,
    pub ebit: f64,
    /// Fraction, not percent.
    pub tax_rate: f64,
    pub ebit_after_tax: f64,
    pub depreciation_amortization: f64,
    pub capex: f64,
    pub working_capital_change: f64,
    #[serde(rename = "unleveredFreeCashFlow")]
    pub ufcf: f64,
}

impl UfcfEntry {
    /// `ufcf = ebit * (1 - tax_rate) + D&A - capex - change in working capital`.
    pub fn from_metrics(m: &PeriodMetrics) -> Self {
        let tax_rate = m.tax_rate_percent / 100.0;
        let ebit_after_tax = m.ebit * (1.0 - tax_rate);
        let ufcf = ebit_after_tax + m.depreciation_amortization - m.capex - m.working_capital_change;

        Self {
            date: m.date,
            year: m.calendar_year,
            ebit: m.ebit,
            tax_rate,
            ebit_after_tax,
            depreciation_amortization: m.depreciation_amortization,
            capex: m.capex,
            working_capital_change: m.working_capital_change,
            ufcf,
        }
    }
}

/// One entry per period, in input order. Periods are computed independently; there is no
/// smoothing or outlier rejection.
pub fn compute_series(metrics: &[PeriodMetrics]) -> Vec<UfcfEntry> {
    metrics.iter().map(UfcfEntry::from_metrics).collect()
}
