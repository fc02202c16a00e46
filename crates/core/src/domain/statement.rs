use crate::ingest::types::RawPeriodRecord;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which raw financial statement to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatementKind {
    Income,
    CashFlow,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementKind::Income => f.write_str("income"),
            StatementKind::CashFlow => f.write_str("cash-flow"),
        }
    }
}

impl FromStr for StatementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "income" | "income-statement" => Ok(StatementKind::Income),
            "cash-flow" | "cashflow" | "cash-flow-statement" => Ok(StatementKind::CashFlow),
            other => Err(format!("unknown statement kind '{other}'")),
        }
    }
}

/// Standardized operating metrics for one reporting period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodMetrics {
    pub date: Option<NaiveDate>,
    pub calendar_year: Option<i32>,
    pub period: Option<String>,

    /// Operating income, used as the EBIT proxy.
    pub ebit: f64,
    pub ebitda: f64,
    /// Effective tax rate in percent. `0` when pre-tax income is zero, so a zero rate is
    /// ambiguous between "no tax" and "undefined".
    pub tax_rate_percent: f64,
    pub tax_expense: f64,
    pub income_before_tax: f64,

    pub depreciation_amortization: f64,
    /// Capital expenditure as a non-negative outflow.
    pub capex: f64,
    /// Signed so that an increase in working capital is a use of cash.
    pub working_capital_change: f64,

    pub revenue: f64,
    pub net_income: f64,
    pub free_cash_flow: f64,
    pub operating_cash_flow: f64,
}

/// Derives `PeriodMetrics` from an income-statement row and the cash-flow row for the same
/// period. Absent fields read as zero.
pub fn normalize(income: &RawPeriodRecord, cashflow: &RawPeriodRecord) -> PeriodMetrics {
    let income_before_tax = income.number("incomeBeforeTax");
    let tax_expense = income.number("incomeTaxExpense");
    let tax_rate_percent = if income_before_tax != 0.0 {
        tax_expense / income_before_tax * 100.0
    } else {
        0.0
    };

    let date = income.date();
    let calendar_year = income
        .calendar_year()
        .or_else(|| date.map(|d| d.year()));

    PeriodMetrics {
        date,
        calendar_year,
        period: income.period().map(str::to_string),
        ebit: income.number("operatingIncome"),
        ebitda: income.number("ebitda"),
        tax_rate_percent,
        tax_expense,
        income_before_tax,
        depreciation_amortization: cashflow.number("depreciationAndAmortization"),
        capex: cashflow.number("capitalExpenditure").abs(),
        working_capital_change: cashflow.number("changeInWorkingCapital"),
        revenue: income.number("revenue"),
        net_income: income.number("netIncome"),
        free_cash_flow: cashflow.number("freeCashFlow"),
        operating_cash_flow: cashflow.number("operatingCashFlow"),
    }
}
