use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValuationError {
    #[error("discount rate ({rate}) equals terminal growth rate; terminal value is undefined")]
    DegenerateRates { rate: f64 },

    #[error("discount rate ({discount_rate}) is below terminal growth rate ({terminal_growth_rate})")]
    InvertedRates {
        discount_rate: f64,
        terminal_growth_rate: f64,
    },

    #[error("discount rate must be greater than -1 (got {0})")]
    InvalidDiscountRate(f64),

    #[error("{field} must be finite")]
    NonFiniteInput { field: &'static str },

    #[error("ufcf at index {index} is not finite")]
    NonFiniteCashFlow { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatementError {
    #[error("{side} statement at index {index} has no date or calendar year")]
    MissingPeriodKey { side: &'static str, index: usize },

    #[error("duplicate {side} statement for period {key}")]
    DuplicatePeriod { side: &'static str, key: String },

    #[error(
        "income and cash-flow statements are misaligned (income only: [{}], cash flow only: [{}])",
        .income_only.join(", "),
        .cashflow_only.join(", ")
    )]
    Misaligned {
        income_only: Vec<String>,
        cashflow_only: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("no stock symbol provided")]
    Empty,

    #[error("invalid stock symbol '{0}': expected 1-5 letters")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown period '{0}': expected 'annual' or 'quarter'")]
pub struct PeriodError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn misaligned_lists_both_sides() {
        let err = StatementError::Misaligned {
            income_only: vec!["2023-12-31".into()],
            cashflow_only: vec!["2019-12-31".into(), "2018-12-31".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("income only: [2023-12-31]"));
        assert!(msg.contains("cash flow only: [2019-12-31, 2018-12-31]"));
    }

    #[test]
    fn degenerate_rates_display() {
        let err = ValuationError::DegenerateRates { rate: 0.05 };
        assert!(err.to_string().contains("0.05"));
    }
}
