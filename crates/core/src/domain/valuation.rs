use crate::domain::error::ValuationError;
use crate::ingest::types::CompanyProfile;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_DISCOUNT_RATE: f64 = 0.10;
pub const DEFAULT_TERMINAL_GROWTH_RATE: f64 = 0.03;

/// Net debt stand-in when the caller has no balance-sheet figure: 5% of enterprise value.
pub const NET_DEBT_ESTIMATE_RATIO: f64 = 0.05;

/// Price/intrinsic variance beyond which a stock is called over- or undervalued. Strict on
/// both sides, so exactly ±20% is fairly valued.
pub const FAIR_VALUE_BAND_PERCENT: f64 = 20.0;
/// Slack on the band edges, in percentage points.
const BAND_EDGE_TOLERANCE: f64 = 1e-9;

/// Which element of the UFCF series is discounted as year 1.
///
/// There is no forecasting step, so historical cash flows stand in for projections. With
/// `EarliestIndexFirst` the first element of the series is year 1; provider data is
/// most-recent-first, so that anchors the schedule on the latest reported period.
/// `OldestPeriodFirst` reverses the series so the oldest period is year 1 and the most recent
/// one drives the terminal value. Callers supplying true forecasts (nearest year first) want
/// `EarliestIndexFirst`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscountAnchor {
    #[default]
    EarliestIndexFirst,
    OldestPeriodFirst,
}

impl fmt::Display for DiscountAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscountAnchor::EarliestIndexFirst => f.write_str("earliest-index-first"),
            DiscountAnchor::OldestPeriodFirst => f.write_str("oldest-period-first"),
        }
    }
}

impl FromStr for DiscountAnchor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "earliest-index-first" | "index" => Ok(DiscountAnchor::EarliestIndexFirst),
            "oldest-period-first" | "oldest" => Ok(DiscountAnchor::OldestPeriodFirst),
            other => Err(format!("unknown discount anchor '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assumptions {
    pub discount_rate: f64,
    pub terminal_growth_rate: f64,
    #[serde(default)]
    pub anchor: DiscountAnchor,
}

impl Default for Assumptions {
    fn default() -> Self {
        Self {
            discount_rate: DEFAULT_DISCOUNT_RATE,
            terminal_growth_rate: DEFAULT_TERMINAL_GROWTH_RATE,
            anchor: DiscountAnchor::default(),
        }
    }
}

impl Assumptions {
    /// Rejects rate combinations for which the Gordon growth terminal value is undefined or
    /// negative.
    pub fn validate(&self) -> Result<(), ValuationError> {
        let r = self.discount_rate;
        let g = self.terminal_growth_rate;
        if !r.is_finite() {
            return Err(ValuationError::NonFiniteInput {
                field: "discount_rate",
            });
        }
        if !g.is_finite() {
            return Err(ValuationError::NonFiniteInput {
                field: "terminal_growth_rate",
            });
        }
        if r <= -1.0 {
            return Err(ValuationError::InvalidDiscountRate(r));
        }
        if r == g {
            return Err(ValuationError::DegenerateRates { rate: r });
        }
        if r < g {
            return Err(ValuationError::InvertedRates {
                discount_rate: r,
                terminal_growth_rate: g,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShareCount {
    /// Caller-supplied share count.
    Explicit(f64),
    /// Derived from the profile: `marketCap / currentPrice`, else the filed share count.
    Profile(CompanyProfile),
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketInputs {
    pub current_price: Option<f64>,
    pub shares: ShareCount,
}

impl MarketInputs {
    pub fn new(current_price: Option<f64>, shares: ShareCount) -> Self {
        Self {
            current_price,
            shares,
        }
    }

    fn validate(&self) -> Result<(), ValuationError> {
        if self.current_price.is_some_and(|p| !p.is_finite()) {
            return Err(ValuationError::NonFiniteInput {
                field: "current_price",
            });
        }
        let (market_cap, shares) = match &self.shares {
            ShareCount::Explicit(n) => (None, Some(*n)),
            ShareCount::Profile(p) => (p.market_cap, p.shares_outstanding),
            ShareCount::Unknown => (None, None),
        };
        if market_cap.is_some_and(|v| !v.is_finite()) {
            return Err(ValuationError::NonFiniteInput { field: "market_cap" });
        }
        if shares.is_some_and(|v| !v.is_finite()) {
            return Err(ValuationError::NonFiniteInput {
                field: "shares_outstanding",
            });
        }
        Ok(())
    }

    fn usable_price(&self) -> Option<f64> {
        self.current_price.filter(|p| *p > 0.0)
    }

    /// Recomputed share count (`marketCap / price`) is preferred over the filed count, which
    /// is often stale.
    pub fn resolve_shares(&self) -> Option<f64> {
        match &self.shares {
            ShareCount::Explicit(n) => Some(*n),
            ShareCount::Profile(profile) => {
                let recomputed = match (profile.market_cap, self.usable_price()) {
                    (Some(cap), Some(price)) if cap > 0.0 => Some(cap / price),
                    _ => None,
                };
                recomputed
                    .filter(|n| n.is_finite() && *n > 0.0)
                    .or(profile.shares_outstanding)
            }
            ShareCount::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "UNDERVALUED")]
    Undervalued,
    #[serde(rename = "OVERVALUED")]
    Overvalued,
    #[serde(rename = "FAIRLY_VALUED")]
    FairlyValued,
    #[serde(rename = "N/A")]
    NotAvailable,
}

impl Recommendation {
    /// Band edges are inclusive up to `BAND_EDGE_TOLERANCE`, so a ratio that is exactly ±20%
    /// stays fairly valued despite float error in `variance / value * 100`.
    pub fn classify(variance_percent: f64) -> Self {
        if variance_percent - FAIR_VALUE_BAND_PERCENT > BAND_EDGE_TOLERANCE {
            Recommendation::Overvalued
        } else if variance_percent + FAIR_VALUE_BAND_PERCENT < -BAND_EDGE_TOLERANCE {
            Recommendation::Undervalued
        } else {
            Recommendation::FairlyValued
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Recommendation::Undervalued => "UNDERVALUED",
            Recommendation::Overvalued => "OVERVALUED",
            Recommendation::FairlyValued => "FAIRLY_VALUED",
            Recommendation::NotAvailable => "N/A",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetDebtSource {
    Supplied,
    Estimated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssumptionsSummary {
    pub terminal_growth_rate: f64,
    pub discount_rate: f64,
    pub years_analyzed: usize,
    pub anchor: DiscountAnchor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashFlowProjection {
    pub year: u32,
    pub ufcf: f64,
    pub pv_factor: f64,
    pub present_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalValue {
    pub terminal_fcf: f64,
    pub terminal_value: f64,
    pub present_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationSummary {
    pub sum_pv_fcf: f64,
    pub terminal_pv: f64,
    pub enterprise_value: f64,
    pub net_debt: f64,
    pub net_debt_source: NetDebtSource,
    pub equity_value: f64,
    pub shares_outstanding: Option<f64>,
    pub intrinsic_value_per_share: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketComparison {
    pub current_price: Option<f64>,
    pub intrinsic_value: Option<f64>,
    pub price_variance: Option<f64>,
    pub price_variance_percent: Option<f64>,
    pub recommendation: Recommendation,
}

/// Output of one valuation. Values are rounded for presentation: monetary aggregates to whole
/// units, per-share figures and percentages to 2 decimals, discount factors to 3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationResult {
    pub assumptions: AssumptionsSummary,
    pub cash_flow_projections: Vec<CashFlowProjection>,
    pub terminal_value: TerminalValue,
    pub valuation_summary: ValuationSummary,
    pub market_comparison: MarketComparison,
}

/// Discounts the UFCF series, adds a Gordon growth terminal value and compares the resulting
/// per-share value with the market price.
///
/// Missing market data degrades to `None` fields and `N/A`; only invalid assumptions or
/// non-finite inputs are errors.
pub fn valuate(
    ufcf: &[f64],
    market: &MarketInputs,
    assumptions: &Assumptions,
    net_debt: Option<f64>,
) -> Result<ValuationResult, ValuationError> {
    assumptions.validate()?;
    market.validate()?;
    if net_debt.is_some_and(|d| !d.is_finite()) {
        return Err(ValuationError::NonFiniteInput { field: "net_debt" });
    }
    if let Some(index) = ufcf.iter().position(|v| !v.is_finite()) {
        return Err(ValuationError::NonFiniteCashFlow { index });
    }

    let r = assumptions.discount_rate;
    let g = assumptions.terminal_growth_rate;

    let schedule: Vec<f64> = match assumptions.anchor {
        DiscountAnchor::EarliestIndexFirst => ufcf.to_vec(),
        DiscountAnchor::OldestPeriodFirst => ufcf.iter().rev().copied().collect(),
    };
    let n = schedule.len();

    let discounted: Vec<(f64, f64, f64)> = schedule
        .iter()
        .enumerate()
        .map(|(i, &cf)| {
            let factor = pv_factor(r, i + 1);
            (cf, factor, cf * factor)
        })
        .collect();

    let final_ufcf = schedule.last().copied().unwrap_or(0.0);
    let terminal_fcf = final_ufcf * (1.0 + g);
    let terminal_value = terminal_fcf / (r - g);
    let terminal_pv = terminal_value * pv_factor(r, n);

    let sum_pv_fcf: f64 = discounted.iter().map(|(_, _, pv)| pv).sum();
    let enterprise_value = sum_pv_fcf + terminal_pv;

    let (net_debt, net_debt_source) = match net_debt {
        Some(d) => (d, NetDebtSource::Supplied),
        None => (enterprise_value * NET_DEBT_ESTIMATE_RATIO, NetDebtSource::Estimated),
    };
    let equity_value = enterprise_value - net_debt;

    let shares_outstanding = market.resolve_shares();
    let intrinsic = shares_outstanding
        .filter(|n| *n > 0.0)
        .map(|n| equity_value / n);

    let comparison = compare(market.usable_price(), intrinsic);

    tracing::debug!(
        years = n,
        discount_rate = r,
        terminal_growth_rate = g,
        enterprise_value,
        equity_value,
        ?intrinsic,
        recommendation = %comparison.recommendation,
        "dcf valuation computed"
    );

    Ok(ValuationResult {
        assumptions: AssumptionsSummary {
            terminal_growth_rate: g,
            discount_rate: r,
            years_analyzed: n,
            anchor: assumptions.anchor,
        },
        cash_flow_projections: discounted
            .iter()
            .enumerate()
            .map(|(i, &(cf, factor, pv))| CashFlowProjection {
                year: (i + 1) as u32,
                ufcf: cf.round(),
                pv_factor: round_dp(factor, 3),
                present_value: pv.round(),
            })
            .collect(),
        terminal_value: TerminalValue {
            terminal_fcf: terminal_fcf.round(),
            terminal_value: terminal_value.round(),
            present_value: terminal_pv.round(),
        },
        valuation_summary: ValuationSummary {
            sum_pv_fcf: sum_pv_fcf.round(),
            terminal_pv: terminal_pv.round(),
            enterprise_value: enterprise_value.round(),
            net_debt: net_debt.round(),
            net_debt_source,
            equity_value: equity_value.round(),
            shares_outstanding,
            intrinsic_value_per_share: intrinsic.map(|v| round_dp(v, 2)),
        },
        market_comparison: MarketComparison {
            current_price: market.current_price,
            ..comparison
        },
    })
}

/// Price vs. intrinsic value. Either side missing (or a zero intrinsic value) gives `N/A`.
pub fn compare(current_price: Option<f64>, intrinsic: Option<f64>) -> MarketComparison {
    let (Some(price), Some(value)) = (current_price, intrinsic.filter(|v| *v != 0.0)) else {
        return MarketComparison {
            current_price,
            intrinsic_value: intrinsic.map(|v| round_dp(v, 2)),
            price_variance: None,
            price_variance_percent: None,
            recommendation: Recommendation::NotAvailable,
        };
    };

    let variance = price - value;
    let variance_percent = variance / value * 100.0;

    MarketComparison {
        current_price: Some(price),
        intrinsic_value: Some(round_dp(value, 2)),
        price_variance: Some(round_dp(variance, 2)),
        price_variance_percent: Some(round_dp(variance_percent, 2)),
        recommendation: Recommendation::classify(variance_percent),
    }
}

fn pv_factor(discount_rate: f64, year: usize) -> f64 {
    1.0 / (1.0 + discount_rate).powi(year as i32)
}

fn round_dp(v: f64, dp: i32) -> f64 {
    let scale = 10f64.powi(dp);
    (v * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn no_market() -> MarketInputs {
        MarketInputs::new(None, ShareCount::Unknown)
    }

    #[test]
    fn single_period_reference_valuation() {
        let res = valuate(&[100.0], &no_market(), &Assumptions::default(), None).unwrap();

        assert_eq!(res.assumptions.years_analyzed, 1);
        assert_eq!(res.cash_flow_projections.len(), 1);
        let p = &res.cash_flow_projections[0];
        assert_eq!(p.year, 1);
        assert_eq!(p.ufcf, 100.0);
        assert_relative_eq!(p.pv_factor, 0.909);
        // 90.909..
        assert_eq!(p.present_value, 91.0);

        assert_eq!(res.terminal_value.terminal_fcf, 103.0);
        // 103 / 0.07 = 1471.43, discounted once = 1337.66
        assert_eq!(res.terminal_value.terminal_value, 1471.0);
        assert_eq!(res.terminal_value.present_value, 1338.0);

        // 90.91 + 1337.66 = 1428.57
        let s = &res.valuation_summary;
        assert_eq!(s.enterprise_value, 1429.0);
        assert_eq!(s.sum_pv_fcf, 91.0);
        assert_eq!(s.net_debt, 71.0);
        assert_eq!(s.net_debt_source, NetDebtSource::Estimated);
        assert_eq!(s.equity_value, 1357.0);
        assert_eq!(s.intrinsic_value_per_share, None);
        assert_eq!(res.market_comparison.recommendation, Recommendation::NotAvailable);
    }

    #[test]
    fn multi_period_schedule_discounts_each_year() {
        let res = valuate(&[100.0, 110.0], &no_market(), &Assumptions::default(), Some(0.0)).unwrap();
        let factors: Vec<f64> = res.cash_flow_projections.iter().map(|p| p.pv_factor).collect();
        assert_eq!(factors, vec![0.909, 0.826]);
        assert_eq!(res.cash_flow_projections[1].present_value, 91.0);
        // Terminal value grows the last element: 110 * 1.03 / 0.07 / 1.21
        assert_eq!(res.terminal_value.terminal_fcf, 113.0);
        assert_eq!(res.terminal_value.present_value, 1338.0);
        assert_eq!(res.valuation_summary.sum_pv_fcf, 182.0);
        assert_eq!(res.valuation_summary.enterprise_value, 1519.0);
        assert_eq!(res.valuation_summary.equity_value, 1519.0);
        assert_eq!(res.valuation_summary.net_debt_source, NetDebtSource::Supplied);
    }

    #[test]
    fn oldest_period_anchor_reverses_schedule() {
        let assumptions = Assumptions {
            anchor: DiscountAnchor::OldestPeriodFirst,
            ..Assumptions::default()
        };
        // Most recent first, as the provider returns it.
        let res = valuate(&[200.0, 100.0], &no_market(), &assumptions, None).unwrap();
        assert_eq!(res.cash_flow_projections[0].ufcf, 100.0);
        assert_eq!(res.cash_flow_projections[1].ufcf, 200.0);
        assert_eq!(res.terminal_value.terminal_fcf, 206.0);
        assert_eq!(res.assumptions.anchor, DiscountAnchor::OldestPeriodFirst);
    }

    #[test]
    fn empty_series_values_to_zero() {
        let res = valuate(&[], &no_market(), &Assumptions::default(), None).unwrap();
        assert!(res.cash_flow_projections.is_empty());
        assert_eq!(res.assumptions.years_analyzed, 0);
        assert_eq!(res.terminal_value.terminal_value, 0.0);
        assert_eq!(res.valuation_summary.enterprise_value, 0.0);
        assert_eq!(res.valuation_summary.equity_value, 0.0);
    }

    #[test]
    fn equal_rates_are_rejected() {
        let assumptions = Assumptions {
            discount_rate: 0.05,
            terminal_growth_rate: 0.05,
            ..Assumptions::default()
        };
        let err = valuate(&[100.0], &no_market(), &assumptions, None).unwrap_err();
        assert_eq!(err, ValuationError::DegenerateRates { rate: 0.05 });
    }

    #[test]
    fn inverted_and_invalid_rates_are_rejected() {
        let inverted = Assumptions {
            discount_rate: 0.02,
            terminal_growth_rate: 0.04,
            ..Assumptions::default()
        };
        assert!(matches!(
            valuate(&[100.0], &no_market(), &inverted, None),
            Err(ValuationError::InvertedRates { .. })
        ));

        let nan = Assumptions {
            discount_rate: f64::NAN,
            ..Assumptions::default()
        };
        assert_eq!(
            nan.validate(),
            Err(ValuationError::NonFiniteInput {
                field: "discount_rate"
            })
        );

        let below = Assumptions {
            discount_rate: -1.0,
            terminal_growth_rate: -2.0,
            ..Assumptions::default()
        };
        assert_eq!(below.validate(), Err(ValuationError::InvalidDiscountRate(-1.0)));
    }

    #[test]
    fn non_finite_inputs_are_rejected() {
        let a = Assumptions::default();
        assert_eq!(
            valuate(&[1.0, f64::INFINITY], &no_market(), &a, None),
            Err(ValuationError::NonFiniteCashFlow { index: 1 })
        );
        assert_eq!(
            valuate(&[1.0], &no_market(), &a, Some(f64::NAN)),
            Err(ValuationError::NonFiniteInput { field: "net_debt" })
        );
        let market = MarketInputs::new(Some(f64::NAN), ShareCount::Unknown);
        assert_eq!(
            valuate(&[1.0], &market, &a, None),
            Err(ValuationError::NonFiniteInput {
                field: "current_price"
            })
        );
    }

    #[test]
    fn missing_price_still_computes_intrinsic_value() {
        let market = MarketInputs::new(None, ShareCount::Explicit(100.0));
        let res = valuate(&[100.0], &market, &Assumptions::default(), None).unwrap();
        // Equity 1357.14 over 100 shares.
        assert_eq!(res.valuation_summary.intrinsic_value_per_share, Some(13.57));
        assert_eq!(res.market_comparison.intrinsic_value, Some(13.57));
        assert_eq!(res.market_comparison.current_price, None);
        assert_eq!(res.market_comparison.price_variance, None);
        assert_eq!(res.market_comparison.recommendation, Recommendation::NotAvailable);
    }

    #[test]
    fn zero_shares_gives_no_intrinsic_value() {
        let market = MarketInputs::new(Some(10.0), ShareCount::Explicit(0.0));
        let res = valuate(&[100.0], &market, &Assumptions::default(), None).unwrap();
        assert_eq!(res.valuation_summary.intrinsic_value_per_share, None);
        assert_eq!(res.market_comparison.recommendation, Recommendation::NotAvailable);
        assert_eq!(res.market_comparison.current_price, Some(10.0));
    }

    #[test]
    fn recommendation_follows_price_variance() {
        // Equity 1428.57 over 100 shares = 14.2857 per share.
        let cases = [
            (10.0, Recommendation::Undervalued),
            (15.0, Recommendation::FairlyValued),
            (20.0, Recommendation::Overvalued),
        ];
        for (price, expected) in cases {
            let market = MarketInputs::new(Some(price), ShareCount::Explicit(100.0));
            let res = valuate(&[100.0], &market, &Assumptions::default(), Some(0.0)).unwrap();
            assert_eq!(res.market_comparison.recommendation, expected, "price {price}");
        }

        let market = MarketInputs::new(Some(10.0), ShareCount::Explicit(100.0));
        let res = valuate(&[100.0], &market, &Assumptions::default(), Some(0.0)).unwrap();
        assert_eq!(res.market_comparison.price_variance, Some(-4.29));
        assert_eq!(res.market_comparison.price_variance_percent, Some(-30.0));
    }

    #[test]
    fn band_edges_are_fairly_valued() {
        assert_eq!(Recommendation::classify(20.0), Recommendation::FairlyValued);
        assert_eq!(Recommendation::classify(-20.0), Recommendation::FairlyValued);
        assert_eq!(Recommendation::classify(20.01), Recommendation::Overvalued);
        assert_eq!(Recommendation::classify(-20.01), Recommendation::Undervalued);

        let c = compare(Some(120.0), Some(100.0));
        assert_eq!(c.price_variance_percent, Some(20.0));
        assert_eq!(c.recommendation, Recommendation::FairlyValued);
        let c = compare(Some(80.0), Some(100.0));
        assert_eq!(c.recommendation, Recommendation::FairlyValued);
    }

    #[test]
    fn band_edges_survive_float_error() {
        let c = compare(Some(3.6), Some(3.0));
        assert_eq!(c.price_variance_percent, Some(20.0));
        assert_eq!(c.recommendation, Recommendation::FairlyValued);

        let c = compare(Some(2.4), Some(3.0));
        assert_eq!(c.price_variance_percent, Some(-20.0));
        assert_eq!(c.recommendation, Recommendation::FairlyValued);

        // EV = 0.21/1.1 + 0.2163/0.07/1.1 = 3.0 per share.
        let market = MarketInputs::new(Some(3.6), ShareCount::Explicit(1.0));
        let res = valuate(&[0.21], &market, &Assumptions::default(), Some(0.0)).unwrap();
        assert_eq!(res.market_comparison.price_variance_percent, Some(20.0));
        assert_eq!(res.market_comparison.recommendation, Recommendation::FairlyValued);
    }

    #[test]
    fn non_finite_profile_share_inputs_are_rejected() {
        let profile = CompanyProfile {
            shares_outstanding: Some(f64::INFINITY),
            ..CompanyProfile::default()
        };
        let market = MarketInputs::new(Some(10.0), ShareCount::Profile(profile));
        assert_eq!(
            valuate(&[1.0], &market, &Assumptions::default(), None),
            Err(ValuationError::NonFiniteInput {
                field: "shares_outstanding"
            })
        );

        let profile = CompanyProfile {
            market_cap: Some(f64::NAN),
            shares_outstanding: Some(50.0),
            ..CompanyProfile::default()
        };
        let market = MarketInputs::new(Some(10.0), ShareCount::Profile(profile));
        assert_eq!(
            valuate(&[1.0], &market, &Assumptions::default(), None),
            Err(ValuationError::NonFiniteInput { field: "market_cap" })
        );
    }

    #[test]
    fn shares_prefer_market_cap_over_filed_count() {
        let profile = CompanyProfile {
            market_cap: Some(1_000.0),
            shares_outstanding: Some(50.0),
            ..CompanyProfile::default()
        };
        let market = MarketInputs::new(Some(10.0), ShareCount::Profile(profile.clone()));
        assert_eq!(market.resolve_shares(), Some(100.0));

        let no_price = MarketInputs::new(None, ShareCount::Profile(profile));
        assert_eq!(no_price.resolve_shares(), Some(50.0));

        let no_cap = MarketInputs::new(
            Some(10.0),
            ShareCount::Profile(CompanyProfile {
                shares_outstanding: Some(75.0),
                ..CompanyProfile::default()
            }),
        );
        assert_eq!(no_cap.resolve_shares(), Some(75.0));

        let empty = MarketInputs::new(Some(10.0), ShareCount::Profile(CompanyProfile::default()));
        assert_eq!(empty.resolve_shares(), None);
    }

    #[test]
    fn serializes_recommendation_labels() {
        let v = serde_json::to_value(Recommendation::FairlyValued).unwrap();
        assert_eq!(v, serde_json::json!("FAIRLY_VALUED"));
        let v = serde_json::to_value(Recommendation::NotAvailable).unwrap();
        assert_eq!(v, serde_json::json!("N/A"));

        let res = valuate(&[100.0], &no_market(), &Assumptions::default(), None).unwrap();
        let v = serde_json::to_value(&res).unwrap();
        assert!(v["valuationSummary"]["intrinsicValuePerShare"].is_null());
        assert_eq!(v["marketComparison"]["recommendation"], "N/A");
        assert_eq!(v["valuationSummary"]["netDebtSource"], "estimated");
        assert_eq!(v["cashFlowProjections"][0]["pvFactor"], 0.909);
    }

    #[test]
    fn parses_anchor_names() {
        assert_eq!(
            "oldest_period_first".parse::<DiscountAnchor>().unwrap(),
            DiscountAnchor::OldestPeriodFirst
        );
        assert_eq!(
            "earliest-index-first".parse::<DiscountAnchor>().unwrap(),
            DiscountAnchor::EarliestIndexFirst
        );
        assert!("latest".parse::<DiscountAnchor>().is_err());
    }
}
