use crate::domain::error::StatementError;
use crate::ingest::types::RawPeriodRecord;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

/// How income-statement rows are matched with cash-flow rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PairingMode {
    /// Match on `date`, or on `calendarYear` + `period` when any record lacks a date.
    #[default]
    ByPeriod,
    /// Match by list index, truncated to the shorter list.
    Positional,
}

impl fmt::Display for PairingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairingMode::ByPeriod => f.write_str("by-period"),
            PairingMode::Positional => f.write_str("positional"),
        }
    }
}

impl FromStr for PairingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "by-period" | "by-date" | "period" | "date" => Ok(PairingMode::ByPeriod),
            "positional" | "index" => Ok(PairingMode::Positional),
            other => Err(format!("unknown pairing mode '{other}'")),
        }
    }
}

pub type StatementPair<'a> = (&'a RawPeriodRecord, &'a RawPeriodRecord);

/// A non-empty record with its index in the provider's original list.
type Indexed<'a> = (usize, &'a RawPeriodRecord);

/// Pairs income rows with cash-flow rows. An empty side yields no pairs rather than an error,
/// so a partially failed fetch still produces an explicit empty result.
pub fn pair_statements<'a>(
    income: &'a [RawPeriodRecord],
    cashflow: &'a [RawPeriodRecord],
    mode: PairingMode,
) -> Result<Vec<StatementPair<'a>>, StatementError> {
    let income = non_empty(income);
    let cashflow = non_empty(cashflow);

    if income.is_empty() || cashflow.is_empty() {
        tracing::warn!(
            income_len = income.len(),
            cashflow_len = cashflow.len(),
            "no statement data to pair"
        );
        return Ok(Vec::new());
    }

    match mode {
        PairingMode::Positional => Ok(pair_positional(&income, &cashflow)),
        PairingMode::ByPeriod => pair_by_period(&income, &cashflow),
    }
}

fn non_empty(records: &[RawPeriodRecord]) -> Vec<Indexed<'_>> {
    records
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.is_empty())
        .collect()
}

fn pair_positional<'a>(income: &[Indexed<'a>], cashflow: &[Indexed<'a>]) -> Vec<StatementPair<'a>> {
    if income.len() != cashflow.len() {
        tracing::warn!(
            income_len = income.len(),
            cashflow_len = cashflow.len(),
            "statement lengths differ; positional pairing truncates to the shorter list"
        );
    }
    income
        .iter()
        .zip(cashflow.iter())
        .map(|((_, i), (_, c))| (*i, *c))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyShape {
    /// Statement `date`, used when every record on both sides carries one.
    Date,
    /// `calendarYear` + `period`.
    FiscalPeriod,
}

fn pair_by_period<'a>(
    income: &[Indexed<'a>],
    cashflow: &[Indexed<'a>],
) -> Result<Vec<StatementPair<'a>>, StatementError> {
    let shape = if income.iter().chain(cashflow).all(|(_, r)| r.date().is_some()) {
        KeyShape::Date
    } else {
        KeyShape::FiscalPeriod
    };

    let income_keyed = keyed("income", income, shape)?;
    let cashflow_keyed = keyed("cash flow", cashflow, shape)?;

    let mut by_key: HashMap<&str, &'a RawPeriodRecord> = HashMap::with_capacity(cashflow_keyed.len());
    for (key, record) in &cashflow_keyed {
        by_key.insert(key.as_str(), *record);
    }

    let income_keys: BTreeSet<&str> = income_keyed.iter().map(|(k, _)| k.as_str()).collect();
    let income_only: Vec<String> = income_keyed
        .iter()
        .filter(|(k, _)| !by_key.contains_key(k.as_str()))
        .map(|(k, _)| k.clone())
        .collect();
    let cashflow_only: Vec<String> = cashflow_keyed
        .iter()
        .filter(|(k, _)| !income_keys.contains(k.as_str()))
        .map(|(k, _)| k.clone())
        .collect();

    if !income_only.is_empty() || !cashflow_only.is_empty() {
        return Err(StatementError::Misaligned {
            income_only,
            cashflow_only,
        });
    }

    Ok(income_keyed
        .iter()
        .filter_map(|(key, record)| by_key.get(key.as_str()).map(|c| (*record, *c)))
        .collect())
}

fn keyed<'a>(
    side: &'static str,
    records: &[Indexed<'a>],
    shape: KeyShape,
) -> Result<Vec<(String, &'a RawPeriodRecord)>, StatementError> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(records.len());
    for &(index, record) in records {
        let key = period_key(record, shape).ok_or(StatementError::MissingPeriodKey { side, index })?;
        if !seen.insert(key.clone()) {
            return Err(StatementError::DuplicatePeriod { side, key });
        }
        out.push((key, record));
    }
    Ok(out)
}

fn period_key(record: &RawPeriodRecord, shape: KeyShape) -> Option<String> {
    match shape {
        KeyShape::Date => record.date().map(|d| d.to_string()),
        KeyShape::FiscalPeriod => {
            let year = record
                .calendar_year()
                .or_else(|| record.date().map(|d| d.year()))?;
            Some(match record.period() {
                Some(p) => format!("{year}-{p}"),
                None => year.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(date: &str, marker: f64) -> RawPeriodRecord {
        serde_json::from_value(json!({"date": date, "marker": marker})).unwrap()
    }

    fn markers(pairs: &[StatementPair<'_>]) -> Vec<(f64, f64)> {
        pairs
            .iter()
            .map(|(i, c)| (i.number("marker"), c.number("marker")))
            .collect()
    }

    #[test]
    fn by_period_matches_regardless_of_order() {
        let income = vec![rec("2023-12-31", 1.0), rec("2022-12-31", 2.0)];
        let cashflow = vec![rec("2022-12-31", 20.0), rec("2023-12-31", 10.0)];
        let pairs = pair_statements(&income, &cashflow, PairingMode::ByPeriod).unwrap();
        assert_eq!(markers(&pairs), vec![(1.0, 10.0), (2.0, 20.0)]);
    }

    #[test]
    fn by_period_reports_misalignment() {
        let income = vec![rec("2023-12-31", 1.0), rec("2022-12-31", 2.0)];
        let cashflow = vec![rec("2022-12-31", 20.0), rec("2021-12-31", 30.0)];
        let err = pair_statements(&income, &cashflow, PairingMode::ByPeriod).unwrap_err();
        assert_eq!(
            err,
            StatementError::Misaligned {
                income_only: vec!["2023-12-31".to_string()],
                cashflow_only: vec!["2021-12-31".to_string()],
            }
        );
    }

    #[test]
    fn by_period_rejects_duplicates_and_missing_keys() {
        let income = vec![rec("2023-12-31", 1.0), rec("2023-12-31", 2.0)];
        let cashflow = vec![rec("2023-12-31", 10.0)];
        assert!(matches!(
            pair_statements(&income, &cashflow, PairingMode::ByPeriod),
            Err(StatementError::DuplicatePeriod { side: "income", .. })
        ));

        let keyless: RawPeriodRecord = serde_json::from_value(json!({"revenue": 1.0})).unwrap();
        let income = vec![keyless];
        assert!(matches!(
            pair_statements(&income, &cashflow, PairingMode::ByPeriod),
            Err(StatementError::MissingPeriodKey { side: "income", index: 0 })
        ));
    }

    #[test]
    fn falls_back_to_calendar_year_and_period() {
        let i: RawPeriodRecord =
            serde_json::from_value(json!({"calendarYear": "2023", "period": "Q4", "marker": 1.0}))
                .unwrap();
        let c: RawPeriodRecord =
            serde_json::from_value(json!({"calendarYear": 2023, "period": "Q4", "marker": 9.0}))
                .unwrap();
        let (income, cashflow) = (vec![i], vec![c]);
        let pairs = pair_statements(&income, &cashflow, PairingMode::ByPeriod).unwrap();
        assert_eq!(markers(&pairs), vec![(1.0, 9.0)]);
    }

    #[test]
    fn mixed_key_shapes_pair_on_fiscal_period() {
        let i: RawPeriodRecord = serde_json::from_value(
            json!({"date": "2023-12-31", "calendarYear": "2023", "period": "FY", "marker": 1.0}),
        )
        .unwrap();
        let c: RawPeriodRecord =
            serde_json::from_value(json!({"calendarYear": "2023", "period": "FY", "marker": 9.0}))
                .unwrap();
        let (income, cashflow) = (vec![i], vec![c]);
        let pairs = pair_statements(&income, &cashflow, PairingMode::ByPeriod).unwrap();
        assert_eq!(markers(&pairs), vec![(1.0, 9.0)]);
    }

    #[test]
    fn missing_key_index_points_into_provider_list() {
        let keyless: RawPeriodRecord = serde_json::from_value(json!({"revenue": 1.0})).unwrap();
        let income = vec![RawPeriodRecord::default(), rec("2023-12-31", 1.0), keyless];
        let cashflow = vec![rec("2023-12-31", 10.0)];
        assert!(matches!(
            pair_statements(&income, &cashflow, PairingMode::ByPeriod),
            Err(StatementError::MissingPeriodKey { side: "income", index: 2 })
        ));
    }

    #[test]
    fn positional_truncates_to_shorter_list() {
        let income = vec![rec("2023-12-31", 1.0), rec("2022-12-31", 2.0), rec("2021-12-31", 3.0)];
        let cashflow = vec![rec("2023-12-31", 10.0), rec("2020-12-31", 40.0)];
        let pairs = pair_statements(&income, &cashflow, PairingMode::Positional).unwrap();
        assert_eq!(markers(&pairs), vec![(1.0, 10.0), (2.0, 40.0)]);
    }

    #[test]
    fn empty_side_yields_no_pairs() {
        let income = vec![rec("2023-12-31", 1.0)];
        let empty: Vec<RawPeriodRecord> = Vec::new();
        for mode in [PairingMode::ByPeriod, PairingMode::Positional] {
            assert!(pair_statements(&income, &empty, mode).unwrap().is_empty());
            assert!(pair_statements(&empty, &income, mode).unwrap().is_empty());
        }
        let blank = vec![RawPeriodRecord::default()];
        assert!(pair_statements(&income, &blank, PairingMode::ByPeriod)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn parses_mode_names() {
        assert_eq!("by_period".parse::<PairingMode>().unwrap(), PairingMode::ByPeriod);
        assert_eq!("Positional".parse::<PairingMode>().unwrap(), PairingMode::Positional);
        assert!("fuzzy".parse::<PairingMode>().is_err());
    }
}
