use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One statement row as the provider sent it. Keys follow the provider's camelCase naming.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawPeriodRecord(Map<String, Value>);

impl RawPeriodRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Numeric field; absent, null and unparseable values read as zero.
    pub fn number(&self, key: &str) -> f64 {
        self.number_opt(key).unwrap_or(0.0)
    }

    pub fn number_opt(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => parse_num(s),
            _ => None,
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// `date` as `YYYY-MM-DD`. Longer timestamps are truncated to their date prefix.
    pub fn date(&self) -> Option<NaiveDate> {
        let s = self.text("date")?;
        let prefix = s.get(..10).unwrap_or(s);
        NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
    }

    /// `calendarYear` may arrive as a string ("2023") or a number.
    pub fn calendar_year(&self) -> Option<i32> {
        match self.0.get("calendarYear")? {
            Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
            Value::String(s) => s.trim().parse::<i32>().ok(),
            _ => None,
        }
    }

    pub fn period(&self) -> Option<&str> {
        self.text("period")
    }
}

impl From<Map<String, Value>> for RawPeriodRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default, alias = "mktCap")]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub shares_outstanding: Option<f64>,
}

fn parse_num(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    t.parse::<f64>().ok()
}
