use crate::domain::error::{PeriodError, SymbolError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MAX_SYMBOL_LEN: usize = 5;

/// Upper-cased exchange ticker, 1-5 ASCII letters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn parse(raw: &str) -> Result<Self, SymbolError> {
        let s = raw.trim().to_ascii_uppercase();
        if s.is_empty() {
            return Err(SymbolError::Empty);
        }
        if s.len() > MAX_SYMBOL_LEN || !s.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(SymbolError::Invalid(s));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Annual,
    Quarter,
}

impl Period {
    /// Value of the provider's `period` query parameter.
    pub fn as_query(self) -> &'static str {
        match self {
            Period::Annual => "annual",
            Period::Quarter => "quarter",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query())
    }
}

impl FromStr for Period {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "annual" | "a" | "fy" | "yearly" => Ok(Period::Annual),
            "quarter" | "quarterly" | "q" => Ok(Period::Quarter),
            _ => Err(PeriodError(s.to_string())),
        }
    }
}
