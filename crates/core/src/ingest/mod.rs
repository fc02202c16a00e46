pub mod provider;
pub mod types;

pub use provider::{FinancialDataProvider, FmpDataProvider};
pub use types::{CompanyProfile, Quote, RawPeriodRecord};
