pub mod error;
pub mod pairing;
pub mod statement;
pub mod symbol;
pub mod ufcf;
pub mod valuation;

pub use error::{PeriodError, StatementError, SymbolError, ValuationError};
pub use pairing::{pair_statements, PairingMode};
pub use statement::{normalize, PeriodMetrics, StatementKind};
pub use symbol::{Period, Symbol};
pub use ufcf::{compute_series, UfcfEntry};
pub use valuation::{
    valuate, Assumptions, DiscountAnchor, MarketInputs, Recommendation, ShareCount,
    ValuationResult,
};
