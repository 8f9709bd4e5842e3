//! Core business logic abstractions

pub mod clock;
pub mod config;
pub mod error;
pub mod financials;
pub mod log;
pub mod metrics;
pub mod provider;

// Re-export main types for cleaner imports
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::VendorError;
pub use financials::{
    BalanceSheet, CashFlow, FinancialStatementRecord, IncomeStatement, Statement, StatementType,
    Vendor,
};
pub use metrics::DerivedMetrics;
pub use provider::{CompanyFinancials, FinancialDataProvider};
