//! Upstream data source abstraction

use crate::core::error::Result;
use crate::core::financials::FinancialStatementRecord;
use async_trait::async_trait;
use serde_json::Value;

/// Everything fetched for one company in a single refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyFinancials {
    /// Company overview as returned by the provider, if it had one.
    pub overview: Option<Value>,
    pub records: Vec<FinancialStatementRecord>,
}

impl CompanyFinancials {
    pub fn overview_str(&self, field: &str) -> Option<&str> {
        overview_str(self.overview.as_ref(), field)
    }
}

/// Reads a non-empty string field from an overview object. The provider
/// uses `"None"` for missing values.
pub fn overview_str<'a>(overview: Option<&'a Value>, field: &str) -> Option<&'a str> {
    overview?
        .get(field)?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "None" && *s != "-")
}

#[async_trait]
pub trait FinancialDataProvider: Send + Sync {
    async fn fetch_financials(&self, ticker: &str) -> Result<CompanyFinancials>;
}
