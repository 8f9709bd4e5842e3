//! Refresh and query orchestration over the cache store.

pub mod query;
pub mod refresh;

pub use query::{Comparison, QueryService, TrendPoint, TrendSeries, VendorSummary};
pub use refresh::{InitializeReport, RefreshFailure, RefreshService, SharedRefresh};

#[cfg(test)]
pub(crate) mod tests {
    use crate::core::config::{AppConfig, VendorConfig};
    use crate::core::error::{Result, VendorError};
    use crate::core::financials::{
        BalanceSheet, FinancialStatementRecord, IncomeStatement, Statement,
    };
    use crate::core::provider::{CompanyFinancials, FinancialDataProvider};
    use async_trait::async_trait;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Provider returning canned results per ticker and counting calls.
    #[derive(Default)]
    pub(crate) struct MockProvider {
        pub calls: AtomicUsize,
        delay: Duration,
        results: Mutex<HashMap<String, Result<CompanyFinancials>>>,
    }

    impl MockProvider {
        pub fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Default::default()
            }
        }

        pub fn set(&self, ticker: &str, result: Result<CompanyFinancials>) {
            self.results
                .lock()
                .unwrap()
                .insert(ticker.to_string(), result);
        }
    }

    #[async_trait]
    impl FinancialDataProvider for MockProvider {
        async fn fetch_financials(&self, ticker: &str) -> Result<CompanyFinancials> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = self
                .results
                .lock()
                .unwrap()
                .get(ticker)
                .cloned()
                .unwrap_or_else(|| Err(VendorError::TickerNotFound(ticker.to_string())));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            result
        }
    }

    pub(crate) fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
    }

    pub(crate) fn target_vendors() -> Vec<VendorConfig> {
        AppConfig::default().vendors
    }

    /// Balance sheet and income statement per `(fiscal year, revenue)`.
    pub(crate) fn company(ticker: &str, years: &[(i32, f64)]) -> CompanyFinancials {
        let mut records = Vec::new();
        for (year, revenue) in years {
            let fiscal_date_ending = NaiveDate::from_ymd_opt(*year, 12, 31).unwrap();
            records.push(FinancialStatementRecord {
                ticker: ticker.to_string(),
                fiscal_date_ending,
                reported_currency: Some("USD".to_string()),
                statement: Statement::BalanceSheet(BalanceSheet {
                    total_assets: Some(1000.0),
                    total_current_assets: Some(150.0),
                    inventory: Some(30.0),
                    total_liabilities: Some(400.0),
                    total_current_liabilities: Some(100.0),
                    total_shareholder_equity: Some(600.0),
                    ..Default::default()
                }),
            });
            records.push(FinancialStatementRecord {
                ticker: ticker.to_string(),
                fiscal_date_ending,
                reported_currency: Some("USD".to_string()),
                statement: Statement::IncomeStatement(IncomeStatement {
                    total_revenue: Some(*revenue),
                    gross_profit: Some(revenue * 0.4),
                    operating_income: Some(revenue * 0.2),
                    net_income: Some(revenue * 0.1),
                    ..Default::default()
                }),
            });
        }
        CompanyFinancials {
            overview: None,
            records,
        }
    }
}
