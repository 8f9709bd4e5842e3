use crate::core::config::VendorConfig;
use crate::core::error::Result;
use crate::core::financials::{
    BalanceSheet, CashFlow, IncomeStatement, Vendor, group_by_period, normalize_ticker,
};
use crate::core::metrics::DerivedMetrics;
use crate::service::refresh::RefreshService;
use crate::store::{CacheEntry, CacheStore, StoreError};
use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A vendor's latest fiscal period with its metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorSummary {
    pub vendor: Vendor,
    pub fiscal_date_ending: Option<NaiveDate>,
    pub balance_sheet: Option<BalanceSheet>,
    pub income_statement: Option<IncomeStatement>,
    pub cash_flow: Option<CashFlow>,
    pub metrics: Option<DerivedMetrics>,
    pub market_cap: Option<f64>,
    pub last_refreshed: Option<DateTime<Utc>>,
    pub stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VendorSummary {
    fn from_entry(entry: &CacheEntry, stale: bool) -> Self {
        let periods = group_by_period(entry.records());
        let latest = periods.values().next_back();

        Self {
            vendor: entry.vendor.clone(),
            fiscal_date_ending: latest.map(|p| p.fiscal_date_ending),
            balance_sheet: latest.and_then(|p| p.balance_sheet.cloned()),
            income_statement: latest.and_then(|p| p.income_statement.cloned()),
            cash_flow: latest.and_then(|p| p.cash_flow.cloned()),
            metrics: entry.metrics().last().cloned(),
            market_cap: entry.vendor.market_cap,
            last_refreshed: Some(entry.last_refreshed),
            stale,
            error: None,
        }
    }

    /// Stand-in for a configured vendor whose data could not be loaded.
    fn placeholder(config: &VendorConfig, error: String, now: DateTime<Utc>) -> Self {
        Self {
            vendor: Vendor {
                ticker: config.ticker.clone(),
                name: config.name.clone(),
                sector: config.sector.clone(),
                industry: config.industry.clone(),
                description: None,
                market_cap: None,
                created_at: now,
            },
            fiscal_date_ending: None,
            balance_sheet: None,
            income_statement: None,
            cash_flow: None,
            metrics: None,
            market_cap: None,
            last_refreshed: None,
            stale: false,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub vendors: Vec<VendorSummary>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub fiscal_year: i32,
    pub fiscal_date_ending: NaiveDate,
    pub total_revenue: Option<f64>,
    pub net_income: Option<f64>,
    pub operating_income: Option<f64>,
    pub gross_profit: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub ticker: String,
    pub stale: bool,
    pub trends: Vec<TrendPoint>,
}

/// Read side of the dashboard. Serves cached data, refreshing it on demand.
pub struct QueryService {
    store: Arc<CacheStore>,
    refresh: Arc<RefreshService>,
    vendors: Vec<VendorConfig>,
}

impl QueryService {
    pub fn new(
        store: Arc<CacheStore>,
        refresh: Arc<RefreshService>,
        vendors: Vec<VendorConfig>,
    ) -> Self {
        Self {
            store,
            refresh,
            vendors,
        }
    }

    pub fn vendors(&self) -> &[VendorConfig] {
        &self.vendors
    }

    /// Loads the entry for `ticker` and reports whether it is stale.
    ///
    /// A stale entry is served as is while a refresh runs in the background.
    /// Without a readable entry the caller waits for the refresh.
    async fn load(&self, ticker: &str) -> Result<(CacheEntry, bool)> {
        let ticker = normalize_ticker(ticker)?;
        match self.store.get(&ticker) {
            Ok(Some(entry)) => {
                if self.store.is_entry_stale(&entry, self.store.now()) {
                    debug!("Serving stale data for {} while refreshing", ticker);
                    drop(self.refresh.begin(&ticker));
                    Ok((entry, true))
                } else {
                    Ok((entry, false))
                }
            }
            Ok(None) => {
                debug!("No cached data for {}, refreshing", ticker);
                Ok((self.refresh.refresh(&ticker).await?, false))
            }
            Err(e) => {
                warn!("Failed to read cached data for {}: {}", ticker, e);
                Ok((self.refresh.refresh(&ticker).await?, false))
            }
        }
    }

    pub async fn get_summary(&self, ticker: &str) -> Result<VendorSummary> {
        let (entry, stale) = self.load(ticker).await?;
        Ok(VendorSummary::from_entry(&entry, stale))
    }

    /// Refreshes `ticker` now and returns the fresh summary.
    pub async fn refresh_summary(&self, ticker: &str) -> Result<VendorSummary> {
        let entry = self.refresh.refresh(ticker).await?;
        Ok(VendorSummary::from_entry(&entry, false))
    }

    /// Summaries for the configured vendors, in configured order.
    pub async fn get_comparison(&self) -> Comparison {
        let summaries = join_all(self.vendors.iter().map(|v| self.get_summary(&v.ticker))).await;
        let now = self.store.now();

        let vendors = self
            .vendors
            .iter()
            .zip(summaries)
            .map(|(config, summary)| {
                summary.unwrap_or_else(|e| {
                    warn!("Comparison is missing {}: {}", config.ticker, e);
                    VendorSummary::placeholder(config, e.to_string(), now)
                })
            })
            .collect();

        Comparison {
            vendors,
            generated_at: now,
        }
    }

    /// Revenue and income history, oldest period first. Periods with only a
    /// balance sheet are left out.
    pub async fn get_trends(&self, ticker: &str) -> Result<TrendSeries> {
        let (entry, stale) = self.load(ticker).await?;
        let trends = group_by_period(entry.records())
            .values()
            .filter(|period| period.income_statement.is_some() || period.cash_flow.is_some())
            .map(|period| {
                let income = period.income_statement;
                TrendPoint {
                    fiscal_year: period.fiscal_year(),
                    fiscal_date_ending: period.fiscal_date_ending,
                    total_revenue: income.and_then(|i| i.total_revenue),
                    net_income: period.net_income(),
                    operating_income: income.and_then(|i| i.operating_income),
                    gross_profit: income.and_then(|i| i.gross_profit),
                }
            })
            .collect();

        Ok(TrendSeries {
            ticker: entry.ticker().to_string(),
            stale,
            trends,
        })
    }

    /// The provider's company overview, or a minimal one built from the
    /// stored vendor.
    pub async fn get_overview(&self, ticker: &str) -> Result<Value> {
        let (entry, _) = self.load(ticker).await?;
        if let Some(overview) = entry.overview {
            return Ok(overview);
        }

        let vendor = entry.vendor;
        Ok(json!({
            "Symbol": vendor.ticker,
            "Name": vendor.name,
            "Sector": vendor.sector,
            "Industry": vendor.industry,
            "Description": vendor.description,
            "MarketCapitalization": vendor.market_cap,
        }))
    }

    /// Metrics for every stored period, newest first.
    pub async fn get_metrics(&self, ticker: &str) -> Result<Vec<DerivedMetrics>> {
        let (entry, _) = self.load(ticker).await?;
        Ok(entry.metrics().iter().rev().cloned().collect())
    }

    /// The stored vendor for `ticker`, without fetching.
    pub fn get_vendor(&self, ticker: &str) -> std::result::Result<Option<Vendor>, StoreError> {
        let Ok(ticker) = normalize_ticker(ticker) else {
            return Ok(None);
        };
        Ok(self.store.get(&ticker)?.map(|entry| entry.vendor))
    }

    /// Drops the cached entry for `ticker`. Returns false if there was none.
    pub fn evict(&self, ticker: &str) -> std::result::Result<bool, StoreError> {
        let Ok(ticker) = normalize_ticker(ticker) else {
            return Ok(false);
        };
        if self.store.get(&ticker)?.is_none() {
            return Ok(false);
        }
        self.store.remove(&ticker)?;
        info!("Evicted cached data for {}", ticker);
        Ok(true)
    }

    /// Drops every cached entry and returns how many were removed.
    pub fn clear_cache(&self) -> std::result::Result<usize, StoreError> {
        let tickers = self.store.tickers()?;
        for ticker in &tickers {
            self.store.remove(ticker)?;
        }
        info!("Cleared {} cached vendors", tickers.len());
        Ok(tickers.len())
    }

    /// Vendors currently in the store.
    pub fn list_vendors(&self) -> std::result::Result<Vec<Vendor>, StoreError> {
        let mut vendors = Vec::new();
        for ticker in self.store.tickers()? {
            match self.store.get(&ticker) {
                Ok(Some(entry)) => vendors.push(entry.vendor),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable entry for {}: {}", ticker, e),
            }
        }
        Ok(vendors)
    }
}
