pub mod disk;
pub mod memory;

use crate::core::clock::Clock;
use crate::core::config::AppConfig;
use crate::core::financials::{FinancialStatementRecord, Vendor};
use crate::core::metrics::{self, DerivedMetrics};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use disk::DiskCollection;
use memory::MemoryCollection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(#[from] fjall::Error),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode or decode cache entry: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Everything cached for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub vendor: Vendor,
    pub overview: Option<Value>,
    records: Vec<FinancialStatementRecord>,
    metrics: Vec<DerivedMetrics>,
    pub last_refreshed: DateTime<Utc>,
}

impl CacheEntry {
    /// Builds an entry whose metrics are derived from `records`, so every
    /// stored metric has a backing record.
    pub fn new(
        vendor: Vendor,
        overview: Option<Value>,
        records: Vec<FinancialStatementRecord>,
        last_refreshed: DateTime<Utc>,
    ) -> Self {
        let metrics = metrics::compute_all(&vendor.ticker, &records);
        Self {
            vendor,
            overview,
            records,
            metrics,
            last_refreshed,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.vendor.ticker
    }

    pub fn records(&self) -> &[FinancialStatementRecord] {
        &self.records
    }

    /// Metrics per fiscal period, oldest first.
    pub fn metrics(&self) -> &[DerivedMetrics] {
        &self.metrics
    }

    pub fn into_records(self) -> Vec<FinancialStatementRecord> {
        self.records
    }
}

/// A collection of cache entries keyed by ticker.
pub trait EntryCollection: Send + Sync {
    fn get(&self, ticker: &str) -> Result<Option<CacheEntry>, StoreError>;
    fn put(&self, entry: CacheEntry) -> Result<(), StoreError>;
    fn remove(&self, ticker: &str) -> Result<(), StoreError>;
    fn tickers(&self) -> Result<Vec<String>, StoreError>;
}

/// Ticker-keyed store with a freshness window measured by an injected clock.
pub struct CacheStore {
    collection: Arc<dyn EntryCollection>,
    clock: Arc<dyn Clock>,
    freshness: Duration,
}

impl CacheStore {
    pub fn new(
        collection: Arc<dyn EntryCollection>,
        clock: Arc<dyn Clock>,
        freshness: Duration,
    ) -> Self {
        Self {
            collection,
            clock,
            freshness,
        }
    }

    pub fn in_memory(clock: Arc<dyn Clock>, freshness: Duration) -> Self {
        Self::new(Arc::new(MemoryCollection::new()), clock, freshness)
    }

    /// Opens the backend selected by `cache.persist`.
    pub fn open(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let freshness = Duration::hours(i64::from(config.cache.freshness_hours));
        if !config.cache.persist {
            debug!("Using in-memory cache store");
            return Ok(Self::in_memory(clock, freshness));
        }

        let path = config.default_data_path()?.join("cache");
        let collection = DiskCollection::open(&path)
            .with_context(|| format!("Failed to open cache store at {}", path.display()))?;
        debug!("Using disk cache store at {}", path.display());
        Ok(Self::new(Arc::new(collection), clock, freshness))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    pub fn get(&self, ticker: &str) -> Result<Option<CacheEntry>, StoreError> {
        self.collection.get(ticker)
    }

    pub fn put(&self, entry: CacheEntry) -> Result<(), StoreError> {
        self.collection.put(entry)
    }

    pub fn remove(&self, ticker: &str) -> Result<(), StoreError> {
        self.collection.remove(ticker)
    }

    pub fn tickers(&self) -> Result<Vec<String>, StoreError> {
        self.collection.tickers()
    }

    /// True when the ticker has no readable entry or its entry is older than
    /// the freshness window at `now`.
    pub fn is_stale(&self, ticker: &str, now: DateTime<Utc>) -> bool {
        match self.collection.get(ticker) {
            Ok(Some(entry)) => self.is_entry_stale(&entry, now),
            Ok(None) => true,
            Err(e) => {
                debug!("Treating unreadable entry for {} as stale: {}", ticker, e);
                true
            }
        }
    }

    pub fn is_entry_stale(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now - entry.last_refreshed > self.freshness
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::financials::{BalanceSheet, Statement};
    use chrono::{NaiveDate, TimeZone};

    pub(crate) fn sample_vendor(ticker: &str, created_at: DateTime<Utc>) -> Vendor {
        Vendor {
            ticker: ticker.to_string(),
            name: format!("{ticker} Inc"),
            sector: Some("Technology".to_string()),
            industry: None,
            description: None,
            market_cap: None,
            created_at,
        }
    }

    pub(crate) fn sample_entry(ticker: &str, refreshed: DateTime<Utc>) -> CacheEntry {
        let record = FinancialStatementRecord {
            ticker: ticker.to_string(),
            fiscal_date_ending: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            reported_currency: Some("USD".to_string()),
            statement: Statement::BalanceSheet(BalanceSheet {
                total_current_assets: Some(150.0),
                total_current_liabilities: Some(100.0),
                ..Default::default()
            }),
        };
        CacheEntry::new(sample_vendor(ticker, refreshed), None, vec![record], refreshed)
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_entry_metrics_are_derived_from_records() {
        let entry = sample_entry("TEL", start());
        assert_eq!(entry.metrics().len(), 1);
        assert_eq!(entry.metrics()[0].current_ratio, Some(1.5));
        assert_eq!(
            entry.metrics()[0].fiscal_date_ending,
            entry.records()[0].fiscal_date_ending
        );

        let empty = CacheEntry::new(sample_vendor("ST", start()), None, vec![], start());
        assert!(empty.metrics().is_empty());
    }

    #[test]
    fn test_is_stale_follows_freshness_window() {
        let clock = Arc::new(ManualClock::new(start()));
        let store = CacheStore::in_memory(clock.clone(), Duration::hours(24));

        assert!(store.is_stale("TEL", store.now()));

        store.put(sample_entry("TEL", store.now())).unwrap();
        assert!(!store.is_stale("TEL", store.now()));

        clock.advance(Duration::hours(24));
        assert!(!store.is_stale("TEL", store.now()));

        clock.advance(Duration::seconds(1));
        assert!(store.is_stale("TEL", store.now()));
    }

    #[test]
    fn test_put_overwrites_entry() {
        let clock = Arc::new(ManualClock::new(start()));
        let store = CacheStore::in_memory(clock.clone(), Duration::hours(24));

        store.put(sample_entry("TEL", start())).unwrap();
        clock.advance(Duration::hours(30));
        store.put(sample_entry("TEL", clock.now())).unwrap();

        let entry = store.get("TEL").unwrap().unwrap();
        assert_eq!(entry.last_refreshed, clock.now());
        assert_eq!(store.tickers().unwrap(), vec!["TEL".to_string()]);
    }
}
