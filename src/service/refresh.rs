use crate::core::config::VendorConfig;
use crate::core::error::{Result, VendorError};
use crate::core::financials::{Vendor, merge_records, normalize_ticker};
use crate::core::provider::{CompanyFinancials, FinancialDataProvider};
use crate::providers::util::parse_reported_value;
use crate::store::{CacheEntry, CacheStore};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared, join_all};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

/// A refresh that any number of callers can await.
pub type SharedRefresh = Shared<BoxFuture<'static, Result<CacheEntry>>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshFailure {
    pub ticker: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InitializeReport {
    pub refreshed: Vec<String>,
    pub failed: Vec<RefreshFailure>,
}

/// Fetches upstream data and writes it through to the cache, running at most
/// one refresh per ticker at a time.
pub struct RefreshService {
    store: Arc<CacheStore>,
    provider: Arc<dyn FinancialDataProvider>,
    vendors: Vec<VendorConfig>,
    in_flight: Mutex<HashMap<String, SharedRefresh>>,
}

/// Clears the in-flight slot when the refresh task ends, including by panic.
struct InFlightSlot {
    service: Arc<RefreshService>,
    ticker: String,
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.service.lock_in_flight().remove(&self.ticker);
    }
}

impl RefreshService {
    pub fn new(
        store: Arc<CacheStore>,
        provider: Arc<dyn FinancialDataProvider>,
        vendors: Vec<VendorConfig>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            provider,
            vendors,
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    /// Starts a refresh for `ticker`, or joins the one already running.
    ///
    /// The work runs on a spawned task, so it completes and populates the
    /// cache even if every returned handle is dropped.
    pub fn begin(self: &Arc<Self>, ticker: &str) -> SharedRefresh {
        let ticker = match normalize_ticker(ticker) {
            Ok(ticker) => ticker,
            Err(e) => return futures::future::ready(Err(e)).boxed().shared(),
        };

        let mut in_flight = self.lock_in_flight();
        if let Some(existing) = in_flight.get(&ticker) {
            debug!("Joining in-flight refresh for {}", ticker);
            return existing.clone();
        }

        let slot = InFlightSlot {
            service: Arc::clone(self),
            ticker: ticker.clone(),
        };
        let task = tokio::spawn(async move {
            let result = slot.service.fetch_and_store(&slot.ticker).await;
            drop(slot);
            result
        });
        let refresh = async move {
            task.await.unwrap_or_else(|e| {
                Err(VendorError::UpstreamUnavailable(format!(
                    "Refresh task failed: {e}"
                )))
            })
        }
        .boxed()
        .shared();

        debug!("Started refresh for {}", ticker);
        in_flight.insert(ticker, refresh.clone());
        refresh
    }

    pub async fn refresh(self: &Arc<Self>, ticker: &str) -> Result<CacheEntry> {
        self.begin(ticker).await
    }

    /// Refreshes every ticker concurrently and reports the outcome of each.
    pub async fn refresh_all(self: &Arc<Self>, tickers: &[String]) -> InitializeReport {
        self.refresh_all_with(tickers, |_| {}).await
    }

    /// Like [`Self::refresh_all`], calling `on_complete` as each ticker finishes.
    pub async fn refresh_all_with(
        self: &Arc<Self>,
        tickers: &[String],
        on_complete: impl Fn(&str),
    ) -> InitializeReport {
        let on_complete = &on_complete;
        let refreshes = tickers.iter().map(|ticker| {
            let refresh = self.begin(ticker);
            async move {
                let result = refresh.await;
                on_complete(ticker);
                (ticker.clone(), result)
            }
        });

        let mut report = InitializeReport::default();
        for (ticker, result) in join_all(refreshes).await {
            match result {
                Ok(entry) => report.refreshed.push(entry.ticker().to_string()),
                Err(e) => report.failed.push(RefreshFailure {
                    ticker,
                    error: e.to_string(),
                }),
            }
        }
        info!(
            "Initialized {} vendors, {} failed",
            report.refreshed.len(),
            report.failed.len()
        );
        report
    }

    /// The refresh currently running for `ticker`, if any.
    pub fn in_flight(&self, ticker: &str) -> Option<SharedRefresh> {
        let ticker = normalize_ticker(ticker).ok()?;
        self.lock_in_flight().get(&ticker).cloned()
    }

    /// Waits until no refresh is running, including refreshes started while
    /// waiting.
    pub async fn wait_idle(&self) {
        loop {
            let pending: Vec<SharedRefresh> = self.lock_in_flight().values().cloned().collect();
            if pending.is_empty() {
                return;
            }
            debug!("Waiting for {} in-flight refreshes", pending.len());
            join_all(pending).await;
        }
    }

    pub fn configured_tickers(&self) -> Vec<String> {
        self.vendors.iter().map(|v| v.ticker.clone()).collect()
    }

    async fn fetch_and_store(&self, ticker: &str) -> Result<CacheEntry> {
        let financials = match self.provider.fetch_financials(ticker).await {
            Ok(financials) => financials,
            Err(e) => {
                error!("Refresh failed for {}: {}", ticker, e);
                return Err(e);
            }
        };

        let now = self.store.now();
        let previous = self.store.get(ticker).unwrap_or_else(|e| {
            warn!("Ignoring unreadable cache entry for {}: {}", ticker, e);
            None
        });

        let vendor = self.build_vendor(ticker, &financials, previous.as_ref(), now);
        let CompanyFinancials { overview, records } = financials;
        let (overview, existing) = match previous {
            Some(prev) => (overview.or(prev.overview.clone()), prev.into_records()),
            None => (overview, Vec::new()),
        };
        let entry = CacheEntry::new(vendor, overview, merge_records(existing, records), now);

        if let Err(e) = self.store.put(entry.clone()) {
            warn!("Failed to write cache entry for {}: {}", ticker, e);
        }
        info!(
            "Refreshed {} with {} fiscal periods",
            ticker,
            entry.metrics().len()
        );
        Ok(entry)
    }

    /// Configured metadata wins over the provider's overview, which wins over
    /// what was stored before.
    fn build_vendor(
        &self,
        ticker: &str,
        financials: &CompanyFinancials,
        previous: Option<&CacheEntry>,
        now: DateTime<Utc>,
    ) -> Vendor {
        let configured = self.vendors.iter().find(|v| v.ticker == ticker);
        let stored = previous.map(|p| &p.vendor);
        let overview = |field: &str| financials.overview_str(field).map(str::to_string);

        Vendor {
            ticker: ticker.to_string(),
            name: configured
                .map(|c| c.name.clone())
                .or_else(|| overview("Name"))
                .or_else(|| stored.map(|s| s.name.clone()))
                .unwrap_or_else(|| ticker.to_string()),
            sector: configured
                .and_then(|c| c.sector.clone())
                .or_else(|| overview("Sector"))
                .or_else(|| stored.and_then(|s| s.sector.clone())),
            industry: configured
                .and_then(|c| c.industry.clone())
                .or_else(|| overview("Industry"))
                .or_else(|| stored.and_then(|s| s.industry.clone())),
            description: overview("Description")
                .or_else(|| stored.and_then(|s| s.description.clone())),
            market_cap: financials
                .overview
                .as_ref()
                .and_then(|o| parse_reported_value(o.get("MarketCapitalization")))
                .or_else(|| stored.and_then(|s| s.market_cap)),
            created_at: stored.map(|s| s.created_at).unwrap_or(now),
        }
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<String, SharedRefresh>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
