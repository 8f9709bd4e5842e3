use super::{CacheEntry, EntryCollection, StoreError};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// In-memory collection, lost on restart.
#[derive(Default)]
pub struct MemoryCollection {
    inner: RwLock<BTreeMap<String, CacheEntry>>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EntryCollection for MemoryCollection {
    fn get(&self, ticker: &str) -> Result<Option<CacheEntry>, StoreError> {
        let entries = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(ticker).cloned();
        if entry.is_some() {
            debug!("Cache HIT for key: {:?}", ticker);
        } else {
            debug!("Cache MISS for key: {:?}", ticker);
        }
        Ok(entry)
    }

    fn put(&self, entry: CacheEntry) -> Result<(), StoreError> {
        let mut entries = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        debug!("Cache PUT for key: {:?}", entry.ticker());
        entries.insert(entry.ticker().to_string(), entry);
        Ok(())
    }

    fn remove(&self, ticker: &str) -> Result<(), StoreError> {
        let mut entries = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(ticker);
        debug!("Cache REMOVE for key: {:?}", ticker);
        Ok(())
    }

    fn tickers(&self) -> Result<Vec<String>, StoreError> {
        let entries = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.keys().cloned().collect())
    }
}
