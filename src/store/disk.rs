use super::{CacheEntry, EntryCollection, StoreError};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tracing::debug;

const PARTITION: &str = "vendors";

/// Fjall-backed collection. Entries are stored as JSON under the ticker.
pub struct DiskCollection {
    keyspace: Keyspace,
    vendors: PartitionHandle,
}

impl DiskCollection {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(db_path)?;

        let keyspace = Config::new(db_path.join("fjall_db")).open()?;
        let vendors = keyspace.open_partition(PARTITION, PartitionCreateOptions::default())?;
        Ok(Self { keyspace, vendors })
    }
}

impl EntryCollection for DiskCollection {
    fn get(&self, ticker: &str) -> Result<Option<CacheEntry>, StoreError> {
        match self.vendors.get(ticker)? {
            Some(value) => {
                debug!("Cache HIT for key: {:?}", ticker);
                Ok(Some(serde_json::from_slice(&value)?))
            }
            None => {
                debug!("Cache MISS for key: {:?}", ticker);
                Ok(None)
            }
        }
    }

    fn put(&self, entry: CacheEntry) -> Result<(), StoreError> {
        let value = serde_json::to_vec(&entry)?;
        self.vendors.insert(entry.ticker(), value)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!("Cache PUT for key: {:?}", entry.ticker());
        Ok(())
    }

    fn remove(&self, ticker: &str) -> Result<(), StoreError> {
        self.vendors.remove(ticker)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!("Cache REMOVE for key: {:?}", ticker);
        Ok(())
    }

    fn tickers(&self) -> Result<Vec<String>, StoreError> {
        self.vendors
            .keys()
            .map(|key| Ok(String::from_utf8_lossy(&key?).into_owned()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::sample_entry;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    #[test]
    fn test_disk_collection_get_put() {
        let dir = tempdir().unwrap();
        let collection = DiskCollection::open(dir.path()).unwrap();

        // Initially, collection is empty
        assert!(collection.get("TEL").unwrap().is_none());

        let entry = sample_entry("TEL", Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap());
        collection.put(entry.clone()).unwrap();

        assert_eq!(collection.get("TEL").unwrap(), Some(entry));
        assert!(collection.get("ST").unwrap().is_none());
    }

    #[test]
    fn test_disk_collection_survives_reopen() {
        let dir = tempdir().unwrap();
        let entry = sample_entry("LYB", Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap());
        {
            let collection = DiskCollection::open(dir.path()).unwrap();
            collection.put(entry.clone()).unwrap();
        }

        let collection = DiskCollection::open(dir.path()).unwrap();
        assert_eq!(collection.get("LYB").unwrap(), Some(entry));
        assert_eq!(collection.tickers().unwrap(), vec!["LYB"]);
    }

    #[test]
    fn test_disk_collection_remove() {
        let dir = tempdir().unwrap();
        let collection = DiskCollection::open(dir.path()).unwrap();

        collection.put(sample_entry("DD", Utc::now())).unwrap();
        collection.put(sample_entry("CE", Utc::now())).unwrap();
        collection.remove("DD").unwrap();

        assert!(collection.get("DD").unwrap().is_none());
        assert_eq!(collection.tickers().unwrap(), vec!["CE"]);
    }
}
