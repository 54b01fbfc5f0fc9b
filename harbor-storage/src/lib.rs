//! Harbor Storage - Single-Table Store and DB Client
//!
//! Defines the wide-column key-value abstraction the hierarchy is stored in,
//! the record codec, an in-memory and an LMDB backend, and the
//! [`HarborDbClient`] that implements cascading create/get/update/delete on
//! top of any backend.

pub mod client;
pub mod codec;
pub mod key;
pub mod lmdb_backend;

pub use client::HarborDbClient;
pub use codec::{decode, decode_as, encode, Attributes, StoredRecord};
pub use key::{kind_prefix, sort_key, RecordKey, SEPARATOR};
pub use lmdb_backend::{LmdbStore, LmdbStoreError};

use harbor_core::{HarborError, HarborResult, StoreBackend, StoreConfig};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Wide-column key-value table holding every Harbor record.
///
/// Records are addressed by partition key + sort key. Within a partition,
/// `query` returns records ordered by sort key.
pub trait KeyValueStore: Send + Sync {
    /// Fetch a single record.
    fn get(&self, key: &RecordKey) -> HarborResult<Option<StoredRecord>>;

    /// Insert or overwrite a record.
    fn put(&self, record: &StoredRecord) -> HarborResult<()>;

    /// Remove a record. Returns whether it existed.
    fn delete(&self, key: &RecordKey) -> HarborResult<bool>;

    /// All records in `partition_key` whose sort key starts with `sort_prefix`.
    fn query(&self, partition_key: &str, sort_prefix: &str) -> HarborResult<Vec<StoredRecord>>;

    /// Remove many records in one call. Returns how many existed.
    fn batch_delete(&self, keys: &[RecordKey]) -> HarborResult<u64>;

    /// Records in every partition whose sort key starts with `sort_prefix`.
    fn scan(&self, sort_prefix: &str) -> HarborResult<Vec<StoredRecord>>;
}

/// Open the backend described by `config`.
pub fn open_store(config: &StoreConfig) -> HarborResult<Arc<dyn KeyValueStore>> {
    config.validate()?;
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryStore::new())),
        StoreBackend::Lmdb => {
            let path = config.path.as_deref().ok_or_else(|| {
                HarborError::from(harbor_core::ConfigError::MissingRequired {
                    field: "HARBOR_STORE_PATH".to_string(),
                })
            })?;
            Ok(Arc::new(LmdbStore::new(path, config.max_size_mb)?))
        }
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Process-local store backed by an ordered map.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    records: Arc<RwLock<BTreeMap<RecordKey, Attributes>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> HarborResult<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> HarborResult<bool> {
        Ok(self.read()?.is_empty())
    }

    /// Drop every record.
    pub fn clear(&self) -> HarborResult<()> {
        self.write()?.clear();
        Ok(())
    }

    fn read(&self) -> HarborResult<RwLockReadGuard<'_, BTreeMap<RecordKey, Attributes>>> {
        self.records
            .read()
            .map_err(|_| HarborError::unavailable("in-memory store lock poisoned"))
    }

    fn write(&self) -> HarborResult<RwLockWriteGuard<'_, BTreeMap<RecordKey, Attributes>>> {
        self.records
            .write()
            .map_err(|_| HarborError::unavailable("in-memory store lock poisoned"))
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &RecordKey) -> HarborResult<Option<StoredRecord>> {
        let records = self.read()?;
        Ok(records
            .get(key)
            .map(|attributes| StoredRecord::new(key.clone(), attributes.clone())))
    }

    fn put(&self, record: &StoredRecord) -> HarborResult<()> {
        self.write()?
            .insert(record.key.clone(), record.attributes.clone());
        Ok(())
    }

    fn delete(&self, key: &RecordKey) -> HarborResult<bool> {
        Ok(self.write()?.remove(key).is_some())
    }

    fn query(&self, partition_key: &str, sort_prefix: &str) -> HarborResult<Vec<StoredRecord>> {
        let records = self.read()?;
        let start = RecordKey::new(partition_key, sort_prefix);
        Ok(records
            .range((Bound::Included(start), Bound::Unbounded))
            .take_while(|(key, _)| {
                key.partition_key() == partition_key && key.sort_key().starts_with(sort_prefix)
            })
            .map(|(key, attributes)| StoredRecord::new(key.clone(), attributes.clone()))
            .collect())
    }

    fn batch_delete(&self, keys: &[RecordKey]) -> HarborResult<u64> {
        let mut records = self.write()?;
        let removed = keys
            .iter()
            .filter(|key| records.remove(*key).is_some())
            .count();
        Ok(removed as u64)
    }

    fn scan(&self, sort_prefix: &str) -> HarborResult<Vec<StoredRecord>> {
        let records = self.read()?;
        Ok(records
            .iter()
            .filter(|(key, _)| key.sort_key().starts_with(sort_prefix))
            .map(|(key, attributes)| StoredRecord::new(key.clone(), attributes.clone()))
            .collect())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(partition: &str, sort: &str, name: &str) -> StoredRecord {
        let mut attributes = Attributes::new();
        attributes.insert("name".to_string(), json!(name));
        StoredRecord::new(RecordKey::new(partition, sort), attributes)
    }

    fn sort_keys(records: &[StoredRecord]) -> Vec<&str> {
        records.iter().map(|r| r.key.sort_key()).collect()
    }

    #[test]
    fn test_put_get_overwrite() -> HarborResult<()> {
        let store = InMemoryStore::new();
        store.put(&record("t1", "TEAM#t1", "first"))?;
        store.put(&record("t1", "TEAM#t1", "second"))?;

        let fetched = store.get(&RecordKey::new("t1", "TEAM#t1"))?;
        assert_eq!(fetched, Some(record("t1", "TEAM#t1", "second")));
        assert_eq!(store.len()?, 1);
        Ok(())
    }

    #[test]
    fn test_delete_reports_existence() -> HarborResult<()> {
        let store = InMemoryStore::new();
        store.put(&record("t1", "TEAM#t1", "t"))?;

        assert!(store.delete(&RecordKey::new("t1", "TEAM#t1"))?);
        assert!(!store.delete(&RecordKey::new("t1", "TEAM#t1"))?);
        assert!(store.is_empty()?);
        Ok(())
    }

    #[test]
    fn test_query_is_partition_scoped_and_ordered() -> HarborResult<()> {
        let store = InMemoryStore::new();
        store.put(&record("t1", "TEAM#t1", "t"))?;
        store.put(&record("t1", "PROJECT#p2", "p2"))?;
        store.put(&record("t1", "PROJECT#p1", "p1"))?;
        store.put(&record("t1", "CODEBASE#c1", "c1"))?;
        store.put(&record("t10", "PROJECT#p9", "other"))?;
        store.put(&record("t0", "PROJECT#p0", "other"))?;

        let all = store.query("t1", "")?;
        assert_eq!(
            sort_keys(&all),
            vec!["CODEBASE#c1", "PROJECT#p1", "PROJECT#p2", "TEAM#t1"]
        );

        let projects = store.query("t1", "PROJECT#")?;
        assert_eq!(sort_keys(&projects), vec!["PROJECT#p1", "PROJECT#p2"]);

        assert!(store.query("missing", "")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_batch_delete_counts_existing() -> HarborResult<()> {
        let store = InMemoryStore::new();
        store.put(&record("t1", "TEAM#t1", "t"))?;
        store.put(&record("t1", "PROJECT#p1", "p1"))?;

        let removed = store.batch_delete(&[
            RecordKey::new("t1", "TEAM#t1"),
            RecordKey::new("t1", "PROJECT#p1"),
            RecordKey::new("t1", "PROJECT#gone"),
        ])?;
        assert_eq!(removed, 2);
        assert!(store.is_empty()?);
        Ok(())
    }

    #[test]
    fn test_scan_crosses_partitions() -> HarborResult<()> {
        let store = InMemoryStore::new();
        store.put(&record("t1", "TEAM#t1", "one"))?;
        store.put(&record("t2", "TEAM#t2", "two"))?;
        store.put(&record("t2", "PROJECT#p1", "p"))?;

        let teams = store.scan("TEAM#")?;
        assert_eq!(teams.len(), 2);
        assert!(teams.iter().all(|r| r.key.sort_key().starts_with("TEAM#")));
        Ok(())
    }

    #[test]
    fn test_clones_share_records() -> HarborResult<()> {
        let store = InMemoryStore::new();
        let other = store.clone();
        store.put(&record("t1", "TEAM#t1", "t"))?;
        assert_eq!(other.len()?, 1);

        other.clear()?;
        assert!(store.is_empty()?);
        Ok(())
    }

    #[test]
    fn test_open_store_memory_default() -> HarborResult<()> {
        let store = open_store(&StoreConfig::default())?;
        store.put(&record("t1", "TEAM#t1", "t"))?;
        assert_eq!(store.query("t1", "")?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_open_store_lmdb_without_path_fails() {
        let config = StoreConfig {
            backend: StoreBackend::Lmdb,
            ..Default::default()
        };
        assert!(matches!(open_store(&config), Err(HarborError::Config(_))));
    }
}
