//! LMDB-backed store.
//!
//! Uses the heed crate to keep the whole table in one memory-mapped LMDB
//! database. Keys are [`RecordKey::encode`] bytes, so a partition (and a
//! kind within it) is a contiguous, lexicographically ordered key range and
//! `query` is a single prefix iteration. Values are the JSON attribute object.
//!
//! Every call runs in its own transaction: reads in a read transaction,
//! `put`/`delete`/`batch_delete` in one write transaction each.

use std::path::Path;

use harbor_core::{HarborError, HarborResult, StorageError};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};

use crate::codec::{Attributes, StoredRecord};
use crate::key::RecordKey;
use crate::KeyValueStore;

/// Error type for LMDB environment operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    #[error("Failed to open database: {0}")]
    DbOpen(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for HarborError {
    fn from(e: LmdbStoreError) -> Self {
        HarborError::unavailable(e.to_string())
    }
}

/// Store backed by an LMDB environment on disk.
pub struct LmdbStore {
    env: Env,
    db: Database<Bytes, Bytes>,
}

impl std::fmt::Debug for LmdbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbStore")
            .field("path", &self.env.path())
            .finish()
    }
}

impl LmdbStore {
    /// Open (or create) a store in `path` with a map of `max_size_mb` megabytes.
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        let map_size = max_size_mb.checked_mul(1024 * 1024).ok_or_else(|| {
            LmdbStoreError::EnvOpen(format!("map size of {} MB overflows", max_size_mb))
        })?;
        std::fs::create_dir_all(&path)?;

        // The environment must not be opened twice in one process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(Self { env, db })
    }

    fn read_txn(&self) -> HarborResult<RoTxn<'_>> {
        self.env
            .read_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()).into())
    }

    fn write_txn(&self) -> HarborResult<RwTxn<'_>> {
        self.env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()).into())
    }

    fn commit(wtxn: RwTxn<'_>) -> HarborResult<()> {
        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()).into())
    }

    /// Turn a raw key/value pair into a record.
    fn to_record(key_bytes: &[u8], value_bytes: &[u8]) -> HarborResult<StoredRecord> {
        let key = RecordKey::decode(key_bytes).ok_or_else(|| StorageError::Decode {
            partition_key: String::from_utf8_lossy(key_bytes).into_owned(),
            sort_key: String::new(),
            reason: "malformed record key".to_string(),
        })?;
        let attributes: Attributes =
            serde_json::from_slice(value_bytes).map_err(|e| StorageError::Decode {
                partition_key: key.partition_key().to_string(),
                sort_key: key.sort_key().to_string(),
                reason: e.to_string(),
            })?;
        Ok(StoredRecord::new(key, attributes))
    }
}

fn transaction_error(e: heed::Error) -> HarborError {
    LmdbStoreError::Transaction(e.to_string()).into()
}

impl KeyValueStore for LmdbStore {
    fn get(&self, key: &RecordKey) -> HarborResult<Option<StoredRecord>> {
        let encoded_key = key.encode();
        let rtxn = self.read_txn()?;
        match self.db.get(&rtxn, &encoded_key).map_err(transaction_error)? {
            Some(bytes) => Self::to_record(&encoded_key, bytes).map(Some),
            None => Ok(None),
        }
    }

    fn put(&self, record: &StoredRecord) -> HarborResult<()> {
        let encoded_key = record.key.encode();
        let value_bytes = serde_json::to_vec(&record.attributes)
            .map_err(|e| HarborError::unavailable(format!("serialization failed: {}", e)))?;

        let mut wtxn = self.write_txn()?;
        self.db
            .put(&mut wtxn, &encoded_key, &value_bytes)
            .map_err(transaction_error)?;
        Self::commit(wtxn)
    }

    fn delete(&self, key: &RecordKey) -> HarborResult<bool> {
        let encoded_key = key.encode();
        let mut wtxn = self.write_txn()?;
        let deleted = self
            .db
            .delete(&mut wtxn, &encoded_key)
            .map_err(transaction_error)?;
        Self::commit(wtxn)?;
        Ok(deleted)
    }

    fn query(&self, partition_key: &str, sort_prefix: &str) -> HarborResult<Vec<StoredRecord>> {
        let prefix = RecordKey::scan_prefix(partition_key, sort_prefix);
        let rtxn = self.read_txn()?;
        let iter = self
            .db
            .prefix_iter(&rtxn, &prefix)
            .map_err(transaction_error)?;

        let mut records = Vec::new();
        for result in iter {
            let (key_bytes, value_bytes) = result.map_err(transaction_error)?;
            records.push(Self::to_record(key_bytes, value_bytes)?);
        }
        Ok(records)
    }

    fn batch_delete(&self, keys: &[RecordKey]) -> HarborResult<u64> {
        let mut wtxn = self.write_txn()?;
        let mut deleted = 0u64;
        for key in keys {
            if self
                .db
                .delete(&mut wtxn, &key.encode())
                .map_err(transaction_error)?
            {
                deleted += 1;
            }
        }
        Self::commit(wtxn)?;
        Ok(deleted)
    }

    fn scan(&self, sort_prefix: &str) -> HarborResult<Vec<StoredRecord>> {
        let rtxn = self.read_txn()?;
        let iter = self.db.iter(&rtxn).map_err(transaction_error)?;

        let mut records = Vec::new();
        for result in iter {
            let (key_bytes, value_bytes) = result.map_err(transaction_error)?;
            let record = Self::to_record(key_bytes, value_bytes)?;
            if record.key.sort_key().starts_with(sort_prefix) {
                records.push(record);
            }
        }
        Ok(records)
    }
}
