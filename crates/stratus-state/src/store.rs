//! StateStore — redb-backed persistence for cluster records.
//!
//! Records are JSON-serialized into redb's `&[u8]` value column. The store
//! supports both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(CLUSTERS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Insert or overwrite a cluster record without a revision check.
    pub fn put_cluster(&self, record: &ClusterRecord) -> StateResult<()> {
        let key = record.table_key();
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(CLUSTERS).map_err(map_err!(Table))?;
            table.insert(key, value.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, revision = record.revision, "cluster stored");
        Ok(())
    }

    pub fn get_cluster(&self, id: &str) -> StateResult<Option<ClusterRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CLUSTERS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: ClusterRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    pub fn list_clusters(&self) -> StateResult<Vec<ClusterRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CLUSTERS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: ClusterRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }

    /// Delete a cluster record. Returns true if it existed.
    pub fn delete_cluster(&self, id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(CLUSTERS).map_err(map_err!(Table))?;
            existed = table.remove(id).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%id, existed, "cluster deleted");
        Ok(existed)
    }

    /// Replace a cluster's api model if its revision is still `expected_revision`.
    ///
    /// Returns the stored record with the bumped revision.
    pub fn replace_cluster_if_revision(
        &self,
        id: &str,
        expected_revision: u64,
        api_model: String,
    ) -> StateResult<ClusterRecord> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let record = {
            let mut table = txn.open_table(CLUSTERS).map_err(map_err!(Table))?;
            let current: ClusterRecord = match table.get(id).map_err(map_err!(Read))? {
                Some(guard) => {
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
                }
                None => return Err(StateError::NotFound(id.to_string())),
            };

            if current.revision != expected_revision {
                return Err(StateError::Conflict {
                    id: id.to_string(),
                    expected: expected_revision,
                    found: current.revision,
                });
            }

            let record = ClusterRecord {
                api_model,
                revision: current.revision + 1,
                updated_at: epoch_secs(),
                ..current
            };
            let value = serde_json::to_vec(&record).map_err(map_err!(Serialize))?;
            table.insert(id, value.as_slice()).map_err(map_err!(Write))?;
            record
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%id, revision = record.revision, "cluster replaced");
        Ok(record)
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
