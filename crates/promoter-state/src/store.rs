//! DedupStore: redb-backed record of handled approval decisions.
//!
//! Values are JSON-serialized [`DedupRecord`]s. The store supports both
//! on-disk and in-memory backends (the latter for testing).
//!
//! redb locks the file, so only one process holds a store at a time. A
//! second open reports [`StateError::Locked`]. [`DedupSnapshot`] reads a
//! file without creating or writing it.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, DatabaseError, ReadOnlyDatabase, ReadableDatabase, ReadableTable};
use tracing::debug;

use promoter_core::{DedupError, DedupGate, DedupRecord};

use crate::error::{StateError, StateResult};
use crate::tables::PROCESSED;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe dedup store backed by redb.
#[derive(Clone)]
pub struct DedupStore {
    db: Arc<Database>,
}

impl DedupStore {
    /// Open (or create) a persistent dedup store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(|e| open_error(path, e))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "dedup store opened");
        Ok(store)
    }

    /// Open a store that must already exist at `path`.
    pub fn open_existing(path: &Path) -> StateResult<Self> {
        let db = Database::open(path).map_err(|e| open_error(path, e))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "existing dedup store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory dedup store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory dedup store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(PROCESSED).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Whether a record exists for the decision id.
    pub fn contains(&self, decision_id: &str) -> StateResult<bool> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PROCESSED).map_err(map_err!(Table))?;
        Ok(table.get(decision_id).map_err(map_err!(Read))?.is_some())
    }

    /// Insert or overwrite the record for a decision id.
    pub fn put(&self, decision_id: &str, record: &DedupRecord) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(PROCESSED).map_err(map_err!(Table))?;
            table
                .insert(decision_id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(decision = %decision_id, "decision marked processed");
        Ok(())
    }

    pub fn get(&self, decision_id: &str) -> StateResult<Option<DedupRecord>> {
        read_record(self.db.as_ref(), decision_id)
    }

    /// Remove a record so the decision is processed again. Returns true if it existed.
    pub fn forget(&self, decision_id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(PROCESSED).map_err(map_err!(Table))?;
            existed = table.remove(decision_id).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(decision = %decision_id, existed, "dedup record removed");
        Ok(existed)
    }

    /// List every stored record.
    pub fn list(&self) -> StateResult<Vec<DedupRecord>> {
        read_all(self.db.as_ref())
    }
}

/// Read-only view of an existing dedup store file.
pub struct DedupSnapshot {
    db: ReadOnlyDatabase,
}

impl DedupSnapshot {
    /// Fails if the file is missing or held by a running daemon.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = ReadOnlyDatabase::open(path).map_err(|e| open_error(path, e))?;
        debug!(?path, "dedup store opened read-only");
        Ok(Self { db })
    }

    pub fn get(&self, decision_id: &str) -> StateResult<Option<DedupRecord>> {
        read_record(&self.db, decision_id)
    }

    pub fn list(&self) -> StateResult<Vec<DedupRecord>> {
        read_all(&self.db)
    }
}

fn open_error(path: &Path, e: DatabaseError) -> StateError {
    match e {
        DatabaseError::DatabaseAlreadyOpen => StateError::Locked(path.display().to_string()),
        other => StateError::Open(other.to_string()),
    }
}

fn read_record(db: &impl ReadableDatabase, decision_id: &str) -> StateResult<Option<DedupRecord>> {
    let txn = db.begin_read().map_err(map_err!(Transaction))?;
    let table = txn.open_table(PROCESSED).map_err(map_err!(Table))?;
    match table.get(decision_id).map_err(map_err!(Read))? {
        Some(guard) => {
            let record: DedupRecord =
                serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
            Ok(Some(record))
        }
        None => Ok(None),
    }
}

fn read_all(db: &impl ReadableDatabase) -> StateResult<Vec<DedupRecord>> {
    let txn = db.begin_read().map_err(map_err!(Transaction))?;
    let table = txn.open_table(PROCESSED).map_err(map_err!(Table))?;
    let mut results = Vec::new();
    for entry in table.iter().map_err(map_err!(Read))? {
        let (_, value) = entry.map_err(map_err!(Read))?;
        let record: DedupRecord =
            serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
        results.push(record);
    }
    Ok(results)
}

#[async_trait::async_trait]
impl DedupGate for DedupStore {
    async fn exists(&self, key: &str) -> Result<bool, DedupError> {
        Ok(self.contains(key)?)
    }

    async fn mark_processed(&self, key: &str, record: &DedupRecord) -> Result<(), DedupError> {
        Ok(self.put(key, record)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> DedupRecord {
        DedupRecord {
            decision_id: id.to_string(),
            status: "APPROVED".to_string(),
            marked_at_ms: 1_000,
        }
    }

    #[test]
    fn put_and_get() {
        let store = DedupStore::open_in_memory().unwrap();
        assert!(!store.contains("inst-1").unwrap());

        store.put("inst-1", &record("inst-1")).unwrap();
        assert!(store.contains("inst-1").unwrap());
        assert_eq!(store.get("inst-1").unwrap(), Some(record("inst-1")));
    }

    #[test]
    fn get_missing_returns_none() {
        let store = DedupStore::open_in_memory().unwrap();
        assert!(store.get("nope").unwrap().is_none());
    }

    #[test]
    fn forget_removes_record() {
        let store = DedupStore::open_in_memory().unwrap();
        store.put("inst-1", &record("inst-1")).unwrap();

        assert!(store.forget("inst-1").unwrap());
        assert!(!store.forget("inst-1").unwrap());
        assert!(!store.contains("inst-1").unwrap());
    }

    #[test]
    fn list_returns_all_records() {
        let store = DedupStore::open_in_memory().unwrap();
        store.put("a", &record("a")).unwrap();
        store.put("b", &record("b")).unwrap();
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dedup.redb");

        {
            let store = DedupStore::open(&path).unwrap();
            store.put("inst-1", &record("inst-1")).unwrap();
        }

        let store = DedupStore::open(&path).unwrap();
        assert!(store.contains("inst-1").unwrap());
    }

    #[test]
    fn second_open_while_held_is_locked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dedup.redb");
        let _held = DedupStore::open(&path).unwrap();

        assert!(matches!(DedupStore::open(&path), Err(StateError::Locked(_))));
        assert!(matches!(DedupStore::open_existing(&path), Err(StateError::Locked(_))));
        assert!(matches!(DedupSnapshot::open(&path), Err(StateError::Locked(_))));
    }

    #[test]
    fn snapshot_reads_closed_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dedup.redb");
        {
            let store = DedupStore::open(&path).unwrap();
            store.put("inst-1", &record("inst-1")).unwrap();
        }

        let snapshot = DedupSnapshot::open(&path).unwrap();
        assert_eq!(snapshot.get("inst-1").unwrap(), Some(record("inst-1")));
        assert!(snapshot.get("inst-2").unwrap().is_none());
        assert_eq!(snapshot.list().unwrap().len(), 1);
    }

    #[test]
    fn missing_file_is_not_created_by_offline_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.redb");

        assert!(matches!(DedupSnapshot::open(&path), Err(StateError::Open(_))));
        assert!(matches!(DedupStore::open_existing(&path), Err(StateError::Open(_))));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn gate_existence_alone_matters() {
        let store = DedupStore::open_in_memory().unwrap();
        let gate: &dyn DedupGate = &store;

        assert!(!gate.exists("inst-1").await.unwrap());
        let mut marker = record("inst-1");
        marker.status = String::new();
        gate.mark_processed("inst-1", &marker).await.unwrap();
        assert!(gate.exists("inst-1").await.unwrap());
    }
}
