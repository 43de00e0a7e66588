//! In-process state storage.
//!
//! [`MemoryStateStorage`] satisfies the [`StateStorage`] contract without
//! touching the filesystem; used by tests and by the service's `--in-memory`
//! mode. [`FailingStateStorage`] rejects every write.

use std::collections::HashMap;
use std::io;

use parking_lot::Mutex;

use super::{StateRecord, StateStorage, StorageError, StorageResult};

/// State storage backed by a `HashMap<record, bytes>`.
#[derive(Debug, Default)]
pub struct MemoryStateStorage {
    records: Mutex<HashMap<StateRecord, Vec<u8>>>,
}

impl MemoryStateStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    pub fn record_count(&self) -> usize {
        self.records.lock().len()
    }
}

impl StateStorage for MemoryStateStorage {
    fn load(&self, record: StateRecord) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.records.lock().get(&record).cloned())
    }

    fn save(&self, record: StateRecord, data: &[u8]) -> StorageResult<()> {
        self.records.lock().insert(record, data.to_vec());
        Ok(())
    }

    fn remove(&self, record: StateRecord) -> StorageResult<()> {
        self.records.lock().remove(&record);
        Ok(())
    }
}

/// Loads nothing and fails every write with an I/O error.
#[derive(Debug, Default)]
pub struct FailingStateStorage;

impl FailingStateStorage {
    fn refuse(record: StateRecord) -> StorageError {
        StorageError::Io(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("{record}: storage is read-only"),
        ))
    }
}

impl StateStorage for FailingStateStorage {
    fn load(&self, _record: StateRecord) -> StorageResult<Option<Vec<u8>>> {
        Ok(None)
    }

    fn save(&self, record: StateRecord, _data: &[u8]) -> StorageResult<()> {
        Err(Self::refuse(record))
    }

    fn remove(&self, record: StateRecord) -> StorageResult<()> {
        Err(Self::refuse(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_and_remove() {
        let s = MemoryStateStorage::new();
        assert!(s.load(StateRecord::Profile).unwrap().is_none());
        s.save(StateRecord::Profile, b"{}").unwrap();
        assert_eq!(s.load(StateRecord::Profile).unwrap().unwrap(), b"{}");
        assert_eq!(s.record_count(), 1);
        s.remove(StateRecord::Profile).unwrap();
        assert_eq!(s.record_count(), 0);
    }

    #[test]
    fn failing_storage_rejects_writes() {
        let s = FailingStateStorage;
        assert!(s.load(StateRecord::Memories).unwrap().is_none());
        let err = s.save(StateRecord::Memories, b"[]").unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
        assert!(err.to_string().contains("memories: storage is read-only"));
        assert!(s.remove(StateRecord::Context).is_err());
    }
}
