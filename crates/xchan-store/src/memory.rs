use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use xchan_codec::{decode_snapshot, encode_snapshot, Table};

use crate::error::{Result, StoreError};
use crate::traits::{SnapshotStore, DEFAULT_CAPACITY};

/// In-process store holding the same fixed-size region a channel file would.
///
/// Clones share the region, so threads holding clones behave like
/// cooperating processes. Snapshots go through the real codec and capacity
/// checks.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    region: Arc<Mutex<Vec<u8>>>,
    lock: Arc<Mutex<()>>,
    path: PathBuf,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            region: Arc::new(Mutex::new(vec![0u8; capacity])),
            lock: Arc::new(Mutex::new(())),
            path: PathBuf::from("<memory>"),
        }
    }

    /// Raw copy of the region, for assertions on the stored layout.
    pub fn raw(&self) -> Vec<u8> {
        self.region().clone()
    }

    fn region(&self) -> MutexGuard<'_, Vec<u8>> {
        // A panicking writer cannot leave a torn snapshot: the region is only
        // mutated by `write_snapshot` after encoding succeeded.
        self.region.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore for MemoryStore {
    fn read_snapshot(&self) -> Result<Table> {
        let bytes = self.region().clone();
        Ok(decode_snapshot(&bytes)?.unwrap_or_default())
    }

    fn write_snapshot(&self, table: &Table) -> Result<()> {
        let blob = encode_snapshot(Some(table))?;
        let mut region = self.region();
        if blob.len() > region.len() {
            return Err(StoreError::CapacityExceeded {
                size: blob.len(),
                max: region.len(),
            });
        }
        region.fill(0);
        region[..blob.len()].copy_from_slice(&blob);
        Ok(())
    }

    fn with_lock<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> Result<R>,
    {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f()
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn capacity(&self) -> usize {
        self.region().len()
    }
}

#[cfg(test)]
mod tests {
    use xchan_codec::Value;

    use super::*;

    #[test]
    fn clones_share_the_region() {
        let a = MemoryStore::new();
        let b = a.clone();

        let mut table = Table::new();
        table.insert("k".to_string(), Value::from("v"));
        a.write_snapshot(&table).unwrap();

        assert_eq!(b.read_snapshot().unwrap(), table);
    }

    #[test]
    fn capacity_is_enforced() {
        let store = MemoryStore::with_capacity(64);
        let mut table = Table::new();
        table.insert("k".to_string(), Value::from("v".repeat(100)));
        assert!(matches!(
            store.write_snapshot(&table),
            Err(StoreError::CapacityExceeded { max: 64, .. })
        ));
        assert!(store.raw().iter().all(|b| *b == 0));
    }
}
