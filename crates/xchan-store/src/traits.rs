use std::path::Path;

use xchan_codec::Table;

use crate::error::Result;

/// Default channel capacity: 4 KiB.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Smallest capacity that can hold an encoded empty table.
pub const MIN_CAPACITY: usize = 64;

/// Configuration for a channel store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Size of the mapped region in bytes. Default: 4 KiB.
    pub capacity: usize,
    /// Take an exclusive advisory lock around read-modify-write sections.
    pub lock: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            lock: true,
        }
    }
}

/// Snapshot-level access to a channel's entry table.
///
/// Every read observes a whole table and every write replaces the whole
/// table. Callers that need read-modify-write wrap both in [`with_lock`],
/// which narrows (but cannot close, across all platforms) the window in
/// which a concurrent writer's update is lost.
///
/// [`with_lock`]: SnapshotStore::with_lock
pub trait SnapshotStore {
    /// Read the current table. A channel with nothing written yet reads as empty.
    fn read_snapshot(&self) -> Result<Table>;

    /// Replace the current table.
    fn write_snapshot(&self, table: &Table) -> Result<()>;

    /// Run `f` while holding the store's exclusive lock (if locking is enabled).
    fn with_lock<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> Result<R>;

    /// Path of the backing file.
    fn path(&self) -> &Path;

    /// Capacity of the snapshot region in bytes.
    fn capacity(&self) -> usize;
}
