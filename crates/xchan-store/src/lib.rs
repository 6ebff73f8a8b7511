//! Memory-mapped, file-backed snapshot store for xchan channels.
//!
//! A channel is the first `capacity` bytes of a file in a directory shared by
//! all cooperating processes. This crate reads and replaces whole snapshots
//! of that region and provides the advisory lock used around
//! read-modify-write sections:
//! - [`MappedStore`]: the file-backed store (Unix, `mmap` + `flock`)
//! - [`MemoryStore`]: an in-process region with identical semantics
//!
//! Everything else builds on the [`SnapshotStore`] trait.

pub mod error;
pub mod memory;
pub mod traits;

#[cfg(unix)]
pub mod mapped;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use traits::{SnapshotStore, StoreConfig, DEFAULT_CAPACITY, MIN_CAPACITY};

#[cfg(unix)]
pub use mapped::{channel_path, MappedStore, CHANNEL_FILE_SUFFIX};
