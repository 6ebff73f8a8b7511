use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use tracing::{debug, trace};
use xchan_codec::{decode_snapshot, encode_snapshot, Table};

use crate::error::{Result, StoreError};
use crate::traits::{SnapshotStore, StoreConfig, MIN_CAPACITY};

/// File extension appended to channel names.
pub const CHANNEL_FILE_SUFFIX: &str = ".tmp";

/// Resolve a channel name to its file path under `dir`.
///
/// All cooperating processes must use the same directory and name.
pub fn channel_path(dir: impl AsRef<Path>, name: &str) -> Result<PathBuf> {
    let invalid = |reason| StoreError::InvalidName {
        name: name.to_string(),
        reason,
    };
    if name.is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if name == "." || name == ".." {
        return Err(invalid("name must not be a relative directory"));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(invalid("name must not contain path separators or NUL"));
    }
    Ok(dir.as_ref().join(format!("{name}{CHANNEL_FILE_SUFFIX}")))
}

/// File-backed channel store.
///
/// The first `capacity` bytes of the channel file are mapped shared
/// read/write on every operation and unmapped when the operation ends, so the
/// store holds no file handle between calls.
#[derive(Debug, Clone)]
pub struct MappedStore {
    path: PathBuf,
    config: StoreConfig,
}

impl MappedStore {
    /// Default permission mode for created channel files.
    pub const DEFAULT_FILE_MODE: u32 = 0o600;

    /// Create a store for the channel file at `path`. Nothing is opened yet.
    pub fn new(path: impl Into<PathBuf>, config: StoreConfig) -> Result<Self> {
        if config.capacity < MIN_CAPACITY {
            return Err(StoreError::InvalidCapacity {
                capacity: config.capacity,
                min: MIN_CAPACITY,
            });
        }
        Ok(Self {
            path: path.into(),
            config,
        })
    }

    /// Create a store for channel `name` under `dir`.
    pub fn for_channel(dir: impl AsRef<Path>, name: &str, config: StoreConfig) -> Result<Self> {
        Self::new(channel_path(dir, name)?, config)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn open_file(&self) -> Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(Self::DEFAULT_FILE_MODE)
            .open(&self.path)
            .map_err(|source| StoreError::Open {
                path: self.path.clone(),
                source,
            })
    }

    fn map(&self) -> Result<MappedRegion> {
        let file = self.open_file()?;
        MappedRegion::new(file, &self.path, self.config.capacity)
    }
}

impl SnapshotStore for MappedStore {
    fn read_snapshot(&self) -> Result<Table> {
        let region = self.map()?;
        let bytes = region.copy_out();
        drop(region);
        Ok(decode_snapshot(&bytes)?.unwrap_or_default())
    }

    fn write_snapshot(&self, table: &Table) -> Result<()> {
        let blob = encode_snapshot(Some(table))?;
        if blob.len() > self.config.capacity {
            return Err(StoreError::CapacityExceeded {
                size: blob.len(),
                max: self.config.capacity,
            });
        }
        let mut region = self.map()?;
        region.overwrite(&blob);
        region.flush()?;
        trace!(path = ?self.path, size = blob.len(), entries = table.len(), "wrote snapshot");
        Ok(())
    }

    fn with_lock<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> Result<R>,
    {
        if !self.config.lock {
            return f();
        }
        let _guard = FileLock::acquire(self.open_file()?, &self.path)?;
        f()
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn capacity(&self) -> usize {
        self.config.capacity
    }
}

/// A shared read/write mapping of the start of a file. Unmapped on drop.
struct MappedRegion {
    ptr: NonNull<u8>,
    len: usize,
    path: PathBuf,
    // Keeps the descriptor alive for the lifetime of the mapping.
    _file: File,
}

impl MappedRegion {
    fn new(file: File, path: &Path, len: usize) -> Result<Self> {
        let current = file
            .metadata()
            .map_err(|source| StoreError::Open {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        // Never shrink: a peer configured with a larger capacity may be using the tail.
        if current < len as u64 {
            debug!(?path, from = current, to = len, "extending channel file");
            file.set_len(len as u64)
                .map_err(|source| StoreError::Open {
                    path: path.to_path_buf(),
                    source,
                })?;
        }

        // SAFETY: `file` is open read/write and at least `len` bytes long, `len`
        // is non-zero (capacity is validated against MIN_CAPACITY), and the
        // returned pointer is only used while `file` is kept alive by `self`.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(StoreError::Map {
                path: path.to_path_buf(),
                source: std::io::Error::last_os_error(),
            });
        }
        let ptr = NonNull::new(ptr.cast::<u8>()).ok_or_else(|| StoreError::Map {
            path: path.to_path_buf(),
            source: std::io::Error::other("mmap returned a null mapping"),
        })?;

        Ok(Self {
            ptr,
            len,
            path: path.to_path_buf(),
            _file: file,
        })
    }

    /// Copy the whole region out of shared memory.
    fn copy_out(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.len];
        // SAFETY: the mapping is `self.len` bytes long and `bytes` has the same
        // length; the two ranges cannot overlap. Peers may write concurrently,
        // which is why the contents are copied rather than borrowed.
        unsafe {
            std::ptr::copy_nonoverlapping(self.ptr.as_ptr(), bytes.as_mut_ptr(), self.len);
        }
        bytes
    }

    /// Zero the whole region, then write `blob` from offset zero.
    ///
    /// Zeroing first keeps a shorter snapshot from leaving stale trailing
    /// bytes behind the new payload.
    fn overwrite(&mut self, blob: &[u8]) {
        debug_assert!(blob.len() <= self.len);
        // SAFETY: both writes stay within the `self.len` byte mapping; the
        // caller validated `blob.len() <= self.len`.
        unsafe {
            std::ptr::write_bytes(self.ptr.as_ptr(), 0, self.len);
            std::ptr::copy_nonoverlapping(blob.as_ptr(), self.ptr.as_ptr(), blob.len());
        }
    }

    fn flush(&self) -> Result<()> {
        // SAFETY: `ptr`/`len` describe a live mapping created by `mmap`.
        let rc = unsafe {
            libc::msync(
                self.ptr.as_ptr().cast::<libc::c_void>(),
                self.len,
                libc::MS_SYNC,
            )
        };
        if rc != 0 {
            return Err(StoreError::Map {
                path: self.path.clone(),
                source: std::io::Error::last_os_error(),
            });
        }
        Ok(())
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        // SAFETY: `ptr`/`len` describe a live mapping created by `mmap` that is
        // unmapped exactly once, here.
        let rc = unsafe { libc::munmap(self.ptr.as_ptr().cast::<libc::c_void>(), self.len) };
        if rc != 0 {
            debug!(path = ?self.path, error = %std::io::Error::last_os_error(), "munmap failed");
        }
    }
}

/// Exclusive `flock` on a channel file, released on drop.
struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    fn acquire(file: File, path: &Path) -> Result<Self> {
        loop {
            // SAFETY: `file` is an open descriptor owned by this function.
            let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
            if rc == 0 {
                break;
            }
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(StoreError::Lock {
                path: path.to_path_buf(),
                source: err,
            });
        }
        trace!(?path, "acquired channel lock");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // SAFETY: `self.file` is still open; closing it would also release the lock.
        let rc = unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_UN) };
        if rc != 0 {
            debug!(path = ?self.path, error = %std::io::Error::last_os_error(), "unlock failed");
        }
    }
}
