use std::path::PathBuf;

use xchan_codec::CodecError;

/// Errors that can occur in channel store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to open or size the channel file.
    #[error("failed to open channel file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to map, flush or unmap the channel region.
    #[error("failed to map channel file {path}: {source}")]
    Map {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to acquire or release the advisory lock.
    #[error("failed to lock channel file {path}: {source}")]
    Lock {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The snapshot in the channel could not be encoded or decoded.
    #[error("snapshot codec error: {0}")]
    Codec(#[from] CodecError),

    /// The encoded table does not fit in the channel region.
    #[error("snapshot too large for channel ({size} bytes, capacity {max})")]
    CapacityExceeded { size: usize, max: usize },

    /// The channel name cannot be turned into a file path.
    #[error("invalid channel name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// The configured capacity cannot hold even an empty snapshot.
    #[error("channel capacity {capacity} is below the minimum of {min} bytes")]
    InvalidCapacity { capacity: usize, min: usize },
}

pub type Result<T> = std::result::Result<T, StoreError>;
