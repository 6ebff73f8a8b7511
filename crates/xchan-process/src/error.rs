use std::path::PathBuf;

use xchan_protocol::ChannelError;

/// Errors that can occur while supervising child processes.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The child could not be spawned.
    #[error("failed to spawn {program:?}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Polling or reaping the child failed.
    #[error("failed to wait for child {label:?}: {source}")]
    Wait {
        label: String,
        #[source]
        source: std::io::Error,
    },

    /// The channel file could not be removed.
    #[error("failed to delete channel file {path}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A channel operation failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

pub type Result<T> = std::result::Result<T, ProcessError>;
