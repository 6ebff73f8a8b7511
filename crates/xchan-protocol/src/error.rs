use std::time::Duration;

use xchan_codec::CodecError;
use xchan_store::StoreError;

/// Errors that can occur in channel operations.
///
/// Every variant names the keys of the failing call; waits also carry the
/// keys present in the channel when they gave up, to help untangle
/// multi-process deadlocks.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Not every requested key appeared before the deadline.
    #[error("timed out after {timeout:?} waiting for keys {missing:?} (channel holds {known:?})")]
    Timeout {
        missing: Vec<String>,
        known: Vec<String>,
        timeout: Duration,
    },

    /// The terminate key was observed while waiting.
    #[error(
        "key \"Terminate JVM\" detected while waiting for {keys:?}{} (channel holds {known:?})",
        shutdown_note(.awaiting_shutdown)
    )]
    Terminated {
        keys: Vec<String>,
        known: Vec<String>,
        awaiting_shutdown: bool,
    },

    /// Store-level failure (I/O, lock, decode, capacity).
    #[error("channel store error for keys {keys:?}: {source}")]
    Store {
        keys: Vec<String>,
        #[source]
        source: StoreError,
    },

    /// A value was rejected before any I/O because it cannot cross a process boundary.
    #[error("value for key {key:?} is not serializable: {source}")]
    NotSerializable {
        key: String,
        #[source]
        source: CodecError,
    },

    /// A value read from the channel did not decode into the requested type.
    #[error("value for key {key:?} could not be decoded: {source}")]
    Codec {
        key: String,
        #[source]
        source: CodecError,
    },

    /// A wait reported success but its result lacks a requested key.
    #[error("completed wait returned no value for key {key:?}")]
    MissingResult { key: String },
}

impl ChannelError {
    /// Returns true for timeouts.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ChannelError::Timeout { .. })
    }

    /// Returns true when the terminate key ended the call.
    pub fn is_terminated(&self) -> bool {
        matches!(self, ChannelError::Terminated { .. })
    }

    /// Returns true for capacity overflows, which are never worth retrying.
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(
            self,
            ChannelError::Store {
                source: StoreError::CapacityExceeded { .. },
                ..
            }
        )
    }
}

/// Errors raised while resolving or executing a task.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// No operation with this name is registered in this process.
    #[error("no task named {0:?} is registered")]
    Unknown(String),

    /// The task needs a channel but was invoked without one.
    #[error("task {0:?} must run with a channel")]
    NoChannel(String),

    /// The operation itself failed.
    #[error("task {name:?} failed: {message}")]
    Failed { name: String, message: String },

    /// A channel operation inside the task failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Captured state or input did not have the expected shape.
    #[error("task codec error: {0}")]
    Codec(#[from] CodecError),
}

impl TaskError {
    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        TaskError::Failed {
            name: name.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;

fn shutdown_note(awaiting_shutdown: &bool) -> &'static str {
    if *awaiting_shutdown {
        ""
    } else {
        ", not for \"Shutdown JVM\""
    }
}
