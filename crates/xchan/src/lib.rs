//! Cross-process coordination channels over shared memory-mapped files.
//!
//! xchan lets independent processes exchange typed values and synchronize
//! lifecycle events through a named channel: a fixed-size region of a file
//! in a shared directory holding a table of key → value entries.
//!
//! # Crate Structure
//!
//! - [`codec`]: Snapshot wire format and the [`Value`]/[`Task`] data model
//! - [`store`]: Memory-mapped snapshot store with advisory locking
//! - [`protocol`]: Polling put/get/remove, control keys, task registry
//! - [`process`]: Child supervision and process groups (behind `process` feature)

/// Re-export codec types.
pub mod codec {
    pub use xchan_codec::*;
}

/// Re-export store types.
pub mod store {
    pub use xchan_store::*;
}

/// Re-export protocol types.
pub mod protocol {
    pub use xchan_protocol::*;
}

/// Re-export process types (requires `process` feature).
#[cfg(feature = "process")]
pub mod process {
    pub use xchan_process::*;
}

pub use xchan_protocol::{Channel, ChannelConfig, ChannelError, Table, Task, TaskRegistry, Value};

#[cfg(unix)]
pub use xchan_protocol::FileChannel;
