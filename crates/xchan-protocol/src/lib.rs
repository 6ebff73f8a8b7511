//! Put/get/remove coordination over shared channels.
//!
//! This is the layer processes talk to. Write entries with `put`, block on
//! keys with `get` or claim them exactly once with `remove`, and use the
//! reserved control keys to shut a process group down. Function values
//! travel as named [`Task`]s resolved through a [`TaskRegistry`].

pub mod channel;
pub mod config;
pub mod control;
pub mod error;
pub mod task;

#[cfg(unix)]
pub use channel::FileChannel;
pub use channel::Channel;
pub use config::{ChannelConfig, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};
pub use control::{
    is_control_key, is_lambda_runner, lambda_runner_key, ShutdownKind, LAMBDA_RUNNER_PREFIX,
    SHUTDOWN_KEY, TERMINATE_KEY,
};
pub use error::{ChannelError, Result, TaskError};
pub use task::{TaskCall, TaskRegistry};
pub use xchan_codec::{Table, Task, Value};
