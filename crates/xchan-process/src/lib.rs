//! Process-group lifecycle over xchan channels.
//!
//! - [`ChildProcess`]: spawn a child, forward its output to the log, and
//!   wait for it with a deadline
//! - [`Accessor`]: launch a group of children around one channel and run
//!   the shutdown handshake
//! - [`remote`]: the child-side entry contract

pub mod error;
pub mod remote;
pub mod supervisor;

#[cfg(unix)]
pub mod accessor;

#[cfg(unix)]
pub use accessor::{
    delete_channel_file, Accessor, ChildReport, ShutdownReport, CHANNEL_DIR_ENV, REMOTE_SUBCOMMAND,
};
pub use error::{ProcessError, Result};
pub use supervisor::{
    ChildProcess, OutputLine, ProcessConfig, Stream, Termination, DEFAULT_TERMINATION_TIMEOUT,
};
