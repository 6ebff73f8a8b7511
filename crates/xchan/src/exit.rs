use std::fmt;

use xchan_codec::CodecError;
use xchan_process::ProcessError;
use xchan_protocol::ChannelError;
use xchan_store::StoreError;

// Exit codes follow sysexits/coreutils conventions where one applies.
pub const SUCCESS: i32 = 0;
#[allow(dead_code)]
pub const FAILURE: i32 = 1;
pub const STORE_ERROR: i32 = 3;
pub const HEALTH_CHECK_FAILED: i32 = 30;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;
pub const TERMINATED: i32 = 130;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn store_error(context: &str, err: StoreError) -> CliError {
    let code = match err {
        StoreError::CapacityExceeded { .. } => DATA_INVALID,
        StoreError::InvalidName { .. } | StoreError::InvalidCapacity { .. } => USAGE,
        _ => STORE_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn codec_error(context: &str, err: CodecError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    match err {
        ChannelError::Timeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        ChannelError::Terminated { .. } => CliError::new(TERMINATED, format!("{context}: {err}")),
        ChannelError::Store { source, .. } => store_error(context, source),
        ChannelError::NotSerializable { .. } | ChannelError::Codec { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ChannelError::MissingResult { .. } => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

pub fn process_error(context: &str, err: ProcessError) -> CliError {
    match err {
        ProcessError::Channel(err) => channel_error(context, err),
        ProcessError::Cleanup { .. } => CliError::new(STORE_ERROR, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}
