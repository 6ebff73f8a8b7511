use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgGroup, Args, Subcommand, ValueEnum};
use xchan_protocol::{ChannelConfig, FileChannel};

use crate::exit::{channel_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod clear;
pub mod doctor;
pub mod envinfo;
pub mod inspect;
pub mod put;
pub mod remote;
pub mod signal;
pub mod version;
pub mod wait;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write an entry to a channel.
    Put(PutArgs),
    /// Wait for keys and print their values.
    Get(WaitArgs),
    /// Wait for keys, claim them and print their values.
    Remove(WaitArgs),
    /// List the entries currently in a channel.
    Inspect(InspectArgs),
    /// Write a control key.
    Signal(SignalArgs),
    /// Delete a channel file.
    Clear(ClearArgs),
    /// Child entry point used by process groups.
    Remote(RemoteArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Run local environment health checks.
    Doctor(DoctorArgs),
    /// Print the wire format, channel defaults and file locations.
    Envinfo(EnvinfoArgs),
}

/// Settings shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub format: OutputFormat,
    pub dir: PathBuf,
}

impl Context {
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            dir: self.dir.clone(),
            ..ChannelConfig::default()
        }
    }

    pub fn open(&self, name: &str) -> CliResult<FileChannel> {
        FileChannel::open_with_config(name, self.channel_config())
            .map_err(|err| channel_error(&format!("failed to open channel {name:?}"), err))
    }
}

pub fn run(command: Command, ctx: &Context) -> CliResult<i32> {
    match command {
        Command::Put(args) => put::run(args, ctx),
        Command::Get(args) => wait::get(args, ctx),
        Command::Remove(args) => wait::remove(args, ctx),
        Command::Inspect(args) => inspect::run(args, ctx),
        Command::Signal(args) => signal::run(args, ctx),
        Command::Clear(args) => clear::run(args, ctx),
        Command::Remote(args) => remote::run(args, ctx),
        Command::Version(args) => version::run(args),
        Command::Doctor(args) => doctor::run(args, ctx),
        Command::Envinfo(args) => envinfo::run(args, ctx),
    }
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("value").required(true).args(["json", "data", "task"])))]
pub struct PutArgs {
    /// Channel name.
    pub channel: String,
    /// Key to write.
    pub key: String,
    /// JSON value.
    #[arg(long)]
    pub json: Option<String>,
    /// String value.
    #[arg(long)]
    pub data: Option<String>,
    /// Task name.
    #[arg(long, value_name = "NAME")]
    pub task: Option<String>,
    /// Captured state for --task, as JSON.
    #[arg(long, value_name = "JSON", requires = "task")]
    pub captured: Option<String>,
}

#[derive(Args, Debug)]
pub struct WaitArgs {
    /// Channel name.
    pub channel: String,
    /// Keys to wait for.
    #[arg(required = true)]
    pub keys: Vec<String>,
    /// Maximum time to wait (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Channel name.
    pub channel: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum SignalKind {
    Shutdown,
    Terminate,
}

#[derive(Args, Debug)]
pub struct SignalArgs {
    /// Channel name.
    pub channel: String,
    /// Control key to write.
    #[arg(value_enum)]
    pub signal: SignalKind,
}

#[derive(Args, Debug)]
pub struct ClearArgs {
    /// Channel name.
    pub channel: String,
}

#[derive(Args, Debug)]
pub struct RemoteArgs {
    /// Channel to join.
    #[arg(long)]
    pub channel: String,
    /// Registered task name, or a "Lambda Runner<n>" key.
    pub entry: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Also print the wire format and platform details.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {}

#[derive(Args, Debug, Default)]
pub struct EnvinfoArgs {
    /// Also describe the file backing this channel.
    pub name: Option<String>,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }
}
