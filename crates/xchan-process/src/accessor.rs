use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};
use xchan_codec::Task;
use xchan_protocol::{lambda_runner_key, ChannelConfig, FileChannel};

use crate::error::{ProcessError, Result};
use crate::supervisor::{ChildProcess, ProcessConfig, Termination};

/// Environment variable children read the channel directory from.
pub const CHANNEL_DIR_ENV: &str = "XCHAN_DIR";

/// Subcommand children are launched with.
pub const REMOTE_SUBCOMMAND: &str = "remote";

const DELETE_RETRIES: u32 = 10;
const DELETE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Outcome of one child at shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildReport {
    pub label: String,
    pub termination: Termination,
}

/// Outcome of [`Accessor::shutdown`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub children: Vec<ChildReport>,
    /// Whether the channel file existed and was removed.
    pub file_removed: bool,
}

impl ShutdownReport {
    /// True when every child exited successfully.
    pub fn is_clean(&self) -> bool {
        self.children
            .iter()
            .all(|child| child.termination.is_success())
    }
}

/// Launches a process group around one channel and runs its shutdown handshake.
///
/// Children are started as `<program> remote --channel <name> <entry>` with
/// the channel directory exported in [`CHANNEL_DIR_ENV`].
#[derive(Debug)]
pub struct Accessor {
    channel: FileChannel,
    program: PathBuf,
    process: ProcessConfig,
    pool: Vec<ChildProcess>,
    shut_down: bool,
}

impl Accessor {
    /// Create an accessor with default channel and process settings.
    pub fn new(channel_name: &str, program: impl Into<PathBuf>) -> Result<Self> {
        Self::with_config(
            channel_name,
            program,
            ChannelConfig::default(),
            ProcessConfig::default(),
        )
    }

    /// Create an accessor. Any stale channel file from an earlier run is deleted.
    pub fn with_config(
        channel_name: &str,
        program: impl Into<PathBuf>,
        channel: ChannelConfig,
        process: ProcessConfig,
    ) -> Result<Self> {
        let path = xchan_store::channel_path(&channel.dir, channel_name).map_err(|source| {
            xchan_protocol::ChannelError::Store {
                keys: Vec::new(),
                source,
            }
        })?;
        delete_channel_file(&path)?;
        let channel = FileChannel::open_with_config(channel_name, channel)?;
        Ok(Self {
            channel,
            program: program.into(),
            process,
            pool: Vec::new(),
            shut_down: false,
        })
    }

    pub fn channel(&self) -> &FileChannel {
        &self.channel
    }

    pub fn children(&self) -> &[ChildProcess] {
        &self.pool
    }

    /// Launch a child running the registered task `entry`.
    pub fn start(&mut self, entry: &str, timeout: Duration) -> Result<&ChildProcess> {
        self.spawn(entry.to_string(), timeout)
    }

    /// Hand `task` to a new child through its runner key.
    pub fn start_task(&mut self, task: Task, timeout: Duration) -> Result<&ChildProcess> {
        let key = lambda_runner_key(self.pool.len() + 1);
        self.channel.put_task(key.clone(), task)?;
        self.spawn(key, timeout)
    }

    /// Ask every child to shut down and wait for them, then delete the channel file.
    pub fn shutdown(&mut self) -> Result<ShutdownReport> {
        if self.shut_down {
            return Ok(ShutdownReport::default());
        }
        self.shut_down = true;

        let signalled = self.channel.signal_shutdown();
        let (children, waited) = collect_reports(
            self.pool
                .iter_mut()
                .map(|child| (child.label().to_string(), child.await_termination())),
        );
        let removed = delete_channel_file(self.channel.path());

        let report = ShutdownReport {
            children,
            file_removed: matches!(removed, Ok(true)),
        };
        info!(
            channel = %self.channel.name(),
            children = report.children.len(),
            clean = report.is_clean(),
            file_removed = report.file_removed,
            "process group shut down"
        );

        // Report the first failure only after every child was awaited and
        // the file was dealt with.
        if let Some(err) = waited {
            return Err(err);
        }
        signalled?;
        removed?;
        Ok(report)
    }

    /// Abort every child not waiting for shutdown.
    pub fn terminate(&self) -> Result<()> {
        Ok(self.channel.signal_terminate()?)
    }

    fn spawn(&mut self, entry: String, timeout: Duration) -> Result<&ChildProcess> {
        let mut config = self.process.clone();
        config.timeout = timeout;
        config.env.push((
            CHANNEL_DIR_ENV.to_string(),
            self.channel.config().dir.to_string_lossy().into_owned(),
        ));
        let args = [
            REMOTE_SUBCOMMAND,
            "--channel",
            self.channel.name(),
            entry.as_str(),
        ];
        let child = ChildProcess::start(entry.clone(), &self.program, args, config)?;
        self.pool.push(child);
        let index = self.pool.len() - 1;
        Ok(&self.pool[index])
    }
}

impl Drop for Accessor {
    fn drop(&mut self) {
        if self.shut_down {
            return;
        }
        if thread::panicking() {
            if let Err(err) = self.terminate() {
                error!(error = %err, "failed to signal terminate while unwinding");
            }
        }
        if let Err(err) = self.shutdown() {
            error!(error = %err, "shutdown on drop failed");
        }
    }
}

/// Record every child's outcome, keeping the first wait failure.
fn collect_reports<I>(outcomes: I) -> (Vec<ChildReport>, Option<ProcessError>)
where
    I: IntoIterator<Item = (String, Result<Termination>)>,
{
    let mut reports = Vec::new();
    let mut first_error = None;
    for (label, outcome) in outcomes {
        match outcome {
            Ok(termination) => {
                if !termination.is_success() {
                    error!(child = %label, ?termination, "failed to properly terminate child");
                }
                reports.push(ChildReport { label, termination });
            }
            Err(err) => {
                error!(child = %label, error = %err, "failed to await child");
                first_error.get_or_insert(err);
            }
        }
    }
    (reports, first_error)
}

/// Delete a channel file, retrying while another process still holds it.
///
/// Returns whether a file was removed.
pub fn delete_channel_file(path: &Path) -> Result<bool> {
    let mut attempt = 0;
    loop {
        match std::fs::remove_file(path) {
            Ok(()) => {
                info!(path = %path.display(), retries = attempt, "channel file deleted");
                return Ok(true);
            }
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
            Err(err) if err.kind() == ErrorKind::PermissionDenied && attempt < DELETE_RETRIES => {
                warn!(path = %path.display(), attempt, "channel file busy, retrying delete");
                attempt += 1;
                thread::sleep(DELETE_RETRY_DELAY);
            }
            Err(source) => {
                error!(path = %path.display(), retries = attempt, error = %source, "channel file could not be deleted");
                return Err(ProcessError::Cleanup {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
    }
}
