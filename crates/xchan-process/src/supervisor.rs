use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::error::{ProcessError, Result};

/// Default time a child gets to exit once it is awaited.
pub const DEFAULT_TERMINATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a supervised child.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Deadline for [`ChildProcess::await_termination`]. Default: 30 s.
    pub timeout: Duration,
    /// Sleep between `try_wait` polls. Default: 10 ms.
    pub poll_interval: Duration,
    /// Extra environment for the child.
    pub env: Vec<(String, String)>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TERMINATION_TIMEOUT,
            poll_interval: Duration::from_millis(10),
            env: Vec::new(),
        }
    }
}

/// How a supervised child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited with status 0.
    Success,
    /// Exited with a non-zero status, or was killed by a signal (`None`).
    Failed(Option<i32>),
    /// Did not exit before the deadline and was killed.
    TimedOut,
}

impl Termination {
    pub fn is_success(&self) -> bool {
        matches!(self, Termination::Success)
    }
}

/// Which child stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    fn as_str(self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }
}

/// One line of child output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: Stream,
    pub line: String,
}

type Transcript = Arc<Mutex<Vec<OutputLine>>>;

/// A child process whose output is forwarded to the log.
#[derive(Debug)]
pub struct ChildProcess {
    label: String,
    child: Child,
    config: ProcessConfig,
    transcript: Transcript,
    readers: Vec<JoinHandle<()>>,
    outcome: Option<Termination>,
}

impl ChildProcess {
    /// Spawn `program` with `args`, labelling its output with `label`.
    pub fn start<I, A>(
        label: impl Into<String>,
        program: impl AsRef<OsStr>,
        args: I,
        config: ProcessConfig,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        let label = label.into();
        let program = program.as_ref();
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            program: program.to_string_lossy().into_owned(),
            source,
        })?;
        info!(child = %label, pid = child.id(), "started child process");

        let transcript = Transcript::default();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(&label, Stream::Stdout, stdout, &transcript));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(&label, Stream::Stderr, stderr, &transcript));
        }

        Ok(Self {
            label,
            child,
            config,
            transcript,
            readers,
            outcome: None,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Wait for the child to exit, killing it once the deadline passes.
    ///
    /// Repeated calls return the first outcome.
    pub fn await_termination(&mut self) -> Result<Termination> {
        if let Some(outcome) = self.outcome {
            return Ok(outcome);
        }

        let started = Instant::now();
        let outcome = loop {
            match self.child.try_wait() {
                Ok(Some(status)) if status.success() => break Termination::Success,
                Ok(Some(status)) => break Termination::Failed(status.code()),
                Ok(None) => {
                    if started.elapsed() > self.config.timeout {
                        warn!(
                            child = %self.label,
                            timeout = ?self.config.timeout,
                            "child did not exit in time, killing"
                        );
                        let _ = self.child.kill();
                        let _ = self.child.wait();
                        break Termination::TimedOut;
                    }
                    thread::sleep(self.config.poll_interval);
                }
                Err(source) => {
                    return Err(ProcessError::Wait {
                        label: self.label.clone(),
                        source,
                    })
                }
            }
        };

        for reader in self.readers.drain(..) {
            let _ = reader.join();
        }

        match outcome {
            Termination::Success => debug!(child = %self.label, "child exited"),
            other => error!(child = %self.label, outcome = ?other, "child did not exit cleanly"),
        }
        self.outcome = Some(outcome);
        Ok(outcome)
    }

    /// Output collected so far.
    pub fn transcript(&self) -> Vec<OutputLine> {
        self.transcript
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Transcript lines from one stream, joined with newlines.
    pub fn output(&self, stream: Stream) -> String {
        self.transcript()
            .into_iter()
            .filter(|line| line.stream == stream)
            .map(|line| line.line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        if self.outcome.is_none() {
            if let Ok(None) = self.child.try_wait() {
                warn!(child = %self.label, "dropping running child, killing");
                let _ = self.child.kill();
                let _ = self.child.wait();
            }
        }
    }
}

fn forward_lines<R>(label: &str, stream: Stream, source: R, transcript: &Transcript) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    let label = label.to_string();
    let transcript = Arc::clone(transcript);
    thread::spawn(move || {
        for line in BufReader::new(source).lines() {
            let Ok(line) = line else { break };
            info!(child = %label, stream = stream.as_str(), "{line}");
            transcript
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(OutputLine { stream, line });
        }
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, config: ProcessConfig) -> ChildProcess {
        ChildProcess::start("sh", "sh", ["-c", script], config).unwrap()
    }

    #[test]
    fn success_and_transcript() {
        let mut child = sh("echo out; echo err 1>&2", ProcessConfig::default());
        assert_eq!(child.await_termination().unwrap(), Termination::Success);
        assert_eq!(child.output(Stream::Stdout), "out");
        assert_eq!(child.output(Stream::Stderr), "err");
    }

    #[test]
    fn non_zero_exit_is_failure() {
        let mut child = sh("exit 3", ProcessConfig::default());
        let outcome = child.await_termination().unwrap();
        assert_eq!(outcome, Termination::Failed(Some(3)));
        assert!(!outcome.is_success());
    }

    #[test]
    fn overdue_child_is_killed() {
        let config = ProcessConfig {
            timeout: Duration::from_millis(200),
            ..ProcessConfig::default()
        };
        let started = Instant::now();
        let mut child = sh("sleep 10", config);
        assert_eq!(child.await_termination().unwrap(), Termination::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn outcome_is_sticky() {
        let mut child = sh("exit 0", ProcessConfig::default());
        assert!(child.await_termination().unwrap().is_success());
        assert!(child.await_termination().unwrap().is_success());
    }

    #[test]
    fn env_reaches_child() {
        let config = ProcessConfig {
            env: vec![("XCHAN_PROBE".to_string(), "42".to_string())],
            ..ProcessConfig::default()
        };
        let mut child = sh("echo $XCHAN_PROBE", config);
        child.await_termination().unwrap();
        assert_eq!(child.output(Stream::Stdout), "42");
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let err = ChildProcess::start(
            "ghost",
            "/nonexistent/xchan-child",
            Vec::<String>::new(),
            ProcessConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }
}
