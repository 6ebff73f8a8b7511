mod cmd;
mod exit;
mod logging;
mod output;
mod tasks;

use std::path::PathBuf;

use clap::Parser;
use tracing::error;

use crate::cmd::{Command, Context};
use crate::logging::{init_logging, LogFormat, LogLevel, ProcessRole};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "xchan", version, about = "Cross-process coordination channels")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// Directory holding channel files. Default: the platform temp directory.
    #[arg(long, value_name = "DIR", env = "XCHAN_DIR", global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn role(&self) -> ProcessRole {
        match self.command {
            Command::Remote(_) => ProcessRole::Remote,
            _ => ProcessRole::Local,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let _root = init_logging(cli.log_format, cli.log_level, cli.role());

    let ctx = Context {
        format: cli.format.unwrap_or_else(OutputFormat::default_for_stdout),
        dir: cli.dir.unwrap_or_else(std::env::temp_dir),
    };
    let result = cmd::run(cli.command, &ctx);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            error!(code = err.code, "{err}");
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_put_subcommand() {
        let cli = Cli::try_parse_from(["xchan", "put", "comm", "Greet", "--data", "hello"])
            .expect("put args should parse");
        assert!(matches!(cli.command, Command::Put(_)));
        assert_eq!(cli.role(), ProcessRole::Local);
    }

    #[test]
    fn rejects_conflicting_value_args() {
        let err = Cli::try_parse_from([
            "xchan", "put", "comm", "k", "--json", "{\"x\":1}", "--data", "hello",
        ])
        .expect_err("conflicting args should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn put_requires_a_value() {
        let err = Cli::try_parse_from(["xchan", "put", "comm", "k"])
            .expect_err("missing value should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn captured_requires_task() {
        let err = Cli::try_parse_from(["xchan", "put", "comm", "k", "--data", "x", "--captured", "1"])
            .expect_err("--captured without --task should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_get_with_keys_and_timeout() {
        let cli = Cli::try_parse_from(["xchan", "get", "comm", "A", "B", "--timeout", "3s"])
            .expect("get args should parse");
        match cli.command {
            Command::Get(args) => {
                assert_eq!(args.keys, vec!["A", "B"]);
                assert_eq!(args.timeout, "3s");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn remote_sets_role() {
        let cli = Cli::try_parse_from(["xchan", "remote", "--channel", "comm", "Lambda Runner1"])
            .expect("remote args should parse");
        assert_eq!(cli.role(), ProcessRole::Remote);
    }

    #[test]
    fn dir_flag_is_global() {
        let cli = Cli::try_parse_from(["xchan", "inspect", "comm", "--dir", "/tmp/x"])
            .expect("inspect args should parse");
        assert_eq!(cli.dir, Some(PathBuf::from("/tmp/x")));
    }
}
