//! Child-side entry point.
//!
//! A child launched by an [`Accessor`](crate::Accessor) resolves its entry,
//! runs it against the shared channel, then blocks until the group is shut
//! down.

use tracing::{error, info};
use xchan_protocol::{
    is_lambda_runner, Channel, ChannelError, ShutdownKind, Task, TaskError, TaskRegistry,
};
use xchan_store::SnapshotStore;

#[cfg(unix)]
use xchan_protocol::{ChannelConfig, FileChannel};
#[cfg(unix)]
use xchan_store::MappedStore;

/// Task ran and the group shut down gracefully.
pub const EXIT_OK: i32 = 0;
/// Task failed, or the group was terminated.
pub const EXIT_FAILED: i32 = 1;
/// The runner task could not be fetched from the channel.
pub const EXIT_RUNNER_UNAVAILABLE: i32 = 2;
/// The entry names no registered task.
pub const EXIT_UNKNOWN_ENTRY: i32 = 3;

/// Open `channel_name` and run `entry`. Returns the process exit code.
#[cfg(unix)]
pub fn run(
    channel_name: &str,
    entry: &str,
    config: ChannelConfig,
    registry: &TaskRegistry<MappedStore>,
) -> i32 {
    let channel = match FileChannel::open_with_config(channel_name, config) {
        Ok(channel) => channel,
        Err(err) => {
            error!(channel = %channel_name, error = %err, "could not open channel");
            return EXIT_FAILED;
        }
    };
    run_on(&channel, entry, registry)
}

/// Run `entry` on an open channel. Returns the process exit code.
pub fn run_on<S: SnapshotStore>(channel: &Channel<S>, entry: &str, registry: &TaskRegistry<S>) -> i32 {
    info!(channel = %channel.name(), entry, "remote entry starting");

    let task = if is_lambda_runner(entry) {
        match fetch_runner(channel, entry) {
            Ok(task) => task,
            Err(err) => {
                error!(entry, error = %err, "error getting a runner task");
                return EXIT_RUNNER_UNAVAILABLE;
            }
        }
    } else {
        Task::named(entry)
    };

    if !registry.contains(&task.name) {
        error!(entry, task = %task.name, "could not resolve task");
        return EXIT_UNKNOWN_ENTRY;
    }

    let mut exit_code = EXIT_OK;
    if let Err(err) = registry.run(&task, channel) {
        error!(entry, task = %task.name, error = %err, "task failed");
        exit_code = EXIT_FAILED;
    } else {
        match channel.await_shutdown(channel.config().default_timeout) {
            Ok(ShutdownKind::Graceful) => {}
            Ok(ShutdownKind::Terminated) => {
                error!(entry, "terminated while waiting for shutdown");
                exit_code = EXIT_FAILED;
            }
            Err(err) => {
                error!(entry, error = %err, "shutdown wait failed");
                exit_code = EXIT_FAILED;
            }
        }
    }

    info!(entry, exit_code, "shutting down");
    exit_code
}

fn fetch_runner<S: SnapshotStore>(channel: &Channel<S>, key: &str) -> Result<Task, TaskError> {
    let value = channel.wait_for(key)?;
    value.into_task().map_err(|source| {
        TaskError::Channel(ChannelError::Codec {
            key: key.to_string(),
            source,
        })
    })
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use xchan_codec::Value;
    use xchan_protocol::{lambda_runner_key, ChannelConfig};
    use xchan_store::MemoryStore;

    use super::*;

    fn channel() -> Channel<MemoryStore> {
        let config = ChannelConfig {
            poll_interval: Duration::from_millis(10),
            default_timeout: Duration::from_millis(500),
            ..ChannelConfig::default()
        };
        Channel::with_store("remote", MemoryStore::new(), config)
    }

    fn registry() -> TaskRegistry<MemoryStore> {
        let mut registry = TaskRegistry::<MemoryStore>::new();
        registry
            .register("publish", |call| {
                let key: String = call.captured_as().unwrap_or_else(|_| "published".to_string());
                call.channel()?.put_one(key, true)?;
                Ok(Value::from(true))
            })
            .register("fail", |call| Err(TaskError::failed(call.name(), "boom")));
        registry
    }

    #[test]
    fn named_entry_runs_then_waits_for_shutdown() {
        let channel = channel();
        channel.signal_shutdown().unwrap();
        assert_eq!(run_on(&channel, "publish", &registry()), EXIT_OK);
        assert!(channel.snapshot().unwrap().contains_key("published"));
    }

    #[test]
    fn runner_entry_fetches_task() {
        let channel = channel();
        let key = lambda_runner_key(1);
        channel
            .put_task(key.clone(), Task::new("publish", "from-runner"))
            .unwrap();
        channel.signal_shutdown().unwrap();
        assert_eq!(run_on(&channel, &key, &registry()), EXIT_OK);
        assert!(channel.snapshot().unwrap().contains_key("from-runner"));
    }

    #[test]
    fn missing_runner_task() {
        let channel = channel();
        assert_eq!(
            run_on(&channel, &lambda_runner_key(7), &registry()),
            EXIT_RUNNER_UNAVAILABLE
        );
    }

    #[test]
    fn runner_key_holding_data() {
        let channel = channel();
        channel.put_one(lambda_runner_key(1), "not a task").unwrap();
        assert_eq!(
            run_on(&channel, &lambda_runner_key(1), &registry()),
            EXIT_RUNNER_UNAVAILABLE
        );
    }

    #[test]
    fn unknown_entry() {
        assert_eq!(run_on(&channel(), "nope", &registry()), EXIT_UNKNOWN_ENTRY);
    }

    #[test]
    fn failing_task() {
        assert_eq!(run_on(&channel(), "fail", &registry()), EXIT_FAILED);
    }

    #[test]
    fn terminate_while_waiting_for_shutdown() {
        let store = MemoryStore::new();
        let config = ChannelConfig {
            poll_interval: Duration::from_millis(10),
            default_timeout: Duration::from_secs(10),
            ..ChannelConfig::default()
        };
        let child = Channel::with_store("remote", store.clone(), config.clone());
        let parent = Channel::with_store("remote", store, config);

        let handle = thread::spawn(move || run_on(&child, "publish", &registry()));
        parent.get_one("published", Duration::from_secs(2)).unwrap();
        parent.signal_terminate().unwrap();
        assert_eq!(handle.join().unwrap(), EXIT_FAILED);
    }
}
