#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use xchan::process::{Accessor, ProcessConfig, Termination};
use xchan::{ChannelConfig, FileChannel, Task};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/xchan-group-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn accessor(dir: &Path, channel: &str) -> Accessor {
    let config = ChannelConfig {
        dir: dir.to_path_buf(),
        ..ChannelConfig::default()
    };
    Accessor::with_config(
        channel,
        env!("CARGO_BIN_EXE_xchan"),
        config,
        ProcessConfig::default(),
    )
    .expect("accessor should open channel")
}

fn remote(dir: &Path, channel: &str, entry: &str) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_xchan"));
    cmd.arg("--log-level")
        .arg("error")
        .arg("--dir")
        .arg(dir)
        .arg("remote")
        .arg("--channel")
        .arg(channel)
        .arg(entry)
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    cmd
}

#[test]
fn greet_task_crosses_process_boundary() {
    let dir = unique_temp_dir("greet");
    let mut group = accessor(&dir, "comm_channel");

    group
        .channel()
        .put_task("Greet", Task::new("const", "Hi, How are you?"))
        .expect("task should be stored");
    group
        .start("relay", Duration::from_secs(20))
        .expect("child should start");

    let reply: String = group
        .channel()
        .get_as("Greet Reply", Duration::from_secs(10))
        .expect("child should reply");
    assert_eq!(reply, "Hi, How are you?");

    let report = group.shutdown().expect("shutdown should succeed");
    assert_eq!(report.children.len(), 1);
    assert!(report.is_clean(), "{report:?}");
    assert!(report.file_removed);
    assert!(!dir.join("comm_channel.tmp").exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn runner_task_is_fetched_by_child() {
    let dir = unique_temp_dir("runner");
    let mut group = accessor(&dir, "runner");

    let publish = Task::new("publish", serde_json::json!({"start": 0, "count": 5}));
    let child = group
        .start_task(publish, Duration::from_secs(20))
        .expect("child should start");
    assert_eq!(child.label(), "Lambda Runner1");

    let table = group
        .channel()
        .get(["0", "1", "2", "3", "4"], Duration::from_secs(10))
        .expect("child should publish");
    assert_eq!(table.len(), 5);

    let report = group.shutdown().expect("shutdown should succeed");
    assert!(report.is_clean(), "{report:?}");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn two_processes_contend_for_two_hundred_keys() {
    let dir = unique_temp_dir("contend");
    let mut group = accessor(&dir, "contend");

    let publish = Task::new("publish", serde_json::json!({"start": 0, "count": 100}));
    group
        .start_task(publish, Duration::from_secs(60))
        .expect("child should start");

    for i in 100u64..200 {
        group
            .channel()
            .put_one(i.to_string(), i)
            .expect("parent put should succeed");
    }

    let keys: Vec<String> = (0..200).map(|i: u64| i.to_string()).collect();
    let removed = group
        .channel()
        .remove(keys, Duration::from_secs(30))
        .expect("all keys should arrive");
    assert_eq!(removed.len(), 200);
    for (key, value) in &removed {
        let number: u64 = value.decode().expect("value should be a number");
        assert_eq!(&number.to_string(), key);
    }

    let report = group.shutdown().expect("shutdown should succeed");
    assert!(report.is_clean(), "{report:?}");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn complex_object_published_by_cli_is_readable_in_library() {
    let dir = unique_temp_dir("complex");
    let object = serde_json::json!({
        "name": "widget",
        "dimensions": {"w": 3, "h": 4},
        "tags": ["a", "b"],
        "ratio": 0.75,
        "enabled": true
    });

    let output = Command::new(env!("CARGO_BIN_EXE_xchan"))
        .arg("--log-level")
        .arg("error")
        .arg("--dir")
        .arg(&dir)
        .args(["put", "complex", "Object", "--json", &object.to_string()])
        .output()
        .expect("put should run");
    assert!(output.status.success());

    let config = ChannelConfig {
        dir: dir.clone(),
        ..ChannelConfig::default()
    };
    let channel = FileChannel::open_with_config("complex", config).expect("channel should open");
    let read: serde_json::Value = channel
        .get_as("Object", Duration::from_secs(2))
        .expect("object should be present");
    assert_eq!(read, object);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn terminate_fails_idle_child() {
    let dir = unique_temp_dir("idle");
    let config = ChannelConfig {
        dir: dir.clone(),
        ..ChannelConfig::default()
    };
    let channel = FileChannel::open_with_config("idle", config).expect("channel should open");

    let child = remote(&dir, "idle", "idle").spawn().expect("child should start");
    std::thread::sleep(Duration::from_millis(500));
    channel.signal_terminate().expect("terminate should be written");

    let output = child.wait_with_output().expect("child should exit");
    assert_eq!(output.status.code(), Some(1));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn shutdown_ends_idle_child_cleanly() {
    let dir = unique_temp_dir("graceful");
    let mut group = accessor(&dir, "graceful");
    group
        .start("idle", Duration::from_secs(20))
        .expect("child should start");

    let report = group.shutdown().expect("shutdown should succeed");
    assert_eq!(report.children[0].termination, Termination::Success);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unknown_entry_exits_with_3() {
    let dir = unique_temp_dir("unknown");
    let output = remote(&dir, "unknown", "no-such-task")
        .output()
        .expect("child should run");
    assert_eq!(output.status.code(), Some(3));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn failing_task_exits_with_1() {
    let dir = unique_temp_dir("fail");
    let output = remote(&dir, "fail", "fail").output().expect("child should run");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("task failed on request"));
    let _ = std::fs::remove_dir_all(&dir);
}
