use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use xchan_codec::{Table, Value};
use xchan_store::{MappedStore, SnapshotStore, StoreConfig};

use crate::cmd::{Context, DoctorArgs};
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::OutputFormat;

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Info,
    Skip,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(_args: DoctorArgs, ctx: &Context) -> CliResult<i32> {
    let checks = vec![
        channel_dir_check(&ctx.dir),
        mapped_roundtrip_check(&ctx.dir),
        dir_override_check(),
        compiled_features_check(),
    ];

    let has_fail = checks.iter().any(|c| matches!(c.status, CheckStatus::Fail));
    let overall = if has_fail { "fail" } else { "pass" };
    let output = DoctorOutput { checks, overall };

    print_doctor(&output, ctx.format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("xchan doctor\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<22} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => {
            println!("{}", output.overall);
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Info => "INFO",
        CheckStatus::Skip => "SKIP",
    }
}

fn channel_dir_check(dir: &Path) -> CheckResult {
    let status = if dir.is_dir() {
        CheckStatus::Pass
    } else {
        CheckStatus::Fail
    };
    let detail = match status {
        CheckStatus::Pass => format!("{} exists", dir.display()),
        _ => format!("{} is not a directory", dir.display()),
    };
    CheckResult {
        name: "channel_dir".to_string(),
        status,
        detail,
    }
}

/// Write and read back a probe table through a real mapped channel file.
fn mapped_roundtrip_check(dir: &Path) -> CheckResult {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let name = format!("xchan-doctor-{}-{nanos}", std::process::id());

    let result = MappedStore::for_channel(dir, &name, StoreConfig::default()).and_then(|store| {
        let mut table = Table::new();
        table.insert("probe".to_string(), Value::from(true));
        let outcome = store
            .with_lock(|| store.write_snapshot(&table))
            .and_then(|_| store.read_snapshot());
        let _ = std::fs::remove_file(store.path());
        outcome.map(|read| read == table)
    });

    match result {
        Ok(true) => CheckResult {
            name: "mapped_roundtrip".to_string(),
            status: CheckStatus::Pass,
            detail: "mmap write/read and flock succeeded".to_string(),
        },
        Ok(false) => CheckResult {
            name: "mapped_roundtrip".to_string(),
            status: CheckStatus::Fail,
            detail: "probe table did not read back unchanged".to_string(),
        },
        Err(err) => CheckResult {
            name: "mapped_roundtrip".to_string(),
            status: CheckStatus::Fail,
            detail: format!("mapped channel probe failed: {err}"),
        },
    }
}

fn dir_override_check() -> CheckResult {
    match std::env::var("XCHAN_DIR") {
        Ok(value) => CheckResult {
            name: "dir_override".to_string(),
            status: CheckStatus::Info,
            detail: format!("XCHAN_DIR={value}"),
        },
        Err(_) => CheckResult {
            name: "dir_override".to_string(),
            status: CheckStatus::Skip,
            detail: "XCHAN_DIR not set, using the platform temp directory".to_string(),
        },
    }
}

fn compiled_features_check() -> CheckResult {
    let mut features = Vec::new();
    if cfg!(feature = "process") {
        features.push("process");
    }
    if cfg!(feature = "cli") {
        features.push("cli");
    }

    CheckResult {
        name: "compiled_features".to_string(),
        status: CheckStatus::Info,
        detail: features.join(", "),
    }
}
