use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use xchan_codec::{FORMAT_VERSION, HEADER_SIZE, MAGIC};
use xchan_protocol::{ChannelConfig, LAMBDA_RUNNER_PREFIX, SHUTDOWN_KEY, TERMINATE_KEY};
use xchan_store::{channel_path, MIN_CAPACITY};

use crate::cmd::{Context, EnvinfoArgs};
use crate::exit::{store_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Debug, Serialize)]
struct ChannelFile {
    name: String,
    path: String,
    exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
}

#[derive(Debug, Serialize)]
struct EnvInfoOutput {
    version: &'static str,
    dir: String,
    xchan_dir: Option<String>,
    magic: String,
    format_version: u16,
    header_size: usize,
    capacity: usize,
    min_capacity: usize,
    locking: bool,
    poll_interval_ms: u128,
    default_timeout_ms: u128,
    read_retries: u32,
    control_keys: [&'static str; 3],
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<ChannelFile>,
}

impl EnvInfoOutput {
    fn new(ctx: &Context, config: &ChannelConfig) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            dir: ctx.dir.display().to_string(),
            xchan_dir: std::env::var("XCHAN_DIR").ok(),
            magic: String::from_utf8_lossy(&MAGIC).into_owned(),
            format_version: FORMAT_VERSION,
            header_size: HEADER_SIZE,
            capacity: config.store.capacity,
            min_capacity: MIN_CAPACITY,
            locking: config.store.lock,
            poll_interval_ms: config.poll_interval.as_millis(),
            default_timeout_ms: config.default_timeout.as_millis(),
            read_retries: config.read_retries,
            control_keys: [SHUTDOWN_KEY, TERMINATE_KEY, LAMBDA_RUNNER_PREFIX],
            channel: None,
        }
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        let mut rows = vec![
            ("version", self.version.to_string()),
            ("channel dir", self.dir.clone()),
            (
                "XCHAN_DIR",
                self.xchan_dir.clone().unwrap_or_else(|| "(not set)".to_string()),
            ),
            (
                "wire format",
                format!(
                    "{:?} v{}, {}-byte header",
                    self.magic, self.format_version, self.header_size
                ),
            ),
            (
                "capacity",
                format!("{} bytes (min {})", self.capacity, self.min_capacity),
            ),
            ("locking", if self.locking { "flock" } else { "off" }.to_string()),
            (
                "polling",
                format!(
                    "every {}ms, default timeout {}ms, {} read retries",
                    self.poll_interval_ms, self.default_timeout_ms, self.read_retries
                ),
            ),
            ("control keys", format!("{:?}", self.control_keys)),
        ];
        if let Some(channel) = &self.channel {
            let state = match channel.size {
                Some(size) => format!("{size} bytes"),
                None if channel.exists => "present".to_string(),
                None => "absent".to_string(),
            };
            rows.push(("channel", channel.name.clone()));
            rows.push(("channel file", format!("{} ({state})", channel.path)));
        }
        rows
    }
}

pub fn run(args: EnvinfoArgs, ctx: &Context) -> CliResult<i32> {
    let config = ctx.channel_config();
    let mut output = EnvInfoOutput::new(ctx, &config);

    if let Some(name) = args.name {
        let path = channel_path(&config.dir, &name)
            .map_err(|err| store_error("failed to resolve channel", err))?;
        let size = std::fs::metadata(&path).ok().map(|meta| meta.len());
        output.channel = Some(ChannelFile {
            name,
            path: path.display().to_string(),
            exists: size.is_some(),
            size,
        });
    }

    print_envinfo(&output, ctx.format);
    Ok(SUCCESS)
}

fn print_envinfo(output: &EnvInfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (field, value) in output.rows() {
                table.add_row(vec![field.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (field, value) in output.rows() {
                println!("  {field:<14} {value}");
            }
        }
        OutputFormat::Raw => match &output.channel {
            Some(channel) => println!("{}", channel.path),
            None => println!("{}", output.dir),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn context() -> Context {
        Context {
            format: OutputFormat::Json,
            dir: PathBuf::from("/tmp/xchan-envinfo"),
        }
    }

    #[test]
    fn reports_wire_format_and_defaults() {
        let ctx = context();
        let output = EnvInfoOutput::new(&ctx, &ctx.channel_config());

        let json = serde_json::to_value(&output).expect("envinfo output should serialize");
        assert_eq!(json["magic"], "XC");
        assert_eq!(json["format_version"], FORMAT_VERSION);
        assert_eq!(json["header_size"], 8);
        assert_eq!(json["capacity"], 4096);
        assert_eq!(json["poll_interval_ms"], 100);
        assert_eq!(json["control_keys"][1], "Terminate JVM");
        assert!(json.get("channel").is_none());
    }

    #[test]
    fn channel_rows_show_resolved_path() {
        let ctx = context();
        let mut output = EnvInfoOutput::new(&ctx, &ctx.channel_config());
        output.channel = Some(ChannelFile {
            name: "comm".to_string(),
            path: "/tmp/xchan-envinfo/comm.tmp".to_string(),
            exists: false,
            size: None,
        });

        let rows = output.rows();
        let file = rows
            .iter()
            .find(|(field, _)| *field == "channel file")
            .map(|(_, value)| value.as_str());
        assert_eq!(file, Some("/tmp/xchan-envinfo/comm.tmp (absent)"));
    }
}
