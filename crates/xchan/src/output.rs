use std::collections::BTreeMap;
use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use xchan_codec::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// JSON form of a channel value.
#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ValueOutput<'a> {
    Data {
        value: &'a serde_json::Value,
    },
    Task {
        name: &'a str,
        #[serde(skip_serializing_if = "serde_json::Value::is_null")]
        captured: &'a serde_json::Value,
    },
}

impl<'a> From<&'a Value> for ValueOutput<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Data(value) => ValueOutput::Data { value },
            Value::Task(task) => ValueOutput::Task {
                name: &task.name,
                captured: &task.captured,
            },
        }
    }
}

#[derive(Serialize)]
struct EntriesOutput<'a> {
    channel: &'a str,
    entries: BTreeMap<&'a str, ValueOutput<'a>>,
}

/// Print the entries a `get`/`remove` returned, or the previous values of a `put`.
pub fn print_entries<'a, I>(channel: &str, entries: I, format: OutputFormat)
where
    I: IntoIterator<Item = (&'a str, Option<&'a Value>)>,
{
    let entries: Vec<(&str, Option<&Value>)> = entries.into_iter().collect();
    match format {
        OutputFormat::Json => {
            let out = EntriesOutput {
                channel,
                entries: entries
                    .iter()
                    .filter_map(|(key, value)| value.map(|value| (*key, ValueOutput::from(value))))
                    .collect(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KEY", "KIND", "VALUE"]);
            for (key, value) in &entries {
                table.add_row(vec![
                    key.to_string(),
                    value.map(Value::kind).unwrap_or("-").to_string(),
                    value.map(Value::to_string).unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (key, value) in &entries {
                match value {
                    Some(value) => println!("{key} ({}) = {value}", value.kind()),
                    None => println!("{key} (none)"),
                }
            }
        }
        OutputFormat::Raw => {
            for (_, value) in &entries {
                if let Some(value) = value {
                    print_raw(raw_text(value).as_bytes());
                    print_raw(b"\n");
                }
            }
        }
    }
}

/// One row of `inspect`.
#[derive(Debug, Serialize)]
pub struct EntrySummary {
    pub key: String,
    pub kind: &'static str,
    pub size: usize,
    pub control: bool,
}

#[derive(Serialize)]
pub struct InspectOutput<'a> {
    pub channel: &'a str,
    pub path: String,
    pub capacity: usize,
    pub used: usize,
    pub entries: &'a [EntrySummary],
}

pub fn print_inspect(output: &InspectOutput<'_>, format: OutputFormat) {
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
                .set_header(vec!["KEY", "KIND", "SIZE", "CONTROL"]);
            for entry in output.entries {
                table.add_row(vec![
                    entry.key.clone(),
                    entry.kind.to_string(),
                    entry.size.to_string(),
                    if entry.control { "yes" } else { "" }.to_string(),
                ]);
            }
            println!("{table}");
            println!(
                "{} ({} of {} bytes used)",
                output.path, output.used, output.capacity
            );
        }
        OutputFormat::Pretty => {
            println!("channel {} at {}", output.channel, output.path);
            println!("  used {} of {} bytes", output.used, output.capacity);
            for entry in output.entries {
                println!("  {:<24} {:<5} {:>6}", entry.key, entry.kind, entry.size);
            }
        }
        OutputFormat::Raw => {
            for entry in output.entries {
                println!("{}", entry.key);
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Strings print bare; everything else prints as JSON.
fn raw_text(value: &Value) -> String {
    match value {
        Value::Data(serde_json::Value::String(text)) => text.clone(),
        Value::Data(other) => other.to_string(),
        Value::Task(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use xchan_codec::Task;

    use super::*;

    #[test]
    fn value_output_tags_kind() {
        let data = Value::from(json!({"a": 1}));
        let json = serde_json::to_value(ValueOutput::from(&data)).unwrap();
        assert_eq!(json, json!({"kind": "data", "value": {"a": 1}}));

        let task = Value::Task(Task::named("idle"));
        let json = serde_json::to_value(ValueOutput::from(&task)).unwrap();
        assert_eq!(json, json!({"kind": "task", "name": "idle"}));
    }

    #[test]
    fn raw_text_unquotes_strings() {
        assert_eq!(raw_text(&Value::from("hi")), "hi");
        assert_eq!(raw_text(&Value::from(3i64)), "3");
    }
}
