use tracing::debug;
use xchan_codec::{Task, Value};

use crate::cmd::{Context, PutArgs};
use crate::exit::{channel_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::print_entries;

pub fn run(args: PutArgs, ctx: &Context) -> CliResult<i32> {
    let value = resolve_value(&args)?;
    let channel = ctx.open(&args.channel)?;
    debug!(channel = %args.channel, key = %args.key, kind = value.kind(), "put");

    let previous = channel
        .put_one(args.key.clone(), value)
        .map_err(|err| channel_error("put failed", err))?;
    print_entries(
        &args.channel,
        [(args.key.as_str(), previous.as_ref())],
        ctx.format,
    );
    Ok(SUCCESS)
}

fn resolve_value(args: &PutArgs) -> CliResult<Value> {
    if let Some(json) = &args.json {
        let value = parse_json("--json", json)?;
        return Ok(Value::Data(value));
    }
    if let Some(data) = &args.data {
        return Ok(Value::from(data.as_str()));
    }
    if let Some(name) = &args.task {
        let captured = match &args.captured {
            Some(json) => parse_json("--captured", json)?,
            None => serde_json::Value::Null,
        };
        return Ok(Value::Task(Task::new(name.as_str(), captured)));
    }
    Err(CliError::new(USAGE, "one of --json, --data or --task is required"))
}

fn parse_json(flag: &str, input: &str) -> CliResult<serde_json::Value> {
    serde_json::from_str(input)
        .map_err(|err| CliError::new(USAGE, format!("{flag} is not valid JSON: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> PutArgs {
        PutArgs {
            channel: "c".to_string(),
            key: "k".to_string(),
            json: None,
            data: None,
            task: None,
            captured: None,
        }
    }

    #[test]
    fn json_value() {
        let value = resolve_value(&PutArgs {
            json: Some("[1,2]".to_string()),
            ..args()
        })
        .unwrap();
        assert_eq!(value, Value::Data(serde_json::json!([1, 2])));
    }

    #[test]
    fn task_with_captured_state() {
        let value = resolve_value(&PutArgs {
            task: Some("concat".to_string()),
            captured: Some("\"Hi, \"".to_string()),
            ..args()
        })
        .unwrap();
        assert_eq!(value, Value::Task(Task::new("concat", "Hi, ")));
    }

    #[test]
    fn invalid_json_is_usage_error() {
        let err = resolve_value(&PutArgs {
            json: Some("{".to_string()),
            ..args()
        })
        .unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}
