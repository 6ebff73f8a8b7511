//! Tasks every `xchan` process can run by name.
//!
//! Captured state is optional JSON; a task launched by name alone runs with
//! its defaults.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::info;
use xchan_codec::Value;
use xchan_protocol::{TaskCall, TaskError, TaskRegistry};
use xchan_store::SnapshotStore;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RelayArgs {
    /// Key holding the task (or data) to relay.
    from: String,
    /// Key the result is written to.
    to: String,
    /// Input handed to a relayed task.
    input: serde_json::Value,
}

impl Default for RelayArgs {
    fn default() -> Self {
        Self {
            from: "Greet".to_string(),
            to: "Greet Reply".to_string(),
            input: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RangeArgs {
    start: u64,
    count: u64,
    /// Where `count` reports how many entries it claimed.
    key: String,
}

impl Default for RangeArgs {
    fn default() -> Self {
        Self {
            start: 0,
            count: 100,
            key: "Count".to_string(),
        }
    }
}

impl RangeArgs {
    fn keys(&self) -> impl Iterator<Item = String> {
        (self.start..self.start + self.count).map(|i| i.to_string())
    }
}

pub fn builtin_registry<S: SnapshotStore + 'static>() -> TaskRegistry<S> {
    let mut registry = TaskRegistry::<S>::new();
    registry
        .register("const", |call| Ok(Value::Data(call.captured().clone())))
        .register("concat", concat)
        .register("relay", relay)
        .register("publish", publish)
        .register("count", count)
        .register("idle", |_| Ok(Value::Data(serde_json::Value::Null)))
        .register("fail", |call| {
            let message = call
                .captured()
                .as_str()
                .unwrap_or("task failed on request")
                .to_string();
            Err(TaskError::failed(call.name(), message))
        });
    registry
}

/// Captured state, or the defaults when none was captured.
fn captured_or_default<T, S>(call: &TaskCall<'_, S>) -> Result<T, TaskError>
where
    T: DeserializeOwned + Default,
    S: SnapshotStore,
{
    if call.captured().is_null() {
        Ok(T::default())
    } else {
        call.captured_as()
    }
}

fn concat<S: SnapshotStore>(call: &TaskCall<'_, S>) -> Result<Value, TaskError> {
    let prefix = call.captured().as_str().unwrap_or_default().to_string();
    let input: String = call.input_as()?;
    Ok(Value::from(prefix + &input))
}

/// Fetch `from`, run it if it is a task, and write the result to `to`.
fn relay<S: SnapshotStore>(call: &TaskCall<'_, S>) -> Result<Value, TaskError> {
    let args: RelayArgs = captured_or_default(call)?;
    let channel = call.channel()?;
    let fetched = channel.wait_for(args.from.clone())?;
    let result = match fetched {
        Value::Task(task) => {
            let input = Value::Data(args.input);
            call.registry().call(&task, Some(&input), Some(channel))?
        }
        data => data,
    };
    channel.put_one(args.to.clone(), result.clone())?;
    info!(from = %args.from, to = %args.to, "relayed value");
    Ok(result)
}

/// Write keys `start..start+count`, each holding its own number.
fn publish<S: SnapshotStore>(call: &TaskCall<'_, S>) -> Result<Value, TaskError> {
    let args: RangeArgs = captured_or_default(call)?;
    let channel = call.channel()?;
    for i in args.start..args.start + args.count {
        channel.put_one(i.to_string(), i)?;
    }
    info!(start = args.start, count = args.count, "published range");
    Ok(Value::from(args.count))
}

/// Claim keys `start..start+count`, check each holds its own number, and
/// report the total under `key`.
fn count<S: SnapshotStore>(call: &TaskCall<'_, S>) -> Result<Value, TaskError> {
    let args: RangeArgs = captured_or_default(call)?;
    let channel = call.channel()?;
    let claimed = channel.remove(args.keys(), channel.config().default_timeout)?;
    for (key, value) in &claimed {
        let number: u64 = value.decode()?;
        if number.to_string() != *key {
            return Err(TaskError::failed(
                call.name(),
                format!("key {key:?} holds {number}"),
            ));
        }
    }
    let total = claimed.len() as u64;
    channel.put_one(args.key.clone(), total)?;
    Ok(Value::from(total))
}
