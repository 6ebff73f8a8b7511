use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};

/// Maximum length of a task name.
pub const MAX_TASK_NAME_LEN: usize = 128;

/// A named operation plus the state it captured when it was created.
///
/// Tasks are the cross-process form of a closure: the name must resolve to
/// the same operation in every process that executes it, and `captured`
/// carries whatever the operation needs beyond its call-time input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Stable operation name, resolved through a registry in the target process.
    pub name: String,
    /// Captured state.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub captured: serde_json::Value,
}

impl Task {
    /// Create a task with captured state.
    pub fn new(name: impl Into<String>, captured: impl Into<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            captured: captured.into(),
        }
    }

    /// Create a task that captures nothing.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, serde_json::Value::Null)
    }

    /// Create a task whose captured state is any serializable value.
    pub fn with_state<T: Serialize>(name: impl Into<String>, state: &T) -> Result<Self> {
        let captured = serde_json::to_value(state)
            .map_err(|err| CodecError::NotSerializable(err.to_string()))?;
        Ok(Self::new(name, captured))
    }

    /// Check that the task can be resolved by name in another process.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CodecError::NotSerializable(
                "task name must not be empty".to_string(),
            ));
        }
        if self.name.len() > MAX_TASK_NAME_LEN {
            return Err(CodecError::NotSerializable(format!(
                "task name exceeds {MAX_TASK_NAME_LEN} bytes"
            )));
        }
        if let Some(bad) = self
            .name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-')))
        {
            return Err(CodecError::NotSerializable(format!(
                "task name {:?} contains {bad:?}",
                self.name
            )));
        }
        Ok(())
    }

    /// Decode the captured state into a concrete type.
    pub fn captured_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&self.captured)?)
    }
}

/// A value stored in the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Plain structured data.
    Data(serde_json::Value),
    /// A function value.
    Task(Task),
}

impl Value {
    /// Serialize any value into channel data.
    ///
    /// Fails with [`CodecError::NotSerializable`] when `value` has no JSON
    /// form, for example a map keyed by non-string values.
    pub fn data<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Value::Data)
            .map_err(|err| CodecError::NotSerializable(err.to_string()))
    }

    /// Decode a data value into a concrete type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        match self {
            Value::Data(value) => Ok(T::deserialize(value)?),
            Value::Task(_) => Err(CodecError::WrongKind {
                expected: "data",
                found: "task",
            }),
        }
    }

    /// Check that the value can cross a process boundary.
    pub fn validate(&self) -> Result<()> {
        match self {
            Value::Data(_) => Ok(()),
            Value::Task(task) => task.validate(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Data(_) => "data",
            Value::Task(_) => "task",
        }
    }

    pub fn as_task(&self) -> Option<&Task> {
        match self {
            Value::Task(task) => Some(task),
            Value::Data(_) => None,
        }
    }

    pub fn into_task(self) -> Result<Task> {
        match self {
            Value::Task(task) => Ok(task),
            Value::Data(_) => Err(CodecError::WrongKind {
                expected: "task",
                found: "data",
            }),
        }
    }

    pub fn as_data(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Data(value) => Some(value),
            Value::Task(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_data().and_then(serde_json::Value::as_str)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Data(value) => write!(f, "{value}"),
            Value::Task(task) if task.captured.is_null() => write!(f, "task:{}", task.name),
            Value::Task(task) => write!(f, "task:{}({})", task.name, task.captured),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::Data(value)
    }
}

impl From<Task> for Value {
    fn from(task: Task) -> Self {
        Value::Task(task)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Data(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Data(value.into())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Data(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Data(value.into())
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Data(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Data(value.into())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;

    #[test]
    fn data_from_struct_decodes_back() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Point {
            x: i32,
            y: i32,
        }

        let value = Value::data(&Point { x: 3, y: -4 }).unwrap();
        assert_eq!(value, Value::Data(json!({"x": 3, "y": -4})));
        assert_eq!(value.decode::<Point>().unwrap(), Point { x: 3, y: -4 });
    }

    #[test]
    fn non_string_map_keys_are_not_serializable() {
        let mut map = HashMap::new();
        map.insert((1, 2), "pair");

        let err = Value::data(&map).unwrap_err();
        assert!(matches!(err, CodecError::NotSerializable(_)));
    }

    #[test]
    fn decode_task_as_data_is_wrong_kind() {
        let value = Value::from(Task::named("idle"));
        let err = value.decode::<String>().unwrap_err();
        assert!(matches!(
            err,
            CodecError::WrongKind {
                expected: "data",
                found: "task"
            }
        ));
    }

    #[test]
    fn decode_mismatched_shape_is_json_error() {
        let value = Value::from("not a number");
        assert!(matches!(value.decode::<u32>(), Err(CodecError::Json(_))));
    }

    #[test]
    fn task_validation() {
        assert!(Task::named("relay").validate().is_ok());
        assert!(Task::named("demo::greet-v2.1").validate().is_ok());
        assert!(Task::named("").validate().is_err());
        assert!(Task::named("has space").validate().is_err());
        assert!(Task::named("x".repeat(MAX_TASK_NAME_LEN + 1))
            .validate()
            .is_err());
    }

    #[test]
    fn task_captured_state_roundtrip() {
        let task = Task::with_state("const", &vec!["1", "2", "3"]).unwrap();
        assert_eq!(task.captured, json!(["1", "2", "3"]));
        let state: Vec<String> = task.captured_as().unwrap();
        assert_eq!(state, vec!["1", "2", "3"]);
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::from("A").to_string(), "\"A\"");
        assert_eq!(Value::from(Task::named("idle")).to_string(), "task:idle");
        assert_eq!(
            Value::from(Task::new("const", "Hi")).to_string(),
            "task:const(\"Hi\")"
        );
    }
}
