use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use xchan_codec::{Task, Value};
use xchan_store::SnapshotStore;

use crate::channel::Channel;
use crate::error::TaskError;

type Handler<S> = Box<dyn Fn(&TaskCall<'_, S>) -> Result<Value, TaskError> + Send + Sync>;

/// Operations a process can execute by name.
///
/// Every process that may run a task must register the same names with
/// compatible behavior; the name is all that crosses the channel.
pub struct TaskRegistry<S> {
    handlers: BTreeMap<String, Handler<S>>,
}

/// Context handed to a task handler.
pub struct TaskCall<'a, S> {
    task: &'a Task,
    input: Option<&'a Value>,
    channel: Option<&'a Channel<S>>,
    registry: &'a TaskRegistry<S>,
}

impl<S> Default for TaskRegistry<S> {
    fn default() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }
}

impl<S> fmt::Debug for TaskRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<S: SnapshotStore> TaskRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous handler.
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&TaskCall<'_, S>) -> Result<Value, TaskError> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.handlers.insert(name.clone(), Box::new(handler)).is_some() {
            warn!(task = %name, "replacing registered task");
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered task names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Apply `task` to `input` without a channel.
    pub fn invoke(&self, task: &Task, input: &Value) -> Result<Value, TaskError> {
        self.call(task, Some(input), None)
    }

    /// Run `task` against `channel`, with no call-time input.
    pub fn run(&self, task: &Task, channel: &Channel<S>) -> Result<Value, TaskError> {
        self.call(task, None, Some(channel))
    }

    /// Resolve `task` by name and execute it.
    pub fn call(
        &self,
        task: &Task,
        input: Option<&Value>,
        channel: Option<&Channel<S>>,
    ) -> Result<Value, TaskError> {
        let handler = self
            .handlers
            .get(&task.name)
            .ok_or_else(|| TaskError::Unknown(task.name.clone()))?;
        debug!(task = %task.name, has_input = input.is_some(), "running task");
        let call = TaskCall {
            task,
            input,
            channel,
            registry: self,
        };
        handler(&call)
    }
}

impl<'a, S: SnapshotStore> TaskCall<'a, S> {
    pub fn name(&self) -> &str {
        &self.task.name
    }

    pub fn task(&self) -> &Task {
        self.task
    }

    pub fn captured(&self) -> &serde_json::Value {
        &self.task.captured
    }

    /// Decode the captured state.
    pub fn captured_as<T: DeserializeOwned>(&self) -> Result<T, TaskError> {
        Ok(self.task.captured_as()?)
    }

    pub fn input(&self) -> Option<&Value> {
        self.input
    }

    /// Decode the call-time input. A missing input decodes from `null`.
    pub fn input_as<T: DeserializeOwned>(&self) -> Result<T, TaskError> {
        match self.input {
            Some(value) => Ok(value.decode()?),
            None => Ok(Value::Data(serde_json::Value::Null).decode()?),
        }
    }

    /// Channel the task runs against.
    pub fn channel(&self) -> Result<&'a Channel<S>, TaskError> {
        self.channel
            .ok_or_else(|| TaskError::NoChannel(self.task.name.clone()))
    }

    /// Registry the task was resolved from, for tasks that run nested tasks.
    pub fn registry(&self) -> &'a TaskRegistry<S> {
        self.registry
    }
}
