use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use xchan_codec::{Table, Task, Value};
use xchan_store::{SnapshotStore, StoreError};

#[cfg(unix)]
use xchan_store::MappedStore;

use crate::config::ChannelConfig;
use crate::control::{ShutdownKind, SHUTDOWN_KEY, TERMINATE_KEY};
use crate::error::{ChannelError, Result};

/// A channel backed by a memory-mapped file.
#[cfg(unix)]
pub type FileChannel = Channel<MappedStore>;

/// A named rendezvous point shared by cooperating processes.
///
/// `put` merges entries into the shared table. `get` and `remove` poll the
/// table until every requested key has been observed, the timeout elapses,
/// or the terminate key appears. A key's value is fixed for the rest of a
/// call once observed, even if a peer later overwrites it.
///
/// Concurrent `put`s from different processes interleave at snapshot
/// granularity. The store lock narrows the window, but writers that need
/// every update to survive should use disjoint keys.
#[derive(Debug)]
pub struct Channel<S> {
    name: String,
    store: S,
    config: ChannelConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WaitMode {
    Get,
    Remove,
}

impl WaitMode {
    fn verb(self) -> &'static str {
        match self {
            WaitMode::Get => "received",
            WaitMode::Remove => "removed",
        }
    }
}

/// Per-call state of a `get`/`remove`.
struct PendingWait {
    keys: BTreeSet<String>,
    results: Table,
    started: Instant,
    timeout: Duration,
    read_failures: u32,
}

impl PendingWait {
    fn new(keys: BTreeSet<String>, timeout: Duration) -> Self {
        Self {
            keys,
            results: Table::new(),
            started: Instant::now(),
            timeout,
            read_failures: 0,
        }
    }

    /// Record every requested key present in `table` that was not seen yet.
    fn collect(&mut self, table: &Table) -> Vec<String> {
        let mut newly = Vec::new();
        for key in &self.keys {
            if self.results.contains_key(key) {
                continue;
            }
            if let Some(value) = table.get(key) {
                self.results.insert(key.clone(), value.clone());
                newly.push(key.clone());
            }
        }
        newly
    }

    fn is_complete(&self) -> bool {
        self.results.len() == self.keys.len()
    }

    fn missing(&self) -> Vec<String> {
        self.keys
            .iter()
            .filter(|key| !self.results.contains_key(*key))
            .cloned()
            .collect()
    }

    fn awaiting_shutdown(&self) -> bool {
        self.keys.contains(SHUTDOWN_KEY)
    }

    fn expired(&self) -> bool {
        self.started.elapsed() > self.timeout
    }

    fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.started.elapsed())
    }

    fn key_list(&self) -> Vec<String> {
        self.keys.iter().cloned().collect()
    }
}

/// Outcome of one poll tick.
enum Tick {
    Snapshot(Table),
    ReadFailed(StoreError),
}

#[cfg(unix)]
impl Channel<MappedStore> {
    /// Open channel `name` in the platform temp directory.
    pub fn open(name: &str) -> Result<Self> {
        Self::open_with_config(name, ChannelConfig::default())
    }

    /// Open channel `name` with explicit configuration.
    pub fn open_with_config(name: &str, config: ChannelConfig) -> Result<Self> {
        let store = MappedStore::for_channel(&config.dir, name, config.store).map_err(|source| {
            ChannelError::Store {
                keys: Vec::new(),
                source,
            }
        })?;
        Ok(Self::with_store(name, store, config))
    }
}

impl<S: SnapshotStore> Channel<S> {
    /// Build a channel over an existing store.
    pub fn with_store(name: impl Into<String>, store: S, config: ChannelConfig) -> Self {
        Self {
            name: name.into(),
            store,
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Read the current table once, without waiting.
    pub fn snapshot(&self) -> Result<Table> {
        self.store.read_snapshot().map_err(|source| {
            error!(channel = %self.name, error = %source, "snapshot read failed");
            ChannelError::Store {
                keys: Vec::new(),
                source,
            }
        })
    }

    /// Merge `entries` into the table. Returns each key's previous value.
    ///
    /// Every value is validated before the channel is touched; a task whose
    /// name cannot be resolved in another process is rejected with
    /// [`ChannelError::NotSerializable`].
    pub fn put<I, K, V>(&self, entries: I) -> Result<BTreeMap<String, Option<Value>>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let entries: Vec<(String, Value)> = entries
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        for (key, value) in &entries {
            value
                .validate()
                .map_err(|source| ChannelError::NotSerializable {
                    key: key.clone(),
                    source,
                })?;
        }
        if entries.is_empty() {
            return Ok(BTreeMap::new());
        }

        let keys: Vec<String> = entries.iter().map(|(key, _)| key.clone()).collect();
        debug!(channel = %self.name, keys = ?keys, "writing entries");

        let previous = self
            .store
            .with_lock(|| {
                let mut table = self.store.read_snapshot()?;
                let mut previous = BTreeMap::new();
                for (key, value) in entries {
                    let prior = table.insert(key.clone(), value);
                    previous.entry(key).or_insert(prior);
                }
                self.store.write_snapshot(&table)?;
                Ok(previous)
            })
            .map_err(|source| self.store_failure(keys.clone(), source))?;

        debug!(channel = %self.name, keys = ?keys, "finished writing entries");
        Ok(previous)
    }

    /// Write a single entry. Returns the previous value, if any.
    pub fn put_one(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<Option<Value>> {
        let key = key.into();
        let mut previous = self.put([(key.clone(), value.into())])?;
        Ok(previous.remove(&key).flatten())
    }

    /// Serialize `value` and write it under `key`.
    pub fn put_data<T: Serialize + ?Sized>(
        &self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Option<Value>> {
        let key = key.into();
        let value = Value::data(value).map_err(|source| ChannelError::NotSerializable {
            key: key.clone(),
            source,
        })?;
        self.put_one(key, value)
    }

    /// Write a task under `key`.
    pub fn put_task(&self, key: impl Into<String>, task: Task) -> Result<Option<Value>> {
        self.put_one(key, Value::Task(task))
    }

    /// Wait until every key in `keys` has been observed.
    pub fn get<I, K>(&self, keys: I, timeout: Duration) -> Result<Table>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.wait(collect_keys(keys), timeout, WaitMode::Get)
    }

    /// Wait for a single key.
    pub fn get_one(&self, key: impl Into<String>, timeout: Duration) -> Result<Value> {
        let key = key.into();
        let mut table = self.get([key.clone()], timeout)?;
        take_key(&mut table, &key)
    }

    /// Wait for a single key and decode it.
    pub fn get_as<T: DeserializeOwned>(&self, key: impl Into<String>, timeout: Duration) -> Result<T> {
        let key = key.into();
        let value = self.get_one(key.clone(), timeout)?;
        decode_value(&key, &value)
    }

    /// Wait for a single key using the configured default timeout.
    pub fn wait_for(&self, key: impl Into<String>) -> Result<Value> {
        self.get_one(key, self.config.default_timeout)
    }

    /// Wait until every key in `keys` has been observed and removed by this call.
    ///
    /// Keys are deleted as soon as they are seen, so each key is returned by
    /// at most one remover.
    pub fn remove<I, K>(&self, keys: I, timeout: Duration) -> Result<Table>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.wait(collect_keys(keys), timeout, WaitMode::Remove)
    }

    /// Remove a single key, waiting for it to appear.
    pub fn remove_one(&self, key: impl Into<String>, timeout: Duration) -> Result<Value> {
        let key = key.into();
        let mut table = self.remove([key.clone()], timeout)?;
        take_key(&mut table, &key)
    }

    /// Remove a single key and decode it.
    pub fn remove_as<T: DeserializeOwned>(
        &self,
        key: impl Into<String>,
        timeout: Duration,
    ) -> Result<T> {
        let key = key.into();
        let value = self.remove_one(key.clone(), timeout)?;
        decode_value(&key, &value)
    }

    /// Remove a single key using the configured default timeout.
    pub fn take(&self, key: impl Into<String>) -> Result<Value> {
        self.remove_one(key, self.config.default_timeout)
    }

    /// Ask every process waiting on this channel to shut down gracefully.
    pub fn signal_shutdown(&self) -> Result<()> {
        self.put_one(SHUTDOWN_KEY, true).map(|_| ())
    }

    /// Abort every process waiting on this channel for anything but shutdown.
    pub fn signal_terminate(&self) -> Result<()> {
        warn!(channel = %self.name, "signalling terminate");
        self.put_one(TERMINATE_KEY, true).map(|_| ())
    }

    /// Block until shutdown is requested or the group is terminated.
    pub fn await_shutdown(&self, timeout: Duration) -> Result<ShutdownKind> {
        match self.get_one(SHUTDOWN_KEY, timeout) {
            Ok(_) => Ok(ShutdownKind::Graceful),
            Err(ChannelError::Terminated {
                awaiting_shutdown: true,
                ..
            }) => Ok(ShutdownKind::Terminated),
            Err(err) => Err(err),
        }
    }

    fn wait(&self, keys: BTreeSet<String>, timeout: Duration, mode: WaitMode) -> Result<Table> {
        if keys.is_empty() {
            return Ok(Table::new());
        }

        debug!(channel = %self.name, keys = ?keys, ?timeout, ?mode, "waiting for keys");
        let mut wait = PendingWait::new(keys, timeout);

        loop {
            let snapshot = match self.tick(&mut wait, mode)? {
                Tick::Snapshot(table) => {
                    wait.read_failures = 0;
                    Some(table)
                }
                Tick::ReadFailed(source) => {
                    wait.read_failures += 1;
                    if wait.read_failures > self.config.read_retries {
                        return Err(self.store_failure(wait.key_list(), source));
                    }
                    warn!(
                        channel = %self.name,
                        keys = ?wait.keys,
                        error = %source,
                        "snapshot read failed, retrying next tick"
                    );
                    None
                }
            };

            if wait.is_complete() {
                debug!(channel = %self.name, keys = ?wait.keys, "finished waiting for keys");
                return Ok(wait.results);
            }

            if let Some(table) = &snapshot {
                if table.contains_key(TERMINATE_KEY) {
                    let known = known_keys(table);
                    let awaiting_shutdown = wait.awaiting_shutdown();
                    if awaiting_shutdown {
                        warn!(
                            channel = %self.name,
                            known = ?known,
                            "terminate key detected while waiting for shutdown, exiting wait"
                        );
                    } else {
                        error!(
                            channel = %self.name,
                            keys = ?wait.keys,
                            known = ?known,
                            "terminate key detected"
                        );
                    }
                    return Err(ChannelError::Terminated {
                        keys: wait.key_list(),
                        known,
                        awaiting_shutdown,
                    });
                }
            }

            if wait.expired() {
                let missing = wait.missing();
                let known = snapshot.as_ref().map(known_keys).unwrap_or_default();
                error!(
                    channel = %self.name,
                    missing = ?missing,
                    known = ?known,
                    "timed out waiting for keys"
                );
                return Err(ChannelError::Timeout {
                    missing,
                    known,
                    timeout,
                });
            }

            thread::sleep(self.config.poll_interval.min(wait.remaining()));
        }
    }

    fn tick(&self, wait: &mut PendingWait, mode: WaitMode) -> Result<Tick> {
        let outcome = match mode {
            WaitMode::Get => match self.store.read_snapshot() {
                Ok(table) => {
                    let newly = wait.collect(&table);
                    (Tick::Snapshot(table), newly)
                }
                Err(source) => (Tick::ReadFailed(source), Vec::new()),
            },
            WaitMode::Remove => self
                .store
                .with_lock(|| {
                    let mut table = match self.store.read_snapshot() {
                        Ok(table) => table,
                        Err(source) => return Ok((Tick::ReadFailed(source), Vec::new())),
                    };
                    let newly = wait.collect(&table);
                    if !newly.is_empty() {
                        for key in &newly {
                            table.remove(key);
                        }
                        self.store.write_snapshot(&table)?;
                    }
                    Ok((Tick::Snapshot(table), newly))
                })
                .map_err(|source| self.store_failure(wait.key_list(), source))?,
        };

        let (tick, newly) = outcome;
        if !newly.is_empty() {
            info!(channel = %self.name, keys = ?newly, "{} keys", mode.verb());
        }
        Ok(tick)
    }

    fn store_failure(&self, keys: Vec<String>, source: StoreError) -> ChannelError {
        let known = self
            .store
            .read_snapshot()
            .map(|table| known_keys(&table))
            .unwrap_or_default();
        error!(
            channel = %self.name,
            keys = ?keys,
            known = ?known,
            error = %source,
            "channel store operation failed"
        );
        ChannelError::Store { keys, source }
    }
}

fn collect_keys<I, K>(keys: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = K>,
    K: Into<String>,
{
    keys.into_iter().map(Into::into).collect()
}

fn known_keys(table: &Table) -> Vec<String> {
    table.keys().cloned().collect()
}

fn take_key(table: &mut Table, key: &str) -> Result<Value> {
    table.remove(key).ok_or_else(|| ChannelError::MissingResult {
        key: key.to_string(),
    })
}

fn decode_value<T: DeserializeOwned>(key: &str, value: &Value) -> Result<T> {
    value.decode().map_err(|source| ChannelError::Codec {
        key: key.to_string(),
        source,
    })
}
