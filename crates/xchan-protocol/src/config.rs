use std::path::PathBuf;
use std::time::Duration;

use xchan_store::StoreConfig;

/// Default interval between snapshot polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default timeout for waits that are not given one explicitly.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Directory holding channel files. Default: the platform temp directory.
    pub dir: PathBuf,
    /// Sleep between polls inside `get`/`remove`. Default: 100 ms.
    pub poll_interval: Duration,
    /// Timeout used by `wait_for`/`take` and `await_shutdown` callers that
    /// do not pick one. Default: 30 s.
    pub default_timeout: Duration,
    /// Consecutive failed snapshot reads tolerated while polling before the
    /// store error is returned. Default: 1.
    pub read_retries: u32,
    /// Store settings (capacity, locking).
    pub store: StoreConfig,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            default_timeout: DEFAULT_TIMEOUT,
            read_retries: 1,
            store: StoreConfig::default(),
        }
    }
}
