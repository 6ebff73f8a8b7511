//! Reserved control keys.
//!
//! Control keys carry no payload semantics of their own; their presence in
//! the channel is the signal.

/// Cooperative, graceful shutdown of every child waiting on the channel.
pub const SHUTDOWN_KEY: &str = "Shutdown JVM";

/// Abnormal termination. Any waiter not waiting for [`SHUTDOWN_KEY`] aborts.
pub const TERMINATE_KEY: &str = "Terminate JVM";

/// Prefix of the keys used to hand a task to a specific child.
pub const LAMBDA_RUNNER_PREFIX: &str = "Lambda Runner";

/// How a wait for the shutdown key ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownKind {
    /// The shutdown key was written.
    Graceful,
    /// The terminate key was written while waiting.
    Terminated,
}

/// Key under which the task for child number `index` is stored.
pub fn lambda_runner_key(index: usize) -> String {
    format!("{LAMBDA_RUNNER_PREFIX}{index}")
}

/// Returns true if `key` belongs to the runner key family.
pub fn is_lambda_runner(key: &str) -> bool {
    key.starts_with(LAMBDA_RUNNER_PREFIX)
}

/// Returns true if `key` is one of the reserved control keys.
pub fn is_control_key(key: &str) -> bool {
    key == SHUTDOWN_KEY || key == TERMINATE_KEY || is_lambda_runner(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runner_keys() {
        assert_eq!(lambda_runner_key(1), "Lambda Runner1");
        assert!(is_lambda_runner("Lambda Runner12"));
        assert!(!is_lambda_runner("Lambda"));
    }

    #[test]
    fn control_keys() {
        assert!(is_control_key(SHUTDOWN_KEY));
        assert!(is_control_key(TERMINATE_KEY));
        assert!(is_control_key(&lambda_runner_key(3)));
        assert!(!is_control_key("Greet"));
    }
}
