/// Errors that can occur while encoding or decoding channel snapshots.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The snapshot header contains an invalid magic number.
    #[error("invalid snapshot magic (expected 0x5843 \"XC\")")]
    InvalidMagic,

    /// The snapshot was written by an incompatible format version.
    #[error("unsupported snapshot format version {0}")]
    UnsupportedVersion(u16),

    /// The declared payload length runs past the end of the buffer.
    #[error("truncated snapshot ({declared} byte payload, {available} bytes available)")]
    Truncated { declared: usize, available: usize },

    /// The payload is too large to be described by the header.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A value cannot be represented in a form another process can rebuild.
    #[error("value is not serializable: {0}")]
    NotSerializable(String),

    /// A typed read was attempted on a value of a different kind.
    #[error("expected a {expected} value, found a {found} value")]
    WrongKind {
        expected: &'static str,
        found: &'static str,
    },

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CodecError>;
