//! Snapshot encoding for xchan entry tables.
//!
//! A channel holds one snapshot at the start of a fixed-size region:
//! - A 2-byte magic number ("XC")
//! - A 4-byte little-endian payload length
//! - A 2-byte little-endian format version
//! - The compact JSON payload, followed by zero padding
//!
//! An all-zero region means "no table yet" and decodes to `None`.

pub mod codec;
pub mod error;
pub mod value;

pub use codec::{
    decode_snapshot, encode_snapshot, encoded_len, Table, FORMAT_VERSION, HEADER_SIZE, MAGIC,
};
pub use error::{CodecError, Result};
pub use value::{Task, Value};
