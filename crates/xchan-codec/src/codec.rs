use std::collections::BTreeMap;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};
use crate::value::{Task, Value};

/// Snapshot header: magic (2) + length (4) + version (2) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Magic bytes: "XC" (0x58 0x43).
pub const MAGIC: [u8; 2] = [0x58, 0x43];

/// Current snapshot format version.
pub const FORMAT_VERSION: u16 = 1;

/// The decoded key/value table stored in a channel.
pub type Table = BTreeMap<String, Value>;

/// On-disk shape of a table: data and tasks live in separate maps so plain
/// values are stored without a per-entry tag.
#[derive(Debug, Default, Serialize, Deserialize)]
struct WireTable {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    data: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    tasks: BTreeMap<String, Task>,
}

impl WireTable {
    fn from_table(table: &Table) -> Self {
        let mut wire = WireTable::default();
        for (key, value) in table {
            match value {
                Value::Data(data) => {
                    wire.data.insert(key.clone(), data.clone());
                }
                Value::Task(task) => {
                    wire.tasks.insert(key.clone(), task.clone());
                }
            }
        }
        wire
    }

    fn into_table(self) -> Table {
        let mut table: Table = self
            .data
            .into_iter()
            .map(|(key, data)| (key, Value::Data(data)))
            .collect();
        table.extend(
            self.tasks
                .into_iter()
                .map(|(key, task)| (key, Value::Task(task))),
        );
        table
    }
}

/// Encode a table into the snapshot format.
///
/// `None` encodes to an empty buffer.
///
/// Snapshot format:
/// ```text
/// ┌──────────────┬───────────┬──────────┬──────────────────┬─────────────┐
/// │ Magic (2B)   │ Length    │ Version  │ Payload          │ Zero pad    │
/// │ 0x58 0x43    │ (4B LE)   │ (2B LE)  │ (Length bytes)   │ to capacity │
/// │ "XC"         │           │          │ compact JSON     │             │
/// └──────────────┴───────────┴──────────┴──────────────────┴─────────────┘
/// ```
pub fn encode_snapshot(table: Option<&Table>) -> Result<Bytes> {
    let Some(table) = table else {
        return Ok(Bytes::new());
    };

    let payload = serde_json::to_vec(&WireTable::from_table(table))?;
    if payload.len() > u32::MAX as usize {
        return Err(CodecError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }

    let mut dst = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    dst.put_slice(&MAGIC);
    dst.put_u32_le(payload.len() as u32);
    dst.put_u16_le(FORMAT_VERSION);
    dst.put_slice(&payload);
    Ok(dst.freeze())
}

/// Decode a snapshot region.
///
/// Returns `Ok(None)` for an empty or all-zero region (no table written yet).
/// Bytes following the declared payload are padding and are ignored.
pub fn decode_snapshot(src: &[u8]) -> Result<Option<Table>> {
    if is_blank(src) {
        return Ok(None);
    }
    if src.len() < HEADER_SIZE {
        return Err(CodecError::Truncated {
            declared: HEADER_SIZE,
            available: src.len(),
        });
    }

    if src[0..2] != MAGIC {
        return Err(CodecError::InvalidMagic);
    }

    let payload_len = u32::from_le_bytes([src[2], src[3], src[4], src[5]]) as usize;
    let version = u16::from_le_bytes([src[6], src[7]]);
    if version != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let available = src.len() - HEADER_SIZE;
    if payload_len > available {
        return Err(CodecError::Truncated {
            declared: payload_len,
            available,
        });
    }

    let wire: WireTable = serde_json::from_slice(&src[HEADER_SIZE..HEADER_SIZE + payload_len])?;
    Ok(Some(wire.into_table()))
}

/// Size in bytes of the snapshot encoding of `table`.
pub fn encoded_len(table: &Table) -> Result<usize> {
    Ok(encode_snapshot(Some(table))?.len())
}

fn is_blank(src: &[u8]) -> bool {
    src.iter().all(|b| *b == 0)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample_table() -> Table {
        let mut table = Table::new();
        table.insert("A".to_string(), Value::from("A"));
        table.insert("int".to_string(), Value::from(10i64));
        table.insert("list".to_string(), Value::Data(json!(["1", "2", "3"])));
        table.insert(
            "Greet".to_string(),
            Value::from(Task::new("const", "Hi, How are you?")),
        );
        table
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let table = sample_table();
        let encoded = encode_snapshot(Some(&table)).unwrap();

        assert_eq!(&encoded[0..2], &MAGIC);
        let decoded = decode_snapshot(&encoded).unwrap().unwrap();
        assert_eq!(decoded, table);
    }

    #[test]
    fn test_encode_none_is_empty() {
        let encoded = encode_snapshot(None).unwrap();
        assert!(encoded.is_empty());
    }

    #[test]
    fn test_empty_table_is_not_blank() {
        let encoded = encode_snapshot(Some(&Table::new())).unwrap();
        assert!(encoded.len() > HEADER_SIZE);
        assert_eq!(decode_snapshot(&encoded).unwrap(), Some(Table::new()));
    }

    #[test]
    fn test_decode_empty_and_zeroed() {
        assert!(decode_snapshot(&[]).unwrap().is_none());
        assert!(decode_snapshot(&[0u8; 4096]).unwrap().is_none());
    }

    #[test]
    fn test_decode_ignores_zero_padding() {
        let table = sample_table();
        let encoded = encode_snapshot(Some(&table)).unwrap();
        let mut region = vec![0u8; 4096];
        region[..encoded.len()].copy_from_slice(&encoded);

        assert_eq!(decode_snapshot(&region).unwrap(), Some(table));
    }

    #[test]
    fn test_decode_invalid_magic() {
        let region = [0xFF, 0xFF, 0x02, 0x00, 0x00, 0x00, 0x01, 0x00, b'{', b'}'];
        assert!(matches!(
            decode_snapshot(&region),
            Err(CodecError::InvalidMagic)
        ));
    }

    #[test]
    fn test_decode_unsupported_version() {
        let mut region = encode_snapshot(Some(&Table::new())).unwrap().to_vec();
        region[6] = 9;
        assert!(matches!(
            decode_snapshot(&region),
            Err(CodecError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_decode_truncated_payload() {
        let encoded = encode_snapshot(Some(&sample_table())).unwrap();
        let cut = &encoded[..encoded.len() - 3];
        assert!(matches!(
            decode_snapshot(cut),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_decode_malformed_payload() {
        let mut region = Vec::new();
        region.extend_from_slice(&MAGIC);
        region.extend_from_slice(&4u32.to_le_bytes());
        region.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        region.extend_from_slice(b"{nop");
        assert!(matches!(decode_snapshot(&region), Err(CodecError::Json(_))));
    }

    #[test]
    fn test_plain_values_are_compact() {
        let mut table = Table::new();
        for i in 0..200i64 {
            table.insert(i.to_string(), Value::from(i));
        }
        // 200 small integer entries must fit the default 4 KiB channel.
        assert!(encoded_len(&table).unwrap() < 4096);
    }
}
