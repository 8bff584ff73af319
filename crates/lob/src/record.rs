//! The persisted value format: a one-byte kind tag followed by the payload.
//!
//! Two kinds of value are written to the backend under this protocol:
//!
//! ```text
//! chunk:   [0x01] [raw payload bytes ...]
//! record:  [0x02] [JSON object record: {"checksum": "...", "parts_num": N}]
//! ```
//!
//! The tag is an explicit content-kind field, not magic-byte sniffing: the
//! store always knows from the key's role which kind it expects, and decode
//! checks the tag against that expectation. A mismatch means the stored
//! value was corrupted or overwritten out-of-band.

use crate::checksum::Checksum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Width of the kind tag preceding every stored value.
pub(crate) const VALUE_TAG_LEN: usize = 1;

/// Kind tag for values stored by the protocol (1 byte).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Raw chunk payload.
    Chunk = 0x01,
    /// JSON-encoded object record.
    Record = 0x02,
}

impl ValueKind {
    /// Parse a tag byte into a ValueKind.
    pub fn from_u8(value: u8) -> Result<Self, CodecError> {
        match value {
            0x01 => Ok(ValueKind::Chunk),
            0x02 => Ok(ValueKind::Record),
            other => Err(CodecError::UnknownTag(other)),
        }
    }

    /// Convert ValueKind to its tag byte.
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// Errors that can occur decoding a stored value.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("empty value")]
    Empty,

    #[error("unknown value tag {0:#04x}")]
    UnknownTag(u8),

    #[error("value tagged {found:?} where {expected:?} was expected")]
    KindMismatch {
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("malformed object record: {0}")]
    MalformedRecord(#[from] serde_json::Error),
}

/// The metadata record stored under an object's own key.
///
/// Locates and verifies the object's chunks: `parts_num` chunks live under
/// the derived part keys, and their payloads in ascending index order hash
/// to `checksum`. `parts_num == 0` means the object had empty content. The
/// record must exist for a key to be considered present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Digest over all chunk payloads in index order.
    pub checksum: Checksum,

    /// Number of chunks the object was split into.
    pub parts_num: u64,
}

impl ObjectRecord {
    /// Encode as a tagged value for storage under the object key.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut out = vec![ValueKind::Record.to_u8()];
        serde_json::to_writer(&mut out, self)?;
        Ok(out)
    }

    /// Decode a tagged value fetched from the object key.
    pub fn decode(value: &[u8]) -> Result<Self, CodecError> {
        expect_kind(value, ValueKind::Record)?;
        Ok(serde_json::from_slice(&value[VALUE_TAG_LEN..])?)
    }
}

/// Encode a chunk payload as a tagged value.
pub fn encode_chunk(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(VALUE_TAG_LEN + payload.len());
    out.push(ValueKind::Chunk.to_u8());
    out.extend_from_slice(payload);
    out
}

/// Decode a tagged value fetched from a part key, returning the payload.
pub fn decode_chunk(value: &[u8]) -> Result<&[u8], CodecError> {
    expect_kind(value, ValueKind::Chunk)?;
    Ok(&value[VALUE_TAG_LEN..])
}

fn expect_kind(value: &[u8], expected: ValueKind) -> Result<(), CodecError> {
    let tag = value.first().ok_or(CodecError::Empty)?;
    let found = ValueKind::from_u8(*tag)?;
    if found != expected {
        return Err(CodecError::KindMismatch { expected, found });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_roundtrip() {
        let encoded = encode_chunk(b"some payload");
        assert_eq!(encoded[0], 0x01);
        assert_eq!(decode_chunk(&encoded).unwrap(), b"some payload");
    }

    #[test]
    fn test_empty_chunk_roundtrip() {
        let encoded = encode_chunk(b"");
        assert_eq!(encoded.len(), 1);
        assert_eq!(decode_chunk(&encoded).unwrap(), b"");
    }

    #[test]
    fn test_record_roundtrip() {
        let record = ObjectRecord {
            checksum: Checksum::from_data(b"content"),
            parts_num: 7,
        };
        let encoded = record.encode().unwrap();
        assert_eq!(encoded[0], 0x02);
        assert_eq!(ObjectRecord::decode(&encoded).unwrap(), record);
    }

    #[test]
    fn test_record_wire_field_names() {
        let record = ObjectRecord {
            checksum: Checksum::from_data(b"x"),
            parts_num: 1,
        };
        let encoded = record.encode().unwrap();
        let json = std::str::from_utf8(&encoded[1..]).unwrap();
        assert!(json.contains("\"checksum\""));
        assert!(json.contains("\"parts_num\""));
    }

    #[test]
    fn test_decode_chunk_rejects_record_tag() {
        let record = ObjectRecord {
            checksum: Checksum::from_data(b"x"),
            parts_num: 0,
        };
        let encoded = record.encode().unwrap();
        assert!(matches!(
            decode_chunk(&encoded),
            Err(CodecError::KindMismatch {
                expected: ValueKind::Chunk,
                found: ValueKind::Record,
            })
        ));
    }

    #[test]
    fn test_decode_record_rejects_chunk_tag() {
        let encoded = encode_chunk(b"not a record");
        assert!(matches!(
            ObjectRecord::decode(&encoded),
            Err(CodecError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_unknown_tag() {
        assert!(matches!(
            decode_chunk(&[0xff, 1, 2, 3]),
            Err(CodecError::UnknownTag(0xff))
        ));
    }

    #[test]
    fn test_decode_rejects_empty_value() {
        assert!(matches!(decode_chunk(&[]), Err(CodecError::Empty)));
        assert!(matches!(ObjectRecord::decode(&[]), Err(CodecError::Empty)));
    }

    #[test]
    fn test_decode_rejects_garbage_record_body() {
        let mut encoded = vec![ValueKind::Record.to_u8()];
        encoded.extend_from_slice(b"{not json");
        assert!(matches!(
            ObjectRecord::decode(&encoded),
            Err(CodecError::MalformedRecord(_))
        ));
    }
}
