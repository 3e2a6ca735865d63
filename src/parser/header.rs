//! Error taxonomy and decoded header records shared by the var-data structures.

use thiserror::Error;

/// Entity identifier: names one task, resource or calendar within a document.
pub type EntityId = i32;

/// Field type code: an opaque attribute slot number, scoped to one entity kind.
pub type FieldType = i32;

/// Errors that can occur during decoding.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Out of range: {width} byte(s) at offset {offset} exceeds buffer size {len}")]
    OutOfRange {
        offset: usize,
        width: usize,
        len: usize,
    },

    #[error("Index corruption in {stream}: entity {id} type {field_type} points at offset {offset}, payload is {payload_len} bytes")]
    IndexCorruption {
        stream: String,
        id: EntityId,
        field_type: FieldType,
        offset: i64,
        payload_len: usize,
    },

    #[error("Entry count mismatch in {stream}: header says {expected}, stream has {actual}")]
    CountMismatch {
        stream: String,
        expected: usize,
        actual: usize,
    },

    #[error("Malformed extended block: scan stopped at {cursor}, block is {len} bytes")]
    MalformedExtendedBlock { cursor: usize, len: usize },

    #[error("Type mismatch for field {field_type}: expected {expected}, got {actual}")]
    FieldTypeMismatch {
        field_type: FieldType,
        expected: String,
        actual: String,
    },

    #[error("Bad magic: expected 0x{expected:08X}, got 0x{actual:08X}")]
    BadMagic { expected: u32, actual: u32 },

    #[error("Stream too small: expected at least {expected} bytes, got {actual}")]
    FileTooSmall { expected: usize, actual: usize },

    #[error("Entity {id} type {field_type}: {source}")]
    Field {
        id: EntityId,
        field_type: FieldType,
        #[source]
        source: Box<ParseError>,
    },

    #[error("Cannot encode {what} {value}: outside the stream's field width")]
    Unencodable { what: &'static str, value: i64 },
}

impl ParseError {
    /// Attach the entity id and type code a failure was decoded for.
    pub fn in_field(self, id: EntityId, field_type: FieldType) -> Self {
        match self {
            // Already attributed, keep the innermost context.
            err @ (ParseError::Field { .. } | ParseError::IndexCorruption { .. }) => err,
            other => ParseError::Field {
                id,
                field_type,
                source: Box::new(other),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Header fields of a var-meta index stream.
///
/// Only `item_count` and `payload_size` carry meaning; the reserved words are
/// kept so a decoded header can be written back unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VarMetaHeader {
    pub magic: u32,
    pub item_count: usize,
    pub payload_size: usize,
    pub reserved: [u32; 3],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_field_wraps_once() {
        let err = ParseError::OutOfRange {
            offset: 10,
            width: 4,
            len: 12,
        }
        .in_field(7, 3)
        .in_field(8, 4);

        match err {
            ParseError::Field {
                id,
                field_type,
                source,
            } => {
                assert_eq!((id, field_type), (7, 3));
                assert!(matches!(*source, ParseError::OutOfRange { offset: 10, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_index_corruption_is_not_rewrapped() {
        let err = ParseError::IndexCorruption {
            stream: "VarData".to_string(),
            id: 1,
            field_type: 2,
            offset: 99,
            payload_len: 10,
        }
        .in_field(1, 2);
        assert!(matches!(err, ParseError::IndexCorruption { .. }));
        assert!(err.to_string().contains("VarData"));
    }
}
