//! Caller-selected decoders for values whose representation is known only from the type code.

use super::header::{FieldType, ParseError, Result};
use super::view::{BinaryView, TextLen};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

/// How to interpret the bytes of one stored value.
///
/// The stores hold no knowledge of what a type code means; a format reader
/// keeps a table from type code to `ValueKind` and passes the kind in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Byte,
    Short,
    Int,
    Long6,
    Long,
    Double,
    Duration,
    Time,
    Date,
    Timestamp,
    Text,
    UnicodeText,
    Bytes,
}

impl ValueKind {
    /// Minimum number of bytes the kind needs; `None` for variable-length kinds.
    pub const fn width(self) -> Option<usize> {
        match self {
            Self::Byte => Some(1),
            Self::Short | Self::Time | Self::Date => Some(2),
            Self::Int | Self::Duration | Self::Timestamp => Some(4),
            Self::Long6 => Some(6),
            Self::Long | Self::Double => Some(8),
            Self::Text | Self::UnicodeText | Self::Bytes => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long6 => "long6",
            Self::Long => "long",
            Self::Double => "double",
            Self::Duration => "duration",
            Self::Time => "time",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
            Self::Text => "text",
            Self::UnicodeText => "unicode text",
            Self::Bytes => "bytes",
        }
    }

    /// Check that `bytes` is wide enough for this kind and open a view on it.
    ///
    /// Used where the value's length is known (size-prefixed values, extended
    /// sub-values, properties): a short value means the stored representation
    /// is not the one requested.
    pub fn check<'a>(self, field_type: FieldType, bytes: &'a [u8]) -> Result<BinaryView<'a>> {
        match self.width() {
            Some(width) if bytes.len() < width => Err(ParseError::FieldTypeMismatch {
                field_type,
                expected: format!("{} ({width} bytes)", self.name()),
                actual: format!("{} bytes", bytes.len()),
            }),
            _ => Ok(BinaryView::new(bytes)),
        }
    }

    /// Decode the value at the start of `view`.
    pub fn decode(self, view: BinaryView<'_>) -> Result<Value> {
        Ok(match self {
            Self::Byte => Value::Byte(view.u8_at(0)?),
            Self::Short => Value::Short(view.i16_at(0)?),
            Self::Int => Value::Int(view.i32_at(0)?),
            Self::Long6 => Value::Long(view.long6_at(0)?),
            Self::Long => Value::Long(view.i64_at(0)?),
            Self::Double => Value::Double(view.f64_at(0)?),
            Self::Duration => Value::Duration(view.duration_at(0)?),
            Self::Time => Value::Time(view.time_at(0)?),
            Self::Date => Value::Date(view.date_at(0)?),
            Self::Timestamp => Value::Timestamp(view.timestamp_at(0)?),
            Self::Text => Value::Text(view.text_at(0, TextLen::Terminated)?),
            Self::UnicodeText => Value::Text(view.unicode_text_at(0, TextLen::Terminated)?),
            Self::Bytes => Value::Bytes(view.as_bytes().to_vec()),
        })
    }
}

/// A decoded value, tagged with the representation it was read as.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Byte(u8),
    Short(i16),
    Int(i32),
    Long(i64),
    Double(f64),
    /// Minutes.
    Duration(f64),
    Time(NaiveTime),
    Date(Option<NaiveDate>),
    Timestamp(Option<NaiveDateTime>),
    Text(String),
    Bytes(Vec<u8>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Byte(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Duration(v) => write!(f, "{v}m"),
            Value::Time(v) => write!(f, "{}", v.format("%H:%M")),
            Value::Date(Some(v)) => write!(f, "{v}"),
            Value::Timestamp(Some(v)) => write!(f, "{}", v.format("%Y-%m-%d %H:%M")),
            Value::Date(None) | Value::Timestamp(None) => write!(f, "NA"),
            Value::Text(v) => write!(f, "{v}"),
            Value::Bytes(v) => write!(f, "{}", hex_preview(v, v.len())),
        }
    }
}

/// Space-separated hex of at most `limit` bytes, with an ellipsis when cut.
pub fn hex_preview(bytes: &[u8], limit: usize) -> String {
    let shown = &bytes[..bytes.len().min(limit)];
    let mut out = shown
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ");
    if bytes.len() > shown.len() {
        out.push_str(" ..");
    }
    out
}
