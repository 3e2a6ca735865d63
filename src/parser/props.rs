//! Document-level property sets: property code -> raw value bytes.

use super::header::{FieldType, Result};
use super::value::{Value, ValueKind};
use super::view::{BinaryView, TextLen};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::BTreeMap;
use tracing::debug;

/// Flat mapping from property code to value bytes.
///
/// Absent codes read as zero, `false` or `None` so optional settings can be
/// requested without presence checks. A present value that is too short for
/// the requested type is reported as a type mismatch.
#[derive(Debug, Clone, Default)]
pub struct PropertySet {
    items: BTreeMap<FieldType, Vec<u8>>,
}

impl PropertySet {
    pub fn builder() -> PropertySetBuilder {
        PropertySetBuilder::default()
    }

    pub fn bytes(&self, code: FieldType) -> Option<&[u8]> {
        self.items.get(&code).map(Vec::as_slice)
    }

    /// Recorded property codes, ascending.
    pub fn keys(&self) -> impl Iterator<Item = FieldType> + '_ {
        self.items.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldType, &[u8])> + '_ {
        self.items.iter().map(|(&code, bytes)| (code, bytes.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn typed<T>(
        &self,
        code: FieldType,
        kind: ValueKind,
        decode: impl FnOnce(BinaryView<'_>) -> Result<T>,
    ) -> Result<Option<T>> {
        self.bytes(code)
            .map(|bytes| kind.check(code, bytes).and_then(decode))
            .transpose()
    }

    /// Decode a property as `kind`.
    pub fn read(&self, code: FieldType, kind: ValueKind) -> Result<Option<Value>> {
        self.typed(code, kind, |view| kind.decode(view))
    }

    pub fn byte(&self, code: FieldType) -> Result<u8> {
        self.typed(code, ValueKind::Byte, |view| view.u8_at(0))
            .map(Option::unwrap_or_default)
    }

    pub fn short(&self, code: FieldType) -> Result<i16> {
        self.typed(code, ValueKind::Short, |view| view.i16_at(0))
            .map(Option::unwrap_or_default)
    }

    pub fn int(&self, code: FieldType) -> Result<i32> {
        self.typed(code, ValueKind::Int, |view| view.i32_at(0))
            .map(Option::unwrap_or_default)
    }

    pub fn double(&self, code: FieldType) -> Result<f64> {
        self.typed(code, ValueKind::Double, |view| view.f64_at(0))
            .map(Option::unwrap_or_default)
    }

    /// Stored as a 16-bit word; any non-zero value is true.
    pub fn boolean(&self, code: FieldType) -> Result<bool> {
        self.typed(code, ValueKind::Short, |view| view.u16_at(0).map(|v| v != 0))
            .map(Option::unwrap_or_default)
    }

    pub fn time(&self, code: FieldType) -> Result<Option<NaiveTime>> {
        self.typed(code, ValueKind::Time, |view| view.time_at(0))
    }

    pub fn timestamp(&self, code: FieldType) -> Result<Option<NaiveDateTime>> {
        self.typed(code, ValueKind::Timestamp, |view| view.timestamp_at(0))
            .map(Option::flatten)
    }

    pub fn date(&self, code: FieldType) -> Result<Option<NaiveDate>> {
        self.typed(code, ValueKind::Date, |view| view.date_at(0))
            .map(Option::flatten)
    }

    /// UTF-16LE string occupying the whole value, up to the first NUL.
    pub fn unicode_string(&self, code: FieldType) -> Result<Option<String>> {
        self.typed(code, ValueKind::UnicodeText, |view| {
            view.unicode_text_at(0, TextLen::Terminated)
        })
    }
}

/// Collects decoded properties. A repeated code keeps its last value.
#[derive(Debug, Default)]
pub struct PropertySetBuilder {
    items: BTreeMap<FieldType, Vec<u8>>,
}

impl PropertySetBuilder {
    pub fn insert(&mut self, code: FieldType, value: impl Into<Vec<u8>>) -> &mut Self {
        self.items.insert(code, value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn build(self) -> PropertySet {
        debug!(properties = self.items.len(), "property set built");
        PropertySet { items: self.items }
    }
}
