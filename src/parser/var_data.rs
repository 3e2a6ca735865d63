//! Variable-length data store: typed field access over an index and its payload.

use super::extended::ExtendedAttributeBlock;
use super::header::{EntityId, FieldType, ParseError, Result};
use super::meta::VarMetaIndex;
use super::value::{Value, ValueKind};
use super::view::{BinaryView, TextLen};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::sync::Arc;
use tracing::debug;

/// How the length of a value is found. The index only records where a value starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// The field type implies a fixed width.
    Fixed(usize),
    /// A 4-byte little-endian length precedes the value.
    SizePrefixed,
    /// Up to a NUL sentinel. Raw byte access gets the rest of the payload;
    /// the sentinel is applied by the text decoders.
    Terminated,
    /// Bounded by the next larger offset recorded in the index, or the payload end.
    UntilNextOffset,
    /// The rest of the payload.
    ToEnd,
}

/// Payload bytes paired with the index that addresses them.
///
/// Immutable after construction; lookups take `&self` only.
#[derive(Debug, Clone)]
pub struct VarDataStore {
    name: String,
    index: Arc<VarMetaIndex>,
    payload: Vec<u8>,
    /// Distinct offsets, ascending, for `Framing::UntilNextOffset`.
    bounds: Vec<usize>,
}

impl VarDataStore {
    /// `name` labels the stream in error messages.
    pub fn new(name: impl Into<String>, index: Arc<VarMetaIndex>, payload: Vec<u8>) -> Self {
        let mut bounds = index.offsets().to_vec();
        bounds.sort_unstable();
        bounds.dedup();

        let name = name.into();
        if index.payload_size() != payload.len() {
            debug!(
                stream = %name,
                declared = index.payload_size(),
                actual = payload.len(),
                "payload size differs from declared size"
            );
        }
        debug!(stream = %name, entities = index.entity_ids().count(), "var-data store ready");

        Self {
            name,
            index,
            payload,
            bounds,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> &VarMetaIndex {
        &self.index
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Entity ids present in the index, ascending.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.index.entity_ids()
    }

    fn view(&self) -> BinaryView<'_> {
        BinaryView::new(&self.payload)
    }

    /// Resolve a pair to a payload offset, rejecting offsets past the payload.
    fn resolve(&self, id: EntityId, field_type: FieldType) -> Result<Option<usize>> {
        let Some(offset) = self.index.offset_of(id, field_type) else {
            return Ok(None);
        };
        if offset > self.payload.len() {
            return Err(ParseError::IndexCorruption {
                stream: self.name.clone(),
                id,
                field_type,
                offset: offset as i64,
                payload_len: self.payload.len(),
            });
        }
        Ok(Some(offset))
    }

    /// Everything from the field's offset to the end of the payload.
    pub fn raw_bytes(&self, id: EntityId, field_type: FieldType) -> Result<Option<&[u8]>> {
        self.resolve(id, field_type)?
            .map(|offset| self.view().tail(offset))
            .transpose()
    }

    /// The field's bytes, with the length derived by `framing`.
    pub fn value(
        &self,
        id: EntityId,
        field_type: FieldType,
        framing: Framing,
    ) -> Result<Option<&[u8]>> {
        self.resolve(id, field_type)?
            .map(|offset| self.frame_at(offset, framing))
            .transpose()
            .map_err(|err| err.in_field(id, field_type))
    }

    /// Frame a value starting at a raw payload offset.
    pub fn frame_at(&self, offset: usize, framing: Framing) -> Result<&[u8]> {
        let view = self.view();
        match framing {
            Framing::Fixed(width) => view.slice(offset, width),
            Framing::SizePrefixed => {
                let size = view.u32_at(offset)? as usize;
                view.slice(offset + 4, size)
            }
            Framing::Terminated | Framing::ToEnd => view.tail(offset),
            Framing::UntilNextOffset => {
                let next = self.bounds.partition_point(|&bound| bound <= offset);
                let end = self
                    .bounds
                    .get(next)
                    .copied()
                    .unwrap_or(self.payload.len())
                    .min(self.payload.len());
                view.slice(offset, end.saturating_sub(offset))
            }
        }
    }

    /// Decode a field as `kind`. Fixed-width kinds are read directly at the
    /// offset; variable-length kinds are framed by `framing`.
    pub fn read(
        &self,
        id: EntityId,
        field_type: FieldType,
        kind: ValueKind,
        framing: Framing,
    ) -> Result<Option<Value>> {
        let Some(bytes) = self.value(id, field_type, framing)? else {
            return Ok(None);
        };
        kind.check(field_type, bytes)
            .and_then(|view| kind.decode(view))
            .map(Some)
            .map_err(|err| err.in_field(id, field_type))
    }

    /// Read a fixed-width field straight from the payload.
    fn fixed<T: Default>(
        &self,
        id: EntityId,
        field_type: FieldType,
        decode: impl FnOnce(BinaryView<'_>, usize) -> Result<T>,
    ) -> Result<T> {
        match self.resolve(id, field_type)? {
            Some(offset) => {
                decode(self.view(), offset).map_err(|err| err.in_field(id, field_type))
            }
            None => Ok(T::default()),
        }
    }

    pub fn short(&self, id: EntityId, field_type: FieldType) -> Result<i16> {
        self.fixed(id, field_type, |view, offset| view.i16_at(offset))
    }

    pub fn int(&self, id: EntityId, field_type: FieldType) -> Result<i32> {
        self.fixed(id, field_type, |view, offset| view.i32_at(offset))
    }

    /// 48-bit value stored in the low six bytes of the field.
    pub fn long6(&self, id: EntityId, field_type: FieldType) -> Result<i64> {
        self.fixed(id, field_type, |view, offset| view.long6_at(offset))
    }

    pub fn long(&self, id: EntityId, field_type: FieldType) -> Result<i64> {
        self.fixed(id, field_type, |view, offset| view.i64_at(offset))
    }

    pub fn double(&self, id: EntityId, field_type: FieldType) -> Result<f64> {
        self.fixed(id, field_type, |view, offset| view.f64_at(offset))
    }

    /// Duration in minutes.
    pub fn duration(&self, id: EntityId, field_type: FieldType) -> Result<f64> {
        self.fixed(id, field_type, |view, offset| view.duration_at(offset))
    }

    pub fn time(&self, id: EntityId, field_type: FieldType) -> Result<Option<NaiveTime>> {
        self.fixed(id, field_type, |view, offset| view.time_at(offset).map(Some))
    }

    pub fn date(&self, id: EntityId, field_type: FieldType) -> Result<Option<NaiveDate>> {
        self.fixed(id, field_type, |view, offset| view.date_at(offset))
    }

    pub fn timestamp(&self, id: EntityId, field_type: FieldType) -> Result<Option<NaiveDateTime>> {
        self.fixed(id, field_type, |view, offset| view.timestamp_at(offset))
    }

    /// Single-byte text. Absent fields read as an empty string.
    pub fn string(&self, id: EntityId, field_type: FieldType, framing: Framing) -> Result<String> {
        match self.resolve(id, field_type)? {
            Some(offset) => self
                .string_at(offset, framing)
                .map_err(|err| err.in_field(id, field_type)),
            None => Ok(String::new()),
        }
    }

    /// UTF-16LE text. Absent fields read as an empty string.
    pub fn unicode_string(
        &self,
        id: EntityId,
        field_type: FieldType,
        framing: Framing,
    ) -> Result<String> {
        match self.resolve(id, field_type)? {
            Some(offset) => self
                .unicode_string_at(offset, framing)
                .map_err(|err| err.in_field(id, field_type)),
            None => Ok(String::new()),
        }
    }

    /// Single-byte text at a raw payload offset.
    pub fn string_at(&self, offset: usize, framing: Framing) -> Result<String> {
        match framing {
            Framing::Terminated => self.view().text_at(offset, TextLen::Terminated),
            framing => {
                let bytes = self.frame_at(offset, framing)?;
                BinaryView::new(bytes).text_at(0, TextLen::Bytes(bytes.len()))
            }
        }
    }

    /// UTF-16LE text at a raw payload offset.
    pub fn unicode_string_at(&self, offset: usize, framing: Framing) -> Result<String> {
        match framing {
            Framing::Terminated => self.view().unicode_text_at(offset, TextLen::Terminated),
            framing => {
                let bytes = self.frame_at(offset, framing)?;
                BinaryView::new(bytes).unicode_text_at(0, TextLen::Bytes(bytes.len()))
            }
        }
    }

    /// Open the field as an extended attribute block.
    pub fn extended(
        &self,
        id: EntityId,
        field_type: FieldType,
        framing: Framing,
    ) -> Result<Option<ExtendedAttributeBlock<'_>>> {
        let Some(bytes) = self.value(id, field_type, framing)? else {
            return Ok(None);
        };
        ExtendedAttributeBlock::new(bytes, id, self)
            .map(Some)
            .map_err(|err| err.in_field(id, field_type))
    }
}
