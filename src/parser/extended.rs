//! Extended attribute blocks: size/type/value triplets packed into one stored value.
//!
//! Wire format, repeated until the enclosing value is exhausted:
//!
//! ```text
//! [size: i32 LE][type: i32 LE][value: size bytes]
//! ```
//!
//! String sub-values are not stored inline. Their four bytes hold `v`, and the
//! string lives at offset `-1 - v` in the owning store's payload.

use super::header::{EntityId, FieldType, ParseError, Result};
use super::value::{Value, ValueKind};
use super::var_data::{Framing, VarDataStore};
use super::view::BinaryView;
use chrono::NaiveDateTime;

const ENTRY_HEADER: usize = 8;

/// Decoded extended attribute block.
///
/// Scanned eagerly on construction, so a built block is immutable.
#[derive(Debug, Clone)]
pub struct ExtendedAttributeBlock<'a> {
    owner: EntityId,
    store: &'a VarDataStore,
    entries: Vec<(FieldType, &'a [u8])>,
}

impl<'a> ExtendedAttributeBlock<'a> {
    /// Scan `data`, the value of one field of entity `owner`, into entries.
    /// `store` resolves string back-references.
    pub fn new(data: &'a [u8], owner: EntityId, store: &'a VarDataStore) -> Result<Self> {
        Ok(Self {
            owner,
            store,
            entries: scan(data)?,
        })
    }

    pub const fn owner(&self) -> EntityId {
        self.owner
    }

    /// Entries in the order they appear in the block.
    pub fn entries(&self) -> impl Iterator<Item = (FieldType, &'a [u8])> + '_ {
        self.entries.iter().copied()
    }

    pub fn types(&self) -> impl Iterator<Item = FieldType> + '_ {
        self.entries.iter().map(|&(field_type, _)| field_type)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sub-value bytes for a type code. A repeated type resolves to its last entry.
    pub fn value_of(&self, field_type: FieldType) -> Option<&'a [u8]> {
        self.entries
            .iter()
            .rev()
            .find(|&&(ty, _)| ty == field_type)
            .map(|&(_, bytes)| bytes)
    }

    /// Decode a sub-value as `kind`. Text kinds follow the back-reference.
    pub fn read(
        &self,
        field_type: FieldType,
        kind: ValueKind,
        framing: Framing,
    ) -> Result<Option<Value>> {
        match kind {
            ValueKind::Text => Ok(self.string(field_type, framing)?.map(Value::Text)),
            ValueKind::UnicodeText => {
                Ok(self.unicode_string(field_type, framing)?.map(Value::Text))
            }
            kind => self.typed(field_type, kind, |view| kind.decode(view)),
        }
    }

    fn typed<T>(
        &self,
        field_type: FieldType,
        kind: ValueKind,
        decode: impl FnOnce(BinaryView<'a>) -> Result<T>,
    ) -> Result<Option<T>> {
        self.value_of(field_type)
            .map(|bytes| kind.check(field_type, bytes).and_then(decode))
            .transpose()
            .map_err(|err| err.in_field(self.owner, field_type))
    }

    pub fn short(&self, field_type: FieldType) -> Result<i16> {
        self.typed(field_type, ValueKind::Short, |view| view.i16_at(0))
            .map(Option::unwrap_or_default)
    }

    pub fn int(&self, field_type: FieldType) -> Result<i32> {
        self.typed(field_type, ValueKind::Int, |view| view.i32_at(0))
            .map(Option::unwrap_or_default)
    }

    pub fn long(&self, field_type: FieldType) -> Result<i64> {
        self.typed(field_type, ValueKind::Long, |view| view.i64_at(0))
            .map(Option::unwrap_or_default)
    }

    pub fn double(&self, field_type: FieldType) -> Result<f64> {
        self.typed(field_type, ValueKind::Double, |view| view.f64_at(0))
            .map(Option::unwrap_or_default)
    }

    pub fn timestamp(&self, field_type: FieldType) -> Result<Option<NaiveDateTime>> {
        self.typed(field_type, ValueKind::Timestamp, |view| view.timestamp_at(0))
            .map(Option::flatten)
    }

    /// Payload offset a string sub-value points at.
    pub fn string_offset(&self, field_type: FieldType) -> Result<Option<usize>> {
        let reference = self.typed(field_type, ValueKind::Int, |view| view.i32_at(0))?;
        let Some(reference) = reference else {
            return Ok(None);
        };
        let offset = -1i64 - i64::from(reference);
        if offset < 0 || offset as usize > self.store.payload().len() {
            return Err(ParseError::IndexCorruption {
                stream: self.store.name().to_string(),
                id: self.owner,
                field_type,
                offset,
                payload_len: self.store.payload().len(),
            });
        }
        Ok(Some(offset as usize))
    }

    /// Single-byte string, read from the owning store's payload.
    pub fn string(&self, field_type: FieldType, framing: Framing) -> Result<Option<String>> {
        self.string_offset(field_type)?
            .map(|offset| self.store.string_at(offset, framing))
            .transpose()
            .map_err(|err| err.in_field(self.owner, field_type))
    }

    /// UTF-16LE string, read from the owning store's payload.
    pub fn unicode_string(
        &self,
        field_type: FieldType,
        framing: Framing,
    ) -> Result<Option<String>> {
        self.string_offset(field_type)?
            .map(|offset| self.store.unicode_string_at(offset, framing))
            .transpose()
            .map_err(|err| err.in_field(self.owner, field_type))
    }
}

/// Split a block into (type, value) entries, consuming it exactly.
fn scan(data: &[u8]) -> Result<Vec<(FieldType, &[u8])>> {
    let view = BinaryView::new(data);
    let malformed = |cursor| ParseError::MalformedExtendedBlock {
        cursor,
        len: data.len(),
    };

    let mut entries = Vec::new();
    let mut cursor = 0;
    while cursor < data.len() {
        if data.len() - cursor < ENTRY_HEADER {
            return Err(malformed(cursor));
        }
        let size = view.i32_at(cursor)?;
        let field_type = view.i32_at(cursor + 4)?;
        let size = usize::try_from(size).map_err(|_| malformed(cursor))?;
        let start = cursor + ENTRY_HEADER;
        if size > data.len() - start {
            return Err(malformed(cursor));
        }
        entries.push((field_type, &data[start..start + size]));
        cursor = start + size;
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::header::VarMetaHeader;
    use crate::parser::meta::VarMetaIndex;
    use std::sync::Arc;

    fn entry(field_type: FieldType, value: &[u8]) -> Vec<u8> {
        let mut out = (value.len() as i32).to_le_bytes().to_vec();
        out.extend_from_slice(&field_type.to_le_bytes());
        out.extend_from_slice(value);
        out
    }

    fn store_with_payload(payload: Vec<u8>) -> VarDataStore {
        let index = VarMetaIndex::builder(VarMetaHeader::default()).build();
        VarDataStore::new("VarData", Arc::new(index), payload)
    }

    #[test]
    fn test_scan_entries() {
        let store = store_with_payload(Vec::new());
        let data = [
            entry(1, &5i32.to_le_bytes()),
            entry(2, &[]),
            entry(3, &2.25f64.to_le_bytes()),
        ]
        .concat();
        let block = ExtendedAttributeBlock::new(&data, 12, &store).unwrap();

        assert_eq!(block.len(), 3);
        assert_eq!(block.types().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(block.int(1).unwrap(), 5);
        assert_eq!(block.value_of(2), Some(&[][..]));
        assert_eq!(block.double(3).unwrap(), 2.25);
        assert_eq!(block.value_of(4), None);
        assert_eq!(block.int(4).unwrap(), 0);
    }

    #[test]
    fn test_empty_block() {
        let store = store_with_payload(Vec::new());
        let block = ExtendedAttributeBlock::new(&[], 12, &store).unwrap();
        assert!(block.is_empty());
        assert_eq!(block.string(1, Framing::Terminated).unwrap(), None);
    }

    #[test]
    fn test_truncated_block_is_malformed() {
        let store = store_with_payload(Vec::new());
        let data = [entry(1, &[1, 2, 3, 4]), entry(2, &[9, 9])].concat();
        for cut in 1..data.len() {
            if cut == 12 {
                // Exactly one whole entry.
                continue;
            }
            let result = ExtendedAttributeBlock::new(&data[..cut], 12, &store);
            assert!(
                matches!(result, Err(ParseError::MalformedExtendedBlock { .. })),
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn test_negative_size_is_malformed() {
        let store = store_with_payload(Vec::new());
        let mut data = (-4i32).to_le_bytes().to_vec();
        data.extend_from_slice(&1i32.to_le_bytes());
        assert!(matches!(
            ExtendedAttributeBlock::new(&data, 12, &store),
            Err(ParseError::MalformedExtendedBlock { cursor: 0, len: 8 })
        ));
    }

    #[test]
    fn test_string_back_reference() {
        let mut payload = b"junk".to_vec();
        payload.extend_from_slice(&[b'N', 0, b'a', 0, b'm', 0, b'e', 0, 0, 0]);
        let store = store_with_payload(payload);

        // String at payload offset 4 is stored as -1 - 4 = -5.
        let data = entry(7, &(-5i32).to_le_bytes());
        let block = ExtendedAttributeBlock::new(&data, 12, &store).unwrap();
        assert_eq!(block.string_offset(7).unwrap(), Some(4));
        assert_eq!(
            block.unicode_string(7, Framing::Terminated).unwrap().as_deref(),
            Some("Name")
        );
        assert_eq!(
            block.read(7, ValueKind::UnicodeText, Framing::Terminated).unwrap(),
            Some(Value::Text("Name".to_string()))
        );
    }

    #[test]
    fn test_back_reference_outside_payload() {
        let store = store_with_payload(vec![0; 4]);
        // -1 - 10 = offset 10, past a 4-byte payload
        let data = [entry(1, &(-11i32).to_le_bytes()), entry(2, &3i32.to_le_bytes())].concat();
        let block = ExtendedAttributeBlock::new(&data, 12, &store).unwrap();
        assert!(matches!(
            block.string(1, Framing::Terminated),
            Err(ParseError::IndexCorruption { id: 12, offset: 10, .. })
        ));
        // Positive reference gives a negative offset.
        assert!(matches!(
            block.string(2, Framing::Terminated),
            Err(ParseError::IndexCorruption { offset: -4, .. })
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let store = store_with_payload(Vec::new());
        let data = entry(1, &[1, 0]);
        let block = ExtendedAttributeBlock::new(&data, 12, &store).unwrap();
        assert_eq!(block.short(1).unwrap(), 1);
        for result in [
            block.int(1).map(|_| ()),
            block.double(1).map(|_| ()),
            block.string(1, Framing::Terminated).map(|_| ()),
        ] {
            match result {
                Err(ParseError::Field {
                    id: 12,
                    field_type: 1,
                    source,
                }) => assert!(matches!(
                    *source,
                    ParseError::FieldTypeMismatch { field_type: 1, .. }
                )),
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }

    #[test]
    fn test_pooled_string_overrun_names_owner() {
        // Size prefix at payload offset 4 claims far more than the payload holds.
        let mut payload = vec![0; 4];
        payload.extend_from_slice(&0x7FFF_FFFFi32.to_le_bytes());
        payload.extend_from_slice(b"abcd");
        let store = store_with_payload(payload);

        let data = entry(7, &(-5i32).to_le_bytes());
        let block = ExtendedAttributeBlock::new(&data, 42, &store).unwrap();
        match block.string(7, Framing::SizePrefixed) {
            Err(ParseError::Field {
                id: 42,
                field_type: 7,
                source,
            }) => assert!(matches!(*source, ParseError::OutOfRange { offset: 8, .. })),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(
            block.unicode_string(7, Framing::SizePrefixed),
            Err(ParseError::Field { id: 42, .. })
        ));
    }

    #[test]
    fn test_timestamp_and_long() {
        let store = store_with_payload(Vec::new());
        let mut ts = 0u16.to_le_bytes().to_vec();
        ts.extend_from_slice(&366u16.to_le_bytes());
        let data = [entry(1, &ts), entry(2, &(-9i64).to_le_bytes())].concat();
        let block = ExtendedAttributeBlock::new(&data, 12, &store).unwrap();
        assert_eq!(
            block.timestamp(1).unwrap(),
            chrono::NaiveDate::from_ymd_opt(1985, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        assert_eq!(block.long(2).unwrap(), -9);
        assert_eq!(block.timestamp(3).unwrap(), None);
    }
}
