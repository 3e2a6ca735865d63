//! Var-meta index with 12-byte entries.

use super::{narrow, IndexDecoder};
use crate::parser::{BinaryView, ParseError, Result, VarMetaHeader, VarMetaIndex};
use tracing::warn;

/// Index layout: a 24-byte header followed by fixed 12-byte entries.
///
/// ```text
/// header: magic u32, reserved u32, item_count i32, reserved u32, reserved u32, payload_size i32
/// entry:  id i32, offset i32, type u16, reserved u16
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct VarMeta12 {
    /// Report declared/actual count drift instead of reading what fits.
    pub strict: bool,
}

impl VarMeta12 {
    pub const MAGIC: u32 = 0xFADF_ADBA;
    pub const HEADER_SIZE: usize = 24;
    pub const ENTRY_SIZE: usize = 12;
    const STREAM: &'static str = "VarMeta";

    pub const fn strict() -> Self {
        Self { strict: true }
    }

    pub fn read_header(view: &BinaryView<'_>) -> Result<VarMetaHeader> {
        if view.len() < Self::HEADER_SIZE {
            return Err(ParseError::FileTooSmall {
                expected: Self::HEADER_SIZE,
                actual: view.len(),
            });
        }

        let magic = view.u32_at(0)?;
        if magic != Self::MAGIC {
            return Err(ParseError::BadMagic {
                expected: Self::MAGIC,
                actual: magic,
            });
        }

        Ok(VarMetaHeader {
            magic,
            item_count: count(view.i32_at(8)?),
            payload_size: count(view.i32_at(20)?),
            reserved: [view.u32_at(4)?, view.u32_at(12)?, view.u32_at(16)?],
        })
    }

    /// Serialize an index in this layout.
    ///
    /// One entry is written per distinct (id, type) pair, in (id, type) order,
    /// and the item count is rewritten to match. Duplicates superseded on decode
    /// are gone, so positional offsets follow the new entry order.
    pub fn encode(index: &VarMetaIndex) -> Result<Vec<u8>> {
        let header = index.header();
        let item_count: i32 = narrow("item count", index.len())?;
        let payload_size: i32 = narrow("payload size", header.payload_size)?;

        let mut out = Vec::with_capacity(Self::HEADER_SIZE + index.len() * Self::ENTRY_SIZE);
        out.extend_from_slice(&Self::MAGIC.to_le_bytes());
        out.extend_from_slice(&header.reserved[0].to_le_bytes());
        out.extend_from_slice(&item_count.to_le_bytes());
        out.extend_from_slice(&header.reserved[1].to_le_bytes());
        out.extend_from_slice(&header.reserved[2].to_le_bytes());
        out.extend_from_slice(&payload_size.to_le_bytes());

        for id in index.entity_ids() {
            for (&field_type, &offset) in index.entries(id).into_iter().flatten() {
                let offset: i32 = narrow("offset", offset)?;
                let field_type: u16 = narrow("field type", field_type)?;
                out.extend_from_slice(&id.to_le_bytes());
                out.extend_from_slice(&offset.to_le_bytes());
                out.extend_from_slice(&field_type.to_le_bytes());
                out.extend_from_slice(&0u16.to_le_bytes());
            }
        }
        Ok(out)
    }
}

/// Negative counts in a header are treated as empty.
fn count(raw: i32) -> usize {
    usize::try_from(raw).unwrap_or(0)
}

impl IndexDecoder for VarMeta12 {
    fn decode_index(&self, bytes: &[u8]) -> Result<VarMetaIndex> {
        let view = BinaryView::new(bytes);
        let header = Self::read_header(&view)?;

        let available = (bytes.len() - Self::HEADER_SIZE) / Self::ENTRY_SIZE;
        if header.item_count > available {
            if self.strict {
                return Err(ParseError::CountMismatch {
                    stream: Self::STREAM.to_string(),
                    expected: header.item_count,
                    actual: available,
                });
            }
            warn!(
                declared = header.item_count,
                available, "var-meta stream shorter than declared item count"
            );
        }

        let mut builder = VarMetaIndex::builder(header);
        for i in 0..header.item_count.min(available) {
            let at = Self::HEADER_SIZE + i * Self::ENTRY_SIZE;
            let id = view.i32_at(at)?;
            let offset = view.i32_at(at + 4)?;
            let field_type = i32::from(view.u16_at(at + 8)?);

            let offset = usize::try_from(offset).map_err(|_| ParseError::IndexCorruption {
                stream: Self::STREAM.to_string(),
                id,
                field_type,
                offset: i64::from(offset),
                payload_len: header.payload_size,
            })?;
            builder.insert(id, field_type, offset);
        }
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(item_count: i32, entries: &[(i32, i32, u16)]) -> Vec<u8> {
        let mut out = VarMeta12::MAGIC.to_le_bytes().to_vec();
        out.extend_from_slice(&0xAAu32.to_le_bytes());
        out.extend_from_slice(&item_count.to_le_bytes());
        out.extend_from_slice(&0xBBu32.to_le_bytes());
        out.extend_from_slice(&0xCCu32.to_le_bytes());
        out.extend_from_slice(&64i32.to_le_bytes());
        for &(id, offset, ty) in entries {
            out.extend_from_slice(&id.to_le_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
            out.extend_from_slice(&ty.to_le_bytes());
            out.extend_from_slice(&[0xFF, 0xFF]);
        }
        out
    }

    #[test]
    fn test_decode_entries() {
        let bytes = stream(3, &[(1, 0, 10), (1, 4, 11), (2, 10, 10)]);
        let index = VarMeta12::default().decode_index(&bytes).unwrap();
        assert_eq!(index.item_count(), 3);
        assert_eq!(index.payload_size(), 64);
        assert_eq!(index.header().reserved, [0xAA, 0xBB, 0xCC]);
        assert_eq!(index.offset_of(1, 11), Some(4));
        assert_eq!(index.offset_of(2, 10), Some(10));
        assert_eq!(index.offset_at_index(2), Some(10));
    }

    #[test]
    fn test_short_stream_lenient_and_strict() {
        let bytes = stream(5, &[(1, 0, 10), (2, 8, 10)]);
        let index = VarMeta12::default().decode_index(&bytes).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.item_count(), 5);

        assert!(matches!(
            VarMeta12::strict().decode_index(&bytes),
            Err(ParseError::CountMismatch {
                expected: 5,
                actual: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_bad_magic_and_short_header() {
        let mut bytes = stream(0, &[]);
        assert!(matches!(
            VarMeta12::default().decode_index(&bytes[..10]),
            Err(ParseError::FileTooSmall { expected: 24, actual: 10 })
        ));
        bytes[0] = 0;
        assert!(matches!(
            VarMeta12::default().decode_index(&bytes),
            Err(ParseError::BadMagic { .. })
        ));
    }

    #[test]
    fn test_negative_offset_is_corruption() {
        let bytes = stream(1, &[(3, -8, 7)]);
        assert!(matches!(
            VarMeta12::default().decode_index(&bytes),
            Err(ParseError::IndexCorruption {
                id: 3,
                field_type: 7,
                offset: -8,
                ..
            })
        ));
    }

    #[test]
    fn test_encode_preserves_header() {
        let bytes = stream(2, &[(1, 0, 10), (2, 8, 11)]);
        let index = VarMeta12::default().decode_index(&bytes).unwrap();
        let again = VarMeta12::default()
            .decode_index(&VarMeta12::encode(&index).unwrap())
            .unwrap();
        assert_eq!(again.header(), index.header());
        assert_eq!(again.offset_of(2, 11), Some(8));
    }

    #[test]
    fn test_encode_rewrites_duplicates() {
        let bytes = stream(3, &[(2, 8, 10), (1, 0, 10), (2, 4, 10)]);
        let index = VarMeta12::default().decode_index(&bytes).unwrap();
        assert_eq!(index.offset_at_index(0), Some(8));

        let again = VarMeta12::strict()
            .decode_index(&VarMeta12::encode(&index).unwrap())
            .unwrap();
        assert_eq!(again.item_count(), 2);
        assert_eq!(again.offset_of(2, 10), Some(4));
        assert_eq!(again.offsets(), &[0, 4]);
    }

    #[test]
    fn test_encode_rejects_wide_values() {
        let mut builder = VarMetaIndex::builder(VarMetaHeader::default());
        builder.insert(1, 0x1_0000, 0);
        assert!(matches!(
            VarMeta12::encode(&builder.build()),
            Err(ParseError::Unencodable {
                what: "field type",
                value: 0x1_0000
            })
        ));

        let mut builder = VarMetaIndex::builder(VarMetaHeader::default());
        builder.insert(1, -1, 0);
        assert!(matches!(
            VarMeta12::encode(&builder.build()),
            Err(ParseError::Unencodable { value: -1, .. })
        ));
    }
}
