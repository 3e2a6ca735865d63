//! Property stream with a 16-byte header and 12-byte entry headers.

use super::{narrow, PropsDecoder};
use crate::parser::{BinaryView, ParseError, PropertySet, Result};
use tracing::warn;

/// Property layout.
///
/// ```text
/// header: 16 bytes, entry count as u16 at offset 12
/// entry:  size i32, code i32, reserved i32, value (size bytes), pad byte if size is odd
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Props14 {
    /// Report a short stream instead of keeping the entries read so far.
    pub strict: bool,
}

impl Props14 {
    pub const HEADER_SIZE: usize = 16;
    pub const ENTRY_HEADER_SIZE: usize = 12;
    const STREAM: &'static str = "Props";

    pub const fn strict() -> Self {
        Self { strict: true }
    }

    /// Serialize a property set in this layout.
    pub fn encode(props: &PropertySet) -> Result<Vec<u8>> {
        let count: u16 = narrow("property count", props.len())?;
        let mut out = vec![0u8; Self::HEADER_SIZE];
        out[12..14].copy_from_slice(&count.to_le_bytes());
        for (code, value) in props.iter() {
            let size: i32 = narrow("property size", value.len())?;
            out.extend_from_slice(&size.to_le_bytes());
            out.extend_from_slice(&code.to_le_bytes());
            out.extend_from_slice(&0i32.to_le_bytes());
            out.extend_from_slice(value);
            if value.len() % 2 != 0 {
                out.push(0);
            }
        }
        Ok(out)
    }
}

impl PropsDecoder for Props14 {
    fn decode_props(&self, bytes: &[u8]) -> Result<PropertySet> {
        let view = BinaryView::new(bytes);
        if view.len() < Self::HEADER_SIZE {
            return Err(ParseError::FileTooSmall {
                expected: Self::HEADER_SIZE,
                actual: view.len(),
            });
        }
        let declared = usize::from(view.u16_at(12)?);

        let mut builder = PropertySet::builder();
        let mut found = 0;
        let mut cursor = Self::HEADER_SIZE;
        while found < declared {
            if bytes.len() - cursor < Self::ENTRY_HEADER_SIZE {
                break;
            }
            let size = view.i32_at(cursor)?;
            let code = view.i32_at(cursor + 4)?;
            cursor += Self::ENTRY_HEADER_SIZE;

            let size = match usize::try_from(size) {
                Ok(size) if size > 0 && size <= bytes.len() - cursor => size,
                _ => break,
            };
            builder.insert(code, view.slice(cursor, size)?);
            found += 1;
            cursor += size;
            if size % 2 != 0 {
                cursor = (cursor + 1).min(bytes.len());
            }
        }

        if found < declared {
            if self.strict {
                return Err(ParseError::CountMismatch {
                    stream: Self::STREAM.to_string(),
                    expected: declared,
                    actual: found,
                });
            }
            warn!(declared, found, "property stream ended before declared count");
        }
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(declared: u16, entries: &[(i32, &[u8])]) -> Vec<u8> {
        let mut out = vec![0u8; 16];
        out[12..14].copy_from_slice(&declared.to_le_bytes());
        for &(code, value) in entries {
            out.extend_from_slice(&(value.len() as i32).to_le_bytes());
            out.extend_from_slice(&code.to_le_bytes());
            out.extend_from_slice(&[0; 4]);
            out.extend_from_slice(value);
            if value.len() % 2 != 0 {
                out.push(0xEE);
            }
        }
        out
    }

    #[test]
    fn test_decode_with_padding() {
        let bytes = stream(
            3,
            &[(1, &[5][..]), (2, &[1, 0][..]), (3, &[0x24, 0, 0, 0][..])],
        );
        let props = Props14::default().decode_props(&bytes).unwrap();
        assert_eq!(props.len(), 3);
        assert_eq!(props.byte(1).unwrap(), 5);
        assert!(props.boolean(2).unwrap());
        assert_eq!(props.unicode_string(3).unwrap().as_deref(), Some("$"));
    }

    #[test]
    fn test_stops_at_declared_count() {
        let bytes = stream(1, &[(1, &[5, 0][..]), (2, &[6, 0][..])]);
        let props = Props14::default().decode_props(&bytes).unwrap();
        assert_eq!(props.keys().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_truncated_stream() {
        let mut bytes = stream(2, &[(1, &[5, 0][..]), (2, &[1, 2, 3, 4][..])]);
        bytes.truncate(bytes.len() - 2);

        let props = Props14::default().decode_props(&bytes).unwrap();
        assert_eq!(props.len(), 1);

        assert!(matches!(
            Props14::strict().decode_props(&bytes),
            Err(ParseError::CountMismatch {
                expected: 2,
                actual: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_zero_size_entry_stops_scan() {
        let bytes = stream(2, &[(1, &[][..]), (2, &[1, 0][..])]);
        let props = Props14::default().decode_props(&bytes).unwrap();
        assert!(props.is_empty());
    }

    #[test]
    fn test_encode_round_trip() {
        let bytes = stream(2, &[(4, &[9][..]), (8, &[1, 2, 3, 4, 5, 6, 7, 8][..])]);
        let props = Props14::default().decode_props(&bytes).unwrap();
        let again = Props14::strict()
            .decode_props(&Props14::encode(&props).unwrap())
            .unwrap();
        assert_eq!(again.bytes(4), Some(&[9][..]));
        assert_eq!(again.bytes(8), props.bytes(8));
    }

    #[test]
    fn test_header_too_small() {
        assert!(matches!(
            Props14::default().decode_props(&[0; 8]),
            Err(ParseError::FileTooSmall { .. })
        ));
    }
}
