//! Bounds-checked typed reads over a byte slice.

use super::header::{ParseError, Result};
use chrono::{Days, Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// Day zero for packed dates and timestamps.
pub fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1984, 1, 1).unwrap_or_default()
}

/// Sentinel used by packed date/time fields for "no value".
const NA: u16 = 0xFFFF;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// How long a text value is, as decided by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextLen {
    /// Read up to a NUL (0x00 or 0x0000) sentinel, or the end of the buffer.
    Terminated,
    /// Exactly this many bytes, trailing sentinels stripped.
    Bytes(usize),
}

/// Read-only window over a byte sequence.
///
/// Every accessor checks the requested span before touching the data and
/// fails with [`ParseError::OutOfRange`] instead of truncating.
#[derive(Debug, Clone, Copy)]
pub struct BinaryView<'a> {
    data: &'a [u8],
}

impl<'a> BinaryView<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub const fn len(&self) -> usize {
        self.data.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub const fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Borrow `len` bytes starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        let end = offset.checked_add(len).ok_or(ParseError::OutOfRange {
            offset,
            width: len,
            len: self.data.len(),
        })?;
        if end > self.data.len() {
            return Err(ParseError::OutOfRange {
                offset,
                width: len,
                len: self.data.len(),
            });
        }
        Ok(&self.data[offset..end])
    }

    /// Borrow everything from `offset` to the end. `offset == len` yields an empty slice.
    pub fn tail(&self, offset: usize) -> Result<&'a [u8]> {
        self.slice(offset, self.data.len().saturating_sub(offset))
    }

    fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N]> {
        let bytes = self.slice(offset, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn u8_at(&self, offset: usize) -> Result<u8> {
        Ok(self.array::<1>(offset)?[0])
    }

    pub fn u16_at(&self, offset: usize) -> Result<u16> {
        self.array(offset).map(u16::from_le_bytes)
    }

    pub fn i16_at(&self, offset: usize) -> Result<i16> {
        self.array(offset).map(i16::from_le_bytes)
    }

    pub fn i32_at(&self, offset: usize) -> Result<i32> {
        self.array(offset).map(i32::from_le_bytes)
    }

    pub fn u32_at(&self, offset: usize) -> Result<u32> {
        self.array(offset).map(u32::from_le_bytes)
    }

    pub fn i64_at(&self, offset: usize) -> Result<i64> {
        self.array(offset).map(i64::from_le_bytes)
    }

    /// 48-bit quantity: only the low six bytes are stored, the value is never negative.
    pub fn long6_at(&self, offset: usize) -> Result<i64> {
        let b: [u8; 6] = self.array(offset)?;
        let mut wide = [0u8; 8];
        wide[..6].copy_from_slice(&b);
        Ok(i64::from_le_bytes(wide))
    }

    pub fn f64_at(&self, offset: usize) -> Result<f64> {
        self.array(offset).map(f64::from_le_bytes)
    }

    /// Duration stored as a 32-bit count of tenths of a minute, returned in minutes.
    pub fn duration_at(&self, offset: usize) -> Result<f64> {
        Ok(f64::from(self.i32_at(offset)?) / 10.0)
    }

    /// Packed time of day: tenths of a minute since midnight, wrapped to one day.
    pub fn time_at(&self, offset: usize) -> Result<NaiveTime> {
        let minutes = u32::from(self.u16_at(offset)? / 10) % MINUTES_PER_DAY;
        Ok(NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0).unwrap_or_default())
    }

    /// Packed date: days since [`epoch`], `0xFFFF` meaning no date.
    pub fn date_at(&self, offset: usize) -> Result<Option<NaiveDate>> {
        let days = self.u16_at(offset)?;
        if days == NA {
            return Ok(None);
        }
        Ok(epoch().checked_add_days(Days::new(u64::from(days))))
    }

    /// Packed timestamp: a time word (tenths of a minute) followed by a day word.
    ///
    /// Day values below 100 show up in real files where the application
    /// displays "NA"; they decode to `None` along with 0 and `0xFFFF`.
    pub fn timestamp_at(&self, offset: usize) -> Result<Option<NaiveDateTime>> {
        let time = self.u16_at(offset)?;
        let days = self.u16_at(offset.checked_add(2).ok_or(ParseError::OutOfRange {
            offset,
            width: 4,
            len: self.data.len(),
        })?)?;
        if days < 100 || days == NA {
            return Ok(None);
        }
        let time = if time == NA { 0 } else { time };
        let midnight = epoch()
            .checked_add_days(Days::new(u64::from(days)))
            .and_then(|date| date.and_hms_opt(0, 0, 0));
        Ok(midnight.map(|start| start + Duration::seconds(i64::from(time) * 6)))
    }

    /// Single-byte text, each byte taken as a Latin-1 code point.
    pub fn text_at(&self, offset: usize, len: TextLen) -> Result<String> {
        let bytes = match len {
            TextLen::Terminated => {
                let rest = self.tail(offset)?;
                let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
                &rest[..end]
            }
            TextLen::Bytes(n) => {
                let raw = self.slice(offset, n)?;
                let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                &raw[..end]
            }
        };
        Ok(bytes.iter().map(|&b| char::from(b)).collect())
    }

    /// UTF-16LE text. Invalid surrogates are replaced, an odd trailing byte is ignored.
    pub fn unicode_text_at(&self, offset: usize, len: TextLen) -> Result<String> {
        let raw = match len {
            TextLen::Terminated => self.tail(offset)?,
            TextLen::Bytes(n) => self.slice(offset, n)?,
        };
        let units = raw
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .take_while(|&unit| unit != 0);
        Ok(char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect())
    }
}
