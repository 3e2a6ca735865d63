//! On-disk layouts for one file-format generation.
//!
//! The parser types hold decoded data only; a decoder per generation turns
//! stream bytes into them. Other generations plug in through the same traits.

mod props14;
mod var_meta12;

pub use props14::*;
pub use var_meta12::*;

use crate::parser::{ParseError, PropertySet, Result, VarMetaIndex};

/// Decodes a var-meta index stream.
pub trait IndexDecoder {
    fn decode_index(&self, bytes: &[u8]) -> Result<VarMetaIndex>;
}

/// Decodes a document property stream.
pub trait PropsDecoder {
    fn decode_props(&self, bytes: &[u8]) -> Result<PropertySet>;
}

/// Narrow a count, offset or code to its on-disk integer width.
fn narrow<T, V>(what: &'static str, value: V) -> Result<T>
where
    V: Copy + TryInto<T> + TryInto<i64>,
{
    TryInto::<T>::try_into(value).map_err(|_| ParseError::Unencodable {
        what,
        value: TryInto::<i64>::try_into(value).unwrap_or(i64::MAX),
    })
}
