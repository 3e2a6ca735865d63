//! Sparse var-data store for binary project files.
//!
//! Decodes the per-entity, per-field values of a project file's var-data
//! streams: the var-meta index, the payload it addresses, nested extended
//! attribute blocks and document property sets.

pub mod format;
pub mod output;
pub mod parser;

pub use format::{IndexDecoder, Props14, PropsDecoder, VarMeta12};
pub use parser::{
    BinaryView, EntityId, ExtendedAttributeBlock, FieldType, Framing, ParseError, PropertySet,
    Value, ValueKind, VarDataStore, VarMetaIndex,
};
