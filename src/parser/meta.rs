//! VarMeta index: (entity id, field type) -> payload offset.

use super::header::{EntityId, FieldType, ParseError, Result, VarMetaHeader};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Declared counts are only a pre-allocation hint; never reserve more than this up front.
const MAX_PREALLOC: usize = 1 << 16;

/// Decoded var-meta index.
///
/// Built once by a format decoder through [`VarMetaIndexBuilder`] and immutable
/// afterwards, so it can be shared between threads freely.
#[derive(Debug, Clone, Default)]
pub struct VarMetaIndex {
    header: VarMetaHeader,
    table: BTreeMap<EntityId, BTreeMap<FieldType, usize>>,
    /// Offsets in the order the decoder presented them, duplicates included.
    offsets: Vec<usize>,
    pairs: usize,
}

impl VarMetaIndex {
    pub fn builder(header: VarMetaHeader) -> VarMetaIndexBuilder {
        VarMetaIndexBuilder::new(header)
    }

    pub const fn header(&self) -> &VarMetaHeader {
        &self.header
    }

    /// Item count as declared by the stream header. Advisory only.
    pub const fn item_count(&self) -> usize {
        self.header.item_count
    }

    /// Payload size as declared by the stream header. Advisory only.
    pub const fn payload_size(&self) -> usize {
        self.header.payload_size
    }

    /// Every entity id with at least one entry, ascending.
    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.table.keys().copied()
    }

    /// Field types recorded for one entity, ascending.
    pub fn field_types(&self, id: EntityId) -> impl Iterator<Item = FieldType> + '_ {
        self.table.get(&id).into_iter().flat_map(|types| types.keys().copied())
    }

    /// All (type, offset) entries for one entity.
    pub fn entries(&self, id: EntityId) -> Option<&BTreeMap<FieldType, usize>> {
        self.table.get(&id)
    }

    pub fn offset_of(&self, id: EntityId, field_type: FieldType) -> Option<usize> {
        self.table.get(&id)?.get(&field_type).copied()
    }

    /// The i-th offset in the order the decoder read them.
    pub fn offset_at_index(&self, index: usize) -> Option<usize> {
        self.offsets.get(index).copied()
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Number of distinct (id, type) pairs.
    pub const fn len(&self) -> usize {
        self.pairs
    }

    pub const fn is_empty(&self) -> bool {
        self.pairs == 0
    }

    /// Compare the number of entries read against the declared item count.
    pub fn check_count(&self, stream: &str) -> Result<()> {
        if self.offsets.len() != self.header.item_count {
            return Err(ParseError::CountMismatch {
                stream: stream.to_string(),
                expected: self.header.item_count,
                actual: self.offsets.len(),
            });
        }
        Ok(())
    }
}

/// Accumulates decoded index entries. Later entries for the same pair win.
#[derive(Debug)]
pub struct VarMetaIndexBuilder {
    index: VarMetaIndex,
}

impl VarMetaIndexBuilder {
    pub fn new(header: VarMetaHeader) -> Self {
        Self {
            index: VarMetaIndex {
                header,
                table: BTreeMap::new(),
                offsets: Vec::with_capacity(header.item_count.min(MAX_PREALLOC)),
                pairs: 0,
            },
        }
    }

    pub fn insert(&mut self, id: EntityId, field_type: FieldType, offset: usize) -> &mut Self {
        let previous = self
            .index
            .table
            .entry(id)
            .or_default()
            .insert(field_type, offset);
        if previous.is_none() {
            self.index.pairs += 1;
        }
        self.index.offsets.push(offset);
        self
    }

    pub fn build(self) -> VarMetaIndex {
        let index = self.index;
        if index.offsets.len() != index.header.item_count {
            warn!(
                declared = index.header.item_count,
                read = index.offsets.len(),
                "var-meta item count drift"
            );
        }
        debug!(
            entities = index.table.len(),
            pairs = index.pairs,
            payload_size = index.header.payload_size,
            "var-meta index built"
        );
        index
    }
}
