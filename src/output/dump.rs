//! Serializable snapshots of decoded index and property streams.

use crate::parser::{
    hex_preview, EntityId, FieldType, Framing, PropertySet, VarDataStore, VarMetaHeader,
};
use serde::Serialize;

/// Bytes shown per value unless the caller asks otherwise.
pub const DEFAULT_PREVIEW: usize = 16;

/// Whole-index snapshot: header plus every entity's fields.
#[derive(Debug, Clone, Serialize)]
pub struct IndexDump {
    pub stream: String,
    pub header: HeaderDump,
    pub payload_len: usize,
    pub entities: Vec<EntityDump>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeaderDump {
    pub magic: String,
    pub item_count: usize,
    pub payload_size: usize,
    pub reserved: [u32; 3],
}

impl From<&VarMetaHeader> for HeaderDump {
    fn from(header: &VarMetaHeader) -> Self {
        Self {
            magic: format!("0x{:08X}", header.magic),
            item_count: header.item_count,
            payload_size: header.payload_size,
            reserved: header.reserved,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityDump {
    pub id: EntityId,
    pub fields: Vec<FieldDump>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldDump {
    pub field_type: FieldType,
    pub offset: usize,
    /// Value length when bounded by the next recorded offset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub len: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    /// Set when the offset cannot be read from the payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IndexDump {
    /// Snapshot every (id, type) entry of `store`. Unreadable offsets are
    /// recorded per field rather than failing the dump.
    pub fn from_store(store: &VarDataStore, preview: usize) -> Self {
        let index = store.index();
        let entities = index
            .entity_ids()
            .map(|id| EntityDump {
                id,
                fields: index
                    .entries(id)
                    .into_iter()
                    .flatten()
                    .map(|(&field_type, &offset)| {
                        field_dump(store, id, field_type, offset, preview)
                    })
                    .collect(),
            })
            .collect();

        Self {
            stream: store.name().to_string(),
            header: HeaderDump::from(index.header()),
            payload_len: store.payload().len(),
            entities,
        }
    }

    pub fn field_count(&self) -> usize {
        self.entities.iter().map(|e| e.fields.len()).sum()
    }

    pub fn error_count(&self) -> usize {
        self.entities
            .iter()
            .flat_map(|e| &e.fields)
            .filter(|f| f.error.is_some())
            .count()
    }
}

fn field_dump(
    store: &VarDataStore,
    id: EntityId,
    field_type: FieldType,
    offset: usize,
    preview: usize,
) -> FieldDump {
    match store.value(id, field_type, Framing::UntilNextOffset) {
        Ok(bytes) => FieldDump {
            field_type,
            offset,
            len: bytes.map(<[u8]>::len),
            preview: bytes.map(|b| hex_preview(b, preview)),
            error: None,
        },
        Err(err) => FieldDump {
            field_type,
            offset,
            len: None,
            preview: None,
            error: Some(err.to_string()),
        },
    }
}

/// Property set snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct PropsDump {
    pub properties: Vec<PropertyDump>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyDump {
    pub code: FieldType,
    pub len: usize,
    pub preview: String,
}

impl PropsDump {
    pub fn from_props(props: &PropertySet, preview: usize) -> Self {
        Self {
            properties: props
                .iter()
                .map(|(code, bytes)| PropertyDump {
                    code,
                    len: bytes.len(),
                    preview: hex_preview(bytes, preview),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::VarMetaIndex;
    use std::sync::Arc;

    #[test]
    fn test_index_dump_bounds_and_errors() {
        let mut builder = VarMetaIndex::builder(VarMetaHeader {
            magic: 0xFADF_ADBA,
            item_count: 3,
            payload_size: 6,
            reserved: [0; 3],
        });
        builder.insert(1, 1, 0).insert(1, 2, 4).insert(2, 1, 40);
        let payload = vec![1, 2, 3, 4, 5, 6];
        let store = VarDataStore::new("VarData", Arc::new(builder.build()), payload);

        let dump = IndexDump::from_store(&store, 2);
        assert_eq!(dump.header.magic, "0xFADFADBA");
        assert_eq!(dump.field_count(), 3);
        assert_eq!(dump.error_count(), 1);

        let first = &dump.entities[0].fields[0];
        assert_eq!(first.len, Some(4));
        assert_eq!(first.preview.as_deref(), Some("01 02 .."));
        assert!(dump.entities[1].fields[0].error.is_some());
    }

    #[test]
    fn test_props_dump() {
        let mut builder = PropertySet::builder();
        builder.insert(5, vec![0xAB]);
        let dump = PropsDump::from_props(&builder.build(), DEFAULT_PREVIEW);
        assert_eq!(dump.properties.len(), 1);
        assert_eq!(dump.properties[0].preview, "AB");
    }
}
