//! Protobuf message type registry
//!
//! Archive segments identify their payloads by integer type IDs. The
//! mapping from type ID to message type is generated offline from the
//! application's descriptors and committed here as a static table; the
//! library treats it as immutable configuration. IDs outside the table
//! decode to an opaque [`Message::Unknown`] that re-serialises
//! byte-identically, so unmodelled archives survive round-trips.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use phf::phf_map;
use prost::Message as _;

use crate::proto::{HasReferences, tn, tsce, tsk, tst, tswp};
use crate::{Error, Result};

/// Type IDs of every message the registry decodes.
pub mod type_id {
    pub const DOCUMENT: u32 = 1;
    pub const SHEET: u32 = 2;
    pub const CUSTOM_FORMAT_LIST: u32 = 610;
    pub const STORAGE: u32 = 2001;
    pub const TEXT_STYLE: u32 = 2021;
    pub const CALCULATION_ENGINE: u32 = 4000;
    pub const FORMULA_OWNER_DEPENDENCIES: u32 = 4002;
    pub const RANGE_PRECEDENTS_TILE: u32 = 4005;
    pub const TABLE_INFO: u32 = 6000;
    pub const TABLE_MODEL: u32 = 6001;
    pub const TILE: u32 = 6002;
    pub const CELL_STYLE: u32 = 6004;
    pub const TABLE_DATA_LIST: u32 = 6005;
    pub const HEADER_STORAGE_BUCKET: u32 = 6006;
    pub const RICH_TEXT_PAYLOAD: u32 = 6102;
}

/// Fully-qualified message names keyed by type ID.
static TYPE_NAMES: phf::Map<u32, &'static str> = phf_map! {
    1u32 => "TN.DocumentArchive",
    2u32 => "TN.SheetArchive",
    610u32 => "TSK.CustomFormatListArchive",
    2001u32 => "TSWP.StorageArchive",
    2021u32 => "TSWP.TextStyleArchive",
    4000u32 => "TSCE.CalculationEngineArchive",
    4002u32 => "TSCE.FormulaOwnerDependenciesArchive",
    4005u32 => "TSCE.RangePrecedentsTileArchive",
    6000u32 => "TST.TableInfoArchive",
    6001u32 => "TST.TableModelArchive",
    6002u32 => "TST.Tile",
    6004u32 => "TST.CellStyleArchive",
    6005u32 => "TST.TableDataList",
    6006u32 => "TST.HeaderStorageBucket",
    6102u32 => "TST.RichTextPayloadArchive",
};

/// Inverse of [`TYPE_NAMES`], built once at first use.
static NAME_IDS: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| {
    TYPE_NAMES
        .entries()
        .map(|(id, name)| (*name, *id))
        .collect()
});

/// A decoded archive payload.
///
/// A closed sum over the archives this crate models, plus an `Unknown`
/// variant that preserves the raw bytes of everything else.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Document(tn::DocumentArchive),
    Sheet(tn::SheetArchive),
    CustomFormatList(tsk::CustomFormatListArchive),
    Storage(tswp::StorageArchive),
    TextStyle(tswp::TextStyleArchive),
    CalculationEngine(tsce::CalculationEngineArchive),
    FormulaOwnerDependencies(tsce::FormulaOwnerDependenciesArchive),
    RangePrecedentsTile(tsce::RangePrecedentsTileArchive),
    TableInfo(tst::TableInfoArchive),
    TableModel(tst::TableModelArchive),
    Tile(tst::Tile),
    CellStyle(tst::CellStyleArchive),
    TableDataList(tst::TableDataList),
    HeaderStorageBucket(tst::HeaderStorageBucket),
    RichTextPayload(tst::RichTextPayloadArchive),
    /// An archive outside the registry, preserved verbatim.
    Unknown { type_id: u32, data: Vec<u8> },
}

/// Decode a payload of the given type ID.
///
/// Fails with [`Error::UnknownMessageType`] for IDs outside the registry;
/// callers that must not abort (the archive decoder) convert that into an
/// [`Message::Unknown`] passthrough.
pub fn decode(message_type: u32, data: &[u8]) -> Result<Message> {
    let msg = match message_type {
        type_id::DOCUMENT => Message::Document(tn::DocumentArchive::decode(data)?),
        type_id::SHEET => Message::Sheet(tn::SheetArchive::decode(data)?),
        type_id::CUSTOM_FORMAT_LIST => {
            Message::CustomFormatList(tsk::CustomFormatListArchive::decode(data)?)
        }
        type_id::STORAGE => Message::Storage(tswp::StorageArchive::decode(data)?),
        type_id::TEXT_STYLE => Message::TextStyle(tswp::TextStyleArchive::decode(data)?),
        type_id::CALCULATION_ENGINE => {
            Message::CalculationEngine(tsce::CalculationEngineArchive::decode(data)?)
        }
        type_id::FORMULA_OWNER_DEPENDENCIES => {
            Message::FormulaOwnerDependencies(tsce::FormulaOwnerDependenciesArchive::decode(data)?)
        }
        type_id::RANGE_PRECEDENTS_TILE => {
            Message::RangePrecedentsTile(tsce::RangePrecedentsTileArchive::decode(data)?)
        }
        type_id::TABLE_INFO => Message::TableInfo(tst::TableInfoArchive::decode(data)?),
        type_id::TABLE_MODEL => Message::TableModel(tst::TableModelArchive::decode(data)?),
        type_id::TILE => Message::Tile(tst::Tile::decode(data)?),
        type_id::CELL_STYLE => Message::CellStyle(tst::CellStyleArchive::decode(data)?),
        type_id::TABLE_DATA_LIST => Message::TableDataList(tst::TableDataList::decode(data)?),
        type_id::HEADER_STORAGE_BUCKET => {
            Message::HeaderStorageBucket(tst::HeaderStorageBucket::decode(data)?)
        }
        type_id::RICH_TEXT_PAYLOAD => {
            Message::RichTextPayload(tst::RichTextPayloadArchive::decode(data)?)
        }
        other => return Err(Error::UnknownMessageType(other)),
    };
    Ok(msg)
}

/// Resolve a fully-qualified message name to its type ID.
pub fn type_id_of(full_name: &str) -> Result<u32> {
    NAME_IDS
        .get(full_name)
        .copied()
        .ok_or_else(|| Error::Unsupported(format!("message type {}", full_name)))
}

/// Resolve a type ID to its fully-qualified message name.
pub fn name_of(type_id: u32) -> Option<&'static str> {
    TYPE_NAMES.get(&type_id).copied()
}

impl Message {
    /// The registry type ID this message serialises under.
    pub fn type_id(&self) -> u32 {
        match self {
            Message::Document(_) => type_id::DOCUMENT,
            Message::Sheet(_) => type_id::SHEET,
            Message::CustomFormatList(_) => type_id::CUSTOM_FORMAT_LIST,
            Message::Storage(_) => type_id::STORAGE,
            Message::TextStyle(_) => type_id::TEXT_STYLE,
            Message::CalculationEngine(_) => type_id::CALCULATION_ENGINE,
            Message::FormulaOwnerDependencies(_) => type_id::FORMULA_OWNER_DEPENDENCIES,
            Message::RangePrecedentsTile(_) => type_id::RANGE_PRECEDENTS_TILE,
            Message::TableInfo(_) => type_id::TABLE_INFO,
            Message::TableModel(_) => type_id::TABLE_MODEL,
            Message::Tile(_) => type_id::TILE,
            Message::CellStyle(_) => type_id::CELL_STYLE,
            Message::TableDataList(_) => type_id::TABLE_DATA_LIST,
            Message::HeaderStorageBucket(_) => type_id::HEADER_STORAGE_BUCKET,
            Message::RichTextPayload(_) => type_id::RICH_TEXT_PAYLOAD,
            Message::Unknown { type_id, .. } => *type_id,
        }
    }

    /// The fully-qualified name, or `None` for unregistered archives.
    pub fn type_name(&self) -> Option<&'static str> {
        name_of(self.type_id())
    }

    /// Serialise to `(type_id, bytes)`.
    pub fn encode(&self) -> (u32, Vec<u8>) {
        let bytes = match self {
            Message::Document(m) => m.encode_to_vec(),
            Message::Sheet(m) => m.encode_to_vec(),
            Message::CustomFormatList(m) => m.encode_to_vec(),
            Message::Storage(m) => m.encode_to_vec(),
            Message::TextStyle(m) => m.encode_to_vec(),
            Message::CalculationEngine(m) => m.encode_to_vec(),
            Message::FormulaOwnerDependencies(m) => m.encode_to_vec(),
            Message::RangePrecedentsTile(m) => m.encode_to_vec(),
            Message::TableInfo(m) => m.encode_to_vec(),
            Message::TableModel(m) => m.encode_to_vec(),
            Message::Tile(m) => m.encode_to_vec(),
            Message::CellStyle(m) => m.encode_to_vec(),
            Message::TableDataList(m) => m.encode_to_vec(),
            Message::HeaderStorageBucket(m) => m.encode_to_vec(),
            Message::RichTextPayload(m) => m.encode_to_vec(),
            Message::Unknown { data, .. } => data.clone(),
        };
        (self.type_id(), bytes)
    }

    /// Every object identifier referenced from this message, in field order.
    pub fn references(&self) -> Vec<u64> {
        let mut refs = Vec::new();
        match self {
            Message::Document(m) => m.collect_references(&mut refs),
            Message::Sheet(m) => m.collect_references(&mut refs),
            Message::CustomFormatList(m) => m.collect_references(&mut refs),
            Message::Storage(m) => m.collect_references(&mut refs),
            Message::TextStyle(m) => m.collect_references(&mut refs),
            Message::CalculationEngine(m) => m.collect_references(&mut refs),
            Message::FormulaOwnerDependencies(m) => m.collect_references(&mut refs),
            Message::RangePrecedentsTile(m) => m.collect_references(&mut refs),
            Message::TableInfo(m) => m.collect_references(&mut refs),
            Message::TableModel(m) => m.collect_references(&mut refs),
            Message::Tile(m) => m.collect_references(&mut refs),
            Message::CellStyle(m) => m.collect_references(&mut refs),
            Message::TableDataList(m) => m.collect_references(&mut refs),
            Message::HeaderStorageBucket(m) => m.collect_references(&mut refs),
            Message::RichTextPayload(m) => m.collect_references(&mut refs),
            Message::Unknown { .. } => {}
        }
        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::tsp;

    #[test]
    fn test_type_name_lookup() {
        assert_eq!(name_of(6001), Some("TST.TableModelArchive"));
        assert_eq!(name_of(2), Some("TN.SheetArchive"));
        assert_eq!(name_of(999), None);
        assert_eq!(type_id_of("TST.TableDataList").unwrap(), 6005);
        assert!(type_id_of("TST.NoSuchArchive").is_err());
    }

    #[test]
    fn test_unknown_message_type() {
        let result = decode(999, &[]);
        assert!(matches!(result, Err(Error::UnknownMessageType(999))));
    }

    #[test]
    fn test_decode_encode_round_trip() {
        let sheet = tn::SheetArchive {
            name: Some("Sheet 1".to_string()),
            drawable_infos: vec![tsp::Reference::new(42)],
        };
        let bytes = sheet.encode_to_vec();
        let msg = decode(type_id::SHEET, &bytes).unwrap();
        assert_eq!(msg, Message::Sheet(sheet));

        let (type_id, encoded) = msg.encode();
        assert_eq!(type_id, 2);
        assert_eq!(encoded, bytes);
        assert_eq!(msg.references(), vec![42]);
    }

    #[test]
    fn test_unknown_passthrough_preserves_bytes() {
        let raw = vec![0x08, 0x01, 0x10, 0x02];
        let msg = Message::Unknown {
            type_id: 12345,
            data: raw.clone(),
        };
        let (type_id, encoded) = msg.encode();
        assert_eq!(type_id, 12345);
        assert_eq!(encoded, raw);
    }
}
