//! Table archives (`TST` namespace)
//!
//! A table is reached through a `TableInfoArchive` drawable whose
//! `table_model` reference leads to the `TableModelArchive`. The model owns
//! the base data store: tile storage for packed cell records plus the keyed
//! data lists (strings, formats, styles, formulas, rich text) that cell
//! records index into.

use super::HasReferences;
use super::{tsce, tsk, tsp};

/// Drawable wrapper that places a table on a sheet.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TableInfoArchive {
    #[prost(message, optional, tag = "1")]
    pub super_: Option<DrawableInfo>,
    #[prost(message, optional, tag = "2")]
    pub table_model: Option<tsp::Reference>,
}

impl HasReferences for TableInfoArchive {
    fn collect_references(&self, out: &mut Vec<u64>) {
        if let Some(info) = &self.super_ {
            info.parent.collect_references(out);
        }
        self.table_model.collect_references(out);
    }
}

/// Minimal drawable superclass: the parent (sheet) link.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DrawableInfo {
    #[prost(message, optional, tag = "1")]
    pub parent: Option<tsp::Reference>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TableModelArchive {
    #[prost(string, tag = "1")]
    pub table_name: String,
    #[prost(uint32, tag = "2")]
    pub number_of_rows: u32,
    #[prost(uint32, tag = "3")]
    pub number_of_columns: u32,
    #[prost(uint32, tag = "4")]
    pub number_of_header_rows: u32,
    #[prost(uint32, tag = "5")]
    pub number_of_header_columns: u32,
    #[prost(uint32, tag = "6")]
    pub number_of_footer_rows: u32,
    #[prost(message, optional, tag = "7")]
    pub base_data_store: Option<DataStore>,
    /// Links the table to its calculation-engine owner UUID.
    #[prost(message, optional, tag = "8")]
    pub haunted_owner: Option<tsce::HauntedOwnerArchive>,
    #[prost(message, optional, tag = "9")]
    pub table_style: Option<tsp::Reference>,
    #[prost(message, optional, tag = "10")]
    pub body_cell_style: Option<tsp::Reference>,
    #[prost(message, optional, tag = "11")]
    pub body_text_style: Option<tsp::Reference>,
}

impl HasReferences for TableModelArchive {
    fn collect_references(&self, out: &mut Vec<u64>) {
        self.base_data_store.collect_references(out);
        self.table_style.collect_references(out);
        self.body_cell_style.collect_references(out);
        self.body_text_style.collect_references(out);
    }
}

/// The per-table data store: tiles plus keyed data lists.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DataStore {
    #[prost(message, optional, tag = "1")]
    pub tiles: Option<TileStorage>,
    #[prost(message, optional, tag = "2")]
    pub string_table: Option<tsp::Reference>,
    #[prost(message, optional, tag = "3")]
    pub style_table: Option<tsp::Reference>,
    #[prost(message, optional, tag = "4")]
    pub formula_table: Option<tsp::Reference>,
    #[prost(message, optional, tag = "5")]
    pub format_table: Option<tsp::Reference>,
    #[prost(message, optional, tag = "6")]
    pub format_table_pre_bnc: Option<tsp::Reference>,
    #[prost(message, optional, tag = "7")]
    pub rich_text_table: Option<tsp::Reference>,
    #[prost(message, optional, tag = "8")]
    pub row_headers: Option<HeaderStorageBuckets>,
    #[prost(message, optional, tag = "9")]
    pub column_headers: Option<tsp::Reference>,
    #[prost(message, optional, tag = "10")]
    pub merge_region_map: Option<tsp::Reference>,
}

impl HasReferences for DataStore {
    fn collect_references(&self, out: &mut Vec<u64>) {
        if let Some(tiles) = &self.tiles {
            for t in &tiles.tiles {
                t.tile.collect_references(out);
            }
        }
        self.string_table.collect_references(out);
        self.style_table.collect_references(out);
        self.formula_table.collect_references(out);
        self.format_table.collect_references(out);
        self.format_table_pre_bnc.collect_references(out);
        self.rich_text_table.collect_references(out);
        if let Some(headers) = &self.row_headers {
            headers.buckets.collect_references(out);
        }
        self.column_headers.collect_references(out);
        self.merge_region_map.collect_references(out);
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TileStorage {
    #[prost(message, repeated, tag = "1")]
    pub tiles: Vec<TileStorageTile>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TileStorageTile {
    #[prost(uint32, tag = "1")]
    pub tileid: u32,
    #[prost(message, optional, tag = "2")]
    pub tile: Option<tsp::Reference>,
}

/// Bucketed row-header storage; each bucket is a separate archive.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HeaderStorageBuckets {
    #[prost(message, repeated, tag = "1")]
    pub buckets: Vec<tsp::Reference>,
}

/// One run of packed cell rows.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Tile {
    #[prost(uint32, tag = "1")]
    pub max_column: u32,
    #[prost(uint32, tag = "2")]
    pub number_of_rows: u32,
    #[prost(message, repeated, tag = "5")]
    pub row_infos: Vec<TileRowInfo>,
    #[prost(bool, optional, tag = "6")]
    pub last_saved_in_bnc: Option<bool>,
    /// Cleared on every write; the writer emits narrow offsets only.
    #[prost(bool, optional, tag = "7")]
    pub should_use_wide_rows: Option<bool>,
}

impl HasReferences for Tile {
    fn collect_references(&self, _out: &mut Vec<u64>) {}
}

/// One row of packed cell storage within a tile.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TileRowInfo {
    #[prost(uint32, tag = "1")]
    pub tile_row_index: u32,
    #[prost(uint32, tag = "2")]
    pub cell_count: u32,
    #[prost(bytes = "vec", tag = "3")]
    pub cell_storage_buffer: Vec<u8>,
    /// 16-bit little-endian per-column offsets; -1 marks an absent cell.
    #[prost(bytes = "vec", tag = "4")]
    pub cell_offsets: Vec<u8>,
    #[prost(bytes = "vec", tag = "5")]
    pub cell_storage_buffer_pre_bnc: Vec<u8>,
    #[prost(bytes = "vec", tag = "6")]
    pub cell_offsets_pre_bnc: Vec<u8>,
    /// Offsets are stored divided by 4 when set.
    #[prost(bool, optional, tag = "7")]
    pub has_wide_offsets: Option<bool>,
    #[prost(uint32, tag = "8")]
    pub storage_version: u32,
}

/// Per-row or per-column header metadata.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HeaderStorageBucket {
    #[prost(message, repeated, tag = "1")]
    pub headers: Vec<HeaderRecord>,
}

impl HasReferences for HeaderStorageBucket {
    fn collect_references(&self, _out: &mut Vec<u64>) {}
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HeaderRecord {
    #[prost(uint32, tag = "1")]
    pub number_of_cells: u32,
    #[prost(float, optional, tag = "2")]
    pub size: Option<f32>,
    #[prost(bool, optional, tag = "3")]
    pub hiding_state: Option<bool>,
}

/// A keyed data list: shared payloads addressed by 4-byte keys from cell
/// storage records.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TableDataList {
    #[prost(uint32, tag = "1")]
    pub list_type: u32,
    #[prost(uint32, tag = "2")]
    pub next_list_id: u32,
    #[prost(message, repeated, tag = "3")]
    pub entries: Vec<ListEntry>,
}

impl HasReferences for TableDataList {
    fn collect_references(&self, out: &mut Vec<u64>) {
        for entry in &self.entries {
            entry.rich_text_payload.collect_references(out);
            entry.style.collect_references(out);
        }
    }
}

/// One shared payload; exactly one of the payload fields is populated
/// depending on the owning list.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListEntry {
    #[prost(uint32, tag = "1")]
    pub key: u32,
    #[prost(uint32, tag = "2")]
    pub refcount: u32,
    #[prost(string, optional, tag = "3")]
    pub string: Option<String>,
    #[prost(message, optional, tag = "4")]
    pub rich_text_payload: Option<tsp::Reference>,
    #[prost(message, optional, tag = "5")]
    pub format: Option<tsk::FormatStructArchive>,
    #[prost(message, optional, tag = "6")]
    pub formula: Option<tsce::FormulaArchive>,
    #[prost(message, optional, tag = "7")]
    pub style: Option<tsp::Reference>,
}

/// Rich-text payload: an indirection to the text storage archive.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RichTextPayloadArchive {
    #[prost(message, optional, tag = "1")]
    pub storage: Option<tsp::Reference>,
}

impl HasReferences for RichTextPayloadArchive {
    fn collect_references(&self, out: &mut Vec<u64>) {
        self.storage.collect_references(out);
    }
}

/// Cell-level style properties referenced from the style data list.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CellStyleArchive {
    #[prost(message, optional, tag = "1")]
    pub cell_properties: Option<CellStylePropertiesArchive>,
}

impl HasReferences for CellStyleArchive {
    fn collect_references(&self, _out: &mut Vec<u64>) {}
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CellStylePropertiesArchive {
    #[prost(message, optional, tag = "1")]
    pub cell_fill: Option<tsp::Color>,
    #[prost(float, optional, tag = "2")]
    pub text_inset: Option<f32>,
    #[prost(uint32, optional, tag = "3")]
    pub vertical_alignment: Option<u32>,
}
