//! Document model
//!
//! Sits between the object store and the table facade: resolves the
//! per-table data lists (strings, formats, styles, rich text, formulas),
//! extracts packed cell buffers from tiles, maps owner UUIDs for
//! cross-table references and merge ranges, renders formatted values and
//! formulas, and regenerates tile storage on save.

use std::collections::{HashMap, HashSet};

use smallvec::SmallVec;
use tracing::warn;

use crate::cell::bullets::bullet_char;
use crate::cell::refs::rowcol_to_cell;
use crate::cell::storage::{self, CellStorage};
use crate::cell::{
    Alignment, Cell, CellValue, HorizontalAlignment, MergeRange, Rgb, RichText, Style,
    VerticalAlignment,
};
use crate::format::date::{datetime_from_epoch, seconds_since_epoch};
use crate::format::duration::format_duration;
use crate::format::fraction::{float_to_fraction, float_to_n_digit_fraction};
use crate::format::number::format_custom_number;
use crate::format::{
    date, duration_format_from_archive, format_boolean, format_custom_text, format_decimal,
    number_format_from_archive,
};
use crate::formula::{render_formula, TableResolver};
use crate::iwa::registry::Message;
use crate::proto::tsce::AstNodeArchive;
use crate::proto::{tsk, tst, tswp};
use crate::store::ObjectStore;
use crate::{Error, Result};

/// Offset-table width of a narrow tile row.
const OFFSETS_WIDTH: usize = 256;

/// The per-table keyed data lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableList {
    Strings,
    Styles,
    Formulas,
    Formats,
    FormatsPreBnc,
    RichText,
}

/// Per-table merge participation.
#[derive(Debug, Clone, Default)]
pub struct MergeMap {
    pub anchors: HashMap<(u32, u32), (u32, u32)>,
    pub covered: HashMap<(u32, u32), MergeRange>,
}

/// Loaded document model over the object store.
pub struct Model {
    store: ObjectStore,
    document_id: u64,
    sheet_ids: Vec<u64>,
    tables_by_sheet: HashMap<u64, Vec<u64>>,
    sheet_of_table: HashMap<u64, u64>,
    table_names: HashMap<u64, String>,
    /// Calculation-engine internal owner IDs to UUIDs.
    owner_uid_by_internal: HashMap<u32, u128>,
    /// Table base owner UUIDs, both directions.
    base_uid_of_table: HashMap<u64, u128>,
    table_of_uid: HashMap<u128, u64>,
    custom_formats: HashMap<u128, tsk::CustomFormatArchive>,
}

impl Model {
    /// Build the model from a loaded store, resolving the document graph
    /// and the calculation-engine owner maps.
    pub fn new(store: ObjectStore) -> Result<Self> {
        let document_id = *store
            .find_by_type("TN.DocumentArchive")
            .first()
            .ok_or_else(|| Error::FileFormat("document archive not found".to_string()))?;

        let sheet_ids: Vec<u64> = match store.get(document_id)? {
            Message::Document(doc) => doc.sheets.iter().map(|r| r.identifier).collect(),
            _ => Vec::new(),
        };

        let mut model = Model {
            store,
            document_id,
            sheet_ids,
            tables_by_sheet: HashMap::new(),
            sheet_of_table: HashMap::new(),
            table_names: HashMap::new(),
            owner_uid_by_internal: HashMap::new(),
            base_uid_of_table: HashMap::new(),
            table_of_uid: HashMap::new(),
            custom_formats: HashMap::new(),
        };
        model.index_tables();
        model.index_owner_uids();
        model.index_custom_formats();
        Ok(model)
    }

    /// Walk the table drawables into per-sheet table lists.
    fn index_tables(&mut self) {
        for info_id in self.store.find_by_type("TST.TableInfoArchive") {
            let Ok(Message::TableInfo(info)) = self.store.get(info_id) else {
                continue;
            };
            let Some(parent) = info.super_.as_ref().and_then(|s| s.parent) else {
                continue;
            };
            let Some(table_model) = info.table_model else {
                continue;
            };
            let table_id = table_model.identifier;

            self.tables_by_sheet
                .entry(parent.identifier)
                .or_default()
                .push(table_id);
            self.sheet_of_table.insert(table_id, parent.identifier);
            if let Ok(Message::TableModel(table)) = self.store.get(table_id) {
                self.table_names
                    .insert(table_id, table.table_name.clone());
            }
        }
    }

    /// Extract the owner-ID map and per-table base UUIDs from the
    /// calculation engine.
    fn index_owner_uids(&mut self) {
        let owner_entries: Vec<(u32, u128)> = self
            .dependency_tracker()
            .and_then(|tracker| tracker.owner_id_map.as_ref())
            .map(|map| {
                map.map_entry
                    .iter()
                    .filter_map(|entry| {
                        entry
                            .owner_id
                            .as_ref()
                            .map(|uid| (entry.internal_owner_id, uid.as_u128()))
                    })
                    .collect()
            })
            .unwrap_or_default();
        self.owner_uid_by_internal.extend(owner_entries);

        // A table's base UUID is held by the formula-owner dependencies
        // archive whose formula owner matches the table's haunted owner.
        let dependency_ids = self
            .store
            .find_by_type("TSCE.FormulaOwnerDependenciesArchive");
        let table_ids: Vec<u64> = self.table_names.keys().copied().collect();
        for table_id in table_ids {
            let Ok(Message::TableModel(table)) = self.store.get(table_id) else {
                continue;
            };
            let Some(haunted) = table
                .haunted_owner
                .as_ref()
                .and_then(|h| h.owner_uid.as_ref())
                .map(|uid| uid.as_u128())
            else {
                continue;
            };
            for dependency_id in &dependency_ids {
                let Ok(Message::FormulaOwnerDependencies(deps)) = self.store.get(*dependency_id)
                else {
                    continue;
                };
                let (Some(formula_uid), Some(base_uid)) =
                    (deps.formula_owner_uid.as_ref(), deps.base_owner_uid.as_ref())
                else {
                    continue;
                };
                if formula_uid.as_u128() == haunted {
                    self.base_uid_of_table.insert(table_id, base_uid.as_u128());
                    self.table_of_uid.insert(base_uid.as_u128(), table_id);
                    break;
                }
            }
        }
    }

    fn index_custom_formats(&mut self) {
        let Ok(Message::Document(doc)) = self.store.get(self.document_id) else {
            return;
        };
        let Some(list_ref) = doc.custom_format_list else {
            return;
        };
        if let Ok(Message::CustomFormatList(list)) = self.store.get(list_ref.identifier) {
            for (uid, custom) in list.uuids.iter().zip(list.custom_formats.iter()) {
                self.custom_formats.insert(uid.as_u128(), custom.clone());
            }
        }
    }

    fn dependency_tracker(&self) -> Option<&crate::proto::tsce::DependencyTrackerArchive> {
        let engine_id = *self
            .store
            .find_by_type("TSCE.CalculationEngineArchive")
            .first()?;
        match self.store.get(engine_id) {
            Ok(Message::CalculationEngine(engine)) => engine.dependency_tracker.as_ref(),
            _ => None,
        }
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ObjectStore {
        &mut self.store
    }

    pub fn sheet_ids(&self) -> &[u64] {
        &self.sheet_ids
    }

    pub fn sheet_name(&self, sheet_id: u64) -> String {
        match self.store.get(sheet_id) {
            Ok(Message::Sheet(sheet)) => sheet.name.clone().unwrap_or_default(),
            _ => String::new(),
        }
    }

    pub fn table_ids(&self, sheet_id: u64) -> Vec<u64> {
        self.tables_by_sheet
            .get(&sheet_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn table_name(&self, table_id: u64) -> String {
        self.table_names.get(&table_id).cloned().unwrap_or_default()
    }

    fn table_model(&self, table_id: u64) -> Result<&tst::TableModelArchive> {
        match self.store.get(table_id)? {
            Message::TableModel(table) => Ok(table),
            _ => Err(Error::FileFormat(format!(
                "object {} is not a table model",
                table_id
            ))),
        }
    }

    fn data_store(&self, table_id: u64) -> Result<&tst::DataStore> {
        self.table_model(table_id)?
            .base_data_store
            .as_ref()
            .ok_or_else(|| Error::FileFormat(format!("table {} has no data store", table_id)))
    }

    fn data_list_id(&self, table_id: u64, list: TableList) -> Option<u64> {
        let data_store = self.data_store(table_id).ok()?;
        let reference = match list {
            TableList::Strings => data_store.string_table,
            TableList::Styles => data_store.style_table,
            TableList::Formulas => data_store.formula_table,
            TableList::Formats => data_store.format_table,
            TableList::FormatsPreBnc => data_store.format_table_pre_bnc,
            TableList::RichText => data_store.rich_text_table,
        };
        reference.map(|r| r.identifier)
    }

    fn data_list(&self, table_id: u64, list: TableList) -> Option<&tst::TableDataList> {
        let list_id = self.data_list_id(table_id, list)?;
        match self.store.get(list_id) {
            Ok(Message::TableDataList(data_list)) => Some(data_list),
            _ => None,
        }
    }

    /// Resolve a key into the table's string table.
    pub fn table_string(&self, table_id: u64, key: u32) -> Option<String> {
        self.data_list(table_id, TableList::Strings)?
            .entries
            .iter()
            .find(|entry| entry.key == key)
            .and_then(|entry| entry.string.clone())
    }

    /// Resolve a key into the table's format table (falling back to the
    /// pre-BNC list when the main list misses).
    pub fn table_format(&self, table_id: u64, key: u32) -> Option<tsk::FormatStructArchive> {
        for list in [TableList::Formats, TableList::FormatsPreBnc] {
            if let Some(found) = self.data_list(table_id, list).and_then(|data_list| {
                data_list
                    .entries
                    .iter()
                    .find(|entry| entry.key == key)
                    .and_then(|entry| entry.format.clone())
            }) {
                return Some(found);
            }
        }
        None
    }

    /// Resolve a key into the rich-text table.
    pub fn table_rich_text(&self, table_id: u64, key: u32) -> Option<RichText> {
        let payload_ref = self
            .data_list(table_id, TableList::RichText)?
            .entries
            .iter()
            .find(|entry| entry.key == key)
            .and_then(|entry| entry.rich_text_payload)?;
        let storage_ref = match self.store.get(payload_ref.identifier) {
            Ok(Message::RichTextPayload(payload)) => payload.storage?,
            _ => return None,
        };
        let storage = match self.store.get(storage_ref.identifier) {
            Ok(Message::Storage(storage)) => storage,
            _ => return None,
        };
        Some(rich_text_from_storage(storage))
    }

    /// Resolve a style key pair into a cell style.
    pub fn resolve_style(
        &self,
        table_id: u64,
        text_style_id: Option<u32>,
        cell_style_id: Option<u32>,
    ) -> Option<Style> {
        if text_style_id.is_none() && cell_style_id.is_none() {
            return None;
        }
        let mut style = Style::default();

        if let Some(key) = text_style_id {
            if let Some(Message::TextStyle(text_style)) = self.style_entry(table_id, key) {
                apply_text_style(&mut style, text_style);
            }
        }
        if let Some(key) = cell_style_id {
            if let Some(Message::CellStyle(cell_style)) = self.style_entry(table_id, key) {
                if let Some(properties) = &cell_style.cell_properties {
                    if let Some(fill) = &properties.cell_fill {
                        style.bg_color = Some(Rgb::from_float(fill.r, fill.g, fill.b));
                    }
                    if let Some(inset) = properties.text_inset {
                        style.text_inset = inset;
                    }
                    if let Some(vertical) = properties.vertical_alignment {
                        style.alignment.vertical = VerticalAlignment::from_archive(vertical);
                    }
                }
            }
        }
        Some(style)
    }

    fn style_entry(&self, table_id: u64, key: u32) -> Option<&Message> {
        let style_ref = self
            .data_list(table_id, TableList::Styles)?
            .entries
            .iter()
            .find(|entry| entry.key == key)
            .and_then(|entry| entry.style)?;
        self.store.get(style_ref.identifier).ok()
    }

    /// Row count from the bucketed row headers, falling back to the table
    /// model.
    pub fn table_row_count(&self, table_id: u64) -> u32 {
        let from_headers = (|| {
            let data_store = self.data_store(table_id).ok()?;
            let bucket_ref = data_store.row_headers.as_ref()?.buckets.first()?;
            match self.store.get(bucket_ref.identifier) {
                Ok(Message::HeaderStorageBucket(bucket)) => Some(bucket.headers.len() as u32),
                _ => None,
            }
        })();
        from_headers
            .filter(|count| *count > 0)
            .unwrap_or_else(|| self.table_model(table_id).map(|t| t.number_of_rows).unwrap_or(0))
    }

    /// Column count from the column header bucket, falling back to the
    /// table model.
    pub fn table_column_count(&self, table_id: u64) -> u32 {
        let from_headers = (|| {
            let data_store = self.data_store(table_id).ok()?;
            let bucket_ref = data_store.column_headers.as_ref()?;
            match self.store.get(bucket_ref.identifier) {
                Ok(Message::HeaderStorageBucket(bucket)) => Some(bucket.headers.len() as u32),
                _ => None,
            }
        })();
        from_headers.filter(|count| *count > 0).unwrap_or_else(|| {
            self.table_model(table_id)
                .map(|t| t.number_of_columns)
                .unwrap_or(0)
        })
    }

    pub fn header_counts(&self, table_id: u64) -> (u32, u32) {
        self.table_model(table_id)
            .map(|t| (t.number_of_header_rows, t.number_of_header_columns))
            .unwrap_or((0, 0))
    }

    fn tiles(&self, table_id: u64) -> Vec<&tst::Tile> {
        let Ok(data_store) = self.data_store(table_id) else {
            return Vec::new();
        };
        let Some(tile_storage) = &data_store.tiles else {
            return Vec::new();
        };
        tile_storage
            .tiles
            .iter()
            .filter_map(|slot| slot.tile)
            .filter_map(|reference| match self.store.get(reference.identifier) {
                Ok(Message::Tile(tile)) => Some(tile),
                _ => None,
            })
            .collect()
    }

    /// Per-row, per-column packed cell buffers across the table's tiles.
    pub fn storage_buffers(&self, table_id: u64, pre_bnc: bool) -> Vec<Vec<Option<Vec<u8>>>> {
        let num_cols = self.table_column_count(table_id) as usize;
        let mut rows = Vec::new();
        for tile in self.tiles(table_id) {
            for row_info in &tile.row_infos {
                let (buffer, offsets) = if pre_bnc {
                    (
                        &row_info.cell_storage_buffer_pre_bnc,
                        &row_info.cell_offsets_pre_bnc,
                    )
                } else {
                    (&row_info.cell_storage_buffer, &row_info.cell_offsets)
                };
                rows.push(row_storage_buffers(
                    buffer,
                    offsets,
                    num_cols,
                    row_info.has_wide_offsets.unwrap_or(false),
                ));
            }
        }
        rows
    }

    /// Merge ranges for a table, from the range-precedents sidecars.
    pub fn merge_map(&self, table_id: u64) -> MergeMap {
        let mut merges = MergeMap::default();
        let Some(base_uid) = self.base_uid_of_table.get(&table_id) else {
            return merges;
        };

        for range_id in self.store.find_by_type("TSCE.RangePrecedentsTileArchive") {
            let Ok(Message::RangePrecedentsTile(tile)) = self.store.get(range_id) else {
                continue;
            };
            let owner_uid = self.owner_uid_by_internal.get(&tile.to_owner_id);
            if owner_uid != Some(base_uid) {
                continue;
            }
            for from_to in &tile.from_to_range {
                let Some(rect) = &from_to.refers_to_rect else {
                    continue;
                };
                let Some(origin) = &rect.origin else {
                    continue;
                };
                let (num_rows, num_cols) = rect
                    .size
                    .map(|size| (size.num_rows.unwrap_or(1), size.num_columns.unwrap_or(1)))
                    .unwrap_or((1, 1));
                if num_rows == 0 || num_cols == 0 {
                    continue;
                }
                let range = MergeRange {
                    row_start: origin.row,
                    col_start: origin.column,
                    row_end: origin.row + num_rows - 1,
                    col_end: origin.column + num_cols - 1,
                };
                merges
                    .anchors
                    .insert((origin.row, origin.column), (num_rows, num_cols));
                for row in range.row_start..=range.row_end {
                    for col in range.col_start..=range.col_end {
                        if (row, col) != (origin.row, origin.column) {
                            merges.covered.insert((row, col), range);
                        }
                    }
                }
            }
        }
        merges
    }

    /// Coordinates holding formulas, from the dependency tracker.
    pub fn formula_cells(&self, table_id: u64) -> HashSet<(u32, u32)> {
        let mut cells = HashSet::new();
        let Some(base_uid) = self.base_uid_of_table.get(&table_id) else {
            return cells;
        };
        let Some(tracker) = self.dependency_tracker() else {
            return cells;
        };
        for info in &tracker.formula_owner_info {
            let matches_owner = info
                .formula_owner_id
                .as_ref()
                .is_some_and(|uid| uid.as_u128() == *base_uid);
            if !matches_owner {
                continue;
            }
            if let Some(dependencies) = &info.cell_dependencies {
                for record in &dependencies.cell_record {
                    if record.contains_a_formula {
                        cells.insert((record.row, record.column));
                    }
                }
            }
        }
        cells
    }

    /// Error flavors for error cells, from the dependency tracker.
    pub fn error_cells(&self, table_id: u64) -> HashMap<(u32, u32), u32> {
        let mut cells = HashMap::new();
        let Some(base_uid) = self.base_uid_of_table.get(&table_id) else {
            return cells;
        };
        let Some(tracker) = self.dependency_tracker() else {
            return cells;
        };
        for info in &tracker.formula_owner_info {
            let matches_owner = info
                .formula_owner_id
                .as_ref()
                .is_some_and(|uid| uid.as_u128() == *base_uid);
            if !matches_owner {
                continue;
            }
            if let Some(errors) = &info.cell_errors {
                for entry in &errors.errors {
                    if let Some(coordinate) = &entry.coordinate {
                        cells.insert((coordinate.row, coordinate.column), entry.error_flavor);
                    }
                }
            }
        }
        cells
    }

    /// The formula node arrays for a table, keyed by formula-table key.
    pub fn formula_asts(&self, table_id: u64) -> HashMap<u32, Vec<AstNodeArchive>> {
        let mut formulas = HashMap::new();
        if let Some(data_list) = self.data_list(table_id, TableList::Formulas) {
            for entry in &data_list.entries {
                let nodes = entry
                    .formula
                    .as_ref()
                    .and_then(|f| f.ast_node_array.as_ref())
                    .map(|array| array.ast_node.clone())
                    .unwrap_or_default();
                formulas.insert(entry.key, nodes);
            }
        }
        formulas
    }

    /// Render the formula for a cell from its formula-table key.
    pub fn formula_text(
        &self,
        table_id: u64,
        formulas: &HashMap<u32, Vec<AstNodeArchive>>,
        key: u32,
        row: u32,
        col: u32,
    ) -> String {
        let table_name = self.table_name(table_id);
        match formulas.get(&key) {
            Some(nodes) => render_formula(nodes, self, &table_name, table_id, row, col),
            None => {
                warn!(
                    "{}@[{},{}]: key #{} not found",
                    table_name, row, col, key
                );
                format!("INVALID_KEY!({})", key)
            }
        }
    }

    /// Decode one packed cell buffer into a semantic value.
    pub fn cell_value(
        &self,
        table_id: u64,
        storage: &CellStorage,
        row: u32,
        col: u32,
    ) -> Result<CellValue> {
        use crate::cell::storage::cell_type;

        let value = match storage.cell_type {
            cell_type::GENERIC => CellValue::Empty,
            cell_type::NUMBER | cell_type::NUMBER_D128 => {
                CellValue::Number(storage.d128.or(storage.double).unwrap_or(0.0))
            }
            cell_type::TEXT => {
                let text = storage
                    .string_id
                    .and_then(|key| self.table_string(table_id, key))
                    .unwrap_or_default();
                CellValue::Text(text)
            }
            cell_type::DATE => {
                CellValue::Date(datetime_from_epoch(storage.seconds.unwrap_or(0.0)))
            }
            cell_type::BOOL => CellValue::Bool(storage.double.unwrap_or(0.0) > 0.0),
            cell_type::DURATION => CellValue::Duration(storage.double.unwrap_or(0.0)),
            cell_type::ERROR => CellValue::Error,
            cell_type::RICH_TEXT => {
                let rich = storage
                    .rich_id
                    .and_then(|key| self.table_rich_text(table_id, key))
                    .unwrap_or_default();
                CellValue::RichText(rich)
            }
            other => {
                return Err(Error::Unsupported(format!(
                    "cell type ID {} at {}",
                    other,
                    cell_reference(&self.table_name(table_id), row, col)
                )));
            }
        };
        Ok(value)
    }

    /// The user-visible formatted string for a cell, where it carries a
    /// format.
    pub fn formatted_value(
        &self,
        table_id: u64,
        storage: &CellStorage,
        value: &CellValue,
    ) -> Option<String> {
        if let (Some(format_id), Some(seconds)) = (storage.duration_format_id, storage.double) {
            let format = self.table_format(table_id, format_id)?;
            return Some(format_duration(
                seconds,
                &duration_format_from_archive(&format),
            ));
        }

        if let (Some(format_id), Some(seconds)) = (storage.date_format_id, storage.seconds) {
            let format = self.table_format(table_id, format_id)?;
            let timestamp = datetime_from_epoch(seconds);
            let format_string = match self.custom_format_for(&format) {
                Some(custom) if custom.format_type == tsk::format_type::CUSTOM_DATE => {
                    custom.custom_format_string.clone().unwrap_or_default()
                }
                Some(custom) => {
                    warn!(
                        "unexpected custom format type {} for date cell",
                        custom.format_type
                    );
                    return None;
                }
                None => format.date_time_format.clone().unwrap_or_default(),
            };
            return match date::format_date(&format_string, &timestamp) {
                Ok(rendered) => Some(rendered),
                Err(error) => {
                    warn!("date format failed: {}", error);
                    None
                }
            };
        }

        let format_id = if storage.text_format_id.is_some()
            && matches!(value, CellValue::Text(_) | CellValue::RichText(_))
        {
            storage.text_format_id
        } else {
            storage.currency_format_id.or(storage.num_format_id)
        }?;
        let format = self.table_format(table_id, format_id)?;
        let number = storage.d128.or(storage.double).unwrap_or(0.0);

        if let Some(custom) = self.custom_format_for(&format) {
            if custom.requires_fraction_replacement.unwrap_or(false) {
                return Some(render_fraction(
                    number,
                    custom.fraction_accuracy.unwrap_or(1),
                ));
            }
            return match custom.format_type {
                tsk::format_type::CUSTOM_TEXT => {
                    let text = storage
                        .string_id
                        .and_then(|key| self.table_string(table_id, key))?;
                    Some(format_custom_text(
                        &custom.custom_format_string.clone().unwrap_or_default(),
                        &text,
                    ))
                }
                tsk::format_type::CUSTOM_NUMBER | tsk::format_type::CUSTOM_CURRENCY => {
                    Some(format_custom_number(
                        &number_format_from_archive(&custom),
                        number,
                    ))
                }
                other => {
                    warn!("unexpected custom format type {}", other);
                    None
                }
            };
        }

        // Plain (non-custom) formats.
        match format.format_type {
            tsk::format_type::DECIMAL | tsk::format_type::CURRENCY | tsk::format_type::PERCENT => {
                Some(format_decimal(
                    number,
                    format.decimal_places,
                    format.show_thousands_separator.unwrap_or(false),
                ))
            }
            tsk::format_type::FRACTION => Some(render_fraction(
                number,
                format.fraction_accuracy.unwrap_or(1),
            )),
            tsk::format_type::BOOLEAN | tsk::format_type::CHECKBOX => match value {
                CellValue::Bool(b) => Some(format_boolean(*b)),
                _ => Some(format_boolean(number > 0.0)),
            },
            tsk::format_type::TEXT => match value {
                CellValue::Text(text) => Some(text.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    /// The custom format a record links to, where its UID resolves.
    fn custom_format_for(&self, format: &tsk::FormatStructArchive) -> Option<tsk::FormatStructArchive> {
        let uid = format.custom_uid.as_ref()?.as_u128();
        self.custom_formats
            .get(&uid)
            .and_then(|custom| custom.default_format.clone())
    }

    /// Whether any other table shares this table's name.
    fn table_name_collides(&self, table_id: u64) -> bool {
        let name = self.table_name(table_id);
        self.table_names
            .iter()
            .any(|(id, other)| *id != table_id && *other == name)
    }

    /// Rewrite the tile storage and string table of a table from its
    /// current cell grid. Called by the facade before saving.
    pub fn update_table_storage(&mut self, table_id: u64, cells: &[Vec<Cell>]) -> Result<()> {
        let num_rows = cells.len();
        let num_cols = cells.first().map(|row| row.len()).unwrap_or(0);
        if num_cols > OFFSETS_WIDTH {
            return Err(Error::Unsupported(format!(
                "tables wider than {} columns on the write path",
                OFFSETS_WIDTH
            )));
        }

        let table_name = self.table_name(table_id);
        let strings_id = self
            .data_list_id(table_id, TableList::Strings)
            .ok_or_else(|| Error::FileFormat(format!("table {} has no string table", table_id)))?;
        let tile_id = {
            let data_store = self.data_store(table_id)?;
            data_store
                .tiles
                .as_ref()
                .and_then(|tiles| tiles.tiles.first())
                .and_then(|slot| slot.tile)
                .map(|reference| reference.identifier)
                .ok_or_else(|| Error::FileFormat(format!("table {} has no tiles", table_id)))?
        };

        // Allocate string keys and rebuild refcounts for the text cells.
        let mut entries = match self.store.get(strings_id)? {
            Message::TableDataList(list) => list.entries.clone(),
            _ => Vec::new(),
        };
        let mut key_of: HashMap<String, u32> = entries
            .iter()
            .filter_map(|entry| entry.string.clone().map(|s| (s, entry.key)))
            .collect();
        let mut next_key = entries.iter().map(|entry| entry.key).max().unwrap_or(0) + 1;
        let mut refcounts: HashMap<u32, u32> = HashMap::new();

        let mut lookup_key = |text: &str| -> u32 {
            let key = match key_of.get(text) {
                Some(key) => *key,
                None => {
                    let key = next_key;
                    next_key += 1;
                    key_of.insert(text.to_string(), key);
                    entries.push(tst::ListEntry {
                        key,
                        refcount: 0,
                        string: Some(text.to_string()),
                        ..Default::default()
                    });
                    key
                }
            };
            key
        };

        // Rebuild every tile row from the cell grid.
        let mut row_infos = Vec::with_capacity(num_rows);
        for (row_index, row) in cells.iter().enumerate() {
            let mut storage_buffer = Vec::new();
            let mut offsets: SmallVec<[i16; OFFSETS_WIDTH]> =
                SmallVec::from_elem(-1, OFFSETS_WIDTH);
            let mut cell_count = 0u32;
            let mut current_offset = 0usize;

            for (col_index, cell) in row.iter().enumerate() {
                let record = match &cell.value {
                    CellValue::Empty => None,
                    CellValue::Number(value) => Some(storage::encode_number(*value)),
                    CellValue::Text(text) => {
                        let key = lookup_key(text);
                        *refcounts.entry(key).or_insert(0) += 1;
                        Some(storage::encode_text(key))
                    }
                    CellValue::Date(timestamp) => {
                        Some(storage::encode_date(seconds_since_epoch(timestamp)))
                    }
                    CellValue::Bool(value) => Some(storage::encode_bool(*value)),
                    CellValue::Duration(value) => Some(storage::encode_duration(*value)),
                    CellValue::Error | CellValue::RichText(_) => {
                        warn!(
                            "{}@[{},{}]: unsupported cell type for save",
                            table_name, row_index, col_index
                        );
                        None
                    }
                };
                if let Some(record) = record {
                    offsets[col_index] = current_offset as i16;
                    current_offset += record.len();
                    storage_buffer.extend(record);
                    cell_count += 1;
                }
            }

            let offset_bytes: Vec<u8> = offsets
                .iter()
                .flat_map(|offset| offset.to_le_bytes())
                .collect();
            row_infos.push(tst::TileRowInfo {
                tile_row_index: row_index as u32,
                cell_count,
                cell_storage_buffer: storage_buffer.clone(),
                cell_offsets: offset_bytes.clone(),
                cell_storage_buffer_pre_bnc: storage_buffer,
                cell_offsets_pre_bnc: offset_bytes,
                has_wide_offsets: None,
                storage_version: storage::STORAGE_VERSION as u32,
            });
        }

        // Apply the rebuilt refcounts; entries no text cell references
        // keep their previous count.
        for entry in &mut entries {
            if let Some(count) = refcounts.get(&entry.key) {
                entry.refcount = *count;
            }
        }

        if let Message::TableDataList(list) = self.store.get_mut(strings_id)? {
            list.entries = entries;
            list.next_list_id = next_key;
        }
        self.store.mark_dirty(strings_id);

        if let Message::Tile(tile) = self.store.get_mut(tile_id)? {
            tile.number_of_rows = num_rows as u32;
            tile.max_column = num_cols.saturating_sub(1) as u32;
            tile.row_infos = row_infos;
            // The writer never emits wide offsets.
            tile.should_use_wide_rows = None;
            tile.last_saved_in_bnc = None;
        }
        self.store.mark_dirty(tile_id);

        self.update_table_extents(table_id, num_rows as u32, num_cols as u32)?;
        Ok(())
    }

    /// Keep the table model and header buckets consistent with a resized
    /// cell grid.
    fn update_table_extents(&mut self, table_id: u64, num_rows: u32, num_cols: u32) -> Result<()> {
        let (row_bucket_id, col_bucket_id) = {
            let data_store = self.data_store(table_id)?;
            (
                data_store
                    .row_headers
                    .as_ref()
                    .and_then(|headers| headers.buckets.first())
                    .map(|reference| reference.identifier),
                data_store.column_headers.map(|reference| reference.identifier),
            )
        };

        let mut extents_changed = false;
        if let Message::TableModel(table) = self.store.get_mut(table_id)? {
            if table.number_of_rows != num_rows || table.number_of_columns != num_cols {
                table.number_of_rows = num_rows;
                table.number_of_columns = num_cols;
                extents_changed = true;
            }
        }
        if extents_changed {
            self.store.mark_dirty(table_id);
        }

        if let Some(bucket_id) = row_bucket_id {
            if let Message::HeaderStorageBucket(bucket) = self.store.get_mut(bucket_id)? {
                resize_headers(&mut bucket.headers, num_rows as usize, num_cols);
            }
            self.store.mark_dirty(bucket_id);
        }
        if let Some(bucket_id) = col_bucket_id {
            if let Message::HeaderStorageBucket(bucket) = self.store.get_mut(bucket_id)? {
                resize_headers(&mut bucket.headers, num_cols as usize, num_rows);
            }
            self.store.mark_dirty(bucket_id);
        }
        Ok(())
    }
}

impl TableResolver for Model {
    fn reference_prefix(&self, from_table_id: u64, table_uid: u128) -> Option<String> {
        let target = *self.table_of_uid.get(&table_uid)?;
        if target == from_table_id {
            return None;
        }
        let table_name = self.table_name(target);
        if self.table_name_collides(target) {
            let sheet_name = self
                .sheet_of_table
                .get(&target)
                .map(|sheet_id| self.sheet_name(*sheet_id))
                .unwrap_or_default();
            Some(format!("{}::{}", sheet_name, table_name))
        } else {
            Some(table_name)
        }
    }

    fn table_uid(&self, from_table_id: u64, sheet: Option<&str>, table: &str) -> Option<u128> {
        let sheet_id = match sheet {
            Some(name) => *self
                .sheet_ids
                .iter()
                .find(|id| self.sheet_name(**id) == name)?,
            None => *self.sheet_of_table.get(&from_table_id)?,
        };
        let table_id = self
            .table_ids(sheet_id)
            .into_iter()
            .find(|id| self.table_name(*id) == table)?;
        self.base_uid_of_table.get(&table_id).copied()
    }
}

/// Resize a header record list, defaulting new entries.
fn resize_headers(headers: &mut Vec<tst::HeaderRecord>, count: usize, number_of_cells: u32) {
    headers.resize_with(count, || tst::HeaderRecord {
        number_of_cells,
        size: None,
        hiding_state: None,
    });
    for header in headers.iter_mut() {
        header.number_of_cells = number_of_cells;
    }
}

/// Fraction accuracy field: small positive values are fixed denominators,
/// high-bit values are a negative digit count.
fn render_fraction(value: f64, accuracy: u32) -> String {
    if accuracy & 0xFF00_0000 != 0 {
        let digits = (0x1_0000_0000u64 - accuracy as u64) as u32;
        float_to_n_digit_fraction(value, digits.clamp(1, 3))
    } else {
        float_to_fraction(value, accuracy.max(1) as u64)
    }
}

/// Split one packed row buffer into per-column cell records.
///
/// Offsets are 16-bit little-endian; `-1` marks an absent cell and wide
/// offsets are stored divided by four. A cell's record ends at the next
/// present offset.
fn row_storage_buffers(
    buffer: &[u8],
    offsets: &[u8],
    num_cols: usize,
    has_wide_offsets: bool,
) -> Vec<Option<Vec<u8>>> {
    let parsed: SmallVec<[i32; OFFSETS_WIDTH]> = offsets
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as i32)
        .map(|offset| {
            if has_wide_offsets && offset >= 0 {
                offset * 4
            } else {
                offset
            }
        })
        .collect();

    let mut cells = Vec::with_capacity(num_cols);
    for col in 0..num_cols {
        if col >= parsed.len() {
            break;
        }
        let start = parsed[col];
        if start < 0 {
            cells.push(None);
            continue;
        }
        let start = start as usize;
        // The record runs to the next non-negative offset.
        let end = parsed[col + 1..]
            .iter()
            .find(|offset| **offset >= 0)
            .map(|offset| *offset as usize)
            .unwrap_or(buffer.len());
        if start <= end && end <= buffer.len() {
            cells.push(Some(buffer[start..end].to_vec()));
        } else {
            cells.push(None);
        }
    }
    cells
}

/// Build a rich-text value from a storage archive.
fn rich_text_from_storage(storage: &tswp::StorageArchive) -> RichText {
    let bullets: Vec<String> = storage.text.clone();
    let text = bullets.join("\n");

    let mut bullet_chars: Vec<Option<String>> = vec![None; bullets.len()];
    let mut bulleted = false;
    for paragraph_style in &storage.table_list_style {
        let index = paragraph_style.paragraph_index as usize;
        if index >= bullet_chars.len() {
            continue;
        }
        if let Some(list_style) = &paragraph_style.list_style {
            if let Some(rendered) = bullet_char(list_style, paragraph_style.paragraph_index) {
                bullet_chars[index] = Some(rendered);
                bulleted = true;
            }
        }
    }

    let chars: Vec<char> = text.chars().collect();
    let hyperlinks = storage
        .table_smartfield
        .iter()
        .filter_map(|field| {
            let url = field.url.clone()?;
            let begin = (field.range_begin as usize).min(chars.len());
            let end = (field.range_end as usize).clamp(begin, chars.len());
            let link_text: String = chars[begin..end].iter().collect();
            Some((link_text, url))
        })
        .collect();

    RichText {
        text,
        bullets,
        bullet_chars,
        hyperlinks,
        bulleted,
    }
}

/// Apply text-style archive properties onto a style.
fn apply_text_style(style: &mut Style, archive: &tswp::TextStyleArchive) {
    if let Some(name) = &archive.style_name {
        style.name = Some(name.clone());
    }
    if let Some(properties) = &archive.char_properties {
        if let Some(bold) = properties.bold {
            style.bold = bold;
        }
        if let Some(italic) = properties.italic {
            style.italic = italic;
        }
        if let Some(underline) = properties.underline {
            style.underline = underline != 0;
        }
        if let Some(strikethru) = properties.strikethru {
            style.strikethrough = strikethru != 0;
        }
        if let Some(size) = properties.font_size {
            style.font_size = size;
        }
        if let Some(font_name) = &properties.font_name {
            style.font_name = font_name.clone();
        }
        if let Some(color) = &properties.font_color {
            style.font_color = Rgb::from_float(color.r, color.g, color.b);
        }
    }
    if let Some(properties) = &archive.para_properties {
        if let Some(alignment) = properties.alignment {
            style.alignment = Alignment {
                horizontal: HorizontalAlignment::from_archive(alignment),
                vertical: style.alignment.vertical,
            };
        }
        if let Some(indent) = properties.first_line_indent {
            style.first_indent = indent;
        }
        if let Some(indent) = properties.left_indent {
            style.left_indent = indent;
        }
        if let Some(indent) = properties.right_indent {
            style.right_indent = indent;
        }
    }
}

/// A1-style reference within a named table, used in diagnostics.
pub fn cell_reference(table_name: &str, row: u32, col: u32) -> String {
    match rowcol_to_cell(row as i64, col as i64, false, false) {
        Ok(reference) => format!("{}::{}", table_name, reference),
        Err(_) => format!("{}@[{},{}]", table_name, row, col),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_storage_buffers_split() {
        // Two cells at offsets 0 and 8, a gap at column 1.
        let mut buffer = vec![0u8; 16];
        buffer[0] = 5;
        buffer[8] = 5;
        let mut offsets = Vec::new();
        for offset in [0i16, -1, 8] {
            offsets.extend(offset.to_le_bytes());
        }

        let cells = row_storage_buffers(&buffer, &offsets, 3, false);
        assert_eq!(cells.len(), 3);
        assert_eq!(cells[0].as_ref().map(|b| b.len()), Some(8));
        assert!(cells[1].is_none());
        assert_eq!(cells[2].as_ref().map(|b| b.len()), Some(8));
    }

    #[test]
    fn test_row_storage_buffers_wide() {
        let buffer = vec![0u8; 40];
        let mut offsets = Vec::new();
        for offset in [0i16, 8] {
            offsets.extend(offset.to_le_bytes());
        }
        // Wide offsets scale by four: 8 becomes 32.
        let cells = row_storage_buffers(&buffer, &offsets, 2, true);
        assert_eq!(cells[0].as_ref().map(|b| b.len()), Some(32));
        assert_eq!(cells[1].as_ref().map(|b| b.len()), Some(8));
    }

    #[test]
    fn test_render_fraction_accuracy_words() {
        // 0xFFFFFFFE is a two-digit accuracy.
        assert_eq!(render_fraction(445.0 / 553.0, 0xFFFF_FFFE), "70/87");
        assert_eq!(render_fraction(0.5, 2), "1/2");
    }

    #[test]
    fn test_rich_text_extraction() {
        use crate::proto::tswp::{list_label, ListStyleArchive, ParagraphListStyle};

        let storage = tswp::StorageArchive {
            text: vec!["first".to_string(), "second".to_string()],
            table_list_style: vec![ParagraphListStyle {
                paragraph_index: 0,
                list_style: Some(ListStyleArchive {
                    label_type: list_label::NUMERIC_DECIMAL,
                    bullet_character: None,
                }),
            }],
            table_smartfield: vec![crate::proto::tswp::SmartFieldEntry {
                range_begin: 0,
                range_end: 5,
                url: Some("https://example.com".to_string()),
            }],
        };

        let rich = rich_text_from_storage(&storage);
        assert_eq!(rich.text, "first\nsecond");
        assert_eq!(rich.bullets.len(), 2);
        assert!(rich.bulleted);
        assert_eq!(rich.bullet_chars[0].as_deref(), Some("1."));
        assert_eq!(rich.bullet_chars[1], None);
        assert_eq!(
            rich.hyperlinks,
            vec![("first".to_string(), "https://example.com".to_string())]
        );
    }
}
