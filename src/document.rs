//! High-level document facade
//!
//! `Document` → `Sheet` → `Table` → `Cell`: the public read/write API over
//! the object store. Tables materialise their full cell grid at load so
//! reads never touch the container afterwards; writes mutate the grid and
//! are folded back into tile storage on save.

use std::path::Path;

use tracing::warn;

use crate::cell::storage::CellStorage;
use crate::cell::{refs, Cell, CellBorder, CellValue, MergeRange, MergeState};
use crate::model::{cell_reference, Model};
use crate::package;
use crate::{Error, Result};

/// Options for [`Document::open_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOptions {
    /// Escalate unsupported-version warnings to errors.
    pub strict_version: bool,
}

/// Options for [`Document::save_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveOptions {
    /// Save as a `.numbers` package folder instead of a single zip.
    pub package: bool,
}

/// A loaded Numbers document.
pub struct Document {
    model: Model,
    sheets: Vec<Sheet>,
}

/// A sheet and its tables.
pub struct Sheet {
    name: String,
    tables: Vec<Table>,
}

/// A table: a named grid of cells.
pub struct Table {
    pub(crate) table_id: u64,
    name: String,
    num_rows: u32,
    num_cols: u32,
    num_header_rows: u32,
    num_header_cols: u32,
    merge_ranges: Vec<MergeRange>,
    pub(crate) cells: Vec<Vec<Cell>>,
    /// Set by writes; clean tables keep their segments byte-identical on
    /// save.
    modified: bool,
}

impl Document {
    /// Open a document from a zip file or `.numbers` package folder.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, OpenOptions::default())
    }

    /// Open with explicit options.
    pub fn open_with<P: AsRef<Path>>(path: P, options: OpenOptions) -> Result<Self> {
        let store = package::read_document(path.as_ref(), options.strict_version)?;
        let model = Model::new(store)?;

        let mut sheets = Vec::new();
        for &sheet_id in model.sheet_ids() {
            let mut tables = Vec::new();
            for table_id in model.table_ids(sheet_id) {
                tables.push(load_table(&model, table_id)?);
            }
            sheets.push(Sheet {
                name: model.sheet_name(sheet_id),
                tables,
            });
        }

        Ok(Document { model, sheets })
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    /// Sheet by position.
    pub fn sheet(&self, index: usize) -> Result<&Sheet> {
        self.sheets
            .get(index)
            .ok_or_else(|| Error::OutOfRange(format!("sheet {}", index)))
    }

    pub fn sheet_mut(&mut self, index: usize) -> Result<&mut Sheet> {
        self.sheets
            .get_mut(index)
            .ok_or_else(|| Error::OutOfRange(format!("sheet {}", index)))
    }

    /// Sheet by name; unknown names are fatal at the call site.
    pub fn sheet_named(&self, name: &str) -> Result<&Sheet> {
        self.sheets
            .iter()
            .find(|sheet| sheet.name == name)
            .ok_or_else(|| Error::OutOfRange(format!("sheet '{}'", name)))
    }

    /// Save as a single zip document.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.save_with(path, SaveOptions::default())
    }

    /// Save with explicit options.
    ///
    /// Every table's tile storage is recomputed from its cell grid, dirty
    /// objects are flushed into their segments, and the package is
    /// written in the requested form.
    pub fn save_with<P: AsRef<Path>>(&mut self, path: P, options: SaveOptions) -> Result<()> {
        for sheet_index in 0..self.sheets.len() {
            for table_index in 0..self.sheets[sheet_index].tables.len() {
                let table = &self.sheets[sheet_index].tables[table_index];
                if table.modified {
                    self.model.update_table_storage(table.table_id, &table.cells)?;
                }
            }
        }
        self.model.store_mut().flush_dirty()?;
        package::write_document(path.as_ref(), self.model.store_mut(), options.package)
    }
}

impl Sheet {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn table(&self, index: usize) -> Result<&Table> {
        self.tables
            .get(index)
            .ok_or_else(|| Error::OutOfRange(format!("table {}", index)))
    }

    pub fn table_mut(&mut self, index: usize) -> Result<&mut Table> {
        self.tables
            .get_mut(index)
            .ok_or_else(|| Error::OutOfRange(format!("table {}", index)))
    }

    pub fn table_named(&self, name: &str) -> Result<&Table> {
        self.tables
            .iter()
            .find(|table| table.name == name)
            .ok_or_else(|| Error::OutOfRange(format!("table '{}'", name)))
    }
}

impl Table {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_rows(&self) -> u32 {
        self.num_rows
    }

    pub fn num_cols(&self) -> u32 {
        self.num_cols
    }

    pub fn num_header_rows(&self) -> u32 {
        self.num_header_rows
    }

    pub fn num_header_cols(&self) -> u32 {
        self.num_header_cols
    }

    /// The cell at a zero-indexed row and column.
    pub fn cell(&self, row: u32, col: u32) -> Result<&Cell> {
        if row >= self.num_rows {
            return Err(Error::OutOfRange(format!("row {}", row)));
        }
        if col >= self.num_cols {
            return Err(Error::OutOfRange(format!("column {}", col)));
        }
        Ok(&self.cells[row as usize][col as usize])
    }

    /// The cell at an A1-style reference.
    pub fn cell_ref(&self, reference: &str) -> Result<&Cell> {
        let (row, col) = refs::cell_to_rowcol(reference)?;
        self.cell(row, col)
    }

    /// All rows of cells.
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.cells
    }

    /// Rows within an inclusive range, each restricted to the column
    /// range. Out-of-range bounds are fatal.
    pub fn iter_rows(
        &self,
        min_row: Option<u32>,
        max_row: Option<u32>,
        min_col: Option<u32>,
        max_col: Option<u32>,
    ) -> Result<impl Iterator<Item = &[Cell]>> {
        let (min_row, max_row, min_col, max_col) =
            self.clamp_ranges(min_row, max_row, min_col, max_col)?;
        Ok(self.cells[min_row as usize..=max_row as usize]
            .iter()
            .map(move |row| &row[min_col as usize..=max_col as usize]))
    }

    /// Columns within an inclusive range, each restricted to the row
    /// range.
    pub fn iter_cols(
        &self,
        min_col: Option<u32>,
        max_col: Option<u32>,
        min_row: Option<u32>,
        max_row: Option<u32>,
    ) -> Result<Vec<Vec<&Cell>>> {
        let (min_row, max_row, min_col, max_col) =
            self.clamp_ranges(min_row, max_row, min_col, max_col)?;
        let mut columns = Vec::with_capacity((max_col - min_col + 1) as usize);
        for col in min_col..=max_col {
            let column: Vec<&Cell> = self.cells[min_row as usize..=max_row as usize]
                .iter()
                .map(|row| &row[col as usize])
                .collect();
            columns.push(column);
        }
        Ok(columns)
    }

    fn clamp_ranges(
        &self,
        min_row: Option<u32>,
        max_row: Option<u32>,
        min_col: Option<u32>,
        max_col: Option<u32>,
    ) -> Result<(u32, u32, u32, u32)> {
        let min_row = min_row.unwrap_or(0);
        let max_row = max_row.unwrap_or(self.num_rows.saturating_sub(1));
        let min_col = min_col.unwrap_or(0);
        let max_col = max_col.unwrap_or(self.num_cols.saturating_sub(1));

        if max_row >= self.num_rows || min_row > max_row {
            return Err(Error::OutOfRange(format!("row {}", max_row)));
        }
        if max_col >= self.num_cols || min_col > max_col {
            return Err(Error::OutOfRange(format!("column {}", max_col)));
        }
        Ok((min_row, max_row, min_col, max_col))
    }

    /// Merged ranges in `A1:B2` form, sorted.
    pub fn merge_ranges(&self) -> Vec<String> {
        let mut ranges: Vec<String> = self
            .merge_ranges
            .iter()
            .map(MergeRange::to_a1)
            .collect();
        ranges.sort();
        ranges.dedup();
        ranges
    }

    /// Write a value, growing the table by whole rows/columns as needed.
    pub fn write(&mut self, row: u32, col: u32, value: CellValue) -> Result<()> {
        while self.num_rows <= row {
            self.add_row();
        }
        while self.num_cols <= col {
            self.add_column();
        }
        self.cells[row as usize][col as usize] = Cell::new(row, col, value);
        self.modified = true;
        Ok(())
    }

    /// Write a value at an A1-style reference.
    pub fn write_ref(&mut self, reference: &str, value: CellValue) -> Result<()> {
        let (row, col) = refs::cell_to_rowcol(reference)?;
        self.write(row, col, value)
    }

    pub fn add_row(&mut self) {
        let row = self.num_rows;
        self.cells.push(
            (0..self.num_cols)
                .map(|col| Cell::new(row, col, CellValue::Empty))
                .collect(),
        );
        self.num_rows += 1;
        self.modified = true;
    }

    pub fn add_column(&mut self) {
        let col = self.num_cols;
        for (row, cells) in self.cells.iter_mut().enumerate() {
            cells.push(Cell::new(row as u32, col, CellValue::Empty));
        }
        self.num_cols += 1;
        self.modified = true;
    }
}

/// Materialise one table: decode every cell with its formatted value,
/// formula, style, border and merge state.
fn load_table(model: &Model, table_id: u64) -> Result<Table> {
    let name = model.table_name(table_id);
    let num_rows = model.table_row_count(table_id);
    let num_cols = model.table_column_count(table_id);
    let (num_header_rows, num_header_cols) = model.header_counts(table_id);

    let buffers = model.storage_buffers(table_id, false);
    let merges = model.merge_map(table_id);
    let formula_cells = model.formula_cells(table_id);
    let formulas = model.formula_asts(table_id);

    let mut cells = Vec::with_capacity(num_rows as usize);
    for row in 0..num_rows {
        let mut row_cells = Vec::with_capacity(num_cols as usize);
        for col in 0..num_cols {
            let buffer = buffers
                .get(row as usize)
                .and_then(|cols| cols.get(col as usize))
                .and_then(|slot| slot.as_deref());

            let merge_state = if let Some((rows, cols)) = merges.anchors.get(&(row, col)) {
                MergeState::Anchor {
                    rows: *rows,
                    cols: *cols,
                }
            } else if let Some(range) = merges.covered.get(&(row, col)) {
                MergeState::Covered { range: *range }
            } else {
                MergeState::None
            };

            let mut cell = match buffer {
                Some(buffer) => {
                    let storage = CellStorage::decode(buffer)?;
                    let mut cell =
                        Cell::new(row, col, model.cell_value(table_id, &storage, row, col)?);
                    cell.formatted = model.formatted_value(table_id, &storage, &cell.value);
                    if formula_cells.contains(&(row, col)) {
                        cell.formula = match storage.formula_key() {
                            Some(key) => {
                                Some(model.formula_text(table_id, &formulas, key, row, col))
                            }
                            None => {
                                warn!(
                                    "{}: formula cell without a key",
                                    cell_reference(&name, row, col)
                                );
                                None
                            }
                        };
                    }
                    cell.style =
                        model.resolve_style(table_id, storage.text_style_id, storage.cell_style_id);
                    cell
                }
                None => Cell::new(row, col, CellValue::Empty),
            };

            cell.merge = merge_state;
            cell.border = border_for(merge_state, row, col);
            row_cells.push(cell);
        }
        cells.push(row_cells);
    }

    let mut merge_ranges: Vec<MergeRange> = merges
        .anchors
        .iter()
        .map(|((row, col), (rows, cols))| MergeRange {
            row_start: *row,
            col_start: *col,
            row_end: row + rows - 1,
            col_end: col + cols - 1,
        })
        .collect();
    merge_ranges.sort_by_key(|range| (range.row_start, range.col_start));

    Ok(Table {
        table_id,
        name,
        num_rows,
        num_cols,
        num_header_rows,
        num_header_cols,
        merge_ranges,
        cells,
        modified: false,
    })
}

/// Border suppression from merge participation: anchors hide the edges
/// their merge extends over, covered cells hide the edges interior to the
/// merge.
fn border_for(merge: MergeState, row: u32, col: u32) -> CellBorder {
    match merge {
        MergeState::None => CellBorder::default(),
        MergeState::Anchor { rows, cols } => {
            CellBorder::with_merges(false, cols > 1, rows > 1, false)
        }
        MergeState::Covered { range } => CellBorder::with_merges(
            row > range.row_start,
            col < range.col_end,
            row < range.row_end,
            col > range.col_start,
        ),
    }
}
