//! End-to-end document tests over a synthetic Numbers package: build the
//! object graph, write it to disk, reload it through the facade, mutate
//! it, and save it again.

use longan::cell::storage::{self, CellFlags};
use longan::formula::{builder, NoTables};
use longan::iwa::archive::ArchiveSegment;
use longan::iwa::registry::Message;
use longan::iwa::IwaFile;
use longan::package::{read_document, write_document};
use longan::proto::{tn, tsce, tsk, tsp, tst};
use longan::store::{FileEntry, ObjectStore};
use longan::{CellValue, Document, SaveOptions};

const DOCUMENT_ID: u64 = 1;
const SHEET_ID: u64 = 2;
const ENGINE_ID: u64 = 3;
const TABLE_INFO_ID: u64 = 4;
const TABLE_ID: u64 = 5;
const TILE_ID: u64 = 6;
const STRINGS_ID: u64 = 7;
const FORMULAS_ID: u64 = 8;
const FORMATS_ID: u64 = 9;
const ROW_HEADERS_ID: u64 = 10;
const COL_HEADERS_ID: u64 = 11;
const OWNER_DEPS_ID: u64 = 12;

const HAUNTED_UID: u128 = 0x1111_2222_3333_4444;
const BASE_UID: u128 = 0x5555_6666_7777_8888;

fn reference(identifier: u64) -> Option<tsp::Reference> {
    Some(tsp::Reference::new(identifier))
}

/// Pack a tile row from per-column optional records.
fn row_info(index: u32, cells: Vec<Option<Vec<u8>>>) -> tst::TileRowInfo {
    let mut offsets = vec![-1i16; 256];
    let mut buffer = Vec::new();
    let mut count = 0;
    for (col, record) in cells.into_iter().enumerate() {
        if let Some(record) = record {
            offsets[col] = buffer.len() as i16;
            buffer.extend(record);
            count += 1;
        }
    }
    let offset_bytes: Vec<u8> = offsets.iter().flat_map(|o| o.to_le_bytes()).collect();
    tst::TileRowInfo {
        tile_row_index: index,
        cell_count: count,
        cell_storage_buffer: buffer.clone(),
        cell_offsets: offset_bytes.clone(),
        cell_storage_buffer_pre_bnc: buffer,
        cell_offsets_pre_bnc: offset_bytes,
        has_wide_offsets: None,
        storage_version: 5,
    }
}

/// A number record carrying a format-table key.
fn number_with_format(value: f64, format_key: u32) -> Vec<u8> {
    let mut record = vec![0u8; 12];
    record[0] = 5;
    record[1] = storage::cell_type::NUMBER;
    let flags = CellFlags::DECIMAL_128 | CellFlags::NUM_FORMAT_ID;
    record[8..12].copy_from_slice(&flags.bits().to_le_bytes());
    record.extend(storage::pack_decimal128(value));
    record.extend(format_key.to_le_bytes());
    record
}

/// A number record carrying a formula-table key.
fn number_with_formula(value: f64, formula_key: u32) -> Vec<u8> {
    let mut record = vec![0u8; 12];
    record[0] = 5;
    record[1] = storage::cell_type::NUMBER;
    let flags = CellFlags::DECIMAL_128 | CellFlags::FORMULA_ID;
    record[8..12].copy_from_slice(&flags.bits().to_le_bytes());
    record.extend(storage::pack_decimal128(value));
    record.extend(formula_key.to_le_bytes());
    record
}

fn header_bucket(count: usize, number_of_cells: u32) -> tst::HeaderStorageBucket {
    tst::HeaderStorageBucket {
        headers: (0..count)
            .map(|_| tst::HeaderRecord {
                number_of_cells,
                size: None,
                hiding_state: None,
            })
            .collect(),
    }
}

fn build_store() -> ObjectStore {
    let document = tn::DocumentArchive {
        sheets: vec![tsp::Reference::new(SHEET_ID)],
        calculation_engine: reference(ENGINE_ID),
        stylesheet: None,
        custom_format_list: None,
    };
    let sheet = tn::SheetArchive {
        name: Some("Sheet 1".to_string()),
        drawable_infos: vec![tsp::Reference::new(TABLE_INFO_ID)],
    };
    let table_info = tst::TableInfoArchive {
        super_: Some(tst::DrawableInfo {
            parent: reference(SHEET_ID),
        }),
        table_model: reference(TABLE_ID),
    };
    let table_model = tst::TableModelArchive {
        table_name: "Table 1".to_string(),
        number_of_rows: 3,
        number_of_columns: 3,
        number_of_header_rows: 0,
        number_of_header_columns: 0,
        number_of_footer_rows: 0,
        base_data_store: Some(tst::DataStore {
            tiles: Some(tst::TileStorage {
                tiles: vec![tst::TileStorageTile {
                    tileid: 0,
                    tile: reference(TILE_ID),
                }],
            }),
            string_table: reference(STRINGS_ID),
            style_table: None,
            formula_table: reference(FORMULAS_ID),
            format_table: reference(FORMATS_ID),
            format_table_pre_bnc: None,
            rich_text_table: None,
            row_headers: Some(tst::HeaderStorageBuckets {
                buckets: vec![tsp::Reference::new(ROW_HEADERS_ID)],
            }),
            column_headers: reference(COL_HEADERS_ID),
            merge_region_map: None,
        }),
        haunted_owner: Some(tsce::HauntedOwnerArchive {
            owner_uid: Some(tsp::Uuid::from_u128(HAUNTED_UID)),
        }),
        table_style: None,
        body_cell_style: None,
        body_text_style: None,
    };

    // Cells: B1 has S1's number with a six-decimal format, A2 a shared
    // string, A3 a formula cell.
    let formula =
        builder::parse_formula("A1+1", &NoTables, TABLE_ID, 2, 0).expect("parse formula");
    let tile = tst::Tile {
        max_column: 2,
        number_of_rows: 3,
        row_infos: vec![
            row_info(
                0,
                vec![
                    Some(storage::encode_number(1.0)),
                    Some(number_with_format(12345.012346, 1)),
                    None,
                ],
            ),
            row_info(1, vec![Some(storage::encode_text(1)), None, None]),
            row_info(2, vec![Some(number_with_formula(2.0, 1)), None, None]),
        ],
        last_saved_in_bnc: None,
        should_use_wide_rows: None,
    };

    let strings = tst::TableDataList {
        list_type: 1,
        next_list_id: 2,
        entries: vec![tst::ListEntry {
            key: 1,
            refcount: 1,
            string: Some("hello".to_string()),
            ..Default::default()
        }],
    };
    let formulas = tst::TableDataList {
        list_type: 2,
        next_list_id: 2,
        entries: vec![tst::ListEntry {
            key: 1,
            refcount: 1,
            formula: Some(formula),
            ..Default::default()
        }],
    };
    let formats = tst::TableDataList {
        list_type: 3,
        next_list_id: 2,
        entries: vec![tst::ListEntry {
            key: 1,
            refcount: 1,
            format: Some(tsk::FormatStructArchive {
                format_type: tsk::format_type::DECIMAL,
                decimal_places: Some(6),
                show_thousands_separator: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        }],
    };

    let engine = tsce::CalculationEngineArchive {
        dependency_tracker: Some(tsce::DependencyTrackerArchive {
            formula_owner_dependencies: vec![tsp::Reference::new(OWNER_DEPS_ID)],
            formula_owner_info: vec![tsce::FormulaOwnerInfoArchive {
                formula_owner_id: Some(tsp::Uuid::from_u128(BASE_UID)),
                cell_dependencies: Some(tsce::CellDependenciesArchive {
                    cell_record: vec![tsce::CellRecordArchive {
                        row: 2,
                        column: 0,
                        contains_a_formula: true,
                        edges: None,
                    }],
                }),
                cell_errors: None,
            }],
            owner_id_map: Some(tsce::OwnerIdMapArchive {
                map_entry: vec![tsce::OwnerIdMapEntry {
                    internal_owner_id: 1,
                    owner_id: Some(tsp::Uuid::from_u128(BASE_UID)),
                }],
            }),
        }),
    };
    let owner_deps = tsce::FormulaOwnerDependenciesArchive {
        formula_owner_uid: Some(tsp::Uuid::from_u128(HAUNTED_UID)),
        base_owner_uid: Some(tsp::Uuid::from_u128(BASE_UID)),
        internal_owner_id: Some(1),
    };

    let objects: Vec<(u64, Message)> = vec![
        (DOCUMENT_ID, Message::Document(document)),
        (SHEET_ID, Message::Sheet(sheet)),
        (ENGINE_ID, Message::CalculationEngine(engine)),
        (TABLE_INFO_ID, Message::TableInfo(table_info)),
        (TABLE_ID, Message::TableModel(table_model)),
        (TILE_ID, Message::Tile(tile)),
        (STRINGS_ID, Message::TableDataList(strings)),
        (FORMULAS_ID, Message::TableDataList(formulas)),
        (FORMATS_ID, Message::TableDataList(formats)),
        (ROW_HEADERS_ID, Message::HeaderStorageBucket(header_bucket(3, 3))),
        (COL_HEADERS_ID, Message::HeaderStorageBucket(header_bucket(3, 3))),
        (OWNER_DEPS_ID, Message::FormulaOwnerDependencies(owner_deps)),
    ];

    let mut store = ObjectStore::new();
    let path = "Index/Document.iwa";
    let segments = objects
        .iter()
        .map(|(id, message)| ArchiveSegment::new(*id, message.clone()))
        .collect();
    store.insert_file(path, FileEntry::Iwa(IwaFile { segments }));
    for (id, message) in objects {
        store.insert_object(id, message, path);
    }

    store.insert_file("Metadata/Properties.plist", FileEntry::Blob(properties_plist()));
    store.insert_file(
        "Metadata/BuildVersionHistory.plist",
        FileEntry::Blob(b"<plist><array/></plist>".to_vec()),
    );
    store.insert_file("preview.jpg", FileEntry::Blob(vec![0xFF, 0xD8, 0xFF]));
    store
}

fn properties_plist() -> Vec<u8> {
    let mut dict = plist_dictionary();
    dict.insert(
        "fileFormatVersion".to_string(),
        plist::Value::String("14.1".to_string()),
    );
    let mut out = Vec::new();
    plist::Value::Dictionary(dict).to_writer_xml(&mut out).unwrap();
    out
}

fn plist_dictionary() -> plist::Dictionary {
    plist::Dictionary::new()
}

fn write_test_document(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("synthetic.numbers");
    let mut store = build_store();
    write_document(&path, &mut store, false).unwrap();
    path
}

#[test]
fn test_open_reads_values_formats_and_formulas() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_test_document(&dir);

    let doc = Document::open(&path).unwrap();
    assert_eq!(doc.sheets().len(), 1);
    let sheet = doc.sheet(0).unwrap();
    assert_eq!(sheet.name(), "Sheet 1");
    let table = sheet.table(0).unwrap();
    assert_eq!(table.name(), "Table 1");
    assert_eq!((table.num_rows(), table.num_cols()), (3, 3));

    // Plain number.
    assert_eq!(table.cell(0, 0).unwrap().value(), &CellValue::Number(1.0));

    // S1: six decimal places, thousands separator off.
    let formatted = table.cell(0, 1).unwrap();
    assert_eq!(formatted.value(), &CellValue::Number(12345.012346));
    assert_eq!(formatted.formatted_value(), Some("12345.012346"));

    // Shared string.
    assert_eq!(
        table.cell_ref("A2").unwrap().value(),
        &CellValue::Text("hello".to_string())
    );

    // Formula cell renders from the node array.
    let formula_cell = table.cell(2, 0).unwrap();
    assert_eq!(formula_cell.value(), &CellValue::Number(2.0));
    assert_eq!(formula_cell.formula(), Some("A1+1"));

    // Empty slot materialises as an empty cell.
    assert_eq!(table.cell(1, 1).unwrap().value(), &CellValue::Empty);
}

#[test]
fn test_unmodified_resave_reloads_equal() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_test_document(&dir);

    let mut doc = Document::open(&path).unwrap();
    let resaved = dir.path().join("resaved.numbers");
    doc.save(&resaved).unwrap();

    let original = Document::open(&path).unwrap();
    let reloaded = Document::open(&resaved).unwrap();
    let table_a = original.sheet(0).unwrap().table(0).unwrap();
    let table_b = reloaded.sheet(0).unwrap().table(0).unwrap();
    assert_eq!(table_a.num_rows(), table_b.num_rows());
    for row in 0..table_a.num_rows() {
        for col in 0..table_a.num_cols() {
            assert_eq!(
                table_a.cell(row, col).unwrap().value(),
                table_b.cell(row, col).unwrap().value(),
                "cell ({}, {}) changed across a resave",
                row,
                col
            );
        }
    }
    // Unmodified tables keep their format links and formulas intact.
    assert_eq!(
        table_b.cell(0, 1).unwrap().formatted_value(),
        Some("12345.012346")
    );
    assert_eq!(table_b.cell(2, 0).unwrap().formula(), Some("A1+1"));
}

#[test]
fn test_write_cells_and_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_test_document(&dir);

    let mut doc = Document::open(&path).unwrap();
    {
        let table = doc.sheet_mut(0).unwrap().table_mut(0).unwrap();
        table.write(0, 2, CellValue::Text("hello".to_string())).unwrap();
        table.write(1, 1, CellValue::Number(2.5)).unwrap();
        table
            .write(3, 0, CellValue::Bool(true))
            .unwrap();
        assert_eq!(table.num_rows(), 4);
    }

    let saved = dir.path().join("modified.numbers");
    doc.save(&saved).unwrap();

    let reloaded = Document::open(&saved).unwrap();
    let table = reloaded.sheet(0).unwrap().table(0).unwrap();
    assert_eq!(table.num_rows(), 4);
    assert_eq!(
        table.cell(0, 2).unwrap().value(),
        &CellValue::Text("hello".to_string())
    );
    assert_eq!(table.cell(1, 1).unwrap().value(), &CellValue::Number(2.5));
    assert_eq!(table.cell(3, 0).unwrap().value(), &CellValue::Bool(true));

    // The shared string is reused: summed refcounts equal the number of
    // text cells that reference the table's string entries.
    let store = read_document(&saved, false).unwrap();
    let strings_id = store.find_by_type("TST.TableDataList")[0];
    let Message::TableDataList(strings) = store.get(strings_id).unwrap() else {
        panic!("expected a data list");
    };
    let total_refs: u32 = strings.entries.iter().map(|entry| entry.refcount).sum();
    assert_eq!(total_refs, 2);
    assert_eq!(strings.entries.len(), 1);
}

#[test]
fn test_save_as_package_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_test_document(&dir);

    let mut doc = Document::open(&path).unwrap();
    let package_path = dir.path().join("package.numbers");
    doc.save_with(&package_path, SaveOptions { package: true })
        .unwrap();

    assert!(package_path.join("Index.zip").is_file());
    assert!(package_path.join("Metadata/Properties.plist").is_file());
    assert!(package_path.join("preview.jpg").is_file());

    let reloaded = Document::open(&package_path).unwrap();
    let table = reloaded.sheet(0).unwrap().table(0).unwrap();
    assert_eq!(
        table.cell_ref("A2").unwrap().value(),
        &CellValue::Text("hello".to_string())
    );
}
