//! Longan - A Rust library for reading and writing Apple Numbers spreadsheets
//!
//! Numbers documents are zipped (or folder-based) packages whose payload is
//! a collection of compressed, length-framed IWA ("iWork Archive") files.
//! Each IWA file wraps Protocol Buffers messages that together describe
//! sheets, tables, cells, formulas, styles, and formatting. This crate
//! implements the IWA container codec and the table-cell data model layered
//! on top of it.
//!
//! # Example - Reading a document
//!
//! ```no_run
//! use longan::Document;
//!
//! # fn main() -> Result<(), longan::Error> {
//! let doc = Document::open("spreadsheet.numbers")?;
//! for sheet in doc.sheets() {
//!     for table in sheet.tables() {
//!         println!("{}::{}", sheet.name(), table.name());
//!         for row in table.rows() {
//!             for cell in row {
//!                 print!("{:?}\t", cell.value());
//!             }
//!             println!();
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Writing cell values
//!
//! ```no_run
//! use longan::{CellValue, Document};
//!
//! # fn main() -> Result<(), longan::Error> {
//! let mut doc = Document::open("spreadsheet.numbers")?;
//! let table = doc.sheet_mut(0)?.table_mut(0)?;
//! table.write(0, 0, CellValue::Text("total".into()))?;
//! table.write(0, 1, CellValue::Number(42.0))?;
//! doc.save("updated.numbers")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Document structure
//!
//! - `Index.zip`: IWA files with the serialised object graph
//! - `Data/`: media assets, carried through untouched
//! - `Metadata/`: `Properties.plist` with the document format version
//!
//! Each `.iwa` file is a sequence of Snappy-compressed chunks (custom
//! framing without a stream identifier) holding archive segments: a
//! varint-prefixed `ArchiveInfo` header followed by length-tagged message
//! payloads.

// Container layers
pub mod iwa;
pub mod package;
pub mod proto;
pub mod store;

// Table data model
pub mod cell;
pub mod format;
pub mod formula;
pub mod model;

/// High-level document types
pub mod document;

/// Re-export commonly used types
pub use cell::{Border, Cell, CellBorder, CellValue, MergeState, RichText, Style};
pub use document::{Document, OpenOptions, SaveOptions, Sheet, Table};
pub use iwa::file::IwaFile;
pub use store::ObjectStore;

/// Error types for Numbers parsing
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid Numbers document: {0}")]
    FileFormat(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("encrypted documents are not supported")]
    Encrypted,

    #[error("snappy decompression error: {0}")]
    Snappy(String),

    #[error("protobuf decoding error: {0}")]
    ProtobufDecode(#[from] prost::DecodeError),

    #[error("unknown message type: {0}")]
    UnknownMessageType(u32),

    #[error("no such object: {0}")]
    NoSuchObject(u64),

    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("formula error: {0}")]
    Formula(String),

    #[error("{0} out of range")]
    OutOfRange(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
