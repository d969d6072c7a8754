//! Calculation engine archives (`TSCE` namespace)
//!
//! The calculation engine scopes formulas, merges and cross-table
//! references by 128-bit owner UUIDs rather than object identifiers. The
//! `CalculationEngineArchive` dependency tracker carries the owner-ID map
//! and per-owner cell records; formulas themselves live in the table's
//! formula data list as `FormulaArchive` entries holding a flat AST node
//! array in reverse-polish order.

use super::HasReferences;
use super::tsp;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CalculationEngineArchive {
    #[prost(message, optional, tag = "1")]
    pub dependency_tracker: Option<DependencyTrackerArchive>,
}

impl HasReferences for CalculationEngineArchive {
    fn collect_references(&self, out: &mut Vec<u64>) {
        if let Some(tracker) = &self.dependency_tracker {
            tracker.formula_owner_dependencies.collect_references(out);
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DependencyTrackerArchive {
    #[prost(message, repeated, tag = "1")]
    pub formula_owner_dependencies: Vec<tsp::Reference>,
    #[prost(message, repeated, tag = "2")]
    pub formula_owner_info: Vec<FormulaOwnerInfoArchive>,
    #[prost(message, optional, tag = "3")]
    pub owner_id_map: Option<OwnerIdMapArchive>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OwnerIdMapArchive {
    #[prost(message, repeated, tag = "1")]
    pub map_entry: Vec<OwnerIdMapEntry>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OwnerIdMapEntry {
    #[prost(uint32, tag = "1")]
    pub internal_owner_id: u32,
    #[prost(message, optional, tag = "2")]
    pub owner_id: Option<tsp::Uuid>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FormulaOwnerInfoArchive {
    #[prost(message, optional, tag = "1")]
    pub formula_owner_id: Option<tsp::Uuid>,
    #[prost(message, optional, tag = "2")]
    pub cell_dependencies: Option<CellDependenciesArchive>,
    #[prost(message, optional, tag = "3")]
    pub cell_errors: Option<CellErrorsArchive>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CellDependenciesArchive {
    #[prost(message, repeated, tag = "1")]
    pub cell_record: Vec<CellRecordArchive>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CellRecordArchive {
    #[prost(uint32, tag = "1")]
    pub row: u32,
    #[prost(uint32, tag = "2")]
    pub column: u32,
    #[prost(bool, tag = "3")]
    pub contains_a_formula: bool,
    #[prost(message, optional, tag = "4")]
    pub edges: Option<CellRecordEdgesArchive>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CellRecordEdgesArchive {
    #[prost(uint32, repeated, tag = "1")]
    pub packed_edge_without_owner: Vec<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CellErrorsArchive {
    #[prost(message, repeated, tag = "1")]
    pub errors: Vec<CellErrorEntry>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CellErrorEntry {
    #[prost(message, optional, tag = "1")]
    pub coordinate: Option<CellCoordinateArchive>,
    #[prost(uint32, tag = "2")]
    pub error_flavor: u32,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct CellCoordinateArchive {
    #[prost(uint32, tag = "1")]
    pub row: u32,
    #[prost(uint32, tag = "2")]
    pub column: u32,
}

/// Maps a formula owner UUID to the base owner UUID of its table.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FormulaOwnerDependenciesArchive {
    #[prost(message, optional, tag = "1")]
    pub formula_owner_uid: Option<tsp::Uuid>,
    #[prost(message, optional, tag = "2")]
    pub base_owner_uid: Option<tsp::Uuid>,
    #[prost(uint32, optional, tag = "3")]
    pub internal_owner_id: Option<u32>,
}

impl HasReferences for FormulaOwnerDependenciesArchive {
    fn collect_references(&self, _out: &mut Vec<u64>) {}
}

/// Back-link from a table model to its owning formula owner.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HauntedOwnerArchive {
    #[prost(message, optional, tag = "1")]
    pub owner_uid: Option<tsp::Uuid>,
}

/// Merge-range sidecar: `from_to_range` rectangles scoped to an owner ID.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RangePrecedentsTileArchive {
    #[prost(uint32, tag = "1")]
    pub to_owner_id: u32,
    #[prost(message, repeated, tag = "2")]
    pub from_to_range: Vec<FromToRangeArchive>,
}

impl HasReferences for RangePrecedentsTileArchive {
    fn collect_references(&self, _out: &mut Vec<u64>) {}
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FromToRangeArchive {
    #[prost(message, optional, tag = "1")]
    pub from_coord: Option<CellCoordinateArchive>,
    #[prost(message, optional, tag = "2")]
    pub refers_to_rect: Option<RectArchive>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RectArchive {
    #[prost(message, optional, tag = "1")]
    pub origin: Option<CellCoordinateArchive>,
    #[prost(message, optional, tag = "2")]
    pub size: Option<RectSizeArchive>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct RectSizeArchive {
    #[prost(uint32, optional, tag = "1")]
    pub num_rows: Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    pub num_columns: Option<u32>,
}

/// A formula: the AST node array plus bookkeeping.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FormulaArchive {
    #[prost(message, optional, tag = "1")]
    pub ast_node_array: Option<AstNodeArrayArchive>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AstNodeArrayArchive {
    #[prost(message, repeated, tag = "1")]
    pub ast_node: Vec<AstNodeArchive>,
}

/// AST node kinds, in the order of the engine's node-type enumeration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum AstNodeType {
    AdditionNode = 1,
    SubtractionNode = 2,
    MultiplicationNode = 3,
    DivisionNode = 4,
    PowerNode = 5,
    ConcatenationNode = 6,
    GreaterThanNode = 7,
    GreaterThanOrEqualToNode = 8,
    LessThanNode = 9,
    LessThanOrEqualToNode = 10,
    EqualToNode = 11,
    NotEqualToNode = 12,
    NegationNode = 13,
    PlusSignNode = 14,
    PercentNode = 15,
    FunctionNode = 16,
    NumberNode = 17,
    StringNode = 18,
    BooleanNode = 19,
    TokenNode = 20,
    DateNode = 21,
    DurationNode = 22,
    EmptyArgumentNode = 23,
    CellReferenceNode = 24,
    ColonNode = 25,
    ColonNodeWithUids = 26,
    ColonTractNode = 27,
    ReferenceErrorNode = 28,
    ReferenceErrorWithUidsNode = 29,
    ArrayNode = 30,
    ListNode = 31,
    ThunkNode = 32,
    EndThunkNode = 33,
    PrependWhitespaceNode = 34,
    AppendWhitespaceNode = 35,
    BeginEmbeddedNodeArray = 36,
}

/// One AST node. The populated fields depend on `ast_node_type`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AstNodeArchive {
    #[prost(enumeration = "AstNodeType", tag = "1")]
    pub ast_node_type: i32,
    #[prost(double, optional, tag = "2")]
    pub ast_number_node_number: Option<f64>,
    /// Decimal128 mantissa word for integer literals.
    #[prost(uint64, optional, tag = "3")]
    pub ast_number_node_decimal_low: Option<u64>,
    /// Decimal128 exponent word; `0x3040000000000000` marks an integer.
    #[prost(uint64, optional, tag = "4")]
    pub ast_number_node_decimal_high: Option<u64>,
    #[prost(string, optional, tag = "5")]
    pub ast_string_node_string: Option<String>,
    #[prost(bool, optional, tag = "6")]
    pub ast_boolean_node_boolean: Option<bool>,
    #[prost(bool, optional, tag = "7")]
    pub ast_token_node_boolean: Option<bool>,
    #[prost(uint32, optional, tag = "8")]
    pub ast_function_node_index: Option<u32>,
    #[prost(uint32, optional, tag = "9")]
    pub ast_function_node_num_args: Option<u32>,
    /// Seconds since the 2001-01-01 epoch.
    #[prost(double, optional, tag = "10")]
    pub ast_date_node_date_num: Option<f64>,
    #[prost(message, optional, tag = "11")]
    pub ast_row: Option<AstRowCoordinateArchive>,
    #[prost(message, optional, tag = "12")]
    pub ast_column: Option<AstColumnCoordinateArchive>,
    #[prost(message, optional, tag = "13")]
    pub ast_sticky_bits: Option<AstStickyBits>,
    #[prost(message, optional, tag = "14")]
    pub ast_colon_tract: Option<AstColonTractArchive>,
    #[prost(message, optional, tag = "15")]
    pub ast_cross_table_reference_extra_info: Option<AstCrossTableReferenceExtraInfoArchive>,
    #[prost(uint32, optional, tag = "16")]
    pub ast_array_node_num_row: Option<u32>,
    #[prost(uint32, optional, tag = "17")]
    pub ast_array_node_num_col: Option<u32>,
    #[prost(uint32, optional, tag = "18")]
    pub ast_list_node_num_args: Option<u32>,
}

impl AstNodeArchive {
    /// A bare node of the given type with no operand fields.
    pub fn of_type(node_type: AstNodeType) -> Self {
        Self {
            ast_node_type: node_type as i32,
            ..Default::default()
        }
    }

    pub fn node_type(&self) -> Option<AstNodeType> {
        AstNodeType::try_from(self.ast_node_type).ok()
    }
}

/// Row coordinate; relative rows are offsets from the referencing cell.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct AstRowCoordinateArchive {
    #[prost(sint32, tag = "1")]
    pub row: i32,
    #[prost(bool, tag = "2")]
    pub absolute: bool,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct AstColumnCoordinateArchive {
    #[prost(sint32, tag = "1")]
    pub column: i32,
    #[prost(bool, tag = "2")]
    pub absolute: bool,
}

/// Absolute/relative markers for the four corners of a colon tract.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct AstStickyBits {
    #[prost(bool, tag = "1")]
    pub begin_row_is_absolute: bool,
    #[prost(bool, tag = "2")]
    pub begin_column_is_absolute: bool,
    #[prost(bool, tag = "3")]
    pub end_row_is_absolute: bool,
    #[prost(bool, tag = "4")]
    pub end_column_is_absolute: bool,
}

/// A rectangular range in relative row/column coordinates.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AstColonTractArchive {
    #[prost(message, repeated, tag = "1")]
    pub relative_row: Vec<AstColonTractRelativeRangeArchive>,
    #[prost(message, repeated, tag = "2")]
    pub relative_column: Vec<AstColonTractRelativeRangeArchive>,
    #[prost(bool, optional, tag = "3")]
    pub preserve_rectangular: Option<bool>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct AstColonTractRelativeRangeArchive {
    #[prost(sint32, tag = "1")]
    pub range_begin: i32,
    #[prost(sint32, optional, tag = "2")]
    pub range_end: Option<i32>,
}

/// Cross-table reference payload: the target table's UUID.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AstCrossTableReferenceExtraInfoArchive {
    #[prost(message, optional, tag = "1")]
    pub table_id: Option<tsp::CfUuidArchive>,
}
