//! Formula AST engine
//!
//! Formulas live in the calculation engine as flat node arrays in
//! reverse-polish order. [`render_formula`] walks a node array as a
//! postfix stack of strings; [`builder::parse_formula`] is the inverse,
//! tokenizing a textual formula and shunting-yard converting it back into
//! a node array.
//!
//! Cross-table references carry table UUIDs; a [`TableResolver`] supplies
//! the qualified-name prefix (and the inverse lookup for the write path).

pub mod builder;
pub mod functions;
pub mod ranges;
pub mod tokenizer;

use tracing::warn;

use crate::cell::refs::rowcol_to_cell;
use crate::format::date::datetime_from_epoch;
use crate::proto::tsce::{AstNodeArchive, AstNodeType};
use crate::Result;
use chrono::Datelike;

/// Resolves table UUIDs for cross-table references.
pub trait TableResolver {
    /// The qualified prefix (`Table` or `Sheet::Table`) for a reference
    /// from `from_table_id` to the table with `table_uid`. `None` when the
    /// reference stays within the source table or the UUID is unknown.
    fn reference_prefix(&self, from_table_id: u64, table_uid: u128) -> Option<String>;

    /// The UUID of the named table (scoped to the source table's sheet
    /// when no sheet name is given), for the write path.
    fn table_uid(&self, from_table_id: u64, sheet: Option<&str>, table: &str) -> Option<u128>;
}

/// Resolver for contexts without a document (tests, detached rendering).
pub struct NoTables;

impl TableResolver for NoTables {
    fn reference_prefix(&self, _from_table_id: u64, _table_uid: u128) -> Option<String> {
        None
    }

    fn table_uid(&self, _from_table_id: u64, _sheet: Option<&str>, _table: &str) -> Option<u128> {
        None
    }
}

/// The formula AST engine entry points.
pub struct Formula;

impl Formula {
    /// Render a node array to its textual form.
    pub fn render(
        nodes: &[AstNodeArchive],
        resolver: &dyn TableResolver,
        table_name: &str,
        table_id: u64,
        row: u32,
        col: u32,
    ) -> String {
        render_formula(nodes, resolver, table_name, table_id, row, col)
    }

    /// Tokenize and convert a textual formula into a node array.
    pub fn parse(
        text: &str,
        resolver: &dyn TableResolver,
        table_id: u64,
        row: u32,
        col: u32,
    ) -> Result<crate::proto::tsce::FormulaArchive> {
        builder::parse_formula(text, resolver, table_id, row, col)
    }
}

/// Walk a node array as a postfix stack of rendered sub-expressions.
pub fn render_formula(
    nodes: &[AstNodeArchive],
    resolver: &dyn TableResolver,
    table_name: &str,
    table_id: u64,
    row: u32,
    col: u32,
) -> String {
    let mut walker = NodeWalker {
        resolver,
        table_name,
        table_id,
        row,
        col,
        stack: Vec::new(),
    };
    for node in nodes {
        walker.push_node(node);
    }
    // Anything left on the stack concatenates in reverse push order.
    let mut rendered = String::new();
    for part in walker.stack.iter().rev() {
        rendered.push_str(part);
    }
    rendered
}

struct NodeWalker<'a> {
    resolver: &'a dyn TableResolver,
    table_name: &'a str,
    table_id: u64,
    row: u32,
    col: u32,
    stack: Vec<String>,
}

impl NodeWalker<'_> {
    fn push_node(&mut self, node: &AstNodeArchive) {
        use AstNodeType::*;

        let Some(node_type) = node.node_type() else {
            warn!(
                "{}@[{},{}]: node type {} is unsupported",
                self.table_name, self.row, self.col, node.ast_node_type
            );
            return;
        };

        match node_type {
            AdditionNode => self.binary("+"),
            SubtractionNode => self.binary("-"),
            MultiplicationNode => self.binary("×"),
            DivisionNode => self.binary("÷"),
            PowerNode => self.binary("^"),
            ConcatenationNode => self.binary("&"),
            GreaterThanNode => self.binary(">"),
            GreaterThanOrEqualToNode => self.binary("≥"),
            LessThanNode => self.binary("<"),
            LessThanOrEqualToNode => self.binary("≤"),
            NotEqualToNode => self.binary("≠"),
            EqualToNode => self.equals(),
            NegationNode => self.unary_prefix("-"),
            PercentNode => self.unary_postfix("%"),
            FunctionNode => self.function(node),
            NumberNode => self.number(node),
            StringNode => self.string(node),
            BooleanNode | TokenNode => self.boolean(node),
            DateNode => self.date(node),
            EmptyArgumentNode => self.stack.push(String::new()),
            CellReferenceNode => self.cell_reference(node),
            ColonTractNode => self.colon_tract(node),
            ColonNode | ColonNodeWithUids => self.range(),
            ReferenceErrorNode | ReferenceErrorWithUidsNode => {
                self.stack.push("#REF!".to_string())
            }
            ArrayNode => self.array(node),
            ListNode => self.list(node),
            // Layout bookkeeping with no textual form.
            ThunkNode | EndThunkNode | PrependWhitespaceNode | AppendWhitespaceNode
            | BeginEmbeddedNodeArray => {}
            PlusSignNode | DurationNode => {
                warn!(
                    "{}@[{},{}]: node type {:?} is unsupported",
                    self.table_name, self.row, self.col, node_type
                );
            }
        }
    }

    fn pop(&mut self) -> String {
        self.stack.pop().unwrap_or_default()
    }

    fn binary(&mut self, op: &str) {
        let arg2 = self.pop();
        let arg1 = self.pop();
        self.stack.push(format!("{}{}{}", arg1, op, arg2));
    }

    /// An equals with fewer than two operands is the formula marker the
    /// write path appends; it renders as nothing.
    fn equals(&mut self) {
        if self.stack.len() < 2 {
            return;
        }
        self.binary("=");
    }

    fn unary_prefix(&mut self, op: &str) {
        let arg = self.pop();
        self.stack.push(format!("{}{}", op, arg));
    }

    fn unary_postfix(&mut self, op: &str) {
        let arg = self.pop();
        self.stack.push(format!("{}{}", arg, op));
    }

    fn function(&mut self, node: &AstNodeArchive) {
        let index = node.ast_function_node_index.unwrap_or(0);
        let mut num_args = node.ast_function_node_num_args.unwrap_or(0) as usize;

        let name = match functions::function_name(index) {
            Some(name) => name,
            None => {
                warn!(
                    "{}@[{},{}]: function ID {} is unsupported",
                    self.table_name, self.row, self.col, index
                );
                "UNDEFINED!"
            }
        };
        if self.stack.len() < num_args {
            warn!(
                "{}@[{},{}]: stack too small for {}",
                self.table_name, self.row, self.col, name
            );
            num_args = self.stack.len();
        }

        let args = self.pop_joined(num_args);
        self.stack.push(format!("{}({})", name, args));
    }

    /// Pop `count` arguments and join them in source order.
    fn pop_joined(&mut self, count: usize) -> String {
        let mut args: Vec<String> = (0..count).map(|_| self.pop()).collect();
        args.reverse();
        args.join(",")
    }

    fn number(&mut self, node: &AstNodeArchive) {
        // The integer exponent word marks values stored without decimals.
        if node.ast_number_node_decimal_high == Some(0x3040000000000000) {
            self.stack
                .push(node.ast_number_node_decimal_low.unwrap_or(0).to_string());
        } else {
            let value = node.ast_number_node_number.unwrap_or(0.0);
            self.stack.push(format!("{}", value));
        }
    }

    fn string(&mut self, node: &AstNodeArchive) {
        // Quotes are not escaped in the AST; they double up in the text
        // form.
        let value = node
            .ast_string_node_string
            .clone()
            .unwrap_or_default()
            .replace('"', "\"\"");
        self.stack.push(format!("\"{}\"", value));
    }

    fn boolean(&mut self, node: &AstNodeArchive) {
        let value = node
            .ast_token_node_boolean
            .or(node.ast_boolean_node_boolean)
            .unwrap_or(false);
        self.stack
            .push(if value { "TRUE" } else { "FALSE" }.to_string());
    }

    /// Date literals export as a DATE() call.
    fn date(&mut self, node: &AstNodeArchive) {
        let seconds = node.ast_date_node_date_num.unwrap_or(0.0);
        let dt = datetime_from_epoch(seconds);
        self.stack
            .push(format!("DATE({},{},{})", dt.year(), dt.month(), dt.day()));
    }

    fn array(&mut self, node: &AstNodeArchive) {
        let num_rows = node.ast_array_node_num_row.unwrap_or(1) as usize;
        let num_cols = node.ast_array_node_num_col.unwrap_or(0) as usize;
        if num_rows <= 1 {
            let args = self.pop_joined(num_cols);
            self.stack.push(format!("{{{}}}", args));
        } else {
            let mut rows: Vec<String> = (0..num_rows).map(|_| self.pop_joined(num_cols)).collect();
            rows.reverse();
            self.stack.push(format!("{{{}}}", rows.join(";")));
        }
    }

    fn list(&mut self, node: &AstNodeArchive) {
        let num_args = node.ast_list_node_num_args.unwrap_or(0) as usize;
        let args = self.pop_joined(num_args);
        self.stack.push(format!("({})", args));
    }

    /// Merge two pushed references into a range.
    fn range(&mut self) {
        let arg2 = self.pop();
        let arg1 = self.pop();
        let func_range = arg1.contains('(') || arg2.contains('(');
        if arg1.contains("::") && !func_range {
            // Qualified begin: keep the prefix once.
            let (prefix, begin) = arg1.rsplit_once("::").unwrap_or(("", arg1.as_str()));
            let end = arg2.rsplit_once("::").map_or(arg2.as_str(), |(_, e)| e);
            self.stack.push(format!("{}::{}:{}", prefix, begin, end));
        } else {
            self.stack.push(format!("{}:{}", arg1, arg2));
        }
    }

    /// The cross-table prefix for a node, where one applies.
    fn reference_prefix(&self, node: &AstNodeArchive) -> Option<String> {
        let info = node.ast_cross_table_reference_extra_info.as_ref()?;
        let uid = info.table_id.as_ref()?.as_u128();
        match self.resolver.reference_prefix(self.table_id, uid) {
            Some(prefix) => Some(prefix),
            None => None,
        }
    }

    fn cell_reference(&mut self, node: &AstNodeArchive) {
        let row_coord = node.ast_row.unwrap_or_default();
        let col_coord = node.ast_column.unwrap_or_default();
        let target_row = if row_coord.absolute {
            row_coord.row as i64
        } else {
            self.row as i64 + row_coord.row as i64
        };
        let target_col = if col_coord.absolute {
            col_coord.column as i64
        } else {
            self.col as i64 + col_coord.column as i64
        };

        let rendered = match rowcol_to_cell(
            target_row,
            target_col,
            row_coord.absolute,
            col_coord.absolute,
        ) {
            Ok(reference) => match self.reference_prefix(node) {
                Some(prefix) => format!("{}::{}", prefix, reference),
                None => reference,
            },
            Err(_) => format!("INVALID[{},{}]", self.row, self.col),
        };
        self.stack.push(rendered);
    }

    fn colon_tract(&mut self, node: &AstNodeArchive) {
        let Some(tract) = node.ast_colon_tract.as_ref() else {
            warn!(
                "{}@[{},{}]: colon tract without ranges",
                self.table_name, self.row, self.col
            );
            return;
        };
        let sticky = node.ast_sticky_bits.unwrap_or_default();
        let rows = tract.relative_row.first().copied().unwrap_or_default();
        let cols = tract.relative_column.first().copied().unwrap_or_default();

        let resolve = |begin: i32, absolute: bool, base: u32| -> i64 {
            if absolute {
                begin as i64
            } else {
                base as i64 + begin as i64
            }
        };
        let begin_row = resolve(rows.range_begin, sticky.begin_row_is_absolute, self.row);
        let end_row = resolve(
            rows.range_end.unwrap_or(rows.range_begin),
            sticky.end_row_is_absolute,
            self.row,
        );
        let begin_col = resolve(cols.range_begin, sticky.begin_column_is_absolute, self.col);
        let end_col = resolve(
            cols.range_end.unwrap_or(cols.range_begin),
            sticky.end_column_is_absolute,
            self.col,
        );

        let begin = rowcol_to_cell(
            begin_row,
            begin_col,
            sticky.begin_row_is_absolute,
            sticky.begin_column_is_absolute,
        );
        let end = rowcol_to_cell(
            end_row,
            end_col,
            sticky.end_row_is_absolute,
            sticky.end_column_is_absolute,
        );
        let (begin, end) = match (begin, end) {
            (Ok(begin), Ok(end)) => (begin, end),
            _ => {
                self.stack
                    .push(format!("INVALID[{},{}]", self.row, self.col));
                return;
            }
        };

        let reference = if begin == end {
            begin
        } else {
            format!("{}:{}", begin, end)
        };
        let rendered = match self.reference_prefix(node) {
            Some(prefix) => format!("{}::{}", prefix, reference),
            None => reference,
        };
        self.stack.push(rendered);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::tsce::{
        AstColumnCoordinateArchive, AstCrossTableReferenceExtraInfoArchive,
        AstRowCoordinateArchive,
    };
    use crate::proto::tsp;

    fn number_node(value: f64) -> AstNodeArchive {
        AstNodeArchive {
            ast_number_node_number: Some(value),
            ..AstNodeArchive::of_type(AstNodeType::NumberNode)
        }
    }

    fn integer_node(value: u64) -> AstNodeArchive {
        AstNodeArchive {
            ast_number_node_number: Some(value as f64),
            ast_number_node_decimal_low: Some(value),
            ast_number_node_decimal_high: Some(0x3040000000000000),
            ..AstNodeArchive::of_type(AstNodeType::NumberNode)
        }
    }

    fn string_node(value: &str) -> AstNodeArchive {
        AstNodeArchive {
            ast_string_node_string: Some(value.to_string()),
            ..AstNodeArchive::of_type(AstNodeType::StringNode)
        }
    }

    fn cell_node(row: i32, row_abs: bool, col: i32, col_abs: bool) -> AstNodeArchive {
        AstNodeArchive {
            ast_row: Some(AstRowCoordinateArchive {
                row,
                absolute: row_abs,
            }),
            ast_column: Some(AstColumnCoordinateArchive {
                column: col,
                absolute: col_abs,
            }),
            ..AstNodeArchive::of_type(AstNodeType::CellReferenceNode)
        }
    }

    fn render(nodes: &[AstNodeArchive]) -> String {
        render_formula(nodes, &NoTables, "Table 1", 1, 0, 0)
    }

    #[test]
    fn test_binary_operators() {
        let nodes = vec![
            integer_node(1),
            integer_node(2),
            AstNodeArchive::of_type(AstNodeType::AdditionNode),
            integer_node(3),
            AstNodeArchive::of_type(AstNodeType::MultiplicationNode),
        ];
        assert_eq!(render(&nodes), "1+2×3");
    }

    #[test]
    fn test_function_call() {
        let nodes = vec![
            integer_node(1),
            integer_node(2),
            AstNodeArchive {
                ast_function_node_index: Some(128),
                ast_function_node_num_args: Some(2),
                ..AstNodeArchive::of_type(AstNodeType::FunctionNode)
            },
        ];
        assert_eq!(render(&nodes), "SUM(1,2)");
    }

    #[test]
    fn test_unknown_function_renders_placeholder() {
        let nodes = vec![
            integer_node(1),
            AstNodeArchive {
                ast_function_node_index: Some(9999),
                ast_function_node_num_args: Some(1),
                ..AstNodeArchive::of_type(AstNodeType::FunctionNode)
            },
        ];
        assert_eq!(render(&nodes), "UNDEFINED!(1)");
    }

    #[test]
    fn test_string_quotes_doubled() {
        let nodes = vec![string_node("say \"hi\"")];
        assert_eq!(render(&nodes), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_cell_reference_relative_and_absolute() {
        // At (0, 0): relative +9 rows is A10, absolute row 9 is A$10.
        let nodes = vec![cell_node(9, false, 0, false)];
        assert_eq!(render(&nodes), "A10");
        let nodes = vec![cell_node(9, true, 0, true)];
        assert_eq!(render(&nodes), "$A$10");
    }

    #[test]
    fn test_cross_table_reference_prefix() {
        struct TwoTables;
        impl TableResolver for TwoTables {
            fn reference_prefix(&self, _from: u64, uid: u128) -> Option<String> {
                // One UID needs sheet qualification, one does not.
                match uid {
                    7 => Some("S2::T2".to_string()),
                    8 => Some("T2".to_string()),
                    _ => None,
                }
            }
            fn table_uid(&self, _: u64, _: Option<&str>, _: &str) -> Option<u128> {
                None
            }
        }

        let make = |uid: u128| AstNodeArchive {
            ast_cross_table_reference_extra_info: Some(AstCrossTableReferenceExtraInfoArchive {
                table_id: Some(tsp::CfUuidArchive::from_u128(uid)),
            }),
            ..cell_node(2, true, 1, true)
        };

        let rendered =
            render_formula(&[make(7)], &TwoTables, "T1", 1, 0, 0);
        assert_eq!(rendered, "S2::T2::$B$3");
        let rendered =
            render_formula(&[make(8)], &TwoTables, "T1", 1, 0, 0);
        assert_eq!(rendered, "T2::$B$3");
    }

    #[test]
    fn test_empty_and_list() {
        let nodes = vec![
            integer_node(1),
            AstNodeArchive::of_type(AstNodeType::EmptyArgumentNode),
            AstNodeArchive {
                ast_list_node_num_args: Some(2),
                ..AstNodeArchive::of_type(AstNodeType::ListNode)
            },
        ];
        assert_eq!(render(&nodes), "(1,)");
    }

    #[test]
    fn test_array_two_dimensional() {
        let nodes = vec![
            integer_node(1),
            integer_node(2),
            integer_node(3),
            integer_node(4),
            AstNodeArchive {
                ast_array_node_num_row: Some(2),
                ast_array_node_num_col: Some(2),
                ..AstNodeArchive::of_type(AstNodeType::ArrayNode)
            },
        ];
        assert_eq!(render(&nodes), "{1,2;3,4}");
    }

    #[test]
    fn test_marker_equals_is_silent() {
        let nodes = vec![
            integer_node(1),
            integer_node(2),
            AstNodeArchive::of_type(AstNodeType::AdditionNode),
            AstNodeArchive::of_type(AstNodeType::EqualToNode),
        ];
        assert_eq!(render(&nodes), "1+2");
    }

    #[test]
    fn test_reference_error() {
        let nodes = vec![AstNodeArchive::of_type(
            AstNodeType::ReferenceErrorWithUidsNode,
        )];
        assert_eq!(render(&nodes), "#REF!");
    }

    #[test]
    fn test_date_node() {
        let nodes = vec![AstNodeArchive {
            // 2001-01-04
            ast_date_node_date_num: Some(86400.0 * 3.0),
            ..AstNodeArchive::of_type(AstNodeType::DateNode)
        }];
        assert_eq!(render(&nodes), "DATE(2001,1,4)");
    }
}
