//! Formula builder (write path)
//!
//! Converts a textual formula into the calculation engine's node array:
//! tokenize, convert infix to reverse-polish by the standard precedence
//! table, then map each token to its archive node kind.

use tracing::warn;

use crate::formula::functions;
use crate::formula::ranges::{self, RangeKind};
use crate::formula::tokenizer::{Token, TokenKind, TokenSubkind, Tokenizer};
use crate::formula::TableResolver;
use crate::proto::tsce::{
    AstColonTractArchive, AstColonTractRelativeRangeArchive, AstColumnCoordinateArchive,
    AstCrossTableReferenceExtraInfoArchive, AstNodeArchive, AstNodeArrayArchive, AstNodeType,
    AstRowCoordinateArchive, AstStickyBits, FormulaArchive,
};
use crate::proto::tsp;
use crate::{Error, Result};

/// Operator precedence; the unary percent binds tightest, comparisons
/// loosest.
fn precedence(op: &str) -> u32 {
    match op {
        "%" => 6,
        "^" => 5,
        "*" | "/" => 4,
        "+" | "-" => 3,
        "&" => 2,
        _ => 1,
    }
}

/// The node kind for an infix operator.
fn infix_node_type(op: &str) -> Option<AstNodeType> {
    let node_type = match op {
        "=" | "==" => AstNodeType::EqualToNode,
        "+" => AstNodeType::AdditionNode,
        "-" => AstNodeType::SubtractionNode,
        "*" => AstNodeType::MultiplicationNode,
        "/" => AstNodeType::DivisionNode,
        "&" => AstNodeType::ConcatenationNode,
        "^" => AstNodeType::PowerNode,
        "<>" => AstNodeType::NotEqualToNode,
        "<" => AstNodeType::LessThanNode,
        ">" => AstNodeType::GreaterThanNode,
        "<=" => AstNodeType::LessThanOrEqualToNode,
        ">=" => AstNodeType::GreaterThanOrEqualToNode,
        _ => return None,
    };
    Some(node_type)
}

/// Parse a textual formula into a formula archive.
///
/// `row` and `col` anchor relative references; `table_id` scopes
/// cross-table lookups through the resolver.
pub fn parse_formula(
    text: &str,
    resolver: &dyn TableResolver,
    table_id: u64,
    row: u32,
    col: u32,
) -> Result<FormulaArchive> {
    let tokens = formula_tokens(text)?;

    let mut nodes = Vec::with_capacity(tokens.len());
    for token in &tokens {
        match token.kind {
            TokenKind::Func if token.subkind == TokenSubkind::Open => {
                let name = token.value.trim_end_matches('(');
                let Some(index) = functions::function_id(name) else {
                    warn!("function {} is not supported", name);
                    return Err(Error::Formula(format!(
                        "function {} is not supported",
                        name
                    )));
                };
                nodes.push(AstNodeArchive {
                    ast_function_node_index: Some(index),
                    ast_function_node_num_args: Some(token.num_args),
                    ..AstNodeArchive::of_type(AstNodeType::FunctionNode)
                });
            }
            TokenKind::Operand => {
                nodes.push(operand_node(token, resolver, table_id, row, col)?);
            }
            TokenKind::OperatorInfix => {
                let Some(node_type) = infix_node_type(&token.value) else {
                    return Err(Error::Formula(format!(
                        "operator {} is not supported",
                        token.value
                    )));
                };
                nodes.push(AstNodeArchive::of_type(node_type));
            }
            TokenKind::OperatorPrefix => match token.value.as_str() {
                "-" => nodes.push(AstNodeArchive::of_type(AstNodeType::NegationNode)),
                // A leading plus sign changes nothing.
                "+" => {}
                other => {
                    return Err(Error::Formula(format!(
                        "prefix operator {} is not supported",
                        other
                    )));
                }
            },
            TokenKind::OperatorPostfix => {
                nodes.push(AstNodeArchive::of_type(AstNodeType::PercentNode));
            }
            TokenKind::Array => {
                return Err(Error::Formula(
                    "array literals are not supported on the write path".to_string(),
                ));
            }
            _ => {}
        }
    }

    Ok(FormulaArchive {
        ast_node_array: Some(AstNodeArrayArchive { ast_node: nodes }),
    })
}

/// Tokenize a formula and convert it to reverse-polish order.
///
/// A missing leading `=` is supplied; the marker travels through the
/// conversion and lands as a trailing equals node.
pub fn formula_tokens(text: &str) -> Result<Vec<Token>> {
    // The application's operator spellings normalise to their ASCII forms
    // before scanning.
    let normalised = text
        .replace('×', "*")
        .replace('÷', "/")
        .replace('≥', ">=")
        .replace('≤', "<=")
        .replace('≠', "<>");
    let with_marker = if normalised.starts_with('=') {
        normalised
    } else {
        format!("={}", normalised)
    };
    let tokens = Tokenizer::tokenize(&with_marker)?;
    Ok(rpn_tokens(tokens))
}

/// One held operator during the shunting-yard conversion.
struct OpEntry {
    token: Token,
    /// The leading formula-marker equals; sits below everything.
    marker: bool,
}

/// Shunting-yard conversion of a token stream to reverse-polish order.
///
/// Function argument counts come from separator counting: each `,` closes
/// one argument and the closing paren closes the last (unless the call is
/// empty).
fn rpn_tokens(tokens: Vec<Token>) -> Vec<Token> {
    let mut output: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut operators: Vec<OpEntry> = Vec::new();
    let mut prev: Option<(TokenKind, TokenSubkind)> = None;

    for (index, token) in tokens.into_iter().enumerate() {
        // The leading equals is the formula marker: it sits below every
        // operator and flushes last.
        let marker = index == 0 && token.kind == TokenKind::OperatorInfix && token.value == "=";
        let current = (token.kind, token.subkind);

        match token.kind {
            TokenKind::Operand => output.push(token),
            TokenKind::Func if token.subkind == TokenSubkind::Open => {
                operators.push(OpEntry {
                    token,
                    marker: false,
                });
            }
            TokenKind::Func => {
                // Close: flush to the opening function, then emit it with
                // its argument count.
                flush_until_open(&mut operators, &mut output);
                if let Some(mut entry) = operators.pop() {
                    if prev != Some((TokenKind::Func, TokenSubkind::Open)) {
                        entry.token.num_args += 1;
                    }
                    output.push(entry.token);
                }
            }
            TokenKind::OperatorPrefix => operators.push(OpEntry {
                token,
                marker: false,
            }),
            TokenKind::OperatorPostfix => output.push(token),
            TokenKind::OperatorInfix => {
                if marker {
                    operators.push(OpEntry {
                        token,
                        marker: true,
                    });
                } else {
                    while let Some(top) = operators.last() {
                        let pops = !top.marker
                            && (top.token.kind == TokenKind::OperatorPrefix
                                || (top.token.kind == TokenKind::OperatorInfix
                                    && precedence(&top.token.value)
                                        >= precedence(&token.value)));
                        if !pops {
                            break;
                        }
                        output.push(operators.pop().expect("operator stack").token);
                    }
                    operators.push(OpEntry {
                        token,
                        marker: false,
                    });
                }
            }
            TokenKind::Sep => {
                // A separator flushes pending operators and closes one
                // argument of the owning function.
                flush_until_open(&mut operators, &mut output);
                if let Some(top) = operators.last_mut() {
                    if top.token.kind == TokenKind::Func {
                        top.token.num_args += 1;
                    }
                }
            }
            TokenKind::Paren => {
                if token.subkind == TokenSubkind::Open {
                    operators.push(OpEntry {
                        token,
                        marker: false,
                    });
                } else {
                    flush_until_open(&mut operators, &mut output);
                    operators.pop();
                }
            }
            TokenKind::Array => output.push(token),
        }
        prev = Some(current);
    }

    while let Some(entry) = operators.pop() {
        output.push(entry.token);
    }
    output
}

/// Pop operators to the output until an opener (function, paren, array)
/// or the formula marker is on top.
fn flush_until_open(operators: &mut Vec<OpEntry>, output: &mut Vec<Token>) {
    while let Some(top) = operators.last() {
        if top.marker || top.token.subkind == TokenSubkind::Open {
            break;
        }
        output.push(operators.pop().expect("operator stack").token);
    }
}

/// Map an operand token to its archive node.
fn operand_node(
    token: &Token,
    resolver: &dyn TableResolver,
    table_id: u64,
    row: u32,
    col: u32,
) -> Result<AstNodeArchive> {
    match token.subkind {
        TokenSubkind::Number => Ok(number_node(&token.value)),
        TokenSubkind::Text => {
            // The tokenizer keeps the surrounding quotes and doubled
            // escapes; the archive stores the bare text.
            let inner = token.value[1..token.value.len() - 1].replace("\"\"", "\"");
            Ok(AstNodeArchive {
                ast_string_node_string: Some(inner),
                ..AstNodeArchive::of_type(AstNodeType::StringNode)
            })
        }
        TokenSubkind::Logical => Ok(AstNodeArchive {
            ast_boolean_node_boolean: Some(token.value == "TRUE"),
            ..AstNodeArchive::of_type(AstNodeType::BooleanNode)
        }),
        TokenSubkind::Error => {
            if token.value == "#REF!" {
                Ok(AstNodeArchive::of_type(AstNodeType::ReferenceErrorNode))
            } else {
                Err(Error::Formula(format!(
                    "error literal {} is not supported",
                    token.value
                )))
            }
        }
        TokenSubkind::Range => range_node(&token.value, resolver, table_id, row, col),
        _ => Err(Error::Formula(format!(
            "operand {} is not supported",
            token.value
        ))),
    }
}

fn number_node(value: &str) -> AstNodeArchive {
    let parsed: f64 = value.parse().unwrap_or(0.0);
    if parsed.fract() == 0.0 && parsed >= 0.0 && parsed <= u64::MAX as f64 {
        AstNodeArchive {
            ast_number_node_number: Some(parsed),
            ast_number_node_decimal_low: Some(parsed as u64),
            ast_number_node_decimal_high: Some(0x3040000000000000),
            ..AstNodeArchive::of_type(AstNodeType::NumberNode)
        }
    } else {
        AstNodeArchive {
            ast_number_node_number: Some(parsed),
            ..AstNodeArchive::of_type(AstNodeType::NumberNode)
        }
    }
}

/// Build a cell-reference or colon-tract node from a range operand.
fn range_node(
    value: &str,
    resolver: &dyn TableResolver,
    table_id: u64,
    row: u32,
    col: u32,
) -> Result<AstNodeArchive> {
    let parsed = ranges::parse_range(value);

    let cross_table = match (&parsed.sheet, &parsed.table) {
        (sheet, Some(table)) => {
            let uid = resolver
                .table_uid(table_id, sheet.as_deref(), table)
                .ok_or_else(|| {
                    Error::Formula(format!("unknown table reference {}", value))
                })?;
            Some(AstCrossTableReferenceExtraInfoArchive {
                table_id: Some(tsp::CfUuidArchive::from_u128(uid)),
            })
        }
        _ => None,
    };

    match parsed.kind {
        RangeKind::Cell {
            row: target_row,
            col: target_col,
            row_abs,
            col_abs,
        } => Ok(AstNodeArchive {
            ast_row: Some(AstRowCoordinateArchive {
                row: relative_coord(target_row, row_abs, row),
                absolute: row_abs,
            }),
            ast_column: Some(AstColumnCoordinateArchive {
                column: relative_coord(target_col, col_abs, col),
                absolute: col_abs,
            }),
            ast_cross_table_reference_extra_info: cross_table,
            ..AstNodeArchive::of_type(AstNodeType::CellReferenceNode)
        }),
        RangeKind::Rect {
            row_start,
            col_start,
            row_end,
            col_end,
            row_start_abs,
            col_start_abs,
            row_end_abs,
            col_end_abs,
        } => {
            let row_begin = relative_coord(row_start, row_start_abs, row);
            let row_finish = relative_coord(row_end, row_end_abs, row);
            let row_range = AstColonTractRelativeRangeArchive {
                range_begin: row_begin,
                range_end: if row_begin == row_finish {
                    None
                } else {
                    Some(row_finish)
                },
            };
            let column_range = AstColonTractRelativeRangeArchive {
                range_begin: relative_coord(col_start, col_start_abs, col),
                range_end: Some(relative_coord(col_end, col_end_abs, col)),
            };
            Ok(AstNodeArchive {
                ast_sticky_bits: Some(AstStickyBits {
                    begin_row_is_absolute: row_start_abs,
                    begin_column_is_absolute: col_start_abs,
                    end_row_is_absolute: row_end_abs,
                    end_column_is_absolute: col_end_abs,
                }),
                ast_colon_tract: Some(AstColonTractArchive {
                    relative_row: vec![row_range],
                    relative_column: vec![column_range],
                    preserve_rectangular: Some(true),
                }),
                ast_cross_table_reference_extra_info: cross_table,
                ..AstNodeArchive::of_type(AstNodeType::ColonTractNode)
            })
        }
        RangeKind::Rows { .. } | RangeKind::Columns { .. } | RangeKind::Named { .. } => {
            Err(Error::Formula(format!(
                "reference {} is not supported on the write path",
                value
            )))
        }
    }
}

/// A coordinate as stored: absolute values stay put, relative values are
/// offsets from the referencing cell.
fn relative_coord(target: i64, absolute: bool, base: u32) -> i32 {
    if absolute {
        target as i32
    } else {
        (target - base as i64) as i32
    }
}
