//! Cell-range reference grammar
//!
//! Parses the range operands the tokenizer produces: single cells and
//! rectangular ranges with optional `$` absolute markers, row-only and
//! column-only spans, named rows/columns, and optional `Sheet::Table::`
//! qualifiers.

/// The reference body of a parsed range operand.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeKind {
    /// `A1`, `$B$3`
    Cell {
        row: i64,
        col: i64,
        row_abs: bool,
        col_abs: bool,
    },
    /// `A1:C4`, `$A3:$B3`
    Rect {
        row_start: i64,
        col_start: i64,
        row_end: i64,
        col_end: i64,
        row_start_abs: bool,
        col_start_abs: bool,
        row_end_abs: bool,
        col_end_abs: bool,
    },
    /// `1:2`, `$1:$2`
    Rows {
        start: i64,
        end: i64,
        start_abs: bool,
        end_abs: bool,
    },
    /// `A:C`, `$E:$F`
    Columns {
        start: i64,
        end: i64,
        start_abs: bool,
        end_abs: bool,
    },
    /// A named row/column or named span; names are arbitrary strings.
    Named { start: String, end: Option<String> },
}

/// A parsed range operand: optional scope qualifiers plus the reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRange {
    /// Sheet name when two qualifiers are present.
    pub sheet: Option<String>,
    /// Table name qualifier.
    pub table: Option<String>,
    pub kind: RangeKind,
}

/// Parse a range operand.
///
/// The grammar can always fall through to a named row/column, so parsing
/// itself never fails; the builder decides which kinds it supports.
pub fn parse_range(range_str: &str) -> ParsedRange {
    let parts: Vec<&str> = range_str.split("::").collect();
    let (sheet, table, reference) = match parts.as_slice() {
        [sheet, table, reference] => (Some(sheet.to_string()), Some(table.to_string()), *reference),
        [table, reference] => (None, Some(table.to_string()), *reference),
        _ => (None, None, range_str),
    };

    let kind = parse_reference(reference);
    ParsedRange { sheet, table, kind }
}

fn parse_reference(reference: &str) -> RangeKind {
    match reference.split_once(':') {
        Some((begin, end)) => {
            let begin_part = parse_part(begin);
            let end_part = parse_part(end);
            match (begin_part, end_part) {
                (Part::Row(start, start_abs), Part::Row(end, end_abs)) => RangeKind::Rows {
                    start,
                    end,
                    start_abs,
                    end_abs,
                },
                (Part::Column(start, start_abs), Part::Column(end, end_abs)) => {
                    RangeKind::Columns {
                        start,
                        end,
                        start_abs,
                        end_abs,
                    }
                }
                (
                    Part::Cell {
                        row: row_start,
                        col: col_start,
                        row_abs: row_start_abs,
                        col_abs: col_start_abs,
                    },
                    Part::Cell {
                        row: row_end,
                        col: col_end,
                        row_abs: row_end_abs,
                        col_abs: col_end_abs,
                    },
                ) => RangeKind::Rect {
                    row_start,
                    col_start,
                    row_end,
                    col_end,
                    row_start_abs,
                    col_start_abs,
                    row_end_abs,
                    col_end_abs,
                },
                _ => RangeKind::Named {
                    start: begin.to_string(),
                    end: Some(end.to_string()),
                },
            }
        }
        None => match parse_part(reference) {
            Part::Cell {
                row,
                col,
                row_abs,
                col_abs,
            } => RangeKind::Cell {
                row,
                col,
                row_abs,
                col_abs,
            },
            _ => RangeKind::Named {
                start: reference.to_string(),
                end: None,
            },
        },
    }
}

/// One side of a (possibly implicit) colon.
enum Part {
    Cell {
        row: i64,
        col: i64,
        row_abs: bool,
        col_abs: bool,
    },
    Row(i64, bool),
    Column(i64, bool),
    Name,
}

fn parse_part(part: &str) -> Part {
    let (col_abs, rest) = match part.strip_prefix('$') {
        Some(rest) => (true, rest),
        None => (false, part),
    };

    let letters_end = rest
        .bytes()
        .position(|b| !b.is_ascii_uppercase())
        .unwrap_or(rest.len());
    let letters = &rest[..letters_end];
    let after_letters = &rest[letters_end..];

    if letters.is_empty() {
        // Row-only: digits, possibly $-prefixed (handled above as col_abs).
        if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(row) = rest.parse::<i64>() {
                return Part::Row(row - 1, col_abs);
            }
        }
        return Part::Name;
    }

    if after_letters.is_empty() {
        return Part::Column(column_index(letters), col_abs);
    }

    // Optional $ before the row digits.
    let (row_abs, digits) = match after_letters.strip_prefix('$') {
        Some(rest) => (true, rest),
        None => (false, after_letters),
    };
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(row) = digits.parse::<i64>() {
            return Part::Cell {
                row: row - 1,
                col: column_index(letters),
                row_abs,
                col_abs,
            };
        }
    }
    Part::Name
}

/// Zero-based index of an A-Z column name.
fn column_index(letters: &str) -> i64 {
    let mut col: i64 = 0;
    for byte in letters.bytes() {
        col = col * 26 + (byte - b'A' + 1) as i64;
    }
    col - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_cell() {
        assert_eq!(
            parse_range("B3").kind,
            RangeKind::Cell {
                row: 2,
                col: 1,
                row_abs: false,
                col_abs: false,
            }
        );
        assert_eq!(
            parse_range("$B$3").kind,
            RangeKind::Cell {
                row: 2,
                col: 1,
                row_abs: true,
                col_abs: true,
            }
        );
    }

    #[test]
    fn test_rect_range() {
        assert_eq!(
            parse_range("A1:C4").kind,
            RangeKind::Rect {
                row_start: 0,
                col_start: 0,
                row_end: 3,
                col_end: 2,
                row_start_abs: false,
                col_start_abs: false,
                row_end_abs: false,
                col_end_abs: false,
            }
        );
    }

    #[test]
    fn test_row_and_column_spans() {
        assert_eq!(
            parse_range("1:2").kind,
            RangeKind::Rows {
                start: 0,
                end: 1,
                start_abs: false,
                end_abs: false,
            }
        );
        assert_eq!(
            parse_range("$E:$F").kind,
            RangeKind::Columns {
                start: 4,
                end: 5,
                start_abs: true,
                end_abs: true,
            }
        );
    }

    #[test]
    fn test_qualified_references() {
        let parsed = parse_range("Sheet 2::Table 2::B3");
        assert_eq!(parsed.sheet.as_deref(), Some("Sheet 2"));
        assert_eq!(parsed.table.as_deref(), Some("Table 2"));
        assert!(matches!(parsed.kind, RangeKind::Cell { .. }));

        let parsed = parse_range("Table 2::B3");
        assert_eq!(parsed.sheet, None);
        assert_eq!(parsed.table.as_deref(), Some("Table 2"));
    }

    #[test]
    fn test_named_fallback() {
        assert_eq!(
            parse_range("totals").kind,
            RangeKind::Named {
                start: "totals".to_string(),
                end: None,
            }
        );
        assert_eq!(
            parse_range("cats:dogs").kind,
            RangeKind::Named {
                start: "cats".to_string(),
                end: Some("dogs".to_string()),
            }
        );
    }
}
