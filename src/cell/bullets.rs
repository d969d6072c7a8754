//! Bullet characters for rich-text list styles
//!
//! Numbered list styles render as decimal, Roman or alphabetic labels in
//! plain, parenthesised or right-paren forms; character styles carry
//! their bullet glyph literally.

use crate::proto::tswp::{list_label, ListStyleArchive};

/// The rendered bullet for one paragraph, `None` for unbulleted styles.
///
/// `index` is the zero-based position of the paragraph within its list.
pub fn bullet_char(style: &ListStyleArchive, index: u32) -> Option<String> {
    let ordinal = index + 1;
    let (prefix, label, suffix) = match style.label_type {
        list_label::CHARACTER => {
            return style.bullet_character.clone();
        }
        list_label::NUMERIC_DECIMAL => ("", ordinal.to_string(), "."),
        list_label::NUMERIC_DOUBLE_PAREN => ("(", ordinal.to_string(), ")"),
        list_label::NUMERIC_RIGHT_PAREN => ("", ordinal.to_string(), ")"),
        list_label::ROMAN_UPPER_DECIMAL => ("", to_roman(ordinal), "."),
        list_label::ROMAN_UPPER_DOUBLE_PAREN => ("(", to_roman(ordinal), ")"),
        list_label::ROMAN_UPPER_RIGHT_PAREN => ("", to_roman(ordinal), ")"),
        list_label::ROMAN_LOWER_DECIMAL => ("", to_roman(ordinal).to_lowercase(), "."),
        list_label::ROMAN_LOWER_DOUBLE_PAREN => ("(", to_roman(ordinal).to_lowercase(), ")"),
        list_label::ROMAN_LOWER_RIGHT_PAREN => ("", to_roman(ordinal).to_lowercase(), ")"),
        list_label::ALPHA_UPPER_DECIMAL => ("", to_alpha(ordinal, b'A'), "."),
        list_label::ALPHA_UPPER_DOUBLE_PAREN => ("(", to_alpha(ordinal, b'A'), ")"),
        list_label::ALPHA_UPPER_RIGHT_PAREN => ("", to_alpha(ordinal, b'A'), ")"),
        list_label::ALPHA_LOWER_DECIMAL => ("", to_alpha(ordinal, b'a'), "."),
        list_label::ALPHA_LOWER_DOUBLE_PAREN => ("(", to_alpha(ordinal, b'a'), ")"),
        list_label::ALPHA_LOWER_RIGHT_PAREN => ("", to_alpha(ordinal, b'a'), ")"),
        _ => return None,
    };
    Some(format!("{}{}{}", prefix, label, suffix))
}

/// Roman numeral for a positive ordinal.
fn to_roman(mut value: u32) -> String {
    const NUMERALS: [(u32, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut roman = String::new();
    for (weight, numeral) in NUMERALS {
        while value >= weight {
            roman.push_str(numeral);
            value -= weight;
        }
    }
    roman
}

/// Single-letter alphabetic label, wrapping after Z.
fn to_alpha(ordinal: u32, base: u8) -> String {
    let letter = (base + ((ordinal - 1) % 26) as u8) as char;
    letter.to_string()
}
