//! Custom number format rendering
//!
//! A custom number format embeds a `#…0…[.…]` template (optionally with
//! `,` separators and an `E+##` tail) inside arbitrary text. The value is
//! scaled, split into integer and decimal sides, padded with zeros or
//! spaces according to the template, and substituted back into the
//! surrounding string.

use tracing::warn;

/// Parameters extracted from a number format record.
#[derive(Debug, Clone, Default)]
pub struct NumberFormat {
    pub custom_format_string: String,
    pub scale_factor: f64,
    pub currency_code: String,
    pub num_nonspace_integer_digits: u32,
    pub num_nonspace_decimal_digits: u32,
    pub show_thousands_separator: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellPadding {
    Space,
    Zero,
}

/// Render a value against a custom number format.
pub fn format_custom_number(format: &NumberFormat, value: f64) -> String {
    let mut format_string = format.custom_format_string.clone();
    let scale = if format.scale_factor == 0.0 {
        1.0
    } else {
        format.scale_factor
    };
    let mut value = value * scale;
    // A per-cent scale carries the 100x itself; a bare % does not.
    if format_string.contains('%') && scale == 1.0 {
        value *= 100.0;
    }

    if !format.currency_code.is_empty() {
        // Currency placeholder becomes the code plus a no-break space.
        format_string =
            format_string.replace('\u{00A4}', &format!("{}\u{00A0}", format.currency_code));
    }

    let Some(spec) = find_format_spec(&format_string) else {
        warn!(
            format = %format_string,
            "can't parse number format string; skipping"
        );
        return format_string;
    };

    let format_spec = &format_string[spec.start..spec.end];
    let (int_part, dec_part) = if format_spec.starts_with('.') {
        ("", &format_spec[1..])
    } else if format_string.contains('.') {
        match format_spec.find('.') {
            Some(dot) => (&format_spec[..dot], &format_spec[dot + 1..]),
            None => (format_spec, ""),
        }
    } else {
        (format_spec, "")
    };

    if spec.tail_len > 0 {
        let rendered = format_scientific(value, dec_part, spec.tail_len);
        return expand_quotes(&format_string.replace(format_spec, &rendered));
    }

    let num_decimals = dec_part.len();
    let dec_pad = if num_decimals > 0 {
        if dec_part.starts_with('#') {
            None
        } else if format.num_nonspace_decimal_digits > 0 {
            Some(CellPadding::Zero)
        } else {
            Some(CellPadding::Space)
        }
    } else {
        None
    };
    let dec_width = num_decimals;

    let display = format!("{}", value);
    let (int_str, dec_str) = display
        .split_once('.')
        .unwrap_or((display.as_str(), ""));
    let (integer, decimal): (i128, f64) = if num_decimals > 0 {
        let integer = int_str.parse::<i128>().unwrap_or(0);
        let frac: f64 = format!("0.{}", dec_str).parse().unwrap_or(0.0);
        (integer, round_to(frac, num_decimals as u32))
    } else {
        let frac: f64 = format!("0.{}", dec_str).parse().unwrap_or(0.0);
        (value.round_ties_even() as i128, frac)
    };

    let num_integers = int_part.replace(',', "").len();
    let (int_pad, int_width) = if num_integers > 0 {
        if int_part.starts_with('#') {
            (None, int_part.len())
        } else if format.num_nonspace_integer_digits > 0 {
            let width = if format.show_thousands_separator {
                let num_commas = if integer != 0 {
                    (integer.unsigned_abs().to_string().len() - 1) / 3
                } else {
                    0
                };
                let num_commas = num_commas.max((num_integers - 1) / 3);
                num_integers + num_commas
            } else {
                num_integers
            };
            (Some(CellPadding::Zero), width)
        } else {
            (Some(CellPadding::Space), int_part.len())
        }
    } else {
        (None, num_integers)
    };

    // str(float) keeps a trailing .0 for whole values; the zero-integer
    // branches below compare against that form.
    let decimal_display = if decimal == 0.0 {
        "0.0".to_string()
    } else {
        format!("{}", decimal)
    };

    // Integer zero renders blank (padded where asked) in several
    // space-padding corners.
    let mut formatted = if integer == 0
        && int_pad == Some(CellPadding::Space)
        && num_decimals == 0
    {
        " ".repeat(int_width)
    } else if integer == 0 && int_pad.is_none() && dec_pad == Some(CellPadding::Space) {
        String::new()
    } else if integer == 0 && int_pad == Some(CellPadding::Space) && dec_pad.is_some() {
        String::new()
    } else if integer == 0
        && int_pad == Some(CellPadding::Space)
        && dec_pad.is_none()
        && decimal_display.len() > num_decimals
    {
        " ".repeat(int_width)
    } else if int_pad == Some(CellPadding::Zero) {
        zero_padded_int(integer, int_width, format.show_thousands_separator)
    } else if int_pad == Some(CellPadding::Space) {
        let grouped = grouped_int(integer, format.show_thousands_separator);
        format!("{:>width$}", grouped, width = int_width)
    } else {
        grouped_int(integer, format.show_thousands_separator)
    };

    if num_decimals > 0 {
        // Space padding renders as zeroes when there is no integer
        // template.
        if dec_pad == Some(CellPadding::Zero)
            || (dec_pad == Some(CellPadding::Space) && num_integers == 0)
        {
            let fixed = format!("{:.*}", dec_width, decimal);
            formatted.push('.');
            formatted.push_str(&fixed[2..]);
        } else if dec_pad == Some(CellPadding::Space) && decimal == 0.0 {
            formatted.push_str(&format!("{:<width$}", ".", width = dec_width + 1));
        } else if dec_pad == Some(CellPadding::Space) {
            formatted.push('.');
            formatted.push_str(&format!(
                "{:<width$}",
                frac_digits(decimal),
                width = dec_width
            ));
        } else if decimal != 0.0 || num_integers == 0 {
            formatted.push('.');
            formatted.push_str(&frac_digits(decimal));
        }
    }

    expand_quotes(&format_string.replace(format_spec, &formatted))
}

/// The located `#0.,` template inside a format string.
struct FormatSpec {
    start: usize,
    end: usize,
    /// Length of the `E+##` tail, 0 when absent.
    tail_len: usize,
}

fn find_format_spec(format_string: &str) -> Option<FormatSpec> {
    let bytes = format_string.as_bytes();
    let start = bytes
        .iter()
        .position(|&b| matches!(b, b'#' | b'0' | b'.' | b','))?;
    let mut end = start;
    while end < bytes.len() && matches!(bytes[end], b'#' | b'0' | b'.' | b',') {
        end += 1;
    }

    // Optional scientific tail: E+ followed by digit placeholders.
    let mut tail_len = 0;
    if end + 1 < bytes.len() && bytes[end] == b'E' && bytes[end + 1] == b'+' {
        let mut tail_end = end + 2;
        while tail_end < bytes.len() && (bytes[tail_end].is_ascii_digit() || bytes[tail_end] == b'#')
        {
            tail_end += 1;
        }
        if tail_end > end + 2 {
            tail_len = tail_end - end;
            end = tail_end;
        }
    }

    Some(FormatSpec {
        start,
        end,
        tail_len,
    })
}

/// Scientific rendering: mantissa precision from the decimal template,
/// exponent width from the placeholder count in the tail.
fn format_scientific(value: f64, dec_part: &str, tail_len: usize) -> String {
    let precision = dec_part.len().saturating_sub(tail_len);
    let exp_width = tail_len - 2;

    let rendered = format!("{:.*E}", precision, value);
    let (mantissa, exponent) = rendered
        .split_once('E')
        .unwrap_or((rendered.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!(
        "{}E{}{:0width$}",
        mantissa,
        sign,
        exponent.unsigned_abs(),
        width = exp_width
    )
}

/// Round a fraction to `digits` decimal places, ties to even.
fn round_to(value: f64, digits: u32) -> f64 {
    let scale = 10f64.powi(digits as i32);
    (value * scale).round_ties_even() / scale
}

/// The digits after the decimal point of the shortest representation.
fn frac_digits(decimal: f64) -> String {
    let display = format!("{}", decimal);
    match display.split_once('.') {
        Some((_, frac)) => frac.to_string(),
        None => "0".to_string(),
    }
}

/// Group digits with thousands separators.
fn grouped_int(integer: i128, separators: bool) -> String {
    if !separators {
        return integer.to_string();
    }
    let sign = if integer < 0 { "-" } else { "" };
    format!("{}{}", sign, group_commas(&integer.unsigned_abs().to_string()))
}

fn group_commas(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    let offset = digits.len() % 3;
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && index % 3 == offset % 3 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Zero-pad an integer to `width`, regrouping separators across the
/// padding.
fn zero_padded_int(integer: i128, width: usize, separators: bool) -> String {
    let sign = if integer < 0 { "-" } else { "" };
    let mut digits = integer.unsigned_abs().to_string();
    if separators {
        loop {
            let grouped = group_commas(&digits);
            if grouped.len() + sign.len() >= width {
                return format!("{}{}", sign, grouped);
            }
            digits.insert(0, '0');
        }
    }
    let natural = digits.len() + sign.len();
    if natural >= width {
        format!("{}{}", sign, digits)
    } else {
        format!("{}{}{}", sign, "0".repeat(width - natural), digits)
    }
}

/// Strip quoting from a rendered format: `'…'` segments pass through
/// verbatim and `''` is a literal quote.
pub fn expand_quotes(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut index = 0;
    let mut result = String::with_capacity(value.len());

    while index < chars.len() {
        let current = chars[index];
        if current == '\'' {
            if index + 1 >= chars.len() {
                break;
            } else if chars[index + 1] == '\'' {
                result.push('\'');
                index += 2;
            } else {
                // Quote toggles; the delimiters themselves are dropped.
                index += 1;
            }
        } else {
            result.push(current);
            index += 1;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(format_string: &str) -> NumberFormat {
        NumberFormat {
            custom_format_string: format_string.to_string(),
            scale_factor: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_hash_template_passthrough() {
        let format = plain("##0");
        assert_eq!(format_custom_number(&format, 12.0), "12");
        assert_eq!(format_custom_number(&format, 0.0), "0");
    }

    #[test]
    fn test_zero_padded_integers() {
        let mut format = plain("000");
        format.num_nonspace_integer_digits = 3;
        assert_eq!(format_custom_number(&format, 12.0), "012");
        assert_eq!(format_custom_number(&format, 1234.0), "1234");
    }

    #[test]
    fn test_zero_padding_with_thousands() {
        let mut format = plain("00000");
        format.num_nonspace_integer_digits = 5;
        format.show_thousands_separator = true;
        assert_eq!(format_custom_number(&format, 1234.0), "01,234");
    }

    #[test]
    fn test_decimals_zero_padded() {
        let mut format = plain("0.00");
        format.num_nonspace_integer_digits = 1;
        format.num_nonspace_decimal_digits = 2;
        assert_eq!(format_custom_number(&format, 1.5), "1.50");
        assert_eq!(format_custom_number(&format, 2.346), "2.35");
    }

    #[test]
    fn test_hash_decimals_trim() {
        let mut format = plain("0.##");
        format.num_nonspace_integer_digits = 1;
        assert_eq!(format_custom_number(&format, 1.5), "1.5");
        assert_eq!(format_custom_number(&format, 2.0), "2");
    }

    #[test]
    fn test_percent_scaling() {
        let mut format = plain("0%");
        format.num_nonspace_integer_digits = 1;
        assert_eq!(format_custom_number(&format, 0.42), "42%");
    }

    #[test]
    fn test_surrounding_text_and_quotes() {
        let mut format = plain("'total:' ##0 'items'");
        format.num_nonspace_integer_digits = 0;
        assert_eq!(format_custom_number(&format, 7.0), "total: 7 items");
    }

    #[test]
    fn test_currency_code_substitution() {
        let mut format = plain("\u{00A4}##0.00");
        format.currency_code = "GBP".to_string();
        format.num_nonspace_decimal_digits = 2;
        assert_eq!(
            format_custom_number(&format, 2.5),
            "GBP\u{00A0}2.50"
        );
    }

    #[test]
    fn test_scientific_notation() {
        let format = plain("0.00E+00");
        assert_eq!(format_custom_number(&format, 12345.6789), "1.23E+04");
        assert_eq!(format_custom_number(&format, 0.00123), "1.23E-03");
    }

    #[test]
    fn test_scale_factor() {
        let mut format = plain("0");
        format.scale_factor = 0.001;
        format.num_nonspace_integer_digits = 1;
        assert_eq!(format_custom_number(&format, 12000.0), "12");
    }

    #[test]
    fn test_unparseable_template_passes_through() {
        let format = plain("no placeholders here");
        assert_eq!(
            format_custom_number(&format, 1.0),
            "no placeholders here"
        );
    }

    #[test]
    fn test_group_commas() {
        assert_eq!(group_commas("1"), "1");
        assert_eq!(group_commas("1234"), "1,234");
        assert_eq!(group_commas("1234567"), "1,234,567");
        assert_eq!(group_commas("001234"), "001,234");
    }

    #[test]
    fn test_expand_quotes() {
        assert_eq!(expand_quotes("'kg' 0"), "kg 0");
        assert_eq!(expand_quotes("it''s 0"), "it's 0");
    }
}
