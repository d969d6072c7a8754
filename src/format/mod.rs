//! Cell value formatting
//!
//! Turns a raw cell value plus its format record into the user-visible
//! string. Four rendering paths: date/time field codes, duration unit
//! selection, fractions, and the `#0.,` number templates (custom text
//! formats substitute the value into a sentinel code point). The
//! per-table format records are resolved by the model layer; everything
//! here is a pure function of the record and the value.

pub mod date;
pub mod duration;
pub mod fraction;
pub mod number;

use crate::proto::tsk::FormatStructArchive;

pub use number::NumberFormat;

/// Placeholder code point replaced by the cell text in custom text
/// formats.
pub const TEXT_SENTINEL: char = '\u{E421}';

/// `decimal_places` values at or above this mean "automatic".
pub const DECIMAL_PLACES_AUTO: u32 = 253;

/// Substitute the cell's string value into a custom text format.
pub fn format_custom_text(format_string: &str, value: &str) -> String {
    format_string.replace(TEXT_SENTINEL, value)
}

/// Plain decimal rendering: fixed decimal places when the record asks for
/// them, shortest representation otherwise.
pub fn format_decimal(value: f64, decimal_places: Option<u32>, show_thousands: bool) -> String {
    let rendered = match decimal_places {
        Some(places) if places < DECIMAL_PLACES_AUTO => {
            format!("{:.*}", places as usize, value)
        }
        _ => format!("{}", value),
    };

    if !show_thousands {
        return rendered;
    }
    let (head, tail) = match rendered.split_once('.') {
        Some((head, tail)) => (head, Some(tail)),
        None => (rendered.as_str(), None),
    };
    let (sign, digits) = match head.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", head),
    };
    let mut grouped = String::with_capacity(rendered.len() + digits.len() / 3);
    grouped.push_str(sign);
    let offset = digits.len() % 3;
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && index % 3 == offset % 3 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if let Some(tail) = tail {
        grouped.push('.');
        grouped.push_str(tail);
    }
    grouped
}

/// Boolean rendering used by checkbox and boolean formats.
pub fn format_boolean(value: bool) -> String {
    if value { "TRUE" } else { "FALSE" }.to_string()
}

/// Extract the number-template parameters from a format record.
pub fn number_format_from_archive(archive: &FormatStructArchive) -> NumberFormat {
    NumberFormat {
        custom_format_string: archive.custom_format_string.clone().unwrap_or_default(),
        scale_factor: archive.scale_factor.unwrap_or(1.0),
        currency_code: archive.currency_code.clone().unwrap_or_default(),
        num_nonspace_integer_digits: archive.num_nonspace_integer_digits.unwrap_or(0),
        num_nonspace_decimal_digits: archive.num_nonspace_decimal_digits.unwrap_or(0),
        show_thousands_separator: archive.show_thousands_separator.unwrap_or(false),
    }
}

/// Extract the duration parameters from a format record.
pub fn duration_format_from_archive(archive: &FormatStructArchive) -> duration::DurationFormat {
    duration::DurationFormat {
        style: duration::DurationStyle::from_archive(archive.duration_style.unwrap_or(0)),
        unit_largest: archive.duration_unit_largest.unwrap_or(duration::unit::DAY),
        unit_smallest: archive
            .duration_unit_smallest
            .unwrap_or(duration::unit::DAY),
        auto_units: archive.use_automatic_duration_units.unwrap_or(false),
    }
}

/// Padding selection for one side of a custom number template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaddingMode {
    #[default]
    None,
    Zeros,
    Spaces,
}

/// Options for building a custom number format on the write path.
#[derive(Debug, Clone, Default)]
pub struct CustomFormatOptions {
    pub integer_format: PaddingMode,
    pub decimal_format: PaddingMode,
    pub num_integers: u32,
    pub num_decimals: u32,
    pub show_thousands_separator: bool,
}

impl CustomFormatOptions {
    /// The `#0.,` template these options describe.
    pub fn format_string(&self) -> String {
        let placeholder = |mode: PaddingMode, count: u32| -> String {
            let ch = match mode {
                PaddingMode::None => '#',
                PaddingMode::Zeros => '0',
                PaddingMode::Spaces => '#',
            };
            std::iter::repeat_n(ch, count.max(1) as usize).collect()
        };

        let mut template = placeholder(self.integer_format, self.num_integers);
        if self.show_thousands_separator && self.num_integers > 3 {
            let mut grouped = String::new();
            for (index, ch) in template.chars().rev().enumerate() {
                if index > 0 && index % 3 == 0 {
                    grouped.push(',');
                }
                grouped.push(ch);
            }
            template = grouped.chars().rev().collect();
        }
        if self.num_decimals > 0 {
            template.push('.');
            template.push_str(&placeholder(self.decimal_format, self.num_decimals));
        }
        template
    }

    /// Render a value with these options.
    pub fn format(&self, value: f64) -> String {
        let format = NumberFormat {
            custom_format_string: self.format_string(),
            scale_factor: 1.0,
            currency_code: String::new(),
            num_nonspace_integer_digits: match self.integer_format {
                PaddingMode::Zeros => self.num_integers,
                _ => 0,
            },
            num_nonspace_decimal_digits: match self.decimal_format {
                PaddingMode::Zeros => self.num_decimals,
                _ => 0,
            },
            show_thousands_separator: self.show_thousands_separator,
        };
        number::format_custom_number(&format, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_decimal_rendering() {
        // Six decimal places, no separator.
        assert_eq!(
            format_decimal(12345.012346, Some(6), false),
            "12345.012346"
        );
        assert_eq!(format_decimal(12345.012346, Some(2), false), "12345.01");
        assert_eq!(format_decimal(1234567.5, None, true), "1,234,567.5");
        assert_eq!(format_decimal(-1234.0, None, true), "-1,234");
        assert_eq!(format_decimal(0.5, Some(DECIMAL_PLACES_AUTO), false), "0.5");
    }

    #[test]
    fn test_custom_text_sentinel() {
        let format_string = format!("before {} after", TEXT_SENTINEL);
        assert_eq!(
            format_custom_text(&format_string, "middle"),
            "before middle after"
        );
    }

    #[test]
    fn test_boolean() {
        assert_eq!(format_boolean(true), "TRUE");
        assert_eq!(format_boolean(false), "FALSE");
    }

    #[test]
    fn test_custom_format_options_template() {
        let options = CustomFormatOptions {
            integer_format: PaddingMode::Zeros,
            decimal_format: PaddingMode::Zeros,
            num_integers: 5,
            num_decimals: 2,
            show_thousands_separator: true,
        };
        assert_eq!(options.format_string(), "00,000.00");
        assert_eq!(options.format(1234.5), "01,234.50");
    }

    #[test]
    fn test_custom_format_options_bare() {
        let options = CustomFormatOptions {
            num_integers: 1,
            ..Default::default()
        };
        assert_eq!(options.format_string(), "#");
        assert_eq!(options.format(12.0), "12");
    }
}
