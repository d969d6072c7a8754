//! Duration rendering
//!
//! A duration format selects a unit range (weeks down to milliseconds)
//! either explicitly or automatically from the value's magnitude, then
//! renders one component per unit. The *no-style* rendering joins
//! components with `:` and renders fractional seconds as `.xxx`; the
//! short and long styles join with spaces and suffix each component with
//! a unit abbreviation or name.

pub const SECONDS_IN_HOUR: f64 = 60.0 * 60.0;
pub const SECONDS_IN_DAY: f64 = SECONDS_IN_HOUR * 24.0;
pub const SECONDS_IN_WEEK: f64 = SECONDS_IN_DAY * 7.0;

/// Duration unit codes, as stored in format records.
pub mod unit {
    pub const WEEK: u32 = 1;
    pub const DAY: u32 = 2;
    pub const HOUR: u32 = 4;
    pub const MINUTE: u32 = 8;
    pub const SECOND: u32 = 16;
    pub const MILLISECOND: u32 = 32;
}

/// Rendering style codes, as stored in format records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationStyle {
    /// Bare components joined with `:`.
    None,
    /// Single-letter unit suffixes (`1w 2d`).
    Short,
    /// Full unit names (`1 week 2 days`).
    Long,
}

impl DurationStyle {
    pub fn from_archive(value: u32) -> Self {
        match value {
            1 => Self::Short,
            2 => Self::Long,
            _ => Self::None,
        }
    }
}

/// Parameters extracted from a duration format record.
#[derive(Debug, Clone, Copy)]
pub struct DurationFormat {
    pub style: DurationStyle,
    pub unit_largest: u32,
    pub unit_smallest: u32,
    pub auto_units: bool,
}

/// Render a duration in seconds.
pub fn format_duration(value: f64, format: &DurationFormat) -> String {
    let (unit_smallest, unit_largest) = if format.auto_units {
        auto_units(value, format)
    } else {
        (format.unit_smallest, format.unit_largest)
    };
    let style = format.style;

    let mut d = value;
    let mut parts: Vec<String> = Vec::new();

    if unit_largest == unit::WEEK {
        let dd = (d / SECONDS_IN_WEEK) as i64;
        if unit_smallest != unit::WEEK {
            d -= SECONDS_IN_WEEK * dd as f64;
        }
        parts.push(format!("{}{}", dd, unit_suffix("week", dd, style, None)));
    }
    if unit_largest <= unit::DAY && unit_smallest >= unit::DAY {
        let dd = (d / SECONDS_IN_DAY) as i64;
        if unit_smallest > unit::DAY {
            d -= SECONDS_IN_DAY * dd as f64;
        }
        parts.push(format!("{}{}", dd, unit_suffix("day", dd, style, None)));
    }
    if unit_largest <= unit::HOUR && unit_smallest >= unit::HOUR {
        let dd = (d / SECONDS_IN_HOUR) as i64;
        if unit_smallest > unit::HOUR {
            d -= SECONDS_IN_HOUR * dd as f64;
        }
        parts.push(format!("{}{}", dd, unit_suffix("hour", dd, style, None)));
    }
    if unit_largest <= unit::MINUTE && unit_smallest >= unit::MINUTE {
        let dd = (d / 60.0) as i64;
        if unit_smallest > unit::MINUTE {
            d -= 60.0 * dd as f64;
        }
        parts.push(format!("{}{}", dd, unit_suffix("minute", dd, style, None)));
    }
    if unit_largest <= unit::SECOND && unit_smallest >= unit::SECOND {
        let dd = d as i64;
        if unit_smallest > unit::SECOND {
            d -= dd as f64;
        }
        parts.push(format!("{}{}", dd, unit_suffix("second", dd, style, None)));
    }
    if unit_smallest >= unit::MILLISECOND {
        let dd = (1000.0 * d).round() as i64;
        if style == DurationStyle::None {
            parts.push(format!("{:03}", dd));
        } else {
            parts.push(format!(
                "{}{}",
                dd,
                unit_suffix("millisecond", dd, style, Some("ms"))
            ));
        }
    }

    let separator = if style == DurationStyle::None { ":" } else { " " };
    let mut rendered = parts.join(separator);

    // No-style fractional seconds are a decimal tail, not a component.
    if style == DurationStyle::None && unit_smallest >= unit::MILLISECOND {
        if let Some(pos) = rendered.rfind(':') {
            if rendered[pos + 1..].len() == 3
                && rendered[pos + 1..].bytes().all(|b| b.is_ascii_digit())
            {
                rendered.replace_range(pos..pos + 1, ".");
            }
        }
    }
    rendered
}

/// The component suffix for one unit: empty for no-style, an abbreviation
/// for short, a pluralised name for long.
fn unit_suffix(unit: &str, value: i64, style: DurationStyle, abbrev: Option<&str>) -> String {
    match style {
        DurationStyle::None => String::new(),
        DurationStyle::Short => abbrev
            .unwrap_or(&unit[..1])
            .to_string(),
        DurationStyle::Long => {
            let plural = if value == 1 { "" } else { "s" };
            format!(" {}{}", unit, plural)
        }
    }
}

/// Choose units from the magnitude of the value: the largest unit is the
/// first with a non-zero count, the smallest the last with a non-zero
/// remainder (both clamp to days for zero).
pub fn auto_units(value: f64, format: &DurationFormat) -> (u32, u32) {
    if value == 0.0 {
        return (unit::DAY, unit::DAY);
    }

    let unit_largest = if value >= SECONDS_IN_WEEK {
        unit::WEEK
    } else if value >= SECONDS_IN_DAY {
        unit::DAY
    } else if value >= SECONDS_IN_HOUR {
        unit::HOUR
    } else if value >= 60.0 {
        unit::MINUTE
    } else if value >= 1.0 {
        unit::SECOND
    } else {
        unit::MILLISECOND
    };

    let mut unit_smallest = format.unit_smallest;
    if value.floor() != value {
        unit_smallest = unit::MILLISECOND;
    } else if value % 60.0 != 0.0 {
        unit_smallest = unit::SECOND;
    } else if value % SECONDS_IN_HOUR != 0.0 {
        unit_smallest = unit::MINUTE;
    } else if value % SECONDS_IN_DAY != 0.0 {
        unit_smallest = unit::HOUR;
    } else if value % SECONDS_IN_WEEK != 0.0 {
        unit_smallest = unit::DAY;
    }
    if unit_smallest < unit_largest {
        unit_smallest = unit_largest;
    }

    (unit_smallest, unit_largest)
}
