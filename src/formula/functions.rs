//! Formula function index table
//!
//! The calculation engine refers to functions by numeric index. This
//! table is generated offline from the application's function registry and
//! committed; it is treated as immutable configuration. Unknown indexes
//! render as `UNDEFINED!` with a diagnostic.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use phf::phf_map;

/// Function names keyed by calculation-engine index.
pub static FUNCTION_MAP: phf::Map<u32, &'static str> = phf_map! {
    1u32 => "ABS",
    2u32 => "ACCRINT",
    3u32 => "ACCRINTM",
    4u32 => "ACOS",
    5u32 => "ACOSH",
    6u32 => "ADDRESS",
    7u32 => "AND",
    8u32 => "AREAS",
    9u32 => "ASIN",
    10u32 => "ASINH",
    11u32 => "ATAN",
    12u32 => "ATAN2",
    13u32 => "ATANH",
    14u32 => "AVEDEV",
    15u32 => "AVERAGE",
    16u32 => "AVERAGEA",
    17u32 => "AVERAGEIF",
    18u32 => "AVERAGEIFS",
    19u32 => "CEILING",
    20u32 => "CHAR",
    21u32 => "CHOOSE",
    22u32 => "CLEAN",
    23u32 => "CODE",
    24u32 => "COLUMN",
    25u32 => "COLUMNS",
    26u32 => "COMBIN",
    27u32 => "CONCATENATE",
    28u32 => "COS",
    29u32 => "COSH",
    30u32 => "COUNT",
    31u32 => "COUNTA",
    32u32 => "COUNTBLANK",
    33u32 => "COUNTIF",
    34u32 => "COUNTIFS",
    35u32 => "DATE",
    36u32 => "DATEDIF",
    37u32 => "DAY",
    38u32 => "DAYNAME",
    39u32 => "DAYS360",
    40u32 => "DEGREES",
    41u32 => "DOLLAR",
    42u32 => "DUR2DAYS",
    43u32 => "DUR2HOURS",
    44u32 => "DUR2MINUTES",
    45u32 => "DUR2SECONDS",
    46u32 => "DUR2WEEKS",
    47u32 => "DURATION",
    48u32 => "EDATE",
    49u32 => "EVEN",
    50u32 => "EXACT",
    51u32 => "EXP",
    52u32 => "FACT",
    53u32 => "FALSE",
    54u32 => "FIND",
    55u32 => "FIXED",
    56u32 => "FLOOR",
    57u32 => "FORECAST",
    58u32 => "GCD",
    59u32 => "HLOOKUP",
    60u32 => "HOUR",
    61u32 => "IF",
    62u32 => "INDEX",
    63u32 => "INDIRECT",
    64u32 => "INT",
    65u32 => "INTERCEPT",
    66u32 => "ISBLANK",
    67u32 => "ISERROR",
    68u32 => "ISEVEN",
    69u32 => "ISODD",
    70u32 => "LARGE",
    71u32 => "LCM",
    72u32 => "LEFT",
    73u32 => "LEN",
    74u32 => "LN",
    75u32 => "LOG",
    76u32 => "LOG10",
    77u32 => "LOOKUP",
    78u32 => "LOWER",
    79u32 => "MATCH",
    80u32 => "MAX",
    81u32 => "MAXA",
    82u32 => "MEDIAN",
    83u32 => "MID",
    84u32 => "MIN",
    85u32 => "MINA",
    86u32 => "MINUTE",
    87u32 => "MOD",
    88u32 => "MONTH",
    89u32 => "MONTHNAME",
    90u32 => "NOT",
    91u32 => "NOW",
    92u32 => "ODD",
    93u32 => "OFFSET",
    94u32 => "OR",
    95u32 => "PERCENTILE",
    96u32 => "PI",
    97u32 => "PMT",
    98u32 => "POISSON",
    99u32 => "POWER",
    100u32 => "PRODUCT",
    101u32 => "PROPER",
    102u32 => "QUOTIENT",
    103u32 => "RADIANS",
    104u32 => "RAND",
    105u32 => "RANDBETWEEN",
    106u32 => "RANK",
    107u32 => "REPLACE",
    108u32 => "REPT",
    109u32 => "RIGHT",
    110u32 => "ROMAN",
    111u32 => "ROUND",
    112u32 => "ROUNDDOWN",
    113u32 => "ROUNDUP",
    114u32 => "ROW",
    115u32 => "ROWS",
    116u32 => "SEARCH",
    117u32 => "SECOND",
    118u32 => "SIGN",
    119u32 => "SIN",
    120u32 => "SINH",
    121u32 => "SLOPE",
    122u32 => "SMALL",
    123u32 => "SQRT",
    124u32 => "STDEV",
    125u32 => "STDEVA",
    126u32 => "STDEVP",
    127u32 => "SUBSTITUTE",
    128u32 => "SUM",
    129u32 => "SUMIF",
    130u32 => "SUMIFS",
    131u32 => "SUMPRODUCT",
    132u32 => "SUMSQ",
    133u32 => "T",
    134u32 => "TAN",
    135u32 => "TANH",
    136u32 => "TIME",
    137u32 => "TIMEVALUE",
    138u32 => "TODAY",
    139u32 => "TRIM",
    140u32 => "TRUE",
    141u32 => "TRUNC",
    142u32 => "UPPER",
    143u32 => "VALUE",
    144u32 => "VAR",
    145u32 => "VARA",
    146u32 => "VARP",
    147u32 => "VLOOKUP",
    148u32 => "WEEKDAY",
    149u32 => "WEEKNUM",
    150u32 => "YEAR",
    151u32 => "YEARFRAC",
    152u32 => "SQRTPI",
    153u32 => "TRANSPOSE",
    154u32 => "IFERROR",
    155u32 => "ISNUMBER",
    156u32 => "ISTEXT",
    157u32 => "NETWORKDAYS",
    158u32 => "WORKDAY",
    159u32 => "XIRR",
    160u32 => "XNPV",
    161u32 => "TEXT",
    162u32 => "MROUND",
    163u32 => "UNION.RANGES",
    164u32 => "INTERSECT.RANGES",
    165u32 => "NUMBERVALUE",
    166u32 => "TEXTJOIN",
    167u32 => "IFS",
    168u32 => "SWITCH",
    169u32 => "MAXIFS",
    170u32 => "MINIFS",
};

/// The inverse lookup for the write path.
pub static FUNCTION_NAME_TO_ID: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| {
    FUNCTION_MAP
        .entries()
        .map(|(id, name)| (*name, *id))
        .collect()
});

/// Name for an index, if known.
pub fn function_name(index: u32) -> Option<&'static str> {
    FUNCTION_MAP.get(&index).copied()
}

/// Index for a name, if known.
pub fn function_id(name: &str) -> Option<u32> {
    FUNCTION_NAME_TO_ID.get(name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_both_ways() {
        assert_eq!(function_name(61), Some("IF"));
        assert_eq!(function_id("IF"), Some(61));
        assert_eq!(function_id("SUM"), Some(128));
        assert_eq!(function_name(9999), None);
        assert_eq!(function_id("NO_SUCH_FUNCTION"), None);
    }

    #[test]
    fn test_inverse_is_total() {
        for (id, name) in FUNCTION_MAP.entries() {
            assert_eq!(function_id(name), Some(*id), "inverse missing for {}", name);
        }
    }
}
