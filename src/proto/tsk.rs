//! Format records and custom format lists (`TSK` namespace)

use super::HasReferences;
use super::tsp;

/// Format-type codes carried in `FormatStructArchive::format_type`.
///
/// The values match the application's format enumeration; only the codes
/// the renderer dispatches on are named here.
pub mod format_type {
    pub const BOOLEAN: u32 = 1;
    pub const DECIMAL: u32 = 256;
    pub const CURRENCY: u32 = 257;
    pub const PERCENT: u32 = 258;
    pub const TEXT: u32 = 260;
    pub const DATE: u32 = 261;
    pub const FRACTION: u32 = 262;
    pub const CHECKBOX: u32 = 263;
    pub const RATING: u32 = 267;
    pub const DURATION: u32 = 268;
    pub const CUSTOM_NUMBER: u32 = 270;
    pub const CUSTOM_TEXT: u32 = 271;
    pub const CUSTOM_DATE: u32 = 272;
    pub const CUSTOM_CURRENCY: u32 = 274;
}

/// A format record from the format data list (or a custom format's
/// default format).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FormatStructArchive {
    #[prost(uint32, tag = "1")]
    pub format_type: u32,
    #[prost(uint32, optional, tag = "2")]
    pub decimal_places: Option<u32>,
    #[prost(bool, optional, tag = "3")]
    pub show_thousands_separator: Option<bool>,
    #[prost(string, optional, tag = "4")]
    pub currency_code: Option<String>,
    #[prost(string, optional, tag = "5")]
    pub date_time_format: Option<String>,
    #[prost(uint32, optional, tag = "6")]
    pub duration_style: Option<u32>,
    #[prost(uint32, optional, tag = "7")]
    pub duration_unit_largest: Option<u32>,
    #[prost(uint32, optional, tag = "8")]
    pub duration_unit_smallest: Option<u32>,
    #[prost(bool, optional, tag = "9")]
    pub use_automatic_duration_units: Option<bool>,
    /// Fixed denominator, or a negative two's-complement digit count.
    #[prost(uint32, optional, tag = "10")]
    pub fraction_accuracy: Option<u32>,
    /// Links to an entry in the document's custom format list.
    #[prost(message, optional, tag = "11")]
    pub custom_uid: Option<tsp::Uuid>,
    #[prost(double, optional, tag = "12")]
    pub scale_factor: Option<f64>,
    #[prost(bool, optional, tag = "13")]
    pub requires_fraction_replacement: Option<bool>,
    #[prost(string, optional, tag = "14")]
    pub custom_format_string: Option<String>,
    #[prost(uint32, optional, tag = "15")]
    pub num_nonspace_integer_digits: Option<u32>,
    #[prost(uint32, optional, tag = "16")]
    pub num_nonspace_decimal_digits: Option<u32>,
    #[prost(uint32, optional, tag = "17")]
    pub min_integer_width: Option<u32>,
    #[prost(uint32, optional, tag = "18")]
    pub negative_style: Option<u32>,
}

/// Document-wide list of user-defined custom formats keyed by UUID.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CustomFormatListArchive {
    #[prost(message, repeated, tag = "1")]
    pub custom_formats: Vec<CustomFormatArchive>,
    #[prost(message, repeated, tag = "2")]
    pub uuids: Vec<tsp::Uuid>,
}

impl HasReferences for CustomFormatListArchive {
    fn collect_references(&self, _out: &mut Vec<u64>) {}
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CustomFormatArchive {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(message, optional, tag = "2")]
    pub default_format: Option<FormatStructArchive>,
}
