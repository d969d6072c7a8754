//! Text storage and style archives (`TSWP` namespace)

use super::HasReferences;
use super::tsp;

/// Rich text storage: paragraphs plus their list styles and smart fields.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StorageArchive {
    #[prost(string, repeated, tag = "1")]
    pub text: Vec<String>,
    #[prost(message, repeated, tag = "2")]
    pub table_list_style: Vec<ParagraphListStyle>,
    #[prost(message, repeated, tag = "3")]
    pub table_smartfield: Vec<SmartFieldEntry>,
}

impl HasReferences for StorageArchive {
    fn collect_references(&self, _out: &mut Vec<u64>) {}
}

/// List style applied to one paragraph (by index into the split text).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ParagraphListStyle {
    #[prost(uint32, tag = "1")]
    pub paragraph_index: u32,
    #[prost(message, optional, tag = "2")]
    pub list_style: Option<ListStyleArchive>,
}

/// Bullet numbering forms for list styles.
pub mod list_label {
    pub const NONE: u32 = 0;
    pub const CHARACTER: u32 = 1;
    pub const NUMERIC_DECIMAL: u32 = 2;
    pub const NUMERIC_DOUBLE_PAREN: u32 = 3;
    pub const NUMERIC_RIGHT_PAREN: u32 = 4;
    pub const ROMAN_UPPER_DECIMAL: u32 = 5;
    pub const ROMAN_UPPER_DOUBLE_PAREN: u32 = 6;
    pub const ROMAN_UPPER_RIGHT_PAREN: u32 = 7;
    pub const ROMAN_LOWER_DECIMAL: u32 = 8;
    pub const ROMAN_LOWER_DOUBLE_PAREN: u32 = 9;
    pub const ROMAN_LOWER_RIGHT_PAREN: u32 = 10;
    pub const ALPHA_UPPER_DECIMAL: u32 = 11;
    pub const ALPHA_UPPER_DOUBLE_PAREN: u32 = 12;
    pub const ALPHA_UPPER_RIGHT_PAREN: u32 = 13;
    pub const ALPHA_LOWER_DECIMAL: u32 = 14;
    pub const ALPHA_LOWER_DOUBLE_PAREN: u32 = 15;
    pub const ALPHA_LOWER_RIGHT_PAREN: u32 = 16;
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListStyleArchive {
    /// One of the `list_label` forms.
    #[prost(uint32, tag = "1")]
    pub label_type: u32,
    /// Literal bullet character for `list_label::CHARACTER`.
    #[prost(string, optional, tag = "2")]
    pub bullet_character: Option<String>,
}

/// A hyperlink (or other smart field) attached to a text range.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SmartFieldEntry {
    #[prost(uint32, tag = "1")]
    pub range_begin: u32,
    #[prost(uint32, tag = "2")]
    pub range_end: u32,
    #[prost(string, optional, tag = "3")]
    pub url: Option<String>,
}

/// Text style referenced from the style data list.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TextStyleArchive {
    #[prost(message, optional, tag = "1")]
    pub char_properties: Option<CharacterStylePropertiesArchive>,
    #[prost(message, optional, tag = "2")]
    pub para_properties: Option<ParagraphStylePropertiesArchive>,
    #[prost(string, optional, tag = "3")]
    pub style_name: Option<String>,
}

impl HasReferences for TextStyleArchive {
    fn collect_references(&self, _out: &mut Vec<u64>) {}
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CharacterStylePropertiesArchive {
    #[prost(bool, optional, tag = "1")]
    pub bold: Option<bool>,
    #[prost(bool, optional, tag = "2")]
    pub italic: Option<bool>,
    #[prost(uint32, optional, tag = "3")]
    pub underline: Option<u32>,
    #[prost(uint32, optional, tag = "4")]
    pub strikethru: Option<u32>,
    #[prost(float, optional, tag = "5")]
    pub font_size: Option<f32>,
    #[prost(string, optional, tag = "6")]
    pub font_name: Option<String>,
    #[prost(message, optional, tag = "7")]
    pub font_color: Option<tsp::Color>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ParagraphStylePropertiesArchive {
    /// 0 left, 1 right, 2 center, 3 justified, 4 auto.
    #[prost(uint32, optional, tag = "1")]
    pub alignment: Option<u32>,
    #[prost(float, optional, tag = "2")]
    pub first_line_indent: Option<f32>,
    #[prost(float, optional, tag = "3")]
    pub left_indent: Option<f32>,
    #[prost(float, optional, tag = "4")]
    pub right_indent: Option<f32>,
}
