//! Numbers document archives (`TN` namespace)

use super::HasReferences;
use super::tsp;

/// Root archive of a Numbers document.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DocumentArchive {
    #[prost(message, repeated, tag = "1")]
    pub sheets: Vec<tsp::Reference>,
    #[prost(message, optional, tag = "3")]
    pub calculation_engine: Option<tsp::Reference>,
    #[prost(message, optional, tag = "4")]
    pub stylesheet: Option<tsp::Reference>,
    #[prost(message, optional, tag = "5")]
    pub custom_format_list: Option<tsp::Reference>,
}

impl HasReferences for DocumentArchive {
    fn collect_references(&self, out: &mut Vec<u64>) {
        self.sheets.collect_references(out);
        self.calculation_engine.collect_references(out);
        self.stylesheet.collect_references(out);
        self.custom_format_list.collect_references(out);
    }
}

/// A sheet: a named canvas holding table drawables.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SheetArchive {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(message, repeated, tag = "2")]
    pub drawable_infos: Vec<tsp::Reference>,
}

impl HasReferences for SheetArchive {
    fn collect_references(&self, out: &mut Vec<u64>) {
        self.drawable_infos.collect_references(out);
    }
}
