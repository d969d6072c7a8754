//! Archive message definitions for Numbers documents
//!
//! Numbers serialises its object graph as Protocol Buffers messages inside
//! IWA archive segments. The message set here is the subset of Apple's
//! archive namespaces that this crate models, maintained as hand-written
//! `prost` structs generated offline from the application's descriptors and
//! committed so the crate builds without a protoc step.
//!
//! Namespaces follow Apple's prefixes:
//! - `tsp`: shared persistence types (archive headers, references, UUIDs)
//! - `tn`: Numbers document and sheet archives
//! - `tst`: table archives (models, tiles, data lists)
//! - `tsce`: calculation engine archives (formulas, dependency tracking)
//! - `tsk`: format records and custom format lists
//! - `tswp`: text storage and style archives

pub mod tn;
pub mod tsce;
pub mod tsk;
pub mod tsp;
pub mod tst;
pub mod tswp;

/// Recursive collection of `TSP.Reference` identifiers embedded in a message.
///
/// When a mutated object is copied back into its archive segment, the
/// segment header's `object_references` list must be rewritten to match the
/// references actually present in the message tree.
pub trait HasReferences {
    /// Append every referenced object identifier, in field order.
    fn collect_references(&self, out: &mut Vec<u64>);
}

impl<T: HasReferences> HasReferences for Option<T> {
    fn collect_references(&self, out: &mut Vec<u64>) {
        if let Some(inner) = self {
            inner.collect_references(out);
        }
    }
}

impl<T: HasReferences> HasReferences for Vec<T> {
    fn collect_references(&self, out: &mut Vec<u64>) {
        for item in self {
            item.collect_references(out);
        }
    }
}
