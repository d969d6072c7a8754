//! Document-wide object store
//!
//! Maps every archive segment identifier to its decoded message and tracks
//! which inner package file each object came from. Mutations go through
//! [`ObjectStore::mark_dirty`]; on save, [`ObjectStore::flush_dirty`]
//! copies the current messages back into their originating segments so the
//! in-memory IWA files are byte-exact representations of what will be
//! written.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::iwa::archive::ArchiveSegment;
use crate::iwa::registry::Message;
use crate::iwa::IwaFile;
use crate::{Error, Result};

/// One inner entry of the package: a decoded IWA file or an opaque blob.
#[derive(Debug, Clone, PartialEq)]
pub enum FileEntry {
    Iwa(IwaFile),
    Blob(Vec<u8>),
}

/// The document-wide object and file store.
#[derive(Debug, Default)]
pub struct ObjectStore {
    objects: HashMap<u64, Message>,
    /// Discovery order of object identifiers during package traversal.
    object_order: Vec<u64>,
    file_of: HashMap<u64, String>,
    files: HashMap<String, FileEntry>,
    /// Insertion order of file paths, for stable byte-level round-trips.
    file_order: Vec<String>,
    dirty: HashSet<u64>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a decoded object and remember which file holds it.
    pub fn insert_object(&mut self, identifier: u64, message: Message, path: &str) {
        if !self.objects.contains_key(&identifier) {
            self.object_order.push(identifier);
        }
        self.objects.insert(identifier, message);
        self.file_of.insert(identifier, path.to_string());
    }

    /// Store an inner package entry.
    pub fn insert_file(&mut self, path: &str, entry: FileEntry) {
        if !self.files.contains_key(path) {
            self.file_order.push(path.to_string());
        }
        self.files.insert(path.to_string(), entry);
    }

    /// Look up an object by identifier.
    pub fn get(&self, identifier: u64) -> Result<&Message> {
        self.objects
            .get(&identifier)
            .ok_or(Error::NoSuchObject(identifier))
    }

    /// Mutable access to an object; the caller is responsible for marking
    /// it dirty once mutated.
    pub fn get_mut(&mut self, identifier: u64) -> Result<&mut Message> {
        self.objects
            .get_mut(&identifier)
            .ok_or(Error::NoSuchObject(identifier))
    }

    pub fn contains(&self, identifier: u64) -> bool {
        self.objects.contains_key(&identifier)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// All identifiers whose object decodes to the named archive type, in
    /// discovery order.
    pub fn find_by_type(&self, full_name: &str) -> Vec<u64> {
        self.object_order
            .iter()
            .filter(|id| {
                self.objects
                    .get(*id)
                    .and_then(Message::type_name)
                    .is_some_and(|name| name == full_name)
            })
            .copied()
            .collect()
    }

    pub fn mark_dirty(&mut self, identifier: u64) {
        self.dirty.insert(identifier);
    }

    /// The next free object identifier: one above the current maximum.
    pub fn new_id(&self) -> u64 {
        self.objects.keys().copied().max().unwrap_or(0) + 1
    }

    /// Create a new single-object archive segment in the IWA file named by
    /// `path_pattern` (any `{}` is replaced with the new identifier; the
    /// file is created when absent). Returns the new identifier.
    pub fn create_object(&mut self, path_pattern: &str, message: Message) -> u64 {
        let identifier = self.new_id();
        let path = path_pattern.replace("{}", &identifier.to_string());
        let segment = ArchiveSegment::new(identifier, message.clone());

        match self.files.get_mut(&path) {
            Some(FileEntry::Iwa(file)) => file.segments.push(segment),
            _ => {
                debug!(path = %path, identifier, "creating IWA file for new object");
                self.insert_file(
                    &path,
                    FileEntry::Iwa(IwaFile {
                        segments: vec![segment],
                    }),
                );
            }
        }

        self.insert_object(identifier, message, &path);
        self.mark_dirty(identifier);
        identifier
    }

    /// Copy every dirty object back into its originating archive segment,
    /// rewriting each segment's reference list from the message tree.
    pub fn flush_dirty(&mut self) -> Result<()> {
        let dirty: Vec<u64> = self.dirty.drain().collect();
        for identifier in dirty {
            let message = self
                .objects
                .get(&identifier)
                .ok_or(Error::NoSuchObject(identifier))?
                .clone();
            let path = self
                .file_of
                .get(&identifier)
                .ok_or(Error::NoSuchObject(identifier))?
                .clone();
            let Some(FileEntry::Iwa(file)) = self.files.get_mut(&path) else {
                return Err(Error::FileFormat(format!(
                    "object {} maps to non-IWA entry {}",
                    identifier, path
                )));
            };
            let segment = file
                .segment_mut(identifier)
                .ok_or(Error::NoSuchObject(identifier))?;
            segment.replace_object(message);
        }
        Ok(())
    }

    /// Inner entries in insertion order, for the package writer.
    pub fn files(&self) -> impl Iterator<Item = (&str, &FileEntry)> {
        self.file_order
            .iter()
            .filter_map(|path| self.files.get(path).map(|entry| (path.as_str(), entry)))
    }

    /// Serialise every inner entry in insertion order: IWA entries are
    /// re-encoded, blobs pass through. Used by the package writer.
    pub fn serialized_files(&mut self) -> Result<Vec<(String, bool, Vec<u8>)>> {
        let mut out = Vec::with_capacity(self.file_order.len());
        for path in &self.file_order {
            let Some(entry) = self.files.get_mut(path) else {
                continue;
            };
            match entry {
                FileEntry::Iwa(file) => out.push((path.clone(), true, file.to_buffer()?)),
                FileEntry::Blob(blob) => out.push((path.clone(), false, blob.clone())),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::tn;

    fn sheet(name: &str) -> Message {
        Message::Sheet(tn::SheetArchive {
            name: Some(name.to_string()),
            drawable_infos: vec![],
        })
    }

    fn store_with_sheet(identifier: u64) -> ObjectStore {
        let mut store = ObjectStore::new();
        let segment = ArchiveSegment::new(identifier, sheet("Sheet 1"));
        store.insert_file(
            "Index/Document.iwa",
            FileEntry::Iwa(IwaFile {
                segments: vec![segment],
            }),
        );
        store.insert_object(identifier, sheet("Sheet 1"), "Index/Document.iwa");
        store
    }

    #[test]
    fn test_get_and_missing() {
        let store = store_with_sheet(4);
        assert!(store.get(4).is_ok());
        assert!(matches!(store.get(5), Err(Error::NoSuchObject(5))));
    }

    #[test]
    fn test_find_by_type_in_discovery_order() {
        let mut store = store_with_sheet(4);
        store.insert_object(2, sheet("Sheet 2"), "Index/Document.iwa");
        store.insert_object(9, sheet("Sheet 3"), "Index/Document.iwa");
        assert_eq!(store.find_by_type("TN.SheetArchive"), vec![4, 2, 9]);
        assert!(store.find_by_type("TN.DocumentArchive").is_empty());
    }

    #[test]
    fn test_new_id_is_monotonic() {
        let mut store = store_with_sheet(41);
        assert_eq!(store.new_id(), 42);
        let id = store.create_object("Index/Extra-{}.iwa", sheet("New"));
        assert_eq!(id, 42);
        assert_eq!(store.new_id(), 43);
    }

    #[test]
    fn test_create_object_makes_file_from_pattern() {
        let mut store = store_with_sheet(1);
        let id = store.create_object("Index/Tables/DataList-{}.iwa", sheet("X"));
        let path = format!("Index/Tables/DataList-{}.iwa", id);
        assert!(matches!(
            store.files.get(path.as_str()),
            Some(FileEntry::Iwa(_))
        ));
        assert_eq!(store.file_of.get(&id), Some(&path));
    }

    #[test]
    fn test_flush_dirty_updates_segment() {
        let mut store = store_with_sheet(4);
        *store.get_mut(4).unwrap() = sheet("Renamed");
        store.mark_dirty(4);
        store.flush_dirty().unwrap();

        let Some(FileEntry::Iwa(file)) = store.files.get("Index/Document.iwa") else {
            panic!("missing IWA entry");
        };
        let segment = &file.segments[0];
        assert_eq!(segment.object(), Some(&sheet("Renamed")));
        assert!(store.dirty.is_empty());
    }

    #[test]
    fn test_file_order_is_stable() {
        let mut store = ObjectStore::new();
        for name in ["b.bin", "a.bin", "c.bin"] {
            store.insert_file(name, FileEntry::Blob(vec![]));
        }
        let order: Vec<&str> = store.files().map(|(path, _)| path).collect();
        assert_eq!(order, vec!["b.bin", "a.bin", "c.bin"]);
    }
}
