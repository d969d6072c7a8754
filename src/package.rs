//! Package reader and writer
//!
//! A Numbers document is either a single zip or a `.numbers` folder
//! ("package"): `Index.zip` holds the IWA entries, `Metadata/` carries the
//! property lists, and everything else (previews, media under `Data/`) is
//! opaque. The reader walks both forms, recurses into nested `Index.zip`
//! entries, routes `.iwa` blobs through the IWA decoder, and refuses
//! encrypted documents (an `.iwph` entry anywhere in the package).
//!
//! All zip and file handles live within the scope of a single read or
//! write call; a loaded document holds no OS handles.

use std::fs;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::iwa::file::{is_iwa_blob, IwaFile};
use crate::store::{FileEntry, ObjectStore};
use crate::{Error, Result};

/// Document format versions this reader has been verified against.
pub const SUPPORTED_VERSIONS: &[&str] = &[
    "12.2", "13.0", "13.1", "13.2", "14.0", "14.1", "14.2", "14.3",
];

/// The encryption sentinel entry name.
const ENCRYPTION_SENTINEL: &str = ".iwph";

/// Read a Numbers document (zip or package folder) into an object store.
///
/// With `strict_version` an unsupported `fileFormatVersion` is an error
/// rather than a warning.
pub fn read_document(path: &Path, strict_version: bool) -> Result<ObjectStore> {
    debug!(path = %path.display(), "reading document");
    if !path.exists() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such file or directory",
        )));
    }

    let mut store = ObjectStore::new();
    if path.is_dir() {
        if path.extension().and_then(|e| e.to_str()) != Some("numbers") {
            return Err(Error::FileFormat(
                "not a .numbers directory".to_string(),
            ));
        }
        check_package_version(path, strict_version)?;
        read_package_dir(path, path, &mut store)?;
    } else {
        let file = fs::File::open(path)?;
        let mut zipf = ZipArchive::new(file)
            .map_err(|_| Error::FileFormat("not a zip archive".to_string()))?;
        check_not_encrypted(&zipf)?;
        check_zip_version(&mut zipf, strict_version)?;
        read_zip_entries(&mut zipf, &mut store)?;
    }
    Ok(store)
}

/// Write the store back to disk.
///
/// With `package` the target is a `.numbers` folder holding `Index.zip`
/// (IWA entries only) beside the other blobs; otherwise a single zip. A
/// zip is never overwritten with a package nor a package with a zip.
pub fn write_document(path: &Path, store: &mut ObjectStore, package: bool) -> Result<()> {
    debug!(path = %path.display(), package, "writing document");
    let entries = store.serialized_files()?;

    if package {
        if path.is_dir() {
            if path.extension().and_then(|e| e.to_str()) != Some("numbers") {
                return Err(Error::FileFormat(
                    "not a .numbers directory".to_string(),
                ));
            }
            if !path.join("Index.zip").is_file() {
                return Err(Error::FileFormat(
                    "folder is not a numbers package".to_string(),
                ));
            }
            check_package_version(path, false)?;
        } else if path.is_file() {
            return Err(Error::FileFormat(
                "cannot overwrite Numbers document file with package".to_string(),
            ));
        } else {
            fs::create_dir(path)?;
        }

        let index = fs::File::create(path.join("Index.zip"))?;
        let mut zipw = ZipWriter::new(index);
        for (name, is_iwa, bytes) in &entries {
            if *is_iwa {
                write_zip_entry(&mut zipw, name, bytes)?;
            } else {
                let target = path.join(name);
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(target, bytes)?;
            }
        }
        zipw.finish()?;
    } else {
        if path.is_dir() {
            return Err(Error::FileFormat(
                "cannot overwrite package with Numbers document file".to_string(),
            ));
        }
        let file = fs::File::create(path)?;
        let mut zipw = ZipWriter::new(file);
        for (name, _, bytes) in &entries {
            write_zip_entry(&mut zipw, name, bytes)?;
        }
        zipw.finish()?;
    }
    Ok(())
}

fn write_zip_entry<W: Write + Seek>(zipw: &mut ZipWriter<W>, name: &str, bytes: &[u8]) -> Result<()> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zipw.start_file(name, options)?;
    zipw.write_all(bytes)?;
    Ok(())
}

/// Validate `Metadata/Properties.plist` in a package folder.
fn check_package_version(path: &Path, strict: bool) -> Result<()> {
    let properties = path.join("Metadata/Properties.plist");
    let build_history = path.join("Metadata/BuildVersionHistory.plist");
    if !properties.is_file() || !build_history.is_file() {
        return Err(Error::FileFormat("missing metadata files".to_string()));
    }
    let blob = fs::read(&properties)?;
    check_version_blob(&blob, strict)
}

/// Validate the property list entries inside a document zip.
fn check_zip_version<R: Read + Seek>(zipf: &mut ZipArchive<R>, strict: bool) -> Result<()> {
    let mut metadata: Vec<String> = zipf
        .file_names()
        .filter(|name| {
            name.ends_with("Metadata/Properties.plist")
                || name.ends_with("Metadata/BuildVersionHistory.plist")
        })
        .map(str::to_string)
        .collect();
    if metadata.len() != 2 {
        return Err(Error::FileFormat("missing metadata files".to_string()));
    }
    metadata.sort();
    // Properties.plist sorts after BuildVersionHistory.plist.
    let mut entry = zipf.by_name(&metadata[1])?;
    let mut blob = Vec::new();
    entry.read_to_end(&mut blob)?;
    check_version_blob(&blob, strict)
}

fn check_version_blob(blob: &[u8], strict: bool) -> Result<()> {
    let version = match plist::Value::from_reader(Cursor::new(blob)) {
        Ok(value) => value
            .as_dictionary()
            .and_then(|dict| dict.get("fileFormatVersion"))
            .and_then(|v| v.as_string())
            .map(str::to_string)
            .unwrap_or_default(),
        Err(_) => {
            // Numbers tolerates malformed property lists, but not missing
            // metadata files.
            warn!("can't read Numbers version from document");
            String::new()
        }
    };

    if !version.is_empty() && !SUPPORTED_VERSIONS.contains(&version.as_str()) {
        if strict {
            return Err(Error::Unsupported(format!("document version {}", version)));
        }
        warn!(version = %version, "unsupported document version");
    }
    Ok(())
}

/// Walk a package directory, storing blobs and decoding IWA entries.
fn read_package_dir(root: &Path, dir: &Path, store: &mut ObjectStore) -> Result<()> {
    let mut paths: Vec<_> = fs::read_dir(dir)?
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .map(|entry| entry.path())
        .collect();
    paths.sort();

    for sub_path in paths {
        if sub_path.is_dir() {
            read_package_dir(root, &sub_path, store)?;
        } else if sub_path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.eq_ignore_ascii_case("index.zip"))
        {
            let file = fs::File::open(&sub_path)?;
            let mut zipf = ZipArchive::new(file)
                .map_err(|_| Error::FileFormat("invalid Index.zip".to_string()))?;
            read_zip_entries(&mut zipf, store)?;
        } else {
            let blob = fs::read(&sub_path)?;
            let name = sub_path
                .strip_prefix(root)
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_else(|_| sub_path.to_string_lossy().into_owned());
            store_blob(&name, blob, store)?;
        }
    }
    Ok(())
}

/// Refuse documents carrying the encryption sentinel.
fn check_not_encrypted<R: Read + Seek>(zipf: &ZipArchive<R>) -> Result<()> {
    if zipf
        .file_names()
        .any(|name| name == ENCRYPTION_SENTINEL || name.ends_with("/.iwph"))
    {
        return Err(Error::Encrypted);
    }
    Ok(())
}

/// Walk a zip stream, recursing into nested `Index.zip` entries.
fn read_zip_entries<R: Read + Seek>(zipf: &mut ZipArchive<R>, store: &mut ObjectStore) -> Result<()> {
    check_not_encrypted(zipf)?;
    let names: Vec<String> = zipf.file_names().map(str::to_string).collect();

    for name in names {
        if name.ends_with('/') {
            continue;
        }
        let mut entry = zipf.by_name(&name)?;
        let mut blob = Vec::new();
        entry.read_to_end(&mut blob)?;
        drop(entry);

        if name.to_lowercase().ends_with("index.zip") {
            let mut nested = ZipArchive::new(Cursor::new(blob))
                .map_err(|_| Error::FileFormat("invalid nested Index.zip".to_string()))?;
            read_zip_entries(&mut nested, store)?;
        } else {
            store_blob(&name, blob, store)?;
        }
    }
    Ok(())
}

/// Store one inner entry, decoding it as IWA when it looks like one.
fn store_blob(name: &str, blob: Vec<u8>, store: &mut ObjectStore) -> Result<()> {
    if name.ends_with(".iwa") && is_iwa_blob(&blob) {
        let iwaf = IwaFile::from_buffer(&blob)
            .map_err(|e| Error::FileFormat(format!("{}: invalid IWA file ({})", name, e)))?;
        // Some archives carry multiple objects; only the first is exposed
        // through the store, the rest round-trip inside the segment.
        for segment in &iwaf.segments {
            if let Some(message) = segment.object() {
                store.insert_object(segment.identifier(), message.clone(), name);
            }
        }
        debug!(name, segments = iwaf.segments.len(), "stored IWA file");
        store.insert_file(name, FileEntry::Iwa(iwaf));
    } else {
        debug!(name, bytes = blob.len(), "stored blob");
        store.insert_file(name, FileEntry::Blob(blob));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iwa::archive::ArchiveSegment;
    use crate::iwa::registry::Message;
    use crate::proto::tn;

    fn minimal_store() -> ObjectStore {
        let mut store = ObjectStore::new();
        let segment = ArchiveSegment::new(
            1,
            Message::Sheet(tn::SheetArchive {
                name: Some("Sheet 1".to_string()),
                drawable_infos: vec![],
            }),
        );
        store.insert_file(
            "Index/Document.iwa",
            FileEntry::Iwa(IwaFile {
                segments: vec![segment],
            }),
        );
        store.insert_file("Metadata/Properties.plist", FileEntry::Blob(plist_blob()));
        store.insert_file(
            "Metadata/BuildVersionHistory.plist",
            FileEntry::Blob(b"<plist><array/></plist>".to_vec()),
        );
        store
    }

    fn plist_blob() -> Vec<u8> {
        let mut dict = plist::Dictionary::new();
        dict.insert(
            "fileFormatVersion".to_string(),
            plist::Value::String("14.1".to_string()),
        );
        let mut out = Vec::new();
        plist::Value::Dictionary(dict)
            .to_writer_xml(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn test_zip_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.numbers");

        let mut store = minimal_store();
        write_document(&path, &mut store, false).unwrap();

        let reloaded = read_document(&path, false).unwrap();
        assert!(reloaded.get(1).is_ok());
        assert_eq!(reloaded.find_by_type("TN.SheetArchive"), vec![1]);
    }

    #[test]
    fn test_package_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.numbers");

        let mut store = minimal_store();
        write_document(&path, &mut store, true).unwrap();
        assert!(path.join("Index.zip").is_file());
        assert!(path.join("Metadata/Properties.plist").is_file());

        let reloaded = read_document(&path, false).unwrap();
        assert!(reloaded.get(1).is_ok());
    }

    #[test]
    fn test_refuses_shape_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.numbers");

        let mut store = minimal_store();
        write_document(&path, &mut store, false).unwrap();
        // Overwriting the zip with a package is refused.
        assert!(matches!(
            write_document(&path, &mut store, true),
            Err(Error::FileFormat(_))
        ));
    }

    #[test]
    fn test_encrypted_document_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked.numbers");

        let file = fs::File::create(&path).unwrap();
        let mut zipw = ZipWriter::new(file);
        write_zip_entry(&mut zipw, ".iwph", b"0").unwrap();
        write_zip_entry(&mut zipw, "Index/Document.iwa", &[0u8; 16]).unwrap();
        zipw.finish().unwrap();

        assert!(matches!(
            read_document(&path, false),
            Err(Error::Encrypted)
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            read_document(Path::new("/nonexistent/file.numbers"), false),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_strict_version_escalates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.numbers");

        let mut store = minimal_store();
        let mut dict = plist::Dictionary::new();
        dict.insert(
            "fileFormatVersion".to_string(),
            plist::Value::String("9.0".to_string()),
        );
        let mut blob = Vec::new();
        plist::Value::Dictionary(dict)
            .to_writer_xml(&mut blob)
            .unwrap();
        store.insert_file("Metadata/Properties.plist", FileEntry::Blob(blob));
        write_document(&path, &mut store, false).unwrap();

        assert!(read_document(&path, false).is_ok());
        assert!(matches!(
            read_document(&path, true),
            Err(Error::Unsupported(_))
        ));
    }
}
