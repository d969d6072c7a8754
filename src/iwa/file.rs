//! Whole-file IWA codec
//!
//! An IWA file is an ordered, non-empty sequence of compressed chunks;
//! decompressing them in order yields one stream of archive segments.
//! Multi-chunk inputs are merged on decode, so a re-encoded file always
//! carries a single logical chunk split into Snappy windows.

use crate::iwa::archive::ArchiveSegment;
use crate::iwa::snappy;
use crate::{Error, Result};

/// Minimum plausible size of an IWA blob: chunk header plus a varint
/// header length plus a tiny archive header.
const MIN_IWA_LEN: usize = 12;

/// Whether a blob looks like an IWA file (leading framing byte 0x00).
pub fn is_iwa_blob(data: &[u8]) -> bool {
    !data.is_empty() && data[0] == 0x00
}

/// A decoded IWA file: the archive segments of its merged chunk stream.
#[derive(Debug, Clone, PartialEq)]
pub struct IwaFile {
    pub segments: Vec<ArchiveSegment>,
}

impl IwaFile {
    /// Decode an IWA file from its on-disk bytes.
    pub fn from_buffer(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_IWA_LEN {
            return Err(Error::FileFormat(format!(
                "IWA file too short ({} bytes)",
                data.len()
            )));
        }

        let stream = snappy::decompress_stream(data)?;
        let mut segments = Vec::new();
        let mut pos = 0;
        while pos < stream.len() {
            let (segment, consumed) = ArchiveSegment::parse(&stream[pos..])?;
            segments.push(segment);
            pos += consumed;
        }

        if segments.is_empty() {
            return Err(Error::FileFormat("IWA file holds no segments".to_string()));
        }
        Ok(Self { segments })
    }

    /// Encode back to on-disk bytes: segment buffers concatenated, then
    /// compressed window by window.
    pub fn to_buffer(&mut self) -> Result<Vec<u8>> {
        let mut stream = Vec::new();
        for segment in &mut self.segments {
            stream.extend(segment.to_buffer());
        }
        snappy::compress_stream(&stream)
    }

    /// Find a segment by object identifier.
    pub fn segment_mut(&mut self, identifier: u64) -> Option<&mut ArchiveSegment> {
        self.segments
            .iter_mut()
            .find(|s| s.identifier() == identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iwa::registry::Message;
    use crate::proto::tn;

    fn test_file() -> IwaFile {
        let segments = (1..=3u64)
            .map(|id| {
                ArchiveSegment::new(
                    id,
                    Message::Sheet(tn::SheetArchive {
                        name: Some(format!("Sheet {}", id)),
                        drawable_infos: vec![],
                    }),
                )
            })
            .collect();
        IwaFile { segments }
    }

    #[test]
    fn test_file_round_trip_stabilises() {
        let mut file = test_file();
        let first = file.to_buffer().unwrap();

        let mut reparsed = IwaFile::from_buffer(&first).unwrap();
        assert_eq!(reparsed, file);

        // Encode of decode is byte-identical from the first re-encode on.
        let second = reparsed.to_buffer().unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn test_segment_order_preserved() {
        let mut file = test_file();
        let bytes = file.to_buffer().unwrap();
        let reparsed = IwaFile::from_buffer(&bytes).unwrap();
        let ids: Vec<u64> = reparsed.segments.iter().map(|s| s.identifier()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_multi_chunk_input_merges() {
        // Two separately compressed chunks decode into one segment stream.
        let mut file = test_file();
        let mut stream = Vec::new();
        for segment in &mut file.segments {
            stream.extend(segment.to_buffer());
        }
        let split = stream.len() / 2;
        let mut bytes = snappy::compress_stream(&stream[..split]).unwrap();
        bytes.extend(snappy::compress_stream(&stream[split..]).unwrap());

        let reparsed = IwaFile::from_buffer(&bytes).unwrap();
        assert_eq!(reparsed, file);
    }

    #[test]
    fn test_too_short_rejected() {
        assert!(matches!(
            IwaFile::from_buffer(&[0x00; 4]),
            Err(Error::FileFormat(_))
        ));
    }

    #[test]
    fn test_is_iwa_blob() {
        assert!(is_iwa_blob(&[0x00, 1, 2]));
        assert!(!is_iwa_blob(&[0x50, 0x4B]));
        assert!(!is_iwa_blob(&[]));
    }
}
