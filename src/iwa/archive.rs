//! IWA archive segment codec
//!
//! A segment is a varint-prefixed `TSP.ArchiveInfo` header followed by the
//! concatenated message payloads its `MessageInfo` entries describe. Every
//! segment carries a document-unique identifier; the first payload is "the"
//! object of the segment, and any additional payloads are preserved and
//! re-emitted but not exposed.
//!
//! Segments whose payload patches a base message (`type == 0` together with
//! `should_merge` on the header) are read-only: their bytes are retained
//! verbatim and re-emitted unchanged.

use prost::Message as _;
use tracing::warn;

use crate::iwa::registry::{self, Message};
use crate::iwa::varint;
use crate::proto::tsp;
use crate::{Error, Result};

/// One payload slot in a segment.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectSlot {
    /// A decoded message (possibly an [`Message::Unknown`] passthrough).
    Parsed(Message),
    /// An opaque diff payload of the message at `base_message_index`.
    Patched { base_type: u32, data: Vec<u8> },
}

impl ObjectSlot {
    /// The serialised payload bytes for this slot.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            ObjectSlot::Parsed(msg) => msg.encode().1,
            ObjectSlot::Patched { data, .. } => data.clone(),
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            ObjectSlot::Parsed(msg) => Some(msg),
            ObjectSlot::Patched { .. } => None,
        }
    }
}

/// A parsed archive segment: header plus payload slots.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveSegment {
    pub header: tsp::ArchiveInfo,
    pub objects: Vec<ObjectSlot>,
}

impl ArchiveSegment {
    /// Build a fresh single-object segment with the given identifier.
    pub fn new(identifier: u64, message: Message) -> Self {
        let (type_id, bytes) = message.encode();
        let header = tsp::ArchiveInfo {
            identifier: Some(identifier),
            message_infos: vec![tsp::MessageInfo {
                r#type: type_id,
                version: vec![1, 0, 5],
                length: bytes.len() as u32,
                object_references: message.references(),
                base_message_index: None,
                diff_field_path: None,
            }],
            should_merge: None,
        };
        Self {
            header,
            objects: vec![ObjectSlot::Parsed(message)],
        }
    }

    /// The document-wide object identifier of this segment.
    pub fn identifier(&self) -> u64 {
        self.header.identifier.unwrap_or(0)
    }

    /// The segment's primary object, if its slot decoded to a message.
    pub fn object(&self) -> Option<&Message> {
        self.objects.first().and_then(ObjectSlot::as_message)
    }

    /// Parse one segment from the front of `buf`.
    ///
    /// Returns the segment and the number of bytes consumed. Payload type
    /// IDs outside the registry decode to [`Message::Unknown`] with a
    /// warning rather than failing the load.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        let (header_len, varint_len) = varint::decode_varint(buf)?;
        let header_len = header_len as usize;
        let mut pos = varint_len;

        if buf.len() - pos < header_len {
            return Err(Error::FileFormat(
                "truncated archive segment header".to_string(),
            ));
        }
        let header = tsp::ArchiveInfo::decode(&buf[pos..pos + header_len])
            .map_err(|e| Error::FileFormat(format!("malformed archive header: {}", e)))?;
        pos += header_len;

        let should_merge = header.should_merge.unwrap_or(false);
        let mut objects = Vec::with_capacity(header.message_infos.len());

        for (index, info) in header.message_infos.iter().enumerate() {
            let length = info.length as usize;
            if buf.len() - pos < length {
                return Err(Error::FileFormat(format!(
                    "archive payload overruns buffer ({} bytes wanted)",
                    length
                )));
            }
            let payload = &buf[pos..pos + length];
            pos += length;

            if info.r#type == 0 && should_merge && index > 0 {
                let base_index = info.base_message_index.unwrap_or(0) as usize;
                let base_type = header
                    .message_infos
                    .get(base_index)
                    .map(|base| base.r#type)
                    .unwrap_or(0);
                objects.push(ObjectSlot::Patched {
                    base_type,
                    data: payload.to_vec(),
                });
                continue;
            }

            let slot = match registry::decode(info.r#type, payload) {
                Ok(msg) => ObjectSlot::Parsed(msg),
                Err(Error::UnknownMessageType(type_id)) => {
                    warn!(type_id, "unregistered archive type; preserving raw bytes");
                    ObjectSlot::Parsed(Message::Unknown {
                        type_id,
                        data: payload.to_vec(),
                    })
                }
                Err(e) => return Err(e),
            };
            objects.push(slot);
        }

        Ok((Self { header, objects }, pos))
    }

    /// Serialise the segment: varint header length, header, payloads.
    ///
    /// Each `MessageInfo.length` is first updated to match the payload it
    /// describes, so the emitted header always agrees with the bytes that
    /// follow.
    pub fn to_buffer(&mut self) -> Vec<u8> {
        let payloads: Vec<Vec<u8>> = self.objects.iter().map(ObjectSlot::to_bytes).collect();
        for (info, payload) in self.header.message_infos.iter_mut().zip(&payloads) {
            let length = payload.len() as u32;
            if info.length != length {
                info.length = length;
            }
        }

        let header_bytes = self.header.encode_to_vec();
        let mut out = Vec::new();
        varint::write_varint(&mut out, header_bytes.len() as u64);
        out.extend(header_bytes);
        for payload in payloads {
            out.extend(payload);
        }
        out
    }

    /// Replace the primary object and refresh the header's reference list
    /// from the references embedded in the new message.
    pub fn replace_object(&mut self, message: Message) {
        let references = message.references();
        if let Some(info) = self.header.message_infos.first_mut() {
            info.object_references = references;
        }
        if self.objects.is_empty() {
            self.objects.push(ObjectSlot::Parsed(message));
        } else {
            self.objects[0] = ObjectSlot::Parsed(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::tn;

    fn sheet_segment(identifier: u64) -> ArchiveSegment {
        ArchiveSegment::new(
            identifier,
            Message::Sheet(tn::SheetArchive {
                name: Some("Totals".to_string()),
                drawable_infos: vec![tsp::Reference::new(7)],
            }),
        )
    }

    #[test]
    fn test_segment_round_trip() {
        let mut segment = sheet_segment(11);
        let bytes = segment.to_buffer();
        let (parsed, consumed) = ArchiveSegment::parse(&bytes).unwrap();

        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed.identifier(), 11);
        assert_eq!(parsed, segment);
        assert_eq!(
            parsed.header.message_infos[0].object_references,
            vec![7u64]
        );
    }

    #[test]
    fn test_unknown_type_preserved() {
        let mut segment = ArchiveSegment::new(
            3,
            Message::Unknown {
                type_id: 9999,
                data: vec![0x08, 0x2A],
            },
        );
        let bytes = segment.to_buffer();
        let (parsed, _) = ArchiveSegment::parse(&bytes).unwrap();
        assert_eq!(parsed, segment);
        // A second round trip is byte-identical.
        assert_eq!(parsed.clone().to_buffer(), bytes);
    }

    #[test]
    fn test_patched_payload_preserved() {
        let base = Message::Sheet(tn::SheetArchive {
            name: Some("S".to_string()),
            drawable_infos: vec![],
        });
        let (base_type, base_bytes) = base.encode();
        let patch_bytes = vec![0x0A, 0x01, 0x54];

        let header = tsp::ArchiveInfo {
            identifier: Some(5),
            message_infos: vec![
                tsp::MessageInfo {
                    r#type: base_type,
                    version: vec![1],
                    length: base_bytes.len() as u32,
                    object_references: vec![],
                    base_message_index: None,
                    diff_field_path: None,
                },
                tsp::MessageInfo {
                    r#type: 0,
                    version: vec![1],
                    length: patch_bytes.len() as u32,
                    object_references: vec![],
                    base_message_index: Some(0),
                    diff_field_path: None,
                },
            ],
            should_merge: Some(true),
        };

        let header_bytes = header.encode_to_vec();
        let mut buf = Vec::new();
        varint::write_varint(&mut buf, header_bytes.len() as u64);
        buf.extend(header_bytes);
        buf.extend(&base_bytes);
        buf.extend(&patch_bytes);

        let (mut parsed, consumed) = ArchiveSegment::parse(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(
            parsed.objects[1],
            ObjectSlot::Patched {
                base_type,
                data: patch_bytes,
            }
        );
        // Patched segments re-serialise byte-identically.
        assert_eq!(parsed.to_buffer(), buf);
    }

    #[test]
    fn test_truncated_payload() {
        let mut segment = sheet_segment(1);
        let bytes = segment.to_buffer();
        let result = ArchiveSegment::parse(&bytes[..bytes.len() - 2]);
        assert!(matches!(result, Err(Error::FileFormat(_))));
    }

    #[test]
    fn test_replace_object_rewrites_references() {
        let mut segment = sheet_segment(9);
        segment.replace_object(Message::Sheet(tn::SheetArchive {
            name: Some("Totals".to_string()),
            drawable_infos: vec![tsp::Reference::new(21), tsp::Reference::new(22)],
        }));
        assert_eq!(
            segment.header.message_infos[0].object_references,
            vec![21, 22]
        );
    }
}
