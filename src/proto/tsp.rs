//! Shared persistence archives (`TSP` namespace)
//!
//! These messages frame every archive segment: the `ArchiveInfo` header,
//! its per-payload `MessageInfo` entries, and the cross-object `Reference`
//! and UUID types used throughout the document graph.

use super::HasReferences;

/// Header of an IWA archive segment.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ArchiveInfo {
    /// Document-wide object identifier for this segment.
    #[prost(uint64, optional, tag = "1")]
    pub identifier: Option<u64>,
    #[prost(message, repeated, tag = "2")]
    pub message_infos: Vec<MessageInfo>,
    /// Set on segments whose payloads patch a base message.
    #[prost(bool, optional, tag = "3")]
    pub should_merge: Option<bool>,
}

/// Describes one message payload within an archive segment.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MessageInfo {
    /// Registry type ID; 0 for patch payloads.
    #[prost(uint32, tag = "1")]
    pub r#type: u32,
    #[prost(uint32, repeated, tag = "2")]
    pub version: Vec<u32>,
    /// Payload length in bytes; rewritten when re-serialisation changes it.
    #[prost(uint32, tag = "3")]
    pub length: u32,
    #[prost(uint64, repeated, tag = "5")]
    pub object_references: Vec<u64>,
    #[prost(uint32, optional, tag = "6")]
    pub base_message_index: Option<u32>,
    #[prost(message, optional, tag = "7")]
    pub diff_field_path: Option<FieldPath>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FieldPath {
    #[prost(uint32, repeated, tag = "1")]
    pub path: Vec<u32>,
}

/// A cross-object reference: an identifier into the object store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct Reference {
    #[prost(uint64, tag = "1")]
    pub identifier: u64,
}

impl Reference {
    pub fn new(identifier: u64) -> Self {
        Self { identifier }
    }
}

impl HasReferences for Reference {
    fn collect_references(&self, out: &mut Vec<u64>) {
        out.push(self.identifier);
    }
}

/// 128-bit UUID split into two 64-bit words.
#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct Uuid {
    #[prost(uint64, tag = "1")]
    pub lower: u64,
    #[prost(uint64, tag = "2")]
    pub upper: u64,
}

impl Uuid {
    /// The UUID as a single 128-bit integer.
    pub fn as_u128(&self) -> u128 {
        (self.upper as u128) << 64 | self.lower as u128
    }

    pub fn from_u128(value: u128) -> Self {
        Self {
            lower: value as u64,
            upper: (value >> 64) as u64,
        }
    }
}

/// 128-bit UUID split into four 32-bit words (CoreFoundation layout).
#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct CfUuidArchive {
    #[prost(uint32, tag = "1")]
    pub uuid_w0: u32,
    #[prost(uint32, tag = "2")]
    pub uuid_w1: u32,
    #[prost(uint32, tag = "3")]
    pub uuid_w2: u32,
    #[prost(uint32, tag = "4")]
    pub uuid_w3: u32,
}

impl CfUuidArchive {
    pub fn as_u128(&self) -> u128 {
        (self.uuid_w3 as u128) << 96
            | (self.uuid_w2 as u128) << 64
            | (self.uuid_w1 as u128) << 32
            | self.uuid_w0 as u128
    }

    pub fn from_u128(value: u128) -> Self {
        Self {
            uuid_w0: value as u32,
            uuid_w1: (value >> 32) as u32,
            uuid_w2: (value >> 64) as u32,
            uuid_w3: (value >> 96) as u32,
        }
    }
}

/// RGBA colour in the 0.0–1.0 range.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Color {
    #[prost(float, tag = "1")]
    pub r: f32,
    #[prost(float, tag = "2")]
    pub g: f32,
    #[prost(float, tag = "3")]
    pub b: f32,
    #[prost(float, optional, tag = "4")]
    pub a: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_archive_info_round_trip() {
        let info = ArchiveInfo {
            identifier: Some(123),
            message_infos: vec![MessageInfo {
                r#type: 6001,
                version: vec![1, 0, 5],
                length: 42,
                object_references: vec![7, 8],
                base_message_index: None,
                diff_field_path: None,
            }],
            should_merge: None,
        };
        let bytes = info.encode_to_vec();
        let decoded = ArchiveInfo::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, info);
    }

    #[test]
    fn test_uuid_word_layouts_agree() {
        let value = 0xf9ad9f35d33aba96_0c4ebfb1d9676393u128;
        assert_eq!(Uuid::from_u128(value).as_u128(), value);
        assert_eq!(CfUuidArchive::from_u128(value).as_u128(), value);
    }
}
