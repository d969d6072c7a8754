//! Snappy chunk framing for IWA files
//!
//! IWA files use a custom Snappy framing format that differs from the
//! standard stream format:
//! - No stream identifier chunk
//! - No CRC-32C checksums
//! - 4-byte chunk header: type byte (always 0x00) + 24-bit LE length
//!
//! Both directions are pure and deterministic. Decompression tolerates
//! chunks whose payload is stored uncompressed under the same framing;
//! compression splits the input into windows of at most [`WINDOW_SIZE`]
//! bytes so each chunk decompresses within one Snappy window.

use snap::raw::{Decoder, Encoder};

use crate::{Error, Result};

/// Maximum uncompressed bytes per chunk.
pub const WINDOW_SIZE: usize = 65536;

/// Decompress a complete IWA framing stream into one contiguous buffer.
///
/// Reads 4-byte headers until the input is exhausted, inflating each
/// chunk and concatenating the results. A chunk that fails Snappy
/// decompression is passed through raw: some archives store uncompressed
/// data under the same framing.
pub fn decompress_stream(data: &[u8]) -> Result<Vec<u8>> {
    let mut decompressed = Vec::new();
    let mut decoder = Decoder::new();
    let mut pos = 0;

    while pos < data.len() {
        if data.len() - pos < 4 {
            return Err(Error::FileFormat("truncated IWA chunk header".to_string()));
        }
        let chunk_type = data[pos];
        if chunk_type != 0 {
            return Err(Error::FileFormat(format!(
                "IWA chunk does not start with 0x00 (found {:#04x})",
                chunk_type
            )));
        }

        // 24-bit little-endian length
        let length =
            u32::from_le_bytes([data[pos + 1], data[pos + 2], data[pos + 3], 0]) as usize;
        pos += 4;

        if length == 0 {
            continue;
        }
        if data.len() - pos < length {
            return Err(Error::FileFormat("truncated IWA chunk payload".to_string()));
        }
        let chunk = &data[pos..pos + length];
        pos += length;

        match decoder.decompress_vec(chunk) {
            Ok(inflated) => decompressed.extend(inflated),
            // Not Snappy data; keep the payload as stored.
            Err(_) => decompressed.extend_from_slice(chunk),
        }
    }

    Ok(decompressed)
}

/// Compress a buffer into IWA chunk framing.
///
/// The input is split into windows of at most [`WINDOW_SIZE`] bytes; each
/// window is Snappy-compressed and emitted as `0x00` + 24-bit LE length +
/// payload.
pub fn compress_stream(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut encoder = Encoder::new();

    for window in data.chunks(WINDOW_SIZE) {
        let payload = encoder
            .compress_vec(window)
            .map_err(|e| Error::Snappy(e.to_string()))?;
        let length = payload.len() as u32;
        out.push(0x00);
        out.extend_from_slice(&length.to_le_bytes()[..3]);
        out.extend(payload);
    }

    Ok(out)
}
