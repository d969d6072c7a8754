//! Variable-length integer encoding/decoding for the IWA format
//!
//! IWA archive headers use Protocol Buffers variable-length encoding,
//! which stores values in 7-bit chunks with the most significant bit
//! indicating continuation.

use crate::{Error, Result};

/// Encode a u64 value as a variable-length integer.
///
/// The encoding is minimal: no redundant trailing continuation bytes are
/// emitted.
pub fn encode_varint(mut value: u64) -> Vec<u8> {
    let mut buf = Vec::new();
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
    buf
}

/// Append the varint encoding of `value` to `out`.
pub fn write_varint(out: &mut Vec<u8>, value: u64) {
    out.extend(encode_varint(value));
}

/// Decode a variable-length integer from the front of a byte slice.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_varint(data: &[u8]) -> Result<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0;

    for (consumed, &byte) in data.iter().enumerate() {
        if shift >= 64 {
            return Err(Error::FileFormat(
                "variable-length integer overflow".to_string(),
            ));
        }
        value |= ((byte & 0x7F) as u64) << shift;
        if (byte & 0x80) == 0 {
            return Ok((value, consumed + 1));
        }
        shift += 7;
    }

    Err(Error::FileFormat(
        "truncated variable-length integer".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_varint_encoding() {
        let test_cases = vec![
            (0u64, vec![0x00]),
            (1u64, vec![0x01]),
            (127u64, vec![0x7F]),
            (128u64, vec![0x80, 0x01]),
            (300u64, vec![0xAC, 0x02]),
            (16384u64, vec![0x80, 0x80, 0x01]),
            (u64::MAX, vec![0xFF; 9].into_iter().chain([0x01]).collect()),
        ];

        for (value, expected) in test_cases {
            let encoded = encode_varint(value);
            assert_eq!(encoded, expected, "Encoding failed for value {}", value);

            let (decoded, consumed) = decode_varint(&encoded).expect("Decoding failed");
            assert_eq!(decoded, value, "Decoding failed for value {}", value);
            assert_eq!(consumed, encoded.len());
        }
    }

    #[test]
    fn test_truncated_varint() {
        assert!(decode_varint(&[0x80]).is_err());
        assert!(decode_varint(&[]).is_err());
    }

    proptest! {
        #[test]
        fn prop_varint_round_trip(value: u64) {
            let encoded = encode_varint(value);
            let (decoded, consumed) = decode_varint(&encoded).unwrap();
            prop_assert_eq!(decoded, value);
            prop_assert_eq!(consumed, encoded.len());
            // Minimal representation: the last byte never has the
            // continuation bit, and the value needs every byte emitted.
            prop_assert_eq!(encoded.last().unwrap() & 0x80, 0);
            if encoded.len() > 1 {
                prop_assert!(value >= 1u64 << (7 * (encoded.len() - 1)));
            }
        }
    }
}
