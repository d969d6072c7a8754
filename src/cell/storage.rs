//! Packed cell-storage records
//!
//! Each cell in a table tile is one packed binary record: a fixed 12-byte
//! prelude (`version`, `cell_type`, reserved bytes, 32-bit flags bitmap)
//! followed by optional fields in a fixed order determined by the bitmap.
//! The record's semantic type derives from `cell_type`, not from which
//! optional fields happen to be present.
//!
//! Only storage version 5 is supported.

use bitflags::bitflags;

use crate::{Error, Result};

/// Storage version this codec understands.
pub const STORAGE_VERSION: u8 = 5;

/// `cell_type` codes at offset 1.
pub mod cell_type {
    pub const GENERIC: u8 = 0;
    pub const NUMBER: u8 = 2;
    pub const TEXT: u8 = 3;
    pub const DATE: u8 = 5;
    pub const BOOL: u8 = 6;
    pub const DURATION: u8 = 7;
    pub const ERROR: u8 = 8;
    pub const RICH_TEXT: u8 = 9;
    /// Stored identically to [`NUMBER`]; produced by newer versions.
    pub const NUMBER_D128: u8 = 10;
}

bitflags! {
    /// The flags bitmap at offset 8. Each set bit implies the presence of
    /// one optional field, consumed in bit order from offset 12.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CellFlags: u32 {
        const DECIMAL_128 = 0x1;
        const DOUBLE = 0x2;
        const SECONDS = 0x4;
        const STRING_ID = 0x8;
        const RICH_ID = 0x10;
        const CELL_STYLE_ID = 0x20;
        const TEXT_STYLE_ID = 0x40;
        const COND_STYLE_ID = 0x80;
        const COND_RULE_STYLE_ID = 0x100;
        const FORMULA_ID = 0x200;
        const CONTROL_ID = 0x400;
        const FORMULA_ERROR_ID = 0x800;
        const SUGGEST_ID = 0x1000;
        const NUM_FORMAT_ID = 0x2000;
        const CURRENCY_FORMAT_ID = 0x4000;
        const DATE_FORMAT_ID = 0x8000;
        const DURATION_FORMAT_ID = 0x10000;
        const TEXT_FORMAT_ID = 0x20000;
        const BOOL_FORMAT_ID = 0x40000;
        const COMMENT_ID = 0x80000;
        const IMPORT_WARNING_ID = 0x100000;
    }
}

/// A decoded cell-storage record.
///
/// Keeps the raw buffer alongside the unpacked fields so the trailing
/// formula-key fallback and byte-level round-trips stay available.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellStorage {
    pub buffer: Vec<u8>,
    pub cell_type: u8,
    pub flags: CellFlags,

    pub d128: Option<f64>,
    pub double: Option<f64>,
    pub seconds: Option<f64>,
    pub string_id: Option<u32>,
    pub rich_id: Option<u32>,
    pub cell_style_id: Option<u32>,
    pub text_style_id: Option<u32>,
    pub cond_style_id: Option<u32>,
    pub cond_rule_style_id: Option<u32>,
    pub formula_id: Option<u32>,
    pub control_id: Option<u32>,
    pub formula_error_id: Option<u32>,
    pub suggest_id: Option<u32>,
    pub num_format_id: Option<u32>,
    pub currency_format_id: Option<u32>,
    pub date_format_id: Option<u32>,
    pub duration_format_id: Option<u32>,
    pub text_format_id: Option<u32>,
    pub bool_format_id: Option<u32>,
    pub comment_id: Option<u32>,
    pub import_warning_id: Option<u32>,
}

impl Default for CellFlags {
    fn default() -> Self {
        CellFlags::empty()
    }
}

impl CellStorage {
    /// Decode one packed record.
    pub fn decode(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < 12 {
            return Err(Error::FileFormat(format!(
                "cell storage record too short ({} bytes)",
                buffer.len()
            )));
        }
        let version = buffer[0];
        if version != STORAGE_VERSION {
            return Err(Error::Unsupported(format!(
                "cell storage version {}",
                version
            )));
        }

        let flags_raw = u32::from_le_bytes([buffer[8], buffer[9], buffer[10], buffer[11]]);
        let flags = CellFlags::from_bits_retain(flags_raw);

        let mut storage = CellStorage {
            buffer: buffer.to_vec(),
            cell_type: buffer[1],
            flags,
            ..Default::default()
        };

        let mut offset = 12usize;

        if flags.contains(CellFlags::DECIMAL_128) {
            let field = take(buffer, &mut offset, 16)?;
            storage.d128 = Some(unpack_decimal128(field.try_into().unwrap()));
        }
        if flags.contains(CellFlags::DOUBLE) {
            let field = take(buffer, &mut offset, 8)?;
            storage.double = Some(f64::from_le_bytes(field.try_into().unwrap()));
        }
        if flags.contains(CellFlags::SECONDS) {
            let field = take(buffer, &mut offset, 8)?;
            storage.seconds = Some(f64::from_le_bytes(field.try_into().unwrap()));
        }

        // The 4-byte keys, in bitmap order.
        let id_fields: [(CellFlags, &mut Option<u32>); 18] = [
            (CellFlags::STRING_ID, &mut storage.string_id),
            (CellFlags::RICH_ID, &mut storage.rich_id),
            (CellFlags::CELL_STYLE_ID, &mut storage.cell_style_id),
            (CellFlags::TEXT_STYLE_ID, &mut storage.text_style_id),
            (CellFlags::COND_STYLE_ID, &mut storage.cond_style_id),
            (CellFlags::COND_RULE_STYLE_ID, &mut storage.cond_rule_style_id),
            (CellFlags::FORMULA_ID, &mut storage.formula_id),
            (CellFlags::CONTROL_ID, &mut storage.control_id),
            (CellFlags::FORMULA_ERROR_ID, &mut storage.formula_error_id),
            (CellFlags::SUGGEST_ID, &mut storage.suggest_id),
            (CellFlags::NUM_FORMAT_ID, &mut storage.num_format_id),
            (CellFlags::CURRENCY_FORMAT_ID, &mut storage.currency_format_id),
            (CellFlags::DATE_FORMAT_ID, &mut storage.date_format_id),
            (CellFlags::DURATION_FORMAT_ID, &mut storage.duration_format_id),
            (CellFlags::TEXT_FORMAT_ID, &mut storage.text_format_id),
            (CellFlags::BOOL_FORMAT_ID, &mut storage.bool_format_id),
            (CellFlags::COMMENT_ID, &mut storage.comment_id),
            (CellFlags::IMPORT_WARNING_ID, &mut storage.import_warning_id),
        ];
        for (flag, slot) in id_fields {
            if flags.contains(flag) {
                let field = take(buffer, &mut offset, 4)?;
                *slot = Some(u32::from_le_bytes(field.try_into().unwrap()));
            }
        }

        Ok(storage)
    }

    /// The formula-table key for this cell.
    ///
    /// The bitmap field is authoritative; records without it fall back to
    /// the trailing 16-bit key (at a different offset for error cells).
    pub fn formula_key(&self) -> Option<u32> {
        if let Some(id) = self.formula_id {
            return Some(id);
        }
        self.trailing_formula_key().map(u32::from)
    }

    /// The 16-bit key at the fixed offset from the end of the record.
    pub fn trailing_formula_key(&self) -> Option<u16> {
        let buf = &self.buffer;
        let offset = if self.cell_type == cell_type::ERROR {
            buf.len().checked_sub(4)?
        } else {
            buf.len().checked_sub(12)?
        };
        if offset < 12 {
            return None;
        }
        Some(u16::from_le_bytes([buf[offset], buf[offset + 1]]))
    }
}

/// Slice `width` bytes from `buffer` at `*offset`, advancing the offset.
fn take<'a>(buffer: &'a [u8], offset: &mut usize, width: usize) -> Result<&'a [u8]> {
    if buffer.len() < *offset + width {
        return Err(Error::FileFormat(
            "cell storage field overruns record".to_string(),
        ));
    }
    let field = &buffer[*offset..*offset + width];
    *offset += width;
    Ok(field)
}

/// Build the packed record for a writer-supported cell.
///
/// `fields` lists `(flag, bytes)` pairs in bitmap order.
fn pack_record(cell_type: u8, fields: &[(CellFlags, &[u8])]) -> Vec<u8> {
    let mut flags = CellFlags::empty();
    let mut payload = Vec::new();
    for (flag, bytes) in fields {
        flags |= *flag;
        payload.extend_from_slice(bytes);
    }

    let mut record = vec![0u8; 12];
    record[0] = STORAGE_VERSION;
    record[1] = cell_type;
    record[8..12].copy_from_slice(&flags.bits().to_le_bytes());
    record.extend(payload);
    record
}

/// Encode a number cell.
pub fn encode_number(value: f64) -> Vec<u8> {
    pack_record(
        cell_type::NUMBER,
        &[(CellFlags::DECIMAL_128, &pack_decimal128(value))],
    )
}

/// Encode a text cell addressing a string-table key.
pub fn encode_text(string_id: u32) -> Vec<u8> {
    pack_record(
        cell_type::TEXT,
        &[(CellFlags::STRING_ID, &string_id.to_le_bytes())],
    )
}

/// Encode a date cell as seconds past the 2001-01-01 epoch.
pub fn encode_date(seconds: f64) -> Vec<u8> {
    pack_record(
        cell_type::DATE,
        &[(CellFlags::SECONDS, &seconds.to_le_bytes())],
    )
}

/// Encode a boolean cell.
pub fn encode_bool(value: bool) -> Vec<u8> {
    let double: f64 = if value { 1.0 } else { 0.0 };
    pack_record(
        cell_type::BOOL,
        &[(CellFlags::DOUBLE, &double.to_le_bytes())],
    )
}

/// Encode a duration cell (seconds).
pub fn encode_duration(value: f64) -> Vec<u8> {
    pack_record(
        cell_type::DURATION,
        &[(CellFlags::DOUBLE, &value.to_le_bytes())],
    )
}

/// Decode a binary-integer decimal128: sign · mantissa · 10^exponent.
pub fn unpack_decimal128(buffer: [u8; 16]) -> f64 {
    let exponent = ((((buffer[15] & 0x7F) as i32) << 7) | (buffer[14] >> 1) as i32) - 0x1820;
    let mut mantissa: u128 = (buffer[14] & 1) as u128;
    for i in (0..14).rev() {
        mantissa = mantissa * 256 + buffer[i] as u128;
    }
    // Parsing the decimal form gives the correctly-rounded double, which
    // a power-of-ten multiply does not.
    let magnitude: f64 = format!("{}e{}", mantissa, exponent).parse().unwrap_or(0.0);
    if buffer[15] & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Encode a float as a binary-integer decimal128.
///
/// The mantissa and exponent come from the shortest decimal representation
/// of the value, so `decode(encode(v)) == v` for every finite double.
pub fn pack_decimal128(value: f64) -> [u8; 16] {
    let mut buffer = [0u8; 16];
    if !value.is_finite() || value == 0.0 {
        let biased = 0x1820u32;
        buffer[14] = ((biased & 0x7F) << 1) as u8;
        buffer[15] = (biased >> 7) as u8;
        if value.is_sign_negative() {
            buffer[15] |= 0x80;
        }
        return buffer;
    }

    let negative = value < 0.0;
    let (mantissa, exponent) = decimal_parts(value.abs());

    let biased = (exponent + 0x1820) as u32;
    for (i, byte) in buffer.iter_mut().enumerate().take(14) {
        *byte = (mantissa >> (8 * i)) as u8;
    }
    buffer[14] = (((biased & 0x7F) << 1) as u8) | ((mantissa >> 112) & 1) as u8;
    buffer[15] = ((biased >> 7) & 0x7F) as u8;
    if negative {
        buffer[15] |= 0x80;
    }
    buffer
}

/// Split a positive finite double into decimal mantissa and exponent.
fn decimal_parts(value: f64) -> (u128, i32) {
    // {:e} prints the shortest round-trip representation, e.g. 1.2345e4.
    let formatted = format!("{:e}", value);
    let (digits_part, exp_part) = formatted.split_once('e').expect("exponent marker");
    let exp10: i32 = exp_part.parse().expect("decimal exponent");

    let (int_digits, frac_digits) = match digits_part.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits_part, ""),
    };
    let mut digits = String::with_capacity(int_digits.len() + frac_digits.len());
    digits.push_str(int_digits);
    digits.push_str(frac_digits);
    let digits = digits.trim_start_matches('0');
    let mantissa: u128 = if digits.is_empty() {
        0
    } else {
        digits.parse().expect("decimal mantissa")
    };
    (mantissa, exp10 - frac_digits.len() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decimal128_decode_known_value() {
        // 12345.012346 = 12345012346 * 10^-6
        let buffer = pack_decimal128(12345.012346);
        assert_eq!(unpack_decimal128(buffer), 12345.012346);

        let exponent =
            ((((buffer[15] & 0x7F) as i32) << 7) | (buffer[14] >> 1) as i32) - 0x1820;
        assert_eq!(exponent, -6);
    }

    #[test]
    fn test_decimal128_negative_and_zero() {
        assert_eq!(unpack_decimal128(pack_decimal128(-2.5)), -2.5);
        assert_eq!(unpack_decimal128(pack_decimal128(0.0)), 0.0);
    }

    #[test]
    fn test_number_record_round_trip() {
        let record = encode_number(12345.012346);
        let storage = CellStorage::decode(&record).unwrap();
        assert_eq!(storage.cell_type, cell_type::NUMBER);
        assert_eq!(storage.flags, CellFlags::DECIMAL_128);
        assert_eq!(storage.d128, Some(12345.012346));
        assert_eq!(storage.double, None);
    }

    #[test]
    fn test_bitmap_implies_fields() {
        // Hand-build a record with a double, a string key and a formula key.
        let double = 2.0f64;
        let record = pack_record(
            cell_type::TEXT,
            &[
                (CellFlags::DOUBLE, &double.to_le_bytes()),
                (CellFlags::STRING_ID, &7u32.to_le_bytes()),
                (CellFlags::FORMULA_ID, &3u32.to_le_bytes()),
            ],
        );
        let storage = CellStorage::decode(&record).unwrap();
        assert_eq!(storage.double, Some(2.0));
        assert_eq!(storage.string_id, Some(7));
        assert_eq!(storage.formula_id, Some(3));
        assert_eq!(storage.formula_key(), Some(3));
        // Clear bits stay absent.
        assert_eq!(storage.d128, None);
        assert_eq!(storage.seconds, None);
        assert_eq!(storage.rich_id, None);
    }

    #[test]
    fn test_unsupported_version() {
        let mut record = encode_number(1.0);
        record[0] = 4;
        assert!(matches!(
            CellStorage::decode(&record),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_truncated_field() {
        let mut record = encode_number(1.0);
        record.truncate(20);
        assert!(matches!(
            CellStorage::decode(&record),
            Err(Error::FileFormat(_))
        ));
    }

    #[test]
    fn test_writer_kind_round_trips() {
        let date = encode_date(86400.0 * 3.0);
        let storage = CellStorage::decode(&date).unwrap();
        assert_eq!(storage.cell_type, cell_type::DATE);
        assert_eq!(storage.seconds, Some(86400.0 * 3.0));

        let boolean = encode_bool(true);
        let storage = CellStorage::decode(&boolean).unwrap();
        assert_eq!(storage.cell_type, cell_type::BOOL);
        assert_eq!(storage.double, Some(1.0));

        let duration = encode_duration(3723.0);
        let storage = CellStorage::decode(&duration).unwrap();
        assert_eq!(storage.cell_type, cell_type::DURATION);
        assert_eq!(storage.double, Some(3723.0));

        let text = encode_text(12);
        let storage = CellStorage::decode(&text).unwrap();
        assert_eq!(storage.cell_type, cell_type::TEXT);
        assert_eq!(storage.string_id, Some(12));
    }

    #[test]
    fn test_trailing_formula_key() {
        // A value record whose key sits 12 bytes from the end.
        let mut record = pack_record(
            cell_type::NUMBER,
            &[(CellFlags::DECIMAL_128, &pack_decimal128(1.0))],
        );
        let len = record.len();
        record[len - 12] = 0x2A;
        let storage = CellStorage::decode(&record).unwrap();
        assert_eq!(storage.trailing_formula_key(), Some(42));
        assert_eq!(storage.formula_key(), Some(42));
    }

    proptest! {
        #[test]
        fn prop_decimal128_round_trip(value in -1.0e15f64..1.0e15f64) {
            prop_assert_eq!(unpack_decimal128(pack_decimal128(value)), value);
        }

        #[test]
        fn prop_number_cell_round_trip(value in -1.0e12f64..1.0e12f64) {
            let record = encode_number(value);
            let storage = CellStorage::decode(&record).unwrap();
            prop_assert_eq!(storage.d128, Some(value));
        }
    }
}
