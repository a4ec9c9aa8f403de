//! Value decoding by VR category.
//!
//! Raw value bytes become an [`AttributeValue`]. Decoding never fails: bytes
//! that do not parse under their declared VR fall back to text or binary.

use crate::raster::{AttributeValue, ByteOrder};

use super::tags::{Vr, VrCategory};

/// Decode raw value bytes as `vr` under `byte_order`.
pub fn decode_value(vr: Vr, bytes: &[u8], byte_order: ByteOrder) -> AttributeValue {
    match vr.category() {
        VrCategory::Integer => AttributeValue::Integers(decode_integers(vr, bytes, byte_order)),
        VrCategory::Float => AttributeValue::Floats(decode_floats(vr, bytes, byte_order)),
        VrCategory::Decimal => decode_decimal(vr, bytes),
        VrCategory::Text => AttributeValue::Text(decode_text(bytes)),
        VrCategory::Nested => AttributeValue::Sequence,
        VrCategory::Binary => AttributeValue::Binary(bytes.to_vec()),
    }
}

/// Text with trailing NUL and space padding removed.
pub fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\0', ' '])
        .trim_start()
        .to_string()
}

/// First unsigned integer of a structural value.
///
/// Structural keys may appear with a binary VR (US) or, in some producers,
/// as an ASCII integer string (IS); both are accepted.
pub fn decode_uint(vr: Vr, bytes: &[u8], byte_order: ByteOrder) -> Option<u64> {
    match decode_value(vr, bytes, byte_order) {
        AttributeValue::Integers(v) => v.first().map(|i| *i as u64),
        AttributeValue::Floats(v) => v.first().map(|f| *f as u64),
        AttributeValue::Text(s) => s.split('\\').next()?.trim().parse().ok(),
        AttributeValue::Binary(b) => match b.len() {
            2 => Some(byte_order.read_u16(&b) as u64),
            4 => Some(byte_order.read_u32(&b) as u64),
            _ => None,
        },
        _ => None,
    }
}

fn decode_integers(vr: Vr, bytes: &[u8], order: ByteOrder) -> Vec<i64> {
    let width = match vr {
        Vr::US | Vr::SS => 2,
        Vr::UV | Vr::SV => 8,
        _ => 4,
    };
    bytes
        .chunks_exact(width)
        .map(|c| match vr {
            Vr::US => order.read_u16(c) as i64,
            Vr::SS => order.read_u16(c) as i16 as i64,
            Vr::UL => order.read_u32(c) as i64,
            Vr::SL => order.read_u32(c) as i32 as i64,
            // Attribute tags are a group followed by an element
            Vr::AT => ((order.read_u16(c) as i64) << 16) | order.read_u16(&c[2..]) as i64,
            _ => order.read_u64(c) as i64,
        })
        .collect()
}

fn decode_floats(vr: Vr, bytes: &[u8], order: ByteOrder) -> Vec<f64> {
    match vr {
        Vr::FD => bytes.chunks_exact(8).map(|c| order.read_f64(c)).collect(),
        _ => bytes
            .chunks_exact(4)
            .map(|c| order.read_f32(c) as f64)
            .collect(),
    }
}

fn decode_decimal(vr: Vr, bytes: &[u8]) -> AttributeValue {
    let text = decode_text(bytes);
    if text.is_empty() {
        return AttributeValue::Text(text);
    }
    let parts: Vec<&str> = text.split('\\').map(str::trim).collect();

    if vr == Vr::IS {
        let ints: Result<Vec<i64>, _> = parts.iter().map(|p| p.parse::<i64>()).collect();
        if let Ok(values) = ints {
            return AttributeValue::Integers(values);
        }
    }
    let floats: Result<Vec<f64>, _> = parts.iter().map(|p| p.parse::<f64>()).collect();
    match floats {
        Ok(values) => AttributeValue::Floats(values),
        Err(_) => AttributeValue::Text(text),
    }
}
