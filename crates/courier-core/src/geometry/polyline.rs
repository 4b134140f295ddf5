//! Encoded Polyline Algorithm Format.
//!
//! Each coordinate is stored as a zig-zag encoded delta from the previous point,
//! split into 5-bit groups offset by 63 so every group is a printable ASCII byte.
//! A group with bit 0x20 set is followed by another group of the same value.

use courier_types::GeoPoint;

/// Precision used by the backend's route geometries (1e-5 degrees).
pub const DEFAULT_PRECISION: u32 = 5;

const CHAR_OFFSET: u8 = 63;
const CONTINUATION: i64 = 0x20;
const CHUNK_MASK: i64 = 0x1f;
/// Past this shift a further 5-bit group would overflow the accumulator.
const MAX_SHIFT: u32 = 60;

/// Decodes a precision-5 polyline.
///
/// Malformed input never fails: decoding stops at the first invalid byte or
/// unfinished value and returns every point completed before it.
pub fn decode(encoded: &str) -> Vec<GeoPoint> {
    decode_with_precision(encoded, DEFAULT_PRECISION)
}

/// Decodes a polyline whose values were scaled by `10^precision`.
pub fn decode_with_precision(encoded: &str, precision: u32) -> Vec<GeoPoint> {
    let factor = scale(precision);
    let mut bytes = encoded.bytes();
    let mut points = Vec::new();
    let (mut lat, mut lng) = (0i64, 0i64);

    loop {
        let Some(dlat) = next_value(&mut bytes) else {
            break;
        };
        let Some(dlng) = next_value(&mut bytes) else {
            break;
        };
        lat = lat.wrapping_add(dlat);
        lng = lng.wrapping_add(dlng);
        points.push(GeoPoint::new(lat as f64 / factor, lng as f64 / factor));
    }

    if bytes.next().is_some() {
        tracing::debug!(
            decoded = points.len(),
            "Polyline stopped at malformed input"
        );
    }
    points
}

/// Encodes points at precision 5, rounding each axis to the nearest 1e-5 degree.
///
/// Points with a NaN or infinite coordinate are skipped.
pub fn encode(points: &[GeoPoint]) -> String {
    encode_with_precision(points, DEFAULT_PRECISION)
}

pub fn encode_with_precision(points: &[GeoPoint], precision: u32) -> String {
    let factor = scale(precision);
    let mut out = String::with_capacity(points.len() * 8);
    let (mut prev_lat, mut prev_lng) = (0i64, 0i64);

    for point in points {
        if !(point.latitude.is_finite() && point.longitude.is_finite()) {
            tracing::debug!(?point, "Skipping non-finite point");
            continue;
        }
        // Out-of-range magnitudes saturate; deltas wrap like the decoder's sums.
        let lat = (point.latitude * factor).round() as i64;
        let lng = (point.longitude * factor).round() as i64;
        push_value(&mut out, lat.wrapping_sub(prev_lat));
        push_value(&mut out, lng.wrapping_sub(prev_lng));
        prev_lat = lat;
        prev_lng = lng;
    }
    out
}

fn scale(precision: u32) -> f64 {
    10f64.powi(precision as i32)
}

/// Reads one zig-zag value. `None` on end of input, an invalid byte, or overflow.
fn next_value(bytes: &mut impl Iterator<Item = u8>) -> Option<i64> {
    let mut result = 0i64;
    let mut shift = 0u32;

    loop {
        let byte = bytes.next()?;
        if !(CHAR_OFFSET..=126).contains(&byte) {
            return None;
        }
        if shift > MAX_SHIFT {
            return None;
        }
        let chunk = i64::from(byte - CHAR_OFFSET);
        result |= (chunk & CHUNK_MASK) << shift;
        shift += 5;
        if chunk & CONTINUATION == 0 {
            break;
        }
    }

    Some(if result & 1 == 1 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

fn push_value(out: &mut String, value: i64) {
    // Zig-zag into an unsigned value so every shift is logical.
    let mut v = ((value << 1) ^ (value >> 63)) as u64;
    while v >= CONTINUATION as u64 {
        let chunk = (v & CHUNK_MASK as u64) as u8 | CONTINUATION as u8;
        out.push(char::from(chunk + CHAR_OFFSET));
        v >>= 5;
    }
    out.push(char::from(v as u8 + CHAR_OFFSET));
}
