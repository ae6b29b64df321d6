//! Binary measurement decoders
//!
//! Pure decoders for the fixed-layout byte buffers that standard GATT health
//! characteristics deliver. Every function takes a little-endian buffer and
//! returns `None` on truncated or out-of-range input, never a partial or
//! garbage value, never a panic.

/// Heart rate in bpm: second byte when the buffer carries the flags octet,
/// else the first byte.
pub fn decode_heart_rate(buf: &[u8]) -> Option<u16> {
    match buf {
        [] => None,
        [only] => Some(*only as u16),
        [_flags, value, ..] => Some(*value as u16),
    }
}

/// Battery level: single byte, 0–100.
pub fn decode_battery(buf: &[u8]) -> Option<u8> {
    let level = *buf.first()?;
    if level <= 100 {
        Some(level)
    } else {
        None
    }
}

/// Step count: 4-byte little-endian unsigned integer.
pub fn decode_steps(buf: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = buf.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

/// Body temperature in °C: 2-byte little-endian integer, value/10, one
/// decimal place.
pub fn decode_temperature(buf: &[u8]) -> Option<f64> {
    let bytes: [u8; 2] = buf.get(..2)?.try_into().ok()?;
    let tenths = u16::from_le_bytes(bytes);
    Some(f64::from(tenths) / 10.0)
}

/// Blood pressure in mmHg: two 2-byte little-endian integers at offsets
/// 0 (systolic) and 2 (diastolic).
pub fn decode_blood_pressure(buf: &[u8]) -> Option<(u16, u16)> {
    let systolic: [u8; 2] = buf.get(..2)?.try_into().ok()?;
    let diastolic: [u8; 2] = buf.get(2..4)?.try_into().ok()?;
    Some((u16::from_le_bytes(systolic), u16::from_le_bytes(diastolic)))
}

/// Blood oxygen saturation: single byte, 0–100 percent.
pub fn decode_blood_oxygen(buf: &[u8]) -> Option<u8> {
    let pct = *buf.first()?;
    if pct <= 100 {
        Some(pct)
    } else {
        None
    }
}

/// Body weight in kg: 2-byte little-endian integer, value/10, one decimal
/// place.
pub fn decode_weight(buf: &[u8]) -> Option<f64> {
    let bytes: [u8; 2] = buf.get(..2)?.try_into().ok()?;
    let tenths = u16::from_le_bytes(bytes);
    Some(f64::from(tenths) / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn heart_rate_uses_second_byte_when_flags_present() {
        assert_eq!(decode_heart_rate(&[0x00, 0x4B]), Some(75));
    }

    #[test]
    fn heart_rate_falls_back_to_single_byte() {
        assert_eq!(decode_heart_rate(&[0x48]), Some(72));
    }

    #[test]
    fn heart_rate_rejects_empty_buffer() {
        assert_eq!(decode_heart_rate(&[]), None);
    }

    #[test]
    fn battery_rejects_out_of_range() {
        assert_eq!(decode_battery(&[87]), Some(87));
        assert_eq!(decode_battery(&[101]), None);
        assert_eq!(decode_battery(&[]), None);
    }

    #[test]
    fn steps_are_four_byte_little_endian() {
        assert_eq!(decode_steps(&[0x10, 0x27, 0x00, 0x00]), Some(10_000));
        assert_eq!(decode_steps(&[0x10, 0x27, 0x00]), None);
    }

    #[test]
    fn temperature_scales_tenths() {
        // 368 tenths -> 36.8 C
        assert_eq!(decode_temperature(&[0x70, 0x01]), Some(36.8));
        assert_eq!(decode_temperature(&[0x70]), None);
    }

    #[test]
    fn blood_pressure_reads_two_u16_fields() {
        assert_eq!(
            decode_blood_pressure(&[0x79, 0x00, 0x4E, 0x00]),
            Some((121, 78))
        );
        assert_eq!(decode_blood_pressure(&[0x79, 0x00, 0x4E]), None);
    }

    #[test]
    fn blood_oxygen_is_single_percent_byte() {
        assert_eq!(decode_blood_oxygen(&[97]), Some(97));
        assert_eq!(decode_blood_oxygen(&[120]), None);
    }

    #[test]
    fn weight_matches_le_tenths_formula() {
        // For all valid 2-byte buffers: (b[0] + b[1]*256) / 10.
        let buf = [0x2E, 0x03]; // 814 -> 81.4 kg
        assert_eq!(
            decode_weight(&buf),
            Some((buf[0] as f64 + buf[1] as f64 * 256.0) / 10.0)
        );
        assert_eq!(decode_weight(&[0x2E]), None);
    }

    #[test]
    fn short_buffers_never_panic() {
        for len in 0..4 {
            let buf = vec![0xFFu8; len];
            let _ = decode_heart_rate(&buf);
            let _ = decode_battery(&buf);
            let _ = decode_steps(&buf);
            let _ = decode_temperature(&buf);
            let _ = decode_blood_pressure(&buf);
            let _ = decode_blood_oxygen(&buf);
            let _ = decode_weight(&buf);
        }
    }
}
