//! Low-level binary parsing helpers for BIFF8 records.
//!
//! All multi-byte integers in BIFF8 are little-endian.

use crate::error::{XlsError, XlsResult};

fn need(data: &[u8], offset: usize, len: usize) -> XlsResult<()> {
    if offset + len > data.len() {
        return Err(XlsError::RecordFormat(format!(
            "unexpected end of data at offset {}, need {} byte(s)",
            offset, len
        )));
    }
    Ok(())
}

/// Read a `u8` from a byte slice at `offset`, advancing `offset`.
#[inline]
pub fn read_u8(data: &[u8], offset: &mut usize) -> XlsResult<u8> {
    need(data, *offset, 1)?;
    let v = data[*offset];
    *offset += 1;
    Ok(v)
}

/// Read a `u16` (little-endian) from a byte slice at `offset`, advancing `offset`.
#[inline]
pub fn read_u16(data: &[u8], offset: &mut usize) -> XlsResult<u16> {
    need(data, *offset, 2)?;
    let v = u16::from_le_bytes([data[*offset], data[*offset + 1]]);
    *offset += 2;
    Ok(v)
}

/// Read a `u32` (little-endian) from a byte slice at `offset`, advancing `offset`.
#[inline]
pub fn read_u32(data: &[u8], offset: &mut usize) -> XlsResult<u32> {
    need(data, *offset, 4)?;
    let v = u32::from_le_bytes([
        data[*offset],
        data[*offset + 1],
        data[*offset + 2],
        data[*offset + 3],
    ]);
    *offset += 4;
    Ok(v)
}

/// Read an `i16` (little-endian).
#[inline]
pub fn read_i16(data: &[u8], offset: &mut usize) -> XlsResult<i16> {
    read_u16(data, offset).map(|v| v as i16)
}

/// Read an `i32` (little-endian).
#[inline]
pub fn read_i32(data: &[u8], offset: &mut usize) -> XlsResult<i32> {
    read_u32(data, offset).map(|v| v as i32)
}

/// Read an `f64` (IEEE 754 double, little-endian) from a byte slice.
#[inline]
pub fn read_f64(data: &[u8], offset: &mut usize) -> XlsResult<f64> {
    need(data, *offset, 8)?;
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[*offset..*offset + 8]);
    *offset += 8;
    Ok(f64::from_le_bytes(bytes))
}

/// Borrow `len` bytes at `offset`, advancing `offset`.
pub fn read_bytes<'a>(data: &'a [u8], offset: &mut usize, len: usize) -> XlsResult<&'a [u8]> {
    need(data, *offset, len)?;
    let slice = &data[*offset..*offset + len];
    *offset += len;
    Ok(slice)
}

/// Fail unless a record body holds at least `len` bytes
pub fn require_len(data: &[u8], len: usize, record: &str) -> XlsResult<()> {
    if data.len() < len {
        return Err(XlsError::RecordFormat(format!(
            "{} record too short: {} bytes (expected {})",
            record,
            data.len(),
            len
        )));
    }
    Ok(())
}

/// Decode an RK-encoded number.
///
/// RK encoding (4 bytes):
/// - Bit 0: if 1, the decoded number should be divided by 100
/// - Bit 1: if 1, value is an integer (bits 2..31 as signed 30-bit int)
///           if 0, value is an IEEE 754 double (bits 2..31 are the upper 30 bits,
///           lower 34 bits of the double are zero)
#[inline]
pub fn decode_rk(rk: u32) -> f64 {
    let div100 = (rk & 0x01) != 0;
    let is_integer = (rk & 0x02) != 0;

    let value = if is_integer {
        ((rk as i32) >> 2) as f64
    } else {
        let upper = (rk & 0xFFFF_FFFC) as u64;
        f64::from_bits(upper << 32)
    };

    if div100 {
        value / 100.0
    } else {
        value
    }
}

/// Read an RK value from 4 bytes at `offset`.
#[inline]
pub fn read_rk(data: &[u8], offset: &mut usize) -> XlsResult<f64> {
    let raw = read_u32(data, offset)?;
    Ok(decode_rk(raw))
}

const RK_INT_MIN: f64 = -(1i64 << 29) as f64;
const RK_INT_MAX: f64 = ((1i64 << 29) - 1) as f64;

/// Encode a number as RK if some RK form decodes to exactly the same value.
pub fn encode_rk(value: f64) -> Option<u32> {
    if !value.is_finite() {
        return None;
    }
    let exact = |rk: u32| (decode_rk(rk).to_bits() == value.to_bits()).then_some(rk);
    let as_int = |v: f64| -> Option<u32> {
        (v.fract() == 0.0 && (RK_INT_MIN..=RK_INT_MAX).contains(&v)).then(|| ((v as i32) << 2) as u32)
    };
    let as_float = |v: f64| -> Option<u32> {
        let bits = v.to_bits();
        (bits & 0x3_FFFF_FFFF == 0).then(|| (bits >> 32) as u32)
    };

    if let Some(rk) = as_int(value).and_then(|rk| exact(rk | 0x02)) {
        return Some(rk);
    }
    if let Some(rk) = as_float(value).and_then(exact) {
        return Some(rk);
    }
    let scaled = value * 100.0;
    if let Some(rk) = as_int(scaled.round()).and_then(|rk| exact(rk | 0x03)) {
        return Some(rk);
    }
    as_float(scaled).and_then(|rk| exact(rk | 0x01))
}

/// Little-endian field writers for record bodies
pub trait WriteLe {
    fn put_u8(&mut self, v: u8);
    fn put_u16(&mut self, v: u16);
    fn put_u32(&mut self, v: u32);
    fn put_i32(&mut self, v: i32);
    fn put_f64(&mut self, v: f64);
}

impl WriteLe for Vec<u8> {
    fn put_u8(&mut self, v: u8) {
        self.push(v);
    }

    fn put_u16(&mut self, v: u16) {
        self.extend_from_slice(&v.to_le_bytes());
    }

    fn put_u32(&mut self, v: u32) {
        self.extend_from_slice(&v.to_le_bytes());
    }

    fn put_i32(&mut self, v: i32) {
        self.extend_from_slice(&v.to_le_bytes());
    }

    fn put_f64(&mut self, v: f64) {
        self.extend_from_slice(&v.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_rk_integer() {
        // Integer 42: bits 2..31 = 42, bit 1 = 1 (integer), bit 0 = 0 (no /100)
        let rk = (42u32 << 2) | 0x02;
        assert_eq!(decode_rk(rk), 42.0);
    }

    #[test]
    fn test_decode_rk_integer_negative() {
        let rk = ((-5i32 << 2) as u32) | 0x02;
        assert_eq!(decode_rk(rk), -5.0);
    }

    #[test]
    fn test_decode_rk_integer_div100() {
        let rk = (4200u32 << 2) | 0x03;
        assert_eq!(decode_rk(rk), 42.0);
    }

    #[test]
    fn test_decode_rk_float() {
        let bits = 42.0_f64.to_bits();
        let rk = ((bits >> 32) as u32) & 0xFFFF_FFFC;
        assert_eq!(decode_rk(rk), 42.0);
    }

    #[test]
    fn test_decode_rk_real_values() {
        // Values observed in MULRK records written by Excel
        assert_eq!(decode_rk(0x000000AA), 42.0);
        assert!((decode_rk(0x000004EB) - 3.14).abs() < f64::EPSILON);
        assert_eq!(decode_rk(0xFFFFFE72), -100.0);
        assert_eq!(decode_rk(0x00000002), 0.0);
    }

    #[test]
    fn test_encode_rk_forms() {
        assert_eq!(encode_rk(42.0), Some(0xAA));
        assert_eq!(encode_rk(-100.0), Some(0xFFFFFE72));
        assert_eq!(encode_rk(3.14), Some(0x000004EB));
        // 0.5 has a short mantissa and fits the float form
        assert_eq!(encode_rk(0.5).map(decode_rk), Some(0.5));
        // 1/3 fits no form
        assert_eq!(encode_rk(1.0 / 3.0), None);
        assert_eq!(encode_rk(f64::NAN), None);
        assert_eq!(encode_rk(f64::INFINITY), None);
        // beyond the 30-bit integer range
        assert_eq!(encode_rk(1_000_000_000_123.0), None);
    }

    #[test]
    fn test_encode_rk_keeps_negative_zero() {
        let rk = encode_rk(-0.0);
        if let Some(rk) = rk {
            assert_eq!(decode_rk(rk).to_bits(), (-0.0f64).to_bits());
        }
    }

    #[test]
    fn test_read_u16() {
        let data = [0x34, 0x12];
        let mut off = 0;
        assert_eq!(read_u16(&data, &mut off).unwrap(), 0x1234);
        assert_eq!(off, 2);
    }

    #[test]
    fn test_read_f64() {
        let val = 3.14_f64;
        let bytes = val.to_le_bytes();
        let mut off = 0;
        let result = read_f64(&bytes, &mut off).unwrap();
        assert!((result - val).abs() < f64::EPSILON);
    }

    #[test]
    fn test_short_read_is_a_record_error() {
        let mut off = 1;
        let err = read_u32(&[0, 1, 2], &mut off).unwrap_err();
        assert!(matches!(err, XlsError::RecordFormat(_)));
        assert_eq!(off, 1);
    }

    proptest! {
        #[test]
        fn rk_encoding_is_exact(value in any::<f64>()) {
            if let Some(rk) = encode_rk(value) {
                prop_assert_eq!(decode_rk(rk).to_bits(), value.to_bits());
            }
        }

        #[test]
        fn small_integers_always_encode(n in -(1i32 << 29)..(1i32 << 29)) {
            prop_assert!(encode_rk(n as f64).is_some());
        }

        #[test]
        fn cents_round_trip(cents in -1_000_000i32..1_000_000) {
            let value = cents as f64 / 100.0;
            if let Some(rk) = encode_rk(value) {
                prop_assert_eq!(decode_rk(rk), value);
            }
        }
    }
}
