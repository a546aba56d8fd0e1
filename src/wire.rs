//! Big-integer wire encoding for H.235 clear tokens
//!
//! H.235.6 carries DH fields as ASN.1 bit strings: an explicit bit-length
//! tag plus big-endian content bytes, with one trailing implicit padding
//! byte. The codec here produces and consumes that shape; the rest of the
//! crate never touches raw buffers directly.

use bytes::{BufMut, Bytes, BytesMut};
use num_bigint::BigUint;

/// A bit-length-tagged byte buffer mirroring the bit-string wire type.
///
/// The stored buffer includes the one trailing implicit padding byte, so
/// `data().len()` is one more than the content length. An empty bit string
/// (`bits == 0`, no buffer) encodes an absent field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitString {
    bits: usize,
    data: Bytes,
}

impl BitString {
    /// Create an empty (absent) bit string.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the content bytes and their exact bit count. The implicit
    /// trailing padding byte is appended here.
    pub fn set_data(&mut self, bits: usize, content: &[u8]) {
        let mut buf = BytesMut::with_capacity(content.len() + 1);
        buf.put_slice(content);
        buf.put_u8(0);
        self.bits = bits;
        self.data = buf.freeze();
    }

    /// Tagged bit count of the value.
    pub fn bit_length(&self) -> usize {
        self.bits
    }

    /// Full buffer, padding byte included.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// True when the field is absent.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Encode right-aligned big-endian, zero-padded on the left to exactly
/// `width` bytes. Used to pad the generator out to the modulus length so
/// the paired fields stay symmetric on the wire.
pub fn encode_fixed_width(value: &BigUint, width: usize) -> Vec<u8> {
    let raw = value.to_bytes_be();
    if raw.len() >= width {
        return raw;
    }
    let mut out = vec![0u8; width];
    out[width - raw.len()..].copy_from_slice(&raw);
    out
}

/// Encode at natural width with the exact bit count of the value.
pub fn encode_bit_string(value: &BigUint) -> BitString {
    let mut bs = BitString::new();
    bs.set_data(value.bits() as usize, &value.to_bytes_be());
    bs
}

/// Decode a bit-string field, dropping the trailing implicit padding byte.
/// An absent field decodes to `None`: the wire format allows an empty field
/// to mean "use the previously agreed value".
pub fn decode_bit_string(bs: &BitString) -> Option<BigUint> {
    if bs.is_empty() {
        return None;
    }
    let data = bs.data();
    Some(BigUint::from_bytes_be(&data[..data.len() - 1]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    #[test]
    fn test_fixed_width_round_trip() {
        let value = BigUint::from(0x01_02_03_04u32);
        for width in [4usize, 8, 16, 64] {
            let encoded = encode_fixed_width(&value, width);
            assert_eq!(encoded.len(), width);
            let mut bs = BitString::new();
            bs.set_data(width * 8, &encoded);
            assert_eq!(decode_bit_string(&bs), Some(value.clone()));
        }
    }

    #[test]
    fn test_fixed_width_padding() {
        let value = BigUint::from(2u8);
        let encoded = encode_fixed_width(&value, 16);
        assert_eq!(encoded.len(), 16);
        assert_eq!(encoded[15], 2);
        assert!(encoded[..15].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_fixed_width_never_truncates() {
        let value = BigUint::from_bytes_be(&[0xab; 8]);
        let encoded = encode_fixed_width(&value, 4);
        assert_eq!(encoded, value.to_bytes_be());
    }

    #[test]
    fn test_bit_string_exact_bit_count() {
        // 0x05 = 101b, three significant bits
        let bs = encode_bit_string(&BigUint::from(5u8));
        assert_eq!(bs.bit_length(), 3);
        // one content byte plus the implicit padding byte
        assert_eq!(bs.data().len(), 2);
    }

    #[test]
    fn test_empty_decodes_to_none() {
        assert_eq!(decode_bit_string(&BitString::new()), None);
    }
}
