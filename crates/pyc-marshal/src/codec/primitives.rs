//! Primitive decoding for the marshal format.
//!
//! All multi-byte integers and floats on the wire are little-endian.

use crate::error::DecodeError;

/// Reader for decoding binary data.
///
/// Wraps a byte slice and provides methods for reading primitives
/// with bounds checking and error handling.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the current position in the data.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the remaining bytes.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Returns the number of remaining bytes.
    pub fn remaining_len(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_byte(&mut self, context: &'static str) -> Result<u8, DecodeError> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(DecodeError::Truncated { context })?;
        self.pos += 1;
        Ok(byte)
    }

    /// Reads exactly n bytes.
    ///
    /// On failure the position is left unchanged.
    #[inline]
    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining_len() {
            return Err(DecodeError::Truncated { context });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Reads exactly N bytes into a fixed-size array.
    #[inline]
    pub fn read_array<const N: usize>(&mut self, context: &'static str) -> Result<[u8; N], DecodeError> {
        let bytes = self.read_bytes(N, context)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Reads a little-endian u32.
    #[inline]
    pub fn read_u32(&mut self, context: &'static str) -> Result<u32, DecodeError> {
        self.read_array(context).map(u32::from_le_bytes)
    }

    /// Reads a little-endian i32.
    #[inline]
    pub fn read_i32(&mut self, context: &'static str) -> Result<i32, DecodeError> {
        self.read_array(context).map(i32::from_le_bytes)
    }

    /// Reads a little-endian i64.
    #[inline]
    pub fn read_i64(&mut self, context: &'static str) -> Result<i64, DecodeError> {
        self.read_array(context).map(i64::from_le_bytes)
    }

    /// Reads a little-endian IEEE-754 double. NaN payloads are accepted.
    #[inline]
    pub fn read_f64(&mut self, context: &'static str) -> Result<f64, DecodeError> {
        self.read_array(context).map(f64::from_le_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_width_little_endian() {
        let data = [
            0x01, 0x00, 0x00, 0x00, // u32 1
            0xFF, 0xFF, 0xFF, 0xFF, // i32 -1
            0x02, 0, 0, 0, 0, 0, 0, 0x80, // i64
        ];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.read_u32("a").unwrap(), 1);
        assert_eq!(reader.read_i32("b").unwrap(), -1);
        assert_eq!(reader.read_i64("c").unwrap(), i64::MIN + 2);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_f64_values() {
        for v in [0.0, 1.5, -2.25, f64::INFINITY, f64::NEG_INFINITY] {
            let bytes = v.to_le_bytes();
            let mut reader = Reader::new(&bytes);
            assert_eq!(reader.read_f64("test").unwrap(), v);
        }

        let bytes = f64::NAN.to_le_bytes();
        let mut reader = Reader::new(&bytes);
        assert!(reader.read_f64("test").unwrap().is_nan());
    }

    #[test]
    fn test_unexpected_eof() {
        let data = [0u8; 5];
        let mut reader = Reader::new(&data);
        let result = reader.read_bytes(10, "test");
        assert!(matches!(result, Err(DecodeError::Truncated { context: "test" })));
        // A failed read consumes nothing.
        assert_eq!(reader.position(), 0);

        let mut reader = Reader::new(&data[..3]);
        assert!(matches!(reader.read_u32("len"), Err(DecodeError::Truncated { .. })));
        assert_eq!(reader.remaining_len(), 3);
    }

    #[test]
    fn test_read_byte_at_end() {
        let mut reader = Reader::new(&[7]);
        assert_eq!(reader.read_byte("tag").unwrap(), 7);
        assert!(matches!(reader.read_byte("tag"), Err(DecodeError::Truncated { context: "tag" })));
        assert!(reader.remaining().is_empty());
    }
}
