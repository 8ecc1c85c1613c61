//! Bounds-checked read cursor for telegram payloads
//!
//! All multi-byte fields in the compact format are little-endian. The
//! cursor tracks a read position over a borrowed datagram and fails closed
//! when a read would run past the end, so callers never index raw offsets.

use crate::error::{Error, Result};

/// Read cursor over a borrowed byte buffer
#[derive(Debug)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Create a cursor at the start of `buf`
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current read position
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Take the next `n` bytes, advancing the cursor
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::Truncated {
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Skip `n` bytes (reserved fields)
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    /// Read a `u8`
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a little-endian `u16`
    pub fn read_u16_le(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read a little-endian `u32`
    pub fn read_u32_le(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a little-endian `u64`
    pub fn read_u64_le(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Read a little-endian `f32`
    pub fn read_f32_le(&mut self) -> Result<f32> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_reads() {
        let mut buf = Vec::new();
        buf.push(0xAB);
        buf.extend_from_slice(&0x1234u16.to_le_bytes());
        buf.extend_from_slice(&0xDEADBEEFu32.to_le_bytes());
        buf.extend_from_slice(&0x0102030405060708u64.to_le_bytes());
        buf.extend_from_slice(&1.5f32.to_le_bytes());

        let mut cursor = Cursor::new(&buf);
        assert_eq!(cursor.read_u8().unwrap(), 0xAB);
        assert_eq!(cursor.read_u16_le().unwrap(), 0x1234);
        assert_eq!(cursor.read_u32_le().unwrap(), 0xDEADBEEF);
        assert_eq!(cursor.read_u64_le().unwrap(), 0x0102030405060708);
        assert_eq!(cursor.read_f32_le().unwrap(), 1.5);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_read_past_end_fails() {
        let buf = [0x01, 0x02];
        let mut cursor = Cursor::new(&buf);
        assert!(cursor.read_u32_le().is_err());
        // Failed read must not advance the cursor
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.read_u16_le().unwrap(), 0x0201);
    }

    #[test]
    fn test_skip() {
        let buf = [0x00, 0x00, 0x00, 0x42];
        let mut cursor = Cursor::new(&buf);
        cursor.skip(3).unwrap();
        assert_eq!(cursor.read_u8().unwrap(), 0x42);
        assert!(cursor.skip(1).is_err());
    }

    #[test]
    fn test_truncated_error_reports_sizes() {
        let buf = [0u8; 3];
        let mut cursor = Cursor::new(&buf);
        match cursor.read_u64_le() {
            Err(Error::Truncated { needed, available }) => {
                assert_eq!(needed, 8);
                assert_eq!(available, 3);
            }
            other => panic!("expected Truncated, got {:?}", other),
        }
    }
}
