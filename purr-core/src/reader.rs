//! Bounds-checked cursor over an in-memory byte buffer

use crate::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};

/// Sequential reader over untrusted bytes.
///
/// Every read past the end of the buffer fails with [`Error::UnexpectedEof`]
/// and leaves the cursor untouched.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current offset from the start of the buffer
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true once every byte has been consumed
    pub fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Reads a single byte
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_exact(1)?[0])
    }

    /// Reads a little-endian u16
    pub fn read_u16_le(&mut self) -> Result<u16> {
        self.read_exact(2).map(LittleEndian::read_u16)
    }

    /// Reads a little-endian u32
    pub fn read_u32_le(&mut self) -> Result<u32> {
        self.read_exact(4).map(LittleEndian::read_u32)
    }

    /// Borrows the next `n` bytes and advances past them
    pub fn read_exact(&mut self, n: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(Error::UnexpectedEof {
                offset: self.pos,
                needed: n - remaining,
            });
        }

        let start = self.pos;
        self.pos += n;
        Ok(&self.data[start..self.pos])
    }

    /// Advances past the next `n` bytes
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_exact(n).map(|_| ())
    }

    /// Skips a chain of length-prefixed sub-blocks up to and including the
    /// zero-length terminator
    pub fn skip_sub_blocks(&mut self) -> Result<()> {
        loop {
            let len = self.read_u8()? as usize;
            if len == 0 {
                return Ok(());
            }
            self.skip(len)?;
        }
    }

    /// Concatenates a chain of length-prefixed sub-blocks into `out`,
    /// consuming the zero-length terminator
    pub fn read_sub_blocks(&mut self, out: &mut Vec<u8>) -> Result<()> {
        loop {
            let len = self.read_u8()? as usize;
            if len == 0 {
                return Ok(());
            }
            out.extend_from_slice(self.read_exact(len)?);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_reads() {
        let mut reader = ByteReader::new(&[0x01, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12]);

        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert_eq!(reader.read_u16_le().unwrap(), 0x1234);
        assert_eq!(reader.read_u32_le().unwrap(), 0x1234_5678);
        assert!(reader.at_end());
    }

    #[test]
    fn test_eof_is_an_error_and_does_not_move() {
        let mut reader = ByteReader::new(&[0xAA, 0xBB, 0xCC]);
        reader.skip(2).unwrap();

        match reader.read_u16_le() {
            Err(Error::UnexpectedEof { offset, needed }) => {
                assert_eq!(offset, 2);
                assert_eq!(needed, 1);
            }
            other => panic!("expected eof, got {:?}", other),
        }

        assert_eq!(reader.position(), 2);
        assert_eq!(reader.read_u8().unwrap(), 0xCC);
        assert!(reader.read_u8().is_err());
        assert!(reader.skip(1).is_err());
    }

    #[test]
    fn test_sub_block_chain() {
        let data = [3, b'a', b'b', b'c', 2, b'd', b'e', 0, 0x3B];
        let mut reader = ByteReader::new(&data);

        let mut out = Vec::new();
        reader.read_sub_blocks(&mut out).unwrap();
        assert_eq!(out, b"abcde");
        assert_eq!(reader.read_u8().unwrap(), 0x3B);

        let mut reader = ByteReader::new(&data);
        reader.skip_sub_blocks().unwrap();
        assert_eq!(reader.remaining(), 1);
    }

    #[test]
    fn test_unterminated_sub_blocks() {
        let mut reader = ByteReader::new(&[4, 1, 2]);
        let mut out = Vec::new();
        assert!(reader.read_sub_blocks(&mut out).is_err());

        let mut reader = ByteReader::new(&[2, 1, 2]);
        assert!(reader.skip_sub_blocks().is_err());
    }
}
