//! Big-endian byte cursors used by block codecs.
//!
//! Every operation advances the cursor. Running past the end of the
//! underlying slice is reported as [`ChainError::InconsistentBlockBytes`],
//! since it can only happen when a codec disagrees with its declared size.

use crate::error::{ChainError, Result};

/// Writing cursor over a mutable byte slice.
pub struct ByteWriter<'a> {
    bytes: &'a mut [u8],
    position: usize,
}

impl<'a> ByteWriter<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    /// Bytes written so far.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left before the end of the slice.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    fn advance(&mut self, len: usize) -> Result<&mut [u8]> {
        if len > self.remaining() {
            return Err(ChainError::InconsistentBlockBytes {
                expected: self.bytes.len(),
                actual: self.position + len,
            });
        }
        let start = self.position;
        self.position += len;
        Ok(&mut self.bytes[start..self.position])
    }

    pub fn write_u64(&mut self, v: u64) -> Result<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    pub fn write_u16(&mut self, v: u16) -> Result<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.write_bytes(&[v])
    }

    /// Copy raw bytes into the cursor.
    pub fn write_bytes(&mut self, src: &[u8]) -> Result<()> {
        self.advance(src.len())?.copy_from_slice(src);
        Ok(())
    }
}

/// Reading cursor over a byte slice.
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left before the end of the slice.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    /// Borrow the next `len` bytes without copying.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(ChainError::InconsistentBlockBytes {
                expected: self.bytes.len(),
                actual: self.position + len,
            });
        }
        let start = self.position;
        self.position += len;
        Ok(&self.bytes[start..self.position])
    }

    /// Fill `dst` from the cursor.
    pub fn copy_to(&mut self, dst: &mut [u8]) -> Result<()> {
        dst.copy_from_slice(self.read_bytes(dst.len())?);
        Ok(())
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        self.copy_to(&mut out)?;
        Ok(out)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }
}
