//! Big-endian cursor over a byte slice.
//!
//! All of the on-disk structures this crate reads (DiskCopy headers,
//! AppleDouble sidecars, resource maps) are packed big-endian records, so a
//! single bounds-checked reader covers them all.

use anyhow::{bail, Result};

pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        if count > self.data.len() - self.pos {
            bail!(
                "unexpected end of data: need {} bytes at offset {}, have {}",
                count,
                self.pos,
                self.data.len() - self.pos
            );
        }
        let slice = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    pub(crate) fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let slice = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub(crate) fn i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.array()?))
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    pub(crate) fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            bail!(
                "seek target {} beyond end of data ({} bytes)",
                pos,
                self.data.len()
            );
        }
        self.pos = pos;
        Ok(())
    }

    pub(crate) fn skip(&mut self, count: usize) -> Result<()> {
        self.take(count)?;
        Ok(())
    }
}
