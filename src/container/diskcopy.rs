//! DiskCopy 4.2 image reading.
//!
//! Format reference: <https://www.discferret.com/wiki/Apple_DiskCopy_4.2>
//! The header is 84 bytes, big-endian, followed by `data_size` bytes of
//! sector data and `tag_size` bytes of tag data we do not use.

use anyhow::{bail, Context, Result};
use std::io::Read;

use crate::bytes::ByteReader;

/// Magic number at header offset 82.
pub const DISKCOPY_MAGIC: u16 = 0x0100;

const NAME_SIZE: usize = 63;
const HEADER_SIZE: usize = 84;

/// A decoded DiskCopy 4.2 image.
#[derive(Debug, Clone)]
pub struct DiskCopyImage {
    /// Image name from the header. May be empty.
    pub name: Vec<u8>,
    /// Raw sector data; a filesystem image.
    pub data: Vec<u8>,
    /// Recorded but not verified.
    pub data_checksum: u32,
    /// Recorded but not verified.
    pub tag_checksum: u32,
    pub disk_type: u8,
    pub format: u8,
}

/// Read a DiskCopy 4.2 image from a stream.
///
/// Fails on a wrong magic number or when the stream holds fewer payload
/// bytes than the header declares.
pub fn read_diskcopy<R: Read>(input: &mut R) -> Result<DiskCopyImage> {
    let mut header = [0u8; HEADER_SIZE];
    input
        .read_exact(&mut header)
        .context("unexpected EOF reading DiskCopy header")?;

    let mut reader = ByteReader::new(&header);
    let name_length = reader.u8()? as usize;
    let name_field = reader.take(NAME_SIZE)?;
    let data_size = reader.u32()?;
    let _tag_size = reader.u32()?;
    let data_checksum = reader.u32()?;
    let tag_checksum = reader.u32()?;
    let disk_type = reader.u8()?;
    let format = reader.u8()?;
    let magic = reader.u16()?;

    if magic != DISKCOPY_MAGIC {
        bail!("invalid DiskCopy magic number 0x{:04x}, expected 0x0100", magic);
    }

    let name = name_field[..name_length.min(NAME_SIZE)].to_vec();

    let mut data = vec![0u8; data_size as usize];
    input
        .read_exact(&mut data)
        .with_context(|| format!("unexpected EOF reading {} bytes of DiskCopy data", data_size))?;

    Ok(DiskCopyImage {
        name,
        data,
        data_checksum,
        tag_checksum,
        disk_type,
        format,
    })
}
