//! AppleSingle/AppleDouble sidecar parsing.
//!
//! Downloads fetched over FTP carry resource forks and Finder metadata in
//! `.rsrc` sidecar files using the AppleDouble container. We only care
//! about two entry types: the resource fork (2) and Finder info (9).
//!
//! Format reference: the AppleSingle/AppleDouble format specification,
//! also described at <http://formats.kaitai.io/apple_single_double/>.

use anyhow::{bail, Result};

use crate::bytes::ByteReader;

pub const SIGNATURE_APPLE_SINGLE: u32 = 0x0005_1600;
pub const SIGNATURE_APPLE_DOUBLE: u32 = 0x0005_1607;

const ENTRY_RESOURCE_FORK: u32 = 2;
const ENTRY_FINDER_INFO: u32 = 9;

/// FInfo as stored in the Finder info entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinderInfo {
    pub file_type: [u8; 4],
    pub creator: [u8; 4],
    pub flags: u16,
    /// Icon position within the containing window, vertical then horizontal.
    pub x: i16,
    pub y: i16,
    pub folder: u16,
}

/// The entries we extract from a sidecar.
#[derive(Debug, Clone, Default)]
pub struct AppleDouble {
    pub resource_fork: Option<Vec<u8>>,
    pub finder_info: Option<FinderInfo>,
}

/// Parse an AppleSingle or AppleDouble container.
pub fn parse(data: &[u8]) -> Result<AppleDouble> {
    let mut reader = ByteReader::new(data);

    let signature = reader.u32()?;
    if signature != SIGNATURE_APPLE_SINGLE && signature != SIGNATURE_APPLE_DOUBLE {
        bail!("invalid AppleDouble signature 0x{:08x}", signature);
    }
    let _version = reader.u32()?;
    reader.skip(16)?;
    let num_entries = reader.u16()?;

    let mut descriptors = Vec::with_capacity(num_entries as usize);
    for _ in 0..num_entries {
        let etype = reader.u32()?;
        let offset = reader.u32()? as usize;
        let length = reader.u32()? as usize;
        descriptors.push((etype, offset, length));
    }

    let mut parsed = AppleDouble::default();
    for (etype, offset, length) in descriptors {
        match etype {
            ENTRY_RESOURCE_FORK => {
                reader.seek(offset)?;
                parsed.resource_fork = Some(reader.take(length)?.to_vec());
            }
            ENTRY_FINDER_INFO => {
                reader.seek(offset)?;
                parsed.finder_info = Some(parse_finder_info(&mut reader)?);
            }
            _ => {}
        }
    }

    Ok(parsed)
}

fn parse_finder_info(reader: &mut ByteReader) -> Result<FinderInfo> {
    Ok(FinderInfo {
        file_type: reader.array()?,
        creator: reader.array()?,
        flags: reader.u16()?,
        x: reader.i16()?,
        y: reader.i16()?,
        folder: reader.u16()?,
    })
}
