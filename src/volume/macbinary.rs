//! MacBinary II encoding, the bridge format for moving files in and out of
//! HFS images with `hcopy -m`.
//!
//! A MacBinary file is a 128-byte header followed by the data fork and the
//! resource fork, each zero-padded to a 128-byte boundary. The header CRC is
//! CRC-16/XMODEM over bytes 0-123.

use anyhow::{bail, Result};

use super::FileEntry;
use crate::bytes::ByteReader;

const HEADER_SIZE: usize = 128;
const CHUNK: usize = 128;
const MACBINARY_II_VERSION: u8 = 129;

/// Encode a named file as MacBinary II.
pub fn encode(name: &[u8], file: &FileEntry) -> Result<Vec<u8>> {
    if name.is_empty() || name.len() > 63 {
        bail!(
            "MacBinary name must be 1-63 bytes, got {} for '{}'",
            name.len(),
            String::from_utf8_lossy(name)
        );
    }

    let mut header = [0u8; HEADER_SIZE];
    header[1] = name.len() as u8;
    header[2..2 + name.len()].copy_from_slice(name);
    header[65..69].copy_from_slice(&file.file_type);
    header[69..73].copy_from_slice(&file.creator);
    header[73] = (file.finder_flags >> 8) as u8;
    header[75..77].copy_from_slice(&file.x.to_be_bytes());
    header[77..79].copy_from_slice(&file.y.to_be_bytes());
    header[83..87].copy_from_slice(&(file.data.len() as u32).to_be_bytes());
    header[87..91].copy_from_slice(&(file.rsrc.len() as u32).to_be_bytes());
    header[101] = (file.finder_flags & 0xff) as u8;
    header[122] = MACBINARY_II_VERSION;
    header[123] = MACBINARY_II_VERSION;
    let crc = crc16_xmodem(&header[..124]);
    header[124..126].copy_from_slice(&crc.to_be_bytes());

    let mut out = Vec::with_capacity(
        HEADER_SIZE + padded_len(file.data.len()) + padded_len(file.rsrc.len()),
    );
    out.extend_from_slice(&header);
    push_padded_fork(&mut out, &file.data);
    push_padded_fork(&mut out, &file.rsrc);
    Ok(out)
}

/// Decode a MacBinary II file into a name and a [`FileEntry`].
pub fn decode(raw: &[u8]) -> Result<(Vec<u8>, FileEntry)> {
    if raw.len() < HEADER_SIZE {
        bail!("MacBinary input is {} bytes, shorter than the header", raw.len());
    }
    let header = &raw[..HEADER_SIZE];
    if header[0] != 0 {
        bail!("bad MacBinary header: nonzero version byte {}", header[0]);
    }
    let name_len = header[1] as usize;
    if name_len == 0 || name_len > 63 {
        bail!("bad MacBinary name length {}", name_len);
    }
    if header[122] >= MACBINARY_II_VERSION {
        let expected = crc16_xmodem(&header[..124]);
        let stored = u16::from_be_bytes([header[124], header[125]]);
        if stored != expected {
            bail!(
                "MacBinary header CRC mismatch: stored 0x{:04x}, computed 0x{:04x}",
                stored,
                expected
            );
        }
    }

    let name = header[2..2 + name_len].to_vec();

    let mut reader = ByteReader::new(header);
    reader.seek(65)?;
    let file_type: [u8; 4] = reader.array()?;
    let creator: [u8; 4] = reader.array()?;
    let flags_high = reader.u8()?;
    reader.skip(1)?;
    let x = reader.i16()?;
    let y = reader.i16()?;
    reader.seek(83)?;
    let data_len = reader.u32()? as usize;
    let rsrc_len = reader.u32()? as usize;
    reader.seek(101)?;
    let flags_low = reader.u8()?;

    let data_start = HEADER_SIZE;
    let rsrc_start = data_start + padded_len(data_len);
    if raw.len() < rsrc_start + rsrc_len {
        bail!(
            "MacBinary payload truncated: need {} bytes, have {}",
            rsrc_start + rsrc_len,
            raw.len()
        );
    }

    let file = FileEntry {
        data: raw[data_start..data_start + data_len].to_vec(),
        rsrc: raw[rsrc_start..rsrc_start + rsrc_len].to_vec(),
        file_type,
        creator,
        finder_flags: u16::from_be_bytes([flags_high, flags_low]),
        x,
        y,
    };
    Ok((name, file))
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(CHUNK) * CHUNK
}

fn push_padded_fork(out: &mut Vec<u8>, fork: &[u8]) {
    out.extend_from_slice(fork);
    out.extend(std::iter::repeat(0u8).take(padded_len(fork.len()) - fork.len()));
}

fn crc16_xmodem(bytes: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in bytes {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file() -> FileEntry {
        FileEntry {
            data: b"data fork contents".to_vec(),
            rsrc: vec![0x42u8; 300],
            file_type: *b"APPL",
            creator: *b"MSWD",
            finder_flags: 0x2180,
            x: 12,
            y: -4,
        }
    }

    #[test]
    fn round_trips() {
        let encoded = encode(b"My App", &sample_file()).unwrap();
        let (name, decoded) = decode(&encoded).unwrap();
        assert_eq!(name, b"My App");
        assert_eq!(decoded, sample_file());
    }

    #[test]
    fn forks_are_chunk_aligned() {
        let encoded = encode(b"x", &sample_file()).unwrap();
        assert_eq!(encoded.len() % CHUNK, 0);
        // header + 128 (18-byte data fork) + 384 (300-byte rsrc fork)
        assert_eq!(encoded.len(), 128 + 128 + 384);
    }

    #[test]
    fn corrupted_header_fails_crc() {
        let mut encoded = encode(b"x", &sample_file()).unwrap();
        encoded[65] = b'Z';
        assert!(decode(&encoded).is_err());
    }

    #[test]
    fn known_crc_value() {
        // CRC-16/XMODEM check value for "123456789"
        assert_eq!(crc16_xmodem(b"123456789"), 0x31C3);
    }

    #[test]
    fn rejects_unrepresentable_names() {
        assert!(encode(b"", &FileEntry::default()).is_err());
        assert!(encode(&[b'a'; 64], &FileEntry::default()).is_err());
    }
}
