//! Apple partition map entries.
//!
//! Each entry is a fixed 512-byte record. The driver-only fields past
//! `flags` are zero for everything except the driver partition.

use anyhow::{bail, Result};

use super::driver::DriverSpec;
use crate::bytes::ByteReader;

/// Partition map entry signature ("PM").
pub const PARTITION_SIGNATURE: u16 = 0x504D;

/// Slots in the boot-argument table of a driver partition.
pub const BOOT_ARG_SLOTS: usize = 32;

const NAME_FIELD_LEN: usize = 32;
const TYPE_FIELD_LEN: usize = 32;
const PROCESSOR_FIELD_LEN: usize = 16;

/// One 512-byte partition map entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionMapEntry {
    /// Total live entries in the map. Identical across all entries.
    pub map_entries: u32,
    pub pblock_start: u32,
    pub pblocks: u32,
    /// ASCII partition name, at most 32 bytes.
    pub name: Vec<u8>,
    /// ASCII partition type, at most 32 bytes.
    pub ptype: Vec<u8>,
    pub lblock_start: u32,
    pub lblocks: u32,
    /// Apple documents this as A/UX-only. Real drivers disagree.
    pub flags: u32,
    pub boot_block: u32,
    pub boot_bytes: u32,
    pub load_addr: u32,
    pub load_addr_2: u32,
    pub goto_addr: u32,
    pub goto_addr_2: u32,
    pub checksum: u32,
    /// ASCII processor id, at most 16 bytes. Driver partitions only.
    pub processor: Vec<u8>,
    pub boot_args: [u32; BOOT_ARG_SLOTS],
}

impl PartitionMapEntry {
    fn blank(name: &[u8], ptype: &[u8], start_block: u32, block_count: u32, flags: u32) -> Self {
        Self {
            map_entries: 0,
            pblock_start: start_block,
            pblocks: block_count,
            name: name.to_vec(),
            ptype: ptype.to_vec(),
            lblock_start: 0,
            lblocks: block_count,
            flags,
            boot_block: 0,
            boot_bytes: 0,
            load_addr: 0,
            load_addr_2: 0,
            goto_addr: 0,
            goto_addr_2: 0,
            checksum: 0,
            processor: Vec::new(),
            boot_args: [0u32; BOOT_ARG_SLOTS],
        }
    }

    /// The primary HFS volume partition.
    pub fn volume(start_block: u32, block_count: u32) -> Self {
        Self::blank(b"MacOS", b"Apple_HFS", start_block, block_count, 0)
    }

    /// The self-describing entry for the partition map itself (blocks 1-63).
    pub fn partition_map() -> Self {
        Self::blank(b"Apple", b"Apple_partition_map", 1, 63, 0)
    }

    /// The driver partition carrying the installed SCSI driver.
    pub fn driver(spec: &DriverSpec, start_block: u32, block_count: u32) -> Self {
        let mut entry = Self::blank(
            b"Macintosh",
            spec.partition_type.as_bytes(),
            start_block,
            block_count,
            spec.partition_flags,
        );
        entry.boot_block = spec.booter;
        entry.boot_bytes = spec.bytes;
        entry.load_addr = spec.load_address_0;
        entry.load_addr_2 = spec.load_address_1;
        entry.goto_addr = spec.goto_address_0;
        entry.goto_addr_2 = spec.goto_address_1;
        entry.checksum = spec.checksum;
        entry.processor = spec.processor.as_bytes().to_vec();
        for (slot, value) in entry.boot_args.iter_mut().zip(spec.boot_args.iter()) {
            *slot = *value;
        }
        entry
    }

    /// Serialize to exactly 512 bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(512);
        buf.extend_from_slice(&PARTITION_SIGNATURE.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&self.map_entries.to_be_bytes());
        buf.extend_from_slice(&self.pblock_start.to_be_bytes());
        buf.extend_from_slice(&self.pblocks.to_be_bytes());
        push_padded(&mut buf, &self.name, NAME_FIELD_LEN, "partition name")?;
        push_padded(&mut buf, &self.ptype, TYPE_FIELD_LEN, "partition type")?;
        buf.extend_from_slice(&self.lblock_start.to_be_bytes());
        buf.extend_from_slice(&self.lblocks.to_be_bytes());
        buf.extend_from_slice(&self.flags.to_be_bytes());
        buf.extend_from_slice(&self.boot_block.to_be_bytes());
        buf.extend_from_slice(&self.boot_bytes.to_be_bytes());
        buf.extend_from_slice(&self.load_addr.to_be_bytes());
        buf.extend_from_slice(&self.load_addr_2.to_be_bytes());
        buf.extend_from_slice(&self.goto_addr.to_be_bytes());
        buf.extend_from_slice(&self.goto_addr_2.to_be_bytes());
        buf.extend_from_slice(&self.checksum.to_be_bytes());
        push_padded(&mut buf, &self.processor, PROCESSOR_FIELD_LEN, "processor id")?;
        for arg in &self.boot_args {
            buf.extend_from_slice(&arg.to_be_bytes());
        }
        buf.extend_from_slice(&[0u8; 62 * 4]);
        if buf.len() != 512 {
            bail!(
                "internal invariant violated: partition map entry serialized to {} bytes, expected 512",
                buf.len()
            );
        }
        Ok(buf)
    }

    /// Parse a 512-byte partition map entry.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data);
        let sig = reader.u16()?;
        if sig != PARTITION_SIGNATURE {
            bail!("bad partition map signature 0x{:04x}, expected 0x504d", sig);
        }
        reader.skip(2)?;
        let map_entries = reader.u32()?;
        let pblock_start = reader.u32()?;
        let pblocks = reader.u32()?;
        let name = trim_padding(reader.take(NAME_FIELD_LEN)?);
        let ptype = trim_padding(reader.take(TYPE_FIELD_LEN)?);
        let lblock_start = reader.u32()?;
        let lblocks = reader.u32()?;
        let flags = reader.u32()?;
        let boot_block = reader.u32()?;
        let boot_bytes = reader.u32()?;
        let load_addr = reader.u32()?;
        let load_addr_2 = reader.u32()?;
        let goto_addr = reader.u32()?;
        let goto_addr_2 = reader.u32()?;
        let checksum = reader.u32()?;
        let processor = trim_padding(reader.take(PROCESSOR_FIELD_LEN)?);
        let mut boot_args = [0u32; BOOT_ARG_SLOTS];
        for slot in boot_args.iter_mut() {
            *slot = reader.u32()?;
        }
        Ok(Self {
            map_entries,
            pblock_start,
            pblocks,
            name,
            ptype,
            lblock_start,
            lblocks,
            flags,
            boot_block,
            boot_bytes,
            load_addr,
            load_addr_2,
            goto_addr,
            goto_addr_2,
            checksum,
            processor,
            boot_args,
        })
    }
}

fn push_padded(buf: &mut Vec<u8>, value: &[u8], width: usize, what: &str) -> Result<()> {
    if value.len() > width {
        bail!(
            "{} is {} bytes, limit is {}: {:?}",
            what,
            value.len(),
            width,
            String::from_utf8_lossy(value)
        );
    }
    buf.extend_from_slice(value);
    buf.extend(std::iter::repeat(0u8).take(width - value.len()));
    Ok(())
}

fn trim_padding(field: &[u8]) -> Vec<u8> {
    let end = field.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    field[..end].to_vec()
}
