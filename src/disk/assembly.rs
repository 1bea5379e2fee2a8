//! Bootable image assembly: Block0, partition map, driver, payload.
//!
//! Emits one image as a single sequential stream. Every size contract here
//! is checked; a mismatch means the builder and the payload encoder
//! disagree, which is a defect and aborts the run rather than producing an
//! image firmware would choke on.

use anyhow::{bail, Context, Result};
use std::io::Write;

use super::block0::{Block0, DriverDescriptor};
use super::driver::DriverSpec;
use super::partition::PartitionMapEntry;
use super::{
    BLOCK_SIZE, DRIVER_REGION_BLOCKS, DRIVER_START_BLOCK, PARTITION_MAP_BLOCKS,
    PAYLOAD_START_BLOCK,
};

/// Live entries in the partition map: volume, map itself, driver.
pub const LIVE_MAP_ENTRIES: u32 = 3;

/// Payload region size in blocks for an image of `target_blocks`.
pub fn payload_blocks(target_blocks: u32) -> Result<u32> {
    if target_blocks <= PAYLOAD_START_BLOCK {
        bail!(
            "target block count {} leaves no room for a volume payload (layout reserves {} blocks)",
            target_blocks,
            PAYLOAD_START_BLOCK
        );
    }
    Ok(target_blocks - PAYLOAD_START_BLOCK)
}

/// Write a complete bootable image of exactly `target_blocks * 512` bytes.
///
/// `payload` is the serialized HFS volume and must be exactly the payload
/// region size; anything else means the encoder violated its contract.
pub fn write_bootable_image<W: Write>(
    out: &mut W,
    spec: &DriverSpec,
    driver_bin: &[u8],
    payload: &[u8],
    target_blocks: u32,
) -> Result<()> {
    let volume_blocks = payload_blocks(target_blocks)?;
    let mut written: u64 = 0;

    let block0 = Block0::with_driver(
        target_blocks,
        DriverDescriptor {
            block: DRIVER_START_BLOCK,
            size: spec.descriptor_blocks(),
            dtype: 1,
        },
    );
    let block0_bytes = block0.to_bytes()?;
    out.write_all(&block0_bytes).context("writing Block0")?;
    written += block0_bytes.len() as u64;

    let mut entries = [
        PartitionMapEntry::volume(PAYLOAD_START_BLOCK, volume_blocks),
        PartitionMapEntry::partition_map(),
        PartitionMapEntry::driver(spec, DRIVER_START_BLOCK, DRIVER_REGION_BLOCKS),
    ];
    for entry in entries.iter_mut() {
        entry.map_entries = LIVE_MAP_ENTRIES;
        let bytes = entry.to_bytes()?;
        out.write_all(&bytes).context("writing partition map entry")?;
        written += bytes.len() as u64;
    }

    // Reserved map slots stay zero-filled.
    let zero_block = [0u8; BLOCK_SIZE as usize];
    for _ in LIVE_MAP_ENTRIES..PARTITION_MAP_BLOCKS {
        out.write_all(&zero_block)
            .context("writing reserved partition map slot")?;
        written += zero_block.len() as u64;
    }

    let driver_region = DRIVER_REGION_BLOCKS as u64 * BLOCK_SIZE;
    if driver_bin.len() as u64 > driver_region {
        bail!(
            "driver binary is {} bytes, larger than the {}-byte driver region",
            driver_bin.len(),
            driver_region
        );
    }
    out.write_all(driver_bin).context("writing driver binary")?;
    let padding = vec![0u8; (driver_region - driver_bin.len() as u64) as usize];
    out.write_all(&padding).context("padding driver region")?;
    written += driver_region;

    let expected_payload = volume_blocks as u64 * BLOCK_SIZE;
    if payload.len() as u64 != expected_payload {
        bail!(
            "internal invariant violated: volume payload is {} bytes, expected {} ({} blocks)",
            payload.len(),
            expected_payload,
            volume_blocks
        );
    }
    out.write_all(payload).context("writing volume payload")?;
    written += payload.len() as u64;

    let expected_total = target_blocks as u64 * BLOCK_SIZE;
    if written != expected_total {
        bail!(
            "internal invariant violated: image is {} bytes, expected {}",
            written,
            expected_total
        );
    }
    Ok(())
}
