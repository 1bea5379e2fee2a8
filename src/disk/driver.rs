//! Driver configuration and binary loading.
//!
//! The SCSI driver installed at blocks 64-95 is a vendor blob; its partition
//! metadata (load addresses, checksum, boot arguments) comes from a TOML
//! file shipped alongside it.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use super::{BLOCK_SIZE, DRIVER_REGION_BLOCKS};

/// Metadata for the installed driver's partition map entry.
#[derive(Debug, Clone)]
pub struct DriverSpec {
    pub partition_type: String,
    pub partition_flags: u32,
    pub booter: u32,
    /// Declared driver length in bytes. Also sizes the Block0 descriptor.
    pub bytes: u32,
    pub load_address_0: u32,
    pub load_address_1: u32,
    pub goto_address_0: u32,
    pub goto_address_1: u32,
    pub checksum: u32,
    pub processor: String,
    pub boot_args: Vec<u32>,
}

impl DriverSpec {
    /// Driver size in blocks for the Block0 descriptor, rounded up.
    pub fn descriptor_blocks(&self) -> u16 {
        (u64::from(self.bytes).div_ceil(BLOCK_SIZE)) as u16
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DriverToml {
    driver: DriverSectionToml,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DriverSectionToml {
    partition_type: String,
    partition_flags: u32,
    booter: u32,
    bytes: u32,
    load_address_0: u32,
    load_address_1: u32,
    goto_address_0: u32,
    goto_address_1: u32,
    checksum: u32,
    processor: String,
    boot_args: Vec<u32>,
}

/// Load and validate a driver configuration file.
pub fn load_driver_spec(path: &Path) -> Result<DriverSpec> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading driver config '{}'", path.display()))?;
    let parsed: DriverToml = toml::from_str(&text)
        .with_context(|| format!("parsing driver config '{}'", path.display()))?;
    let section = parsed.driver;

    if !section.partition_type.is_ascii() || section.partition_type.len() > 32 {
        bail!(
            "invalid driver config '{}': partition_type must be ASCII, at most 32 bytes",
            path.display()
        );
    }
    if !section.processor.is_ascii() || section.processor.len() > 16 {
        bail!(
            "invalid driver config '{}': processor must be ASCII, at most 16 bytes",
            path.display()
        );
    }
    if section.boot_args.len() > 32 {
        bail!(
            "invalid driver config '{}': at most 32 boot_args, got {}",
            path.display(),
            section.boot_args.len()
        );
    }

    Ok(DriverSpec {
        partition_type: section.partition_type,
        partition_flags: section.partition_flags,
        booter: section.booter,
        bytes: section.bytes,
        load_address_0: section.load_address_0,
        load_address_1: section.load_address_1,
        goto_address_0: section.goto_address_0,
        goto_address_1: section.goto_address_1,
        checksum: section.checksum,
        processor: section.processor,
        boot_args: section.boot_args,
    })
}

/// Load the driver binary. It must fit the 32-block driver region.
pub fn load_driver_binary(path: &Path) -> Result<Vec<u8>> {
    let data =
        fs::read(path).with_context(|| format!("reading driver binary '{}'", path.display()))?;
    let limit = DRIVER_REGION_BLOCKS as u64 * BLOCK_SIZE;
    if data.len() as u64 > limit {
        bail!(
            "driver binary '{}' is {} bytes, larger than the {}-byte driver region",
            path.display(),
            data.len(),
            limit
        );
    }
    Ok(data)
}
