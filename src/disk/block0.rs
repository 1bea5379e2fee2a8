//! Block0: the driver descriptor record at block 0 of a bootable disk.
//!
//! Reference: Apple's SCSI Manager documentation. Firmware reads this record
//! to locate the installed driver before any filesystem is touched.

use anyhow::{bail, Result};

use crate::bytes::ByteReader;

/// `sbSIGWord` magic number ("ER").
pub const BLOCK0_SIGNATURE: u16 = 0x4552;

/// Fixed capacity of the driver descriptor table.
pub const DRIVER_DESCRIPTOR_SLOTS: usize = 61;

/// Location and size of one installed driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverDescriptor {
    /// First block of the driver binary.
    pub block: u32,
    /// Driver size in blocks, rounded up from its byte length.
    pub size: u16,
    /// Driver type. Always 1 for SCSI drivers.
    pub dtype: u16,
}

/// The 512-byte record at block 0.
///
/// Dev type and dev id have no documented meaning; Apple's hfdisk writes
/// zero for both but System 6's disk utility writes 1, so we follow the
/// utility that shipped with the hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block0 {
    pub blk_size: u16,
    pub blk_count: u32,
    pub dev_type: u16,
    pub dev_id: u16,
    pub data: u32,
    pub drvr_count: u16,
    pub drivers: [DriverDescriptor; DRIVER_DESCRIPTOR_SLOTS],
}

impl Block0 {
    /// Block0 for an image of `blk_count` total blocks with a single
    /// installed driver.
    pub fn with_driver(blk_count: u32, driver: DriverDescriptor) -> Self {
        let mut drivers = [DriverDescriptor::default(); DRIVER_DESCRIPTOR_SLOTS];
        drivers[0] = driver;
        Self {
            blk_size: 512,
            blk_count,
            dev_type: 1,
            dev_id: 1,
            data: 0,
            drvr_count: 1,
            drivers,
        }
    }

    /// Serialize to exactly 512 bytes.
    ///
    /// A length other than 512 is a programming defect, reported as a fatal
    /// error rather than silently corrupting the image.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(512);
        buf.extend_from_slice(&BLOCK0_SIGNATURE.to_be_bytes());
        buf.extend_from_slice(&self.blk_size.to_be_bytes());
        buf.extend_from_slice(&self.blk_count.to_be_bytes());
        buf.extend_from_slice(&self.dev_type.to_be_bytes());
        buf.extend_from_slice(&self.dev_id.to_be_bytes());
        buf.extend_from_slice(&self.data.to_be_bytes());
        buf.extend_from_slice(&self.drvr_count.to_be_bytes());
        for descriptor in &self.drivers {
            buf.extend_from_slice(&descriptor.block.to_be_bytes());
            buf.extend_from_slice(&descriptor.size.to_be_bytes());
            buf.extend_from_slice(&descriptor.dtype.to_be_bytes());
        }
        buf.extend_from_slice(&[0u8; 6]);
        if buf.len() != 512 {
            bail!(
                "internal invariant violated: Block0 serialized to {} bytes, expected 512",
                buf.len()
            );
        }
        Ok(buf)
    }

    /// Parse a 512-byte Block0 record.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data);
        let sig = reader.u16()?;
        if sig != BLOCK0_SIGNATURE {
            bail!("bad Block0 signature 0x{:04x}, expected 0x4552", sig);
        }
        let blk_size = reader.u16()?;
        let blk_count = reader.u32()?;
        let dev_type = reader.u16()?;
        let dev_id = reader.u16()?;
        let data_field = reader.u32()?;
        let drvr_count = reader.u16()?;
        let mut drivers = [DriverDescriptor::default(); DRIVER_DESCRIPTOR_SLOTS];
        for descriptor in drivers.iter_mut() {
            descriptor.block = reader.u32()?;
            descriptor.size = reader.u16()?;
            descriptor.dtype = reader.u16()?;
        }
        Ok(Self {
            blk_size,
            blk_count,
            dev_type,
            dev_id,
            data: data_field,
            drvr_count,
            drivers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Block0 {
        Block0::with_driver(
            2048,
            DriverDescriptor {
                block: 64,
                size: 3,
                dtype: 1,
            },
        )
    }

    #[test]
    fn serializes_to_exactly_512_bytes() {
        assert_eq!(sample().to_bytes().unwrap().len(), 512);
    }

    #[test]
    fn round_trips() {
        let block0 = sample();
        let parsed = Block0::from_bytes(&block0.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, block0);
        assert_eq!(parsed.drivers[0].block, 64);
        assert_eq!(parsed.drivers[0].size, 3);
        assert_eq!(parsed.drivers[1], DriverDescriptor::default());
    }

    #[test]
    fn rejects_bad_signature() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes[0] = 0;
        assert!(Block0::from_bytes(&bytes).is_err());
    }

    #[test]
    fn signature_is_first_field() {
        let bytes = sample().to_bytes().unwrap();
        assert_eq!(&bytes[0..2], &[0x45, 0x52]);
    }
}
