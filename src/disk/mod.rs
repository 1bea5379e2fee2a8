//! On-disk layout for bootable SCSI volume images.
//!
//! Every emitted image follows the fixed layout period firmware walks at
//! startup, in 512-byte blocks:
//!
//! ```text
//! block 0        Block0 (driver descriptor record)
//! blocks 1-63    Apple partition map (3 live entries, rest zeroed)
//! blocks 64-95   installed SCSI driver binary
//! blocks 96..    HFS volume payload
//! ```

pub mod assembly;
pub mod block0;
pub mod driver;
pub mod partition;

pub use assembly::write_bootable_image;
pub use driver::DriverSpec;

/// Sector size in bytes. Everything in the layout is counted in these.
pub const BLOCK_SIZE: u64 = 512;

/// Blocks reserved for the partition map (blocks 1-63).
pub const PARTITION_MAP_BLOCKS: u32 = 63;

/// First block of the driver region.
pub const DRIVER_START_BLOCK: u32 = 64;

/// Blocks reserved for the driver binary (blocks 64-95).
pub const DRIVER_REGION_BLOCKS: u32 = 32;

/// First block of the HFS volume payload (Block0 + map + driver).
pub const PAYLOAD_START_BLOCK: u32 = 96;

/// Round a byte count up to whole 512-byte blocks.
pub fn to_blocks(byte_count: u64) -> u64 {
    byte_count.div_ceil(BLOCK_SIZE)
}
