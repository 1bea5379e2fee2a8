//! The seam between the packing pipeline and HFS serialization.

use anyhow::Result;

use super::{Folder, Volume};

/// Encodes and decodes HFS filesystem images.
///
/// The production implementation shells out to hfsutils; tests substitute a
/// stub so packing behavior can be checked without host tools.
pub trait HfsCodec {
    /// Serialize `volume` into an HFS image of exactly `size_bytes` bytes.
    fn encode(&self, volume: &Volume, size_bytes: u64) -> Result<Vec<u8>>;

    /// Read the directory tree out of an HFS image.
    fn decode(&self, image: &[u8]) -> Result<Folder>;
}
