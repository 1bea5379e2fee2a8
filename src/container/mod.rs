//! Input container classification and normalization.
//!
//! Downloaded software arrives in several shapes: raw HFS sector images,
//! DiskCopy 4.2 images, StuffIt archives, and plain files with optional
//! AppleDouble sidecars. This module decides which is which; the packer
//! decides what to do about it.

pub mod diskcopy;
pub mod extract;

use std::path::Path;

/// What a file extension says about a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// Raw `.dsk` sector image; the file bytes are the filesystem.
    RawImage,
    /// DiskCopy 4.2 `.img`/`.image`; header plus payload.
    DiskCopy,
    /// StuffIt `.sit` archive; expanded by the external extraction tool.
    Archive,
}

/// Classify a path by extension. `None` means a plain file.
pub fn classify(path: &Path) -> Option<ContainerKind> {
    let ext = path.extension()?.to_str()?;
    if ext.eq_ignore_ascii_case("dsk") {
        Some(ContainerKind::RawImage)
    } else if ext.eq_ignore_ascii_case("img") || ext.eq_ignore_ascii_case("image") {
        Some(ContainerKind::DiskCopy)
    } else if ext.eq_ignore_ascii_case("sit") {
        Some(ContainerKind::Archive)
    } else {
        None
    }
}
