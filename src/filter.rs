//! Processor architecture classification for classic Mac executables.
//!
//! A 68k application carries its code in `CODE` resources; a PowerPC
//! application declares code fragments in a `cfrg` resource. Fat binaries
//! carry both. The target hardware is 68k only, so anything that declares
//! architectures without including 68k gets rejected.

use anyhow::Result;

use crate::metadata::resource::resource_types;

/// Resource type declaring PowerPC code fragments.
pub const TYPE_CODE_FRAGMENT: [u8; 4] = *b"cfrg";

/// Resource type holding 68k code segments.
pub const TYPE_CODE_SEGMENT: [u8; 4] = *b"CODE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    M68k,
    PowerPc,
}

/// Architectures an executable's resource fork declares.
///
/// Presence of a `cfrg` lump is taken to mean PowerPC support without
/// inspecting the fragment's processor field.
pub fn supported_archs(rsrc: &[u8]) -> Result<Vec<Arch>> {
    let types = resource_types(rsrc)?;

    let mut archs = Vec::new();
    if types.contains(&TYPE_CODE_FRAGMENT) {
        archs.push(Arch::PowerPc);
    }
    if types.contains(&TYPE_CODE_SEGMENT) {
        archs.push(Arch::M68k);
    }
    Ok(archs)
}

/// Accept unless the declared set is non-empty and excludes 68k.
///
/// Non-executables declare nothing and pass.
pub fn is_compatible(archs: &[Arch]) -> bool {
    archs.is_empty() || archs.contains(&Arch::M68k)
}
