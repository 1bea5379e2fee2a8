//! Minimal resource fork reading: the type list only.
//!
//! The architecture filter only needs to know which resource types exist in
//! a fork, so this reader walks the resource map's type list and nothing
//! else. Layout per Inside Macintosh: fork header, then a map whose type
//! list offset sits 24 bytes into the map.

use anyhow::{bail, Result};

use crate::bytes::ByteReader;

/// List the resource type codes present in a resource fork.
///
/// Fails on anything that is not a structurally valid fork; callers treat
/// that as "not a resource fork" rather than bad input.
pub fn resource_types(rsrc: &[u8]) -> Result<Vec<[u8; 4]>> {
    let mut reader = ByteReader::new(rsrc);

    let _data_offset = reader.u32()?;
    let map_offset = reader.u32()? as usize;
    let _data_length = reader.u32()?;
    let map_length = reader.u32()? as usize;

    if map_offset >= rsrc.len() || map_length < 30 {
        bail!(
            "invalid resource map location (offset {}, length {})",
            map_offset,
            map_length
        );
    }

    // Type list offset is relative to the map start.
    reader.seek(map_offset + 24)?;
    let type_list_offset = reader.u16()? as usize;
    reader.seek(map_offset + type_list_offset)?;

    // Stored as count minus one; 0xFFFF means an empty list.
    let count = reader.u16()?.wrapping_add(1) as usize;

    let mut types = Vec::with_capacity(count);
    for _ in 0..count {
        let code: [u8; 4] = reader.array()?;
        let _count_minus_one = reader.u16()?;
        let _ref_list_offset = reader.u16()?;
        types.push(code);
    }

    Ok(types)
}

/// Build a structurally valid resource fork containing the given types with
/// no resource data. Test support for the architecture filter.
#[cfg(test)]
pub(crate) fn synthetic_fork(types: &[[u8; 4]]) -> Vec<u8> {
    let mut buf = Vec::new();
    let map_offset = 256u32;
    let type_list_len = 2 + types.len() * 8;
    let map_length = (28 + type_list_len) as u32;

    buf.extend_from_slice(&256u32.to_be_bytes()); // data offset
    buf.extend_from_slice(&map_offset.to_be_bytes());
    buf.extend_from_slice(&0u32.to_be_bytes()); // data length
    buf.extend_from_slice(&map_length.to_be_bytes());
    buf.resize(map_offset as usize, 0);

    // Map: 16-byte header copy, 4-byte handle, file ref, attributes, then
    // the two offsets at map+24 and map+26.
    buf.extend_from_slice(&[0u8; 24]);
    buf.extend_from_slice(&28u16.to_be_bytes()); // type list offset
    buf.extend_from_slice(&(28 + type_list_len as u16).to_be_bytes()); // name list offset
    buf.extend_from_slice(&(types.len() as u16).wrapping_sub(1).to_be_bytes());
    for code in types {
        buf.extend_from_slice(code);
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_types_from_a_synthetic_fork() {
        let fork = synthetic_fork(&[*b"CODE", *b"STR "]);
        let types = resource_types(&fork).unwrap();
        assert_eq!(types, vec![*b"CODE", *b"STR "]);
    }

    #[test]
    fn empty_type_list() {
        let fork = synthetic_fork(&[]);
        assert!(resource_types(&fork).unwrap().is_empty());
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(resource_types(b"not a resource fork").is_err());
        assert!(resource_types(&[]).is_err());
    }

    #[test]
    fn truncated_type_list_is_an_error() {
        let mut fork = synthetic_fork(&[*b"CODE", *b"cfrg"]);
        fork.truncate(fork.len() - 6);
        assert!(resource_types(&fork).is_err());
    }
}
