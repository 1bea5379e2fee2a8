//! In-memory HFS volume model.
//!
//! The packer accumulates entries into a [`Volume`] and hands the whole tree
//! to an [`HfsCodec`] when it is time to serialize. Names are stored as
//! sanitized bytes that already satisfy HFS limits.

pub mod codec;
pub mod hfsutils;
pub mod macbinary;

pub use codec::HfsCodec;
pub use hfsutils::HfsutilsCodec;

use anyhow::{bail, Result};
use std::collections::BTreeMap;

use crate::disk::to_blocks;
use crate::metadata::appledouble::FinderInfo;

/// HFS folder name limit after sanitization, in bytes.
pub const FOLDER_NAME_MAX: usize = 17;

/// HFS file name limit after sanitization, in bytes.
pub const FILE_NAME_MAX: usize = 31;

/// HFS volume name limit, in bytes.
pub const VOLUME_NAME_MAX: usize = 27;

/// A file with both forks and its Finder metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub data: Vec<u8>,
    pub rsrc: Vec<u8>,
    pub file_type: [u8; 4],
    pub creator: [u8; 4],
    pub finder_flags: u16,
    pub x: i16,
    pub y: i16,
}

impl Default for FileEntry {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            rsrc: Vec::new(),
            file_type: *b"????",
            creator: *b"????",
            finder_flags: 0,
            x: 0,
            y: 0,
        }
    }
}

impl FileEntry {
    /// Apply Finder metadata from an AppleDouble sidecar.
    pub fn apply_finder_info(&mut self, info: &FinderInfo) {
        self.file_type = info.file_type;
        self.creator = info.creator;
        self.finder_flags = info.flags;
        self.x = info.x;
        self.y = info.y;
    }

    /// Projected on-disk footprint: each fork rounded up to whole blocks.
    ///
    /// Catalog and allocation overhead is deliberately not modeled here; the
    /// packer's overhead ratio absorbs it globally.
    pub fn footprint(&self) -> u64 {
        (to_blocks(self.data.len() as u64) + to_blocks(self.rsrc.len() as u64)) * 512
    }
}

/// File or folder node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    File(FileEntry),
    Folder(Folder),
}

/// A folder: ordered children keyed by sanitized name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Folder {
    pub children: BTreeMap<Vec<u8>, Node>,
}

impl Folder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: Vec<u8>, node: Node) {
        self.children.insert(name, node);
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Sum of file footprints across the whole subtree.
    pub fn footprint(&self) -> u64 {
        self.children
            .values()
            .map(|node| match node {
                Node::File(file) => file.footprint(),
                Node::Folder(folder) => folder.footprint(),
            })
            .sum()
    }

    /// Count of files across the whole subtree.
    pub fn file_count(&self) -> u64 {
        self.children
            .values()
            .map(|node| match node {
                Node::File(_) => 1,
                Node::Folder(folder) => folder.file_count(),
            })
            .sum()
    }

    /// Navigate to a nested folder, creating intermediate folders.
    ///
    /// Fails if a path component is already taken by a file.
    pub fn folder_at_mut(&mut self, path: &[Vec<u8>]) -> Result<&mut Folder> {
        let mut cursor = self;
        for component in path {
            let node = cursor
                .children
                .entry(component.clone())
                .or_insert_with(|| Node::Folder(Folder::new()));
            cursor = match node {
                Node::Folder(folder) => folder,
                Node::File(_) => bail!(
                    "name collision: '{}' is a file, expected a folder",
                    String::from_utf8_lossy(component)
                ),
            };
        }
        Ok(cursor)
    }
}

/// The volume accumulator the packer owns between flushes.
#[derive(Debug, Clone, Default)]
pub struct Volume {
    pub name: String,
    pub root: Folder,
}

impl Volume {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Sanitize a name for HFS: remap the path separator, transliterate to
/// MacRoman where possible, replace the rest, truncate to the folder or
/// file limit.
///
/// An empty result means the entry cannot be represented at all.
pub fn sanitize_name(name: &str, is_folder: bool) -> Result<Vec<u8>> {
    if name.is_empty() {
        bail!("invalid empty HFS name");
    }
    let mut out: Vec<u8> = name
        .chars()
        .map(|c| match c {
            ':' => b'?',
            c if c.is_ascii() && !c.is_ascii_control() => c as u8,
            c => mac_roman_byte(c).unwrap_or(b'?'),
        })
        .collect();
    let limit = if is_folder { FOLDER_NAME_MAX } else { FILE_NAME_MAX };
    out.truncate(limit);
    if out.is_empty() {
        bail!("HFS name for '{}' is empty after sanitization", name);
    }
    Ok(out)
}

/// Sanitize a name already in byte form (e.g. from a DiskCopy header).
pub fn sanitize_name_bytes(name: &[u8], is_folder: bool) -> Result<Vec<u8>> {
    sanitize_name(&String::from_utf8_lossy(name), is_folder)
}

/// MacRoman code point for a character outside ASCII, if one exists.
/// Covers the accented-letter and symbol rows real file names use.
fn mac_roman_byte(c: char) -> Option<u8> {
    let byte = match c {
        'Ä' => 0x80, 'Å' => 0x81, 'Ç' => 0x82, 'É' => 0x83, 'Ñ' => 0x84,
        'Ö' => 0x85, 'Ü' => 0x86, 'á' => 0x87, 'à' => 0x88, 'â' => 0x89,
        'ä' => 0x8A, 'ã' => 0x8B, 'å' => 0x8C, 'ç' => 0x8D, 'é' => 0x8E,
        'è' => 0x8F, 'ê' => 0x90, 'ë' => 0x91, 'í' => 0x92, 'ì' => 0x93,
        'î' => 0x94, 'ï' => 0x95, 'ñ' => 0x96, 'ó' => 0x97, 'ò' => 0x98,
        'ô' => 0x99, 'ö' => 0x9A, 'õ' => 0x9B, 'ú' => 0x9C, 'ù' => 0x9D,
        'û' => 0x9E, 'ü' => 0x9F, '†' => 0xA0, '°' => 0xA1, '¢' => 0xA2,
        '£' => 0xA3, '§' => 0xA4, '•' => 0xA5, '¶' => 0xA6, 'ß' => 0xA7,
        '®' => 0xA8, '©' => 0xA9, '™' => 0xAA, '´' => 0xAB, '¨' => 0xAC,
        'Æ' => 0xAE, 'Ø' => 0xAF, '±' => 0xB1, '¥' => 0xB4, 'µ' => 0xB5,
        'ª' => 0xBB, 'º' => 0xBC, 'æ' => 0xBE, 'ø' => 0xBF, '¿' => 0xC0,
        '¡' => 0xC1, '¬' => 0xC2, '«' => 0xC7, '»' => 0xC8, '…' => 0xC9,
        'À' => 0xCB, 'Ã' => 0xCC, 'Õ' => 0xCD, 'Œ' => 0xCE, 'œ' => 0xCF,
        '–' => 0xD0, '—' => 0xD1, '“' => 0xD2, '”' => 0xD3, '‘' => 0xD4,
        '’' => 0xD5, '÷' => 0xD6, 'ÿ' => 0xD8, 'Ÿ' => 0xD9, '€' => 0xDB,
        'Â' => 0xE5, 'Ê' => 0xE6, 'Á' => 0xE7, 'Ë' => 0xE8, 'È' => 0xE9,
        'Í' => 0xEA, 'Î' => 0xEB, 'Ï' => 0xEC, 'Ì' => 0xED, 'Ó' => 0xEE,
        'Ô' => 0xEF, 'Ò' => 0xF1, 'Ú' => 0xF2, 'Û' => 0xF3, 'Ù' => 0xF4,
        _ => return None,
    };
    Some(byte)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footprint_rounds_each_fork_independently() {
        let file = FileEntry {
            data: vec![0u8; 1000],
            ..FileEntry::default()
        };
        assert_eq!(file.footprint(), 1024);

        let both = FileEntry {
            data: vec![0u8; 1000],
            rsrc: vec![0u8; 1],
            ..FileEntry::default()
        };
        assert_eq!(both.footprint(), 1024 + 512);

        assert_eq!(FileEntry::default().footprint(), 0);
    }

    #[test]
    fn folder_footprint_sums_subtree() {
        let mut root = Folder::new();
        let sub = root.folder_at_mut(&[b"Sub".to_vec()]).unwrap();
        sub.insert(
            b"a".to_vec(),
            Node::File(FileEntry {
                data: vec![0u8; 512],
                ..FileEntry::default()
            }),
        );
        root.insert(
            b"b".to_vec(),
            Node::File(FileEntry {
                data: vec![0u8; 1],
                ..FileEntry::default()
            }),
        );
        assert_eq!(root.footprint(), 1024);
        assert_eq!(root.file_count(), 2);
    }

    #[test]
    fn folder_at_mut_rejects_file_collision() {
        let mut root = Folder::new();
        root.insert(b"x".to_vec(), Node::File(FileEntry::default()));
        assert!(root.folder_at_mut(&[b"x".to_vec()]).is_err());
    }

    #[test]
    fn sanitize_remaps_separator_and_truncates() {
        assert_eq!(sanitize_name("a:b", false).unwrap(), b"a?b");

        let long = "x".repeat(40);
        assert_eq!(sanitize_name(&long, true).unwrap().len(), FOLDER_NAME_MAX);
        assert_eq!(sanitize_name(&long, false).unwrap().len(), FILE_NAME_MAX);
    }

    #[test]
    fn sanitize_transliterates_to_mac_roman() {
        assert_eq!(sanitize_name("café", false).unwrap(), [b'c', b'a', b'f', 0x8E]);
        assert_eq!(sanitize_name("Über", false).unwrap(), [0x86, b'b', b'e', b'r']);
        // no MacRoman equivalent
        assert_eq!(sanitize_name("夢", false).unwrap(), b"?");
    }

    #[test]
    fn empty_names_are_errors() {
        assert!(sanitize_name("", false).is_err());
        assert!(sanitize_name_bytes(b"", true).is_err());
    }
}
