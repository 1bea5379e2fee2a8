//! The packing pipeline: walk the download tree, filter and normalize
//! entries, pack them into volumes, flush each full volume to a bootable
//! image.
//!
//! The packer owns exactly one in-progress [`Volume`] at a time. It fills
//! the volume until the next accepted entry would blow the budget, flushes,
//! and starts the next one. Per-entry failures are reported and skipped;
//! only builder-side size contract violations abort the run.

pub mod manifest;

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use walkdir::WalkDir;

use crate::container::{self, diskcopy, extract, ContainerKind};
use crate::disk::{assembly, DriverSpec, BLOCK_SIZE, PAYLOAD_START_BLOCK};
use crate::filter;
use crate::metadata::appledouble;
use crate::volume::{
    sanitize_name, sanitize_name_bytes, FileEntry, Folder, HfsCodec, Node, Volume,
    VOLUME_NAME_MAX,
};

use manifest::{utc_timestamp, RunManifest, VolumeRecord};

/// Plain files beyond this size are rejected outright.
pub const FILE_SIZE_CAP: u64 = 5 * 1024 * 1024;

/// Why a top-level entry did not make it into a volume.
///
/// Both variants are recovered at per-entry granularity; the run continues.
#[derive(Debug)]
pub enum EntryError {
    /// Content intentionally excluded: wrong architecture, oversized file,
    /// disallowed container type.
    Filtered(String),
    /// An operation needed to include the entry failed: extraction error,
    /// corrupt container header, unreadable name.
    Preparation(anyhow::Error),
}

impl fmt::Display for EntryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryError::Filtered(reason) => write!(f, "filtered: {reason}"),
            EntryError::Preparation(err) => write!(f, "preparation failed: {err:#}"),
        }
    }
}

impl From<anyhow::Error> for EntryError {
    fn from(err: anyhow::Error) -> Self {
        EntryError::Preparation(err)
    }
}

type EntryResult<T> = std::result::Result<T, EntryError>;

/// Packer settings, one record per run.
#[derive(Debug, Clone)]
pub struct PackerConfig {
    /// Root of the downloaded software tree.
    pub input_root: PathBuf,
    /// Scratch directory for archive extraction.
    pub scratch_dir: PathBuf,
    /// Where output images and the run manifest land.
    pub output_dir: PathBuf,
    /// Total size of each output image, in 512-byte blocks.
    pub target_blocks: u32,
    /// Index of the first emitted volume.
    pub start_index: u32,
    /// Fraction of the image usable for file content. HFS catalog and
    /// allocation overhead is not known until serialization, so usable
    /// space is approximated by this ratio.
    pub overhead_ratio: f64,
    /// Volume name prefix; the volume index is appended.
    pub volume_label: String,
    pub verbose: bool,
}

impl PackerConfig {
    /// Usable bytes per volume before a flush is forced.
    pub fn budget_bytes(&self) -> Result<u64> {
        if !(self.overhead_ratio > 0.0 && self.overhead_ratio <= 1.0) {
            bail!(
                "overhead ratio {} out of range; expected a fraction in (0, 1]",
                self.overhead_ratio
            );
        }
        let blocks =
            (self.target_blocks as f64 * self.overhead_ratio) as i64 - PAYLOAD_START_BLOCK as i64;
        if blocks <= 0 {
            bail!(
                "target block count {} with overhead ratio {} leaves no usable space",
                self.target_blocks,
                self.overhead_ratio
            );
        }
        Ok(blocks as u64 * BLOCK_SIZE)
    }
}

/// An accepted top-level entry ready for placement.
struct PreparedEntry {
    name: Vec<u8>,
    node: Node,
    bytes: u64,
}

/// Outcome of normalizing one file on disk.
enum Leaf {
    /// Not an error, contributes nothing (e.g. `.DS_Store`, merged sidecar).
    Skip,
    File {
        name: Vec<u8>,
        file: FileEntry,
        bytes: u64,
    },
    /// A decoded disk image folded into a synthetic folder.
    Folder {
        name: Vec<u8>,
        folder: Folder,
        bytes: u64,
    },
    /// An extracted archive whose directory still needs traversal.
    Expand { name: Vec<u8>, dir: PathBuf },
}

pub struct VolumePacker<'a> {
    config: PackerConfig,
    driver: DriverSpec,
    driver_bin: Vec<u8>,
    codec: &'a dyn HfsCodec,
    volume: Volume,
    bytes_taken: u64,
    volume_index: u32,
    budget_bytes: u64,
    manifest: RunManifest,
}

impl std::fmt::Debug for VolumePacker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumePacker").finish_non_exhaustive()
    }
}

impl<'a> VolumePacker<'a> {
    pub fn new(
        config: PackerConfig,
        driver: DriverSpec,
        driver_bin: Vec<u8>,
        codec: &'a dyn HfsCodec,
    ) -> Result<Self> {
        let budget_bytes = config.budget_bytes()?;
        assembly::payload_blocks(config.target_blocks)?;
        volume_name(&config.volume_label, config.start_index)?;
        Ok(Self {
            volume: Volume::new(),
            bytes_taken: 0,
            volume_index: config.start_index,
            budget_bytes,
            manifest: RunManifest::new(config.target_blocks, config.overhead_ratio),
            config,
            driver,
            driver_bin,
            codec,
        })
    }

    /// Process every top-level entry of the input root, then emit a final
    /// flush with whatever remains.
    pub fn run(mut self) -> Result<RunManifest> {
        let mut entries: Vec<PathBuf> = fs::read_dir(&self.config.input_root)
            .with_context(|| {
                format!(
                    "reading input directory '{}'",
                    self.config.input_root.display()
                )
            })?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<_>>()
            .with_context(|| {
                format!(
                    "iterating input directory '{}'",
                    self.config.input_root.display()
                )
            })?;
        entries.sort_by_key(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().to_lowercase())
                .unwrap_or_default()
        });

        let total = entries.len();
        for (position, path) in entries.iter().enumerate() {
            let shown = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            match self.prepare_entry(path) {
                Ok(Some(prepared)) => {
                    let bytes = prepared.bytes;
                    self.place(prepared)?;
                    println!(
                        "[{}/{}] added {} (~{})",
                        position + 1,
                        total,
                        shown,
                        human_size(bytes)
                    );
                }
                Ok(None) => {}
                Err(EntryError::Filtered(reason)) => {
                    println!("[{}/{}] skipping {}: {}", position + 1, total, shown, reason);
                }
                Err(EntryError::Preparation(err)) => {
                    eprintln!("[{}/{}] failed to prepare {}: {:#}", position + 1, total, shown, err);
                }
            }
        }

        self.flush()?;
        println!("done: wrote {} volume(s)", self.manifest.volumes.len());
        Ok(self.manifest)
    }

    /// Insert an accepted entry, flushing first if it would overflow the
    /// budget. A fresh volume always accepts its first entry, however
    /// large, so an oversized entry cannot be deferred forever.
    fn place(&mut self, prepared: PreparedEntry) -> Result<()> {
        if !self.volume.root.is_empty() && self.bytes_taken + prepared.bytes > self.budget_bytes {
            println!("reached target size, writing volume #{}", self.volume_index);
            self.flush()?;
        }
        self.volume.root.insert(prepared.name, prepared.node);
        self.bytes_taken += prepared.bytes;
        Ok(())
    }

    /// Serialize the current volume, write the bootable image, reset the
    /// accumulator. Size contract violations abort the whole run.
    fn flush(&mut self) -> Result<()> {
        self.volume.name = volume_name(&self.config.volume_label, self.volume_index)?;
        let output = self
            .config
            .output_dir
            .join(format!("collection.{}.scsi", self.volume_index));
        println!(
            "writing volume to {} with {} blocks",
            output.display(),
            self.config.target_blocks
        );

        let payload_len =
            assembly::payload_blocks(self.config.target_blocks)? as u64 * BLOCK_SIZE;
        let payload = self
            .codec
            .encode(&self.volume, payload_len)
            .with_context(|| format!("encoding HFS volume for '{}'", output.display()))?;

        {
            let file = File::create(&output)
                .with_context(|| format!("creating output image '{}'", output.display()))?;
            let mut writer = BufWriter::new(file);
            assembly::write_bootable_image(
                &mut writer,
                &self.driver,
                &self.driver_bin,
                &payload,
                self.config.target_blocks,
            )
            .with_context(|| format!("assembling image '{}'", output.display()))?;
            writer
                .flush()
                .with_context(|| format!("flushing output image '{}'", output.display()))?;
        }

        self.manifest.volumes.push(VolumeRecord {
            index: self.volume_index,
            output: output
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            files: self.volume.root.file_count(),
            packed_bytes: self.bytes_taken,
            written_at_utc: utc_timestamp(),
        });

        self.volume = Volume::new();
        self.bytes_taken = 0;
        self.volume_index += 1;
        Ok(())
    }

    /// Normalize one top-level entry into a named node plus its footprint.
    fn prepare_entry(&self, path: &Path) -> EntryResult<Option<PreparedEntry>> {
        if path.is_dir() {
            let dir_name = utf8_file_name(path)?;
            if is_app_bundle(dir_name) {
                return Err(EntryError::Filtered(".app bundle detected".to_string()));
            }
            let name = sanitize_name(dir_name, true)?;
            let mut folder = Folder::new();
            let bytes = self.prepare_tree(path, &mut folder)?;
            return Ok(Some(PreparedEntry {
                name,
                node: Node::Folder(folder),
                bytes,
            }));
        }

        match self.prepare_leaf(path)? {
            Leaf::Skip => Ok(None),
            Leaf::File { name, file, bytes } => Ok(Some(PreparedEntry {
                name,
                node: Node::File(file),
                bytes,
            })),
            Leaf::Folder {
                name,
                folder,
                bytes,
            } => Ok(Some(PreparedEntry {
                name,
                node: Node::Folder(folder),
                bytes,
            })),
            Leaf::Expand { name, dir } => {
                let mut folder = Folder::new();
                let bytes = self.prepare_tree(&dir, &mut folder)?;
                Ok(Some(PreparedEntry {
                    name,
                    node: Node::Folder(folder),
                    bytes,
                }))
            }
        }
    }

    /// Traverse a directory into `into`, expanding nested containers.
    ///
    /// Archives found during the walk push their extracted directory onto a
    /// worklist instead of recursing, so container-in-container nesting
    /// cannot blow the stack. Any failure rejects the whole subtree.
    fn prepare_tree(&self, seed: &Path, into: &mut Folder) -> EntryResult<u64> {
        let mut total: u64 = 0;
        let mut worklist: VecDeque<(PathBuf, Vec<Vec<u8>>)> = VecDeque::new();
        worklist.push_back((seed.to_path_buf(), Vec::new()));

        while let Some((dir, base)) = worklist.pop_front() {
            let mut dir_paths: HashMap<PathBuf, Vec<Vec<u8>>> = HashMap::new();
            dir_paths.insert(dir.clone(), base);

            for entry in WalkDir::new(&dir).min_depth(1).sort_by_file_name() {
                let entry = entry.map_err(|err| {
                    EntryError::Preparation(
                        anyhow::Error::new(err)
                            .context(format!("walking directory '{}'", dir.display())),
                    )
                })?;
                let parent = entry
                    .path()
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default();
                let Some(parent_path) = dir_paths.get(&parent).cloned() else {
                    continue;
                };

                if entry.file_type().is_dir() {
                    let dir_name = utf8_file_name(entry.path())?;
                    if is_app_bundle(dir_name) {
                        return Err(EntryError::Filtered(".app bundle detected".to_string()));
                    }
                    let name = sanitize_name(dir_name, true)?;
                    let mut hfs_path = parent_path;
                    hfs_path.push(name);
                    into.folder_at_mut(&hfs_path)?;
                    dir_paths.insert(entry.into_path(), hfs_path);
                } else if entry.file_type().is_file() {
                    match self.prepare_leaf(entry.path())? {
                        Leaf::Skip => {}
                        Leaf::File { name, file, bytes } => {
                            into.folder_at_mut(&parent_path)?
                                .insert(name, Node::File(file));
                            total += bytes;
                        }
                        Leaf::Folder {
                            name,
                            folder,
                            bytes,
                        } => {
                            into.folder_at_mut(&parent_path)?
                                .insert(name, Node::Folder(folder));
                            total += bytes;
                        }
                        Leaf::Expand { name, dir: extracted } => {
                            let mut hfs_path = parent_path.clone();
                            hfs_path.push(name);
                            into.folder_at_mut(&hfs_path)?;
                            worklist.push_back((extracted, hfs_path));
                        }
                    }
                }
            }
        }
        Ok(total)
    }

    /// Normalize one file: skip, plain file, decoded disk image, or an
    /// extracted archive directory.
    fn prepare_leaf(&self, path: &Path) -> EntryResult<Leaf> {
        let file_name = utf8_file_name(path)?;
        if file_name == ".DS_Store" {
            return Ok(Leaf::Skip);
        }
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        if ext.eq_ignore_ascii_case("dmg") {
            return Err(EntryError::Filtered("OS X disk image (.dmg)".to_string()));
        }

        let mut has_data_file = true;
        if ext.eq_ignore_ascii_case("rsrc") {
            if path.with_file_name(stem).is_file() {
                // Sidecar merges when its data file is processed.
                return Ok(Leaf::Skip);
            }
            has_data_file = false;
        }

        match container::classify(path) {
            Some(ContainerKind::DiskCopy) => return self.prepare_diskcopy(path, stem),
            Some(ContainerKind::RawImage) => return self.prepare_raw_image(path, stem),
            Some(ContainerKind::Archive) => return self.prepare_archive(path, stem),
            None => {}
        }

        let mut file = FileEntry::default();
        if has_data_file {
            let size = fs::metadata(path)
                .with_context(|| format!("reading metadata of '{}'", path.display()))?
                .len();
            if size > FILE_SIZE_CAP {
                return Err(EntryError::Filtered(format!(
                    "file larger than 5 MiB ({size} bytes)"
                )));
            }
            file.data = fs::read(path)
                .with_context(|| format!("reading file '{}'", path.display()))?;
        }

        let rsrc_path = if has_data_file {
            let mut os = path.as_os_str().to_owned();
            os.push(".rsrc");
            PathBuf::from(os)
        } else {
            path.to_path_buf()
        };
        if rsrc_path.is_file() {
            let raw = fs::read(&rsrc_path)
                .with_context(|| format!("reading sidecar '{}'", rsrc_path.display()))?;
            // A sidecar that is not AppleDouble at all is ignored.
            if let Ok(double) = appledouble::parse(&raw) {
                if let Some(rsrc) = double.resource_fork {
                    file.rsrc = rsrc;
                }
                if let Some(info) = &double.finder_info {
                    file.apply_finder_info(info);
                }
                let archs = match filter::supported_archs(&file.rsrc) {
                    Ok(archs) => archs,
                    Err(_) => {
                        eprintln!(
                            "warning: unable to parse resource fork from AppleDouble file at '{}'",
                            rsrc_path.display()
                        );
                        Vec::new()
                    }
                };
                if !filter::is_compatible(&archs) {
                    return Err(EntryError::Filtered("non-68k executable".to_string()));
                }
            }
        }

        if self.config.verbose {
            println!("* adding file at {}", path.display());
        }
        let hfs_name = if has_data_file { file_name } else { stem };
        let name = sanitize_name(hfs_name, false)?;
        let bytes = file.footprint();
        Ok(Leaf::File { name, file, bytes })
    }

    fn prepare_diskcopy(&self, path: &Path, stem: &str) -> EntryResult<Leaf> {
        if self.config.verbose {
            println!("* adding DiskCopy image at {}", path.display());
        }
        let mut input = File::open(path)
            .with_context(|| format!("opening DiskCopy file '{}'", path.display()))?;
        let image = diskcopy::read_diskcopy(&mut input)
            .map_err(|err| err.context(format!("reading DiskCopy file at '{}'", path.display())))
            .map_err(EntryError::Preparation)?;

        let name = if image.name.is_empty() {
            sanitize_name(stem, true)?
        } else {
            sanitize_name_bytes(&image.name, true)?
        };
        let folder = self.decode_filesystem(&image.data, path);
        let bytes = folder.footprint();
        Ok(Leaf::Folder {
            name,
            folder,
            bytes,
        })
    }

    fn prepare_raw_image(&self, path: &Path, stem: &str) -> EntryResult<Leaf> {
        if self.config.verbose {
            println!("* adding raw disk image at {}", path.display());
        }
        let flat =
            fs::read(path).with_context(|| format!("reading disk image '{}'", path.display()))?;
        let name = sanitize_name(stem, true)?;
        let folder = self.decode_filesystem(&flat, path);
        let bytes = folder.footprint();
        Ok(Leaf::Folder {
            name,
            folder,
            bytes,
        })
    }

    fn prepare_archive(&self, path: &Path, stem: &str) -> EntryResult<Leaf> {
        if self.config.verbose {
            println!("* expanding archive at {}", path.display());
        }
        let dir = extract::extract_archive(path, &self.config.scratch_dir)
            .map_err(EntryError::Preparation)?;
        let name = sanitize_name(stem, true)?;
        Ok(Leaf::Expand { name, dir })
    }

    /// Decode an HFS image. Failure is logged and yields an empty folder so
    /// one unreadable nested filesystem does not sink the entry.
    fn decode_filesystem(&self, data: &[u8], path: &Path) -> Folder {
        match self.codec.decode(data) {
            Ok(folder) => folder,
            Err(err) => {
                eprintln!(
                    "issue reading filesystem from disk image at '{}': {:#}; skipping contents",
                    path.display(),
                    err
                );
                Folder::new()
            }
        }
    }
}

/// Volume name for `index`. HFS caps volume names at 27 bytes, so an
/// over-long label fails the run up front rather than deep inside the
/// filesystem encoder.
fn volume_name(label: &str, index: u32) -> Result<String> {
    let name = format!("{label} #{index}");
    if name.len() > VOLUME_NAME_MAX {
        bail!(
            "volume name '{}' is {} bytes, HFS allows at most {}",
            name,
            name.len(),
            VOLUME_NAME_MAX
        );
    }
    Ok(name)
}

fn is_app_bundle(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("app"))
}

fn utf8_file_name(path: &Path) -> EntryResult<&str> {
    path.file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            EntryError::Preparation(anyhow!("non-UTF-8 file name at '{}'", path.display()))
        })
}

fn human_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in ["B", "KiB", "MiB", "GiB", "TiB"] {
        if value < 1024.0 {
            return format!("{value:.1}{unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.1}PiB")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::resource::synthetic_fork;
    use tempfile::TempDir;

    struct StubCodec;

    impl HfsCodec for StubCodec {
        fn encode(&self, _volume: &Volume, size_bytes: u64) -> Result<Vec<u8>> {
            Ok(vec![0u8; size_bytes as usize])
        }

        fn decode(&self, _image: &[u8]) -> Result<Folder> {
            Ok(Folder::new())
        }
    }

    fn test_config(temp: &TempDir, target_blocks: u32) -> PackerConfig {
        let input_root = temp.path().join("input");
        let scratch_dir = temp.path().join("scratch");
        let output_dir = temp.path().join("out");
        for dir in [&input_root, &scratch_dir, &output_dir] {
            fs::create_dir_all(dir).unwrap();
        }
        PackerConfig {
            input_root,
            scratch_dir,
            output_dir,
            target_blocks,
            start_index: 0,
            overhead_ratio: 1.0,
            volume_label: "Collection".to_string(),
            verbose: false,
        }
    }

    fn test_driver() -> DriverSpec {
        DriverSpec {
            partition_type: "Apple_Driver43".to_string(),
            partition_flags: 0,
            booter: 0,
            bytes: 1536,
            load_address_0: 0,
            load_address_1: 0,
            goto_address_0: 0,
            goto_address_1: 0,
            checksum: 0,
            processor: "68000".to_string(),
            boot_args: vec![],
        }
    }

    fn packer(config: PackerConfig, codec: &dyn HfsCodec) -> VolumePacker<'_> {
        VolumePacker::new(config, test_driver(), vec![0u8; 1536], codec).unwrap()
    }

    /// Codec whose decode yields one 700-byte file named "System".
    struct PopulatedDecodeCodec;

    impl HfsCodec for PopulatedDecodeCodec {
        fn encode(&self, _volume: &Volume, size_bytes: u64) -> Result<Vec<u8>> {
            Ok(vec![0u8; size_bytes as usize])
        }

        fn decode(&self, _image: &[u8]) -> Result<Folder> {
            let mut folder = Folder::new();
            folder.insert(
                b"System".to_vec(),
                Node::File(FileEntry {
                    data: vec![0u8; 700],
                    ..FileEntry::default()
                }),
            );
            Ok(folder)
        }
    }

    /// Codec whose decode always fails.
    struct BrokenDecodeCodec;

    impl HfsCodec for BrokenDecodeCodec {
        fn encode(&self, _volume: &Volume, size_bytes: u64) -> Result<Vec<u8>> {
            Ok(vec![0u8; size_bytes as usize])
        }

        fn decode(&self, _image: &[u8]) -> Result<Folder> {
            Err(anyhow!("no HFS signature"))
        }
    }

    /// Minimal DiskCopy 4.2 file: header plus raw sector data.
    fn diskcopy_bytes(name: &[u8], data: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(name.len() as u8);
        let mut name_field = [0u8; 63];
        name_field[..name.len()].copy_from_slice(name);
        buf.extend_from_slice(&name_field);
        buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
        buf.extend_from_slice(&[0u8; 12]); // tag size, both checksums
        buf.push(1);
        buf.push(0x22);
        buf.extend_from_slice(&diskcopy::DISKCOPY_MAGIC.to_be_bytes());
        buf.extend_from_slice(data);
        buf
    }

    /// Minimal AppleDouble container holding one resource fork entry.
    fn apple_double(rsrc: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&appledouble::SIGNATURE_APPLE_DOUBLE.to_be_bytes());
        buf.extend_from_slice(&0x0002_0000u32.to_be_bytes());
        buf.extend_from_slice(&[0u8; 16]);
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&2u32.to_be_bytes());
        buf.extend_from_slice(&38u32.to_be_bytes());
        buf.extend_from_slice(&(rsrc.len() as u32).to_be_bytes());
        buf.extend_from_slice(rsrc);
        buf
    }

    #[test]
    fn budget_math() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp, 2048);
        config.overhead_ratio = 0.5;
        // 1024 usable blocks minus the 96 reserved by the layout
        assert_eq!(config.budget_bytes().unwrap(), 928 * 512);

        config.overhead_ratio = 1.5;
        assert!(config.budget_bytes().is_err());
        config.overhead_ratio = 0.85;
        config.target_blocks = 100;
        assert!(config.budget_bytes().is_err());
    }

    #[test]
    fn splits_volumes_when_budget_is_reached() {
        let temp = TempDir::new().unwrap();
        // budget: 128 - 96 = 32 blocks = 16384 bytes
        let config = test_config(&temp, 128);
        let input = config.input_root.clone();
        let output = config.output_dir.clone();
        for name in ["a.bin", "b.bin", "c.bin"] {
            fs::write(input.join(name), vec![0u8; 6000]).unwrap();
        }

        let codec = StubCodec;
        let manifest = packer(config, &codec).run().unwrap();

        // 6144 * 2 fits, the third forces a flush
        assert_eq!(manifest.volumes.len(), 2);
        assert_eq!(manifest.volumes[0].files, 2);
        assert_eq!(manifest.volumes[1].files, 1);
        assert!(manifest.volumes[0].packed_bytes <= 16384);
        for record in &manifest.volumes {
            let image = fs::read(output.join(&record.output)).unwrap();
            assert_eq!(image.len(), 128 * 512);
        }
    }

    #[test]
    fn oversized_first_entry_is_not_deferred() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp, 128);
        let input = config.input_root.clone();
        // 20480-byte footprint exceeds the 16384-byte budget on its own
        fs::write(input.join("a-huge.bin"), vec![0u8; 20000]).unwrap();
        fs::write(input.join("b-small.bin"), vec![0u8; 1000]).unwrap();

        let codec = StubCodec;
        let manifest = packer(config, &codec).run().unwrap();

        assert_eq!(manifest.volumes.len(), 2);
        assert_eq!(manifest.volumes[0].files, 1);
        assert_eq!(manifest.volumes[0].packed_bytes, 20480);
        assert_eq!(manifest.volumes[1].packed_bytes, 1024);
    }

    #[test]
    fn rejected_entries_do_not_stop_the_run() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp, 128);
        let input = config.input_root.clone();
        fs::write(input.join("installer.dmg"), b"x").unwrap();
        fs::write(input.join(".DS_Store"), b"junk").unwrap();
        fs::write(input.join("too-big.bin"), vec![0u8; FILE_SIZE_CAP as usize + 1]).unwrap();
        fs::write(input.join("readme.txt"), b"hello").unwrap();

        let codec = StubCodec;
        let manifest = packer(config, &codec).run().unwrap();

        assert_eq!(manifest.volumes.len(), 1);
        assert_eq!(manifest.volumes[0].files, 1);
        assert_eq!(manifest.volumes[0].packed_bytes, 512);
    }

    #[test]
    fn sidecar_merges_into_its_data_file() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp, 128);
        let input = config.input_root.clone();
        fs::write(input.join("App"), vec![1u8; 100]).unwrap();
        let fork = synthetic_fork(&[*b"CODE"]);
        fs::write(input.join("App.rsrc"), apple_double(&fork)).unwrap();

        let codec = StubCodec;
        let packer = packer(config, &codec);

        let prepared = packer.prepare_entry(&input.join("App")).unwrap().unwrap();
        assert_eq!(prepared.name, b"App");
        match &prepared.node {
            Node::File(file) => {
                assert_eq!(file.data.len(), 100);
                assert_eq!(file.rsrc, fork);
            }
            Node::Folder(_) => panic!("expected a file"),
        }
        // footprint counts both forks, each block aligned
        assert_eq!(prepared.bytes, 512 + (fork.len() as u64).div_ceil(512) * 512);

        // the sidecar itself contributes nothing
        assert!(packer
            .prepare_entry(&input.join("App.rsrc"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn orphan_sidecar_becomes_a_metadata_only_file() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp, 128);
        let input = config.input_root.clone();
        let fork = synthetic_fork(&[*b"STR "]);
        fs::write(input.join("Orphan.rsrc"), apple_double(&fork)).unwrap();

        let codec = StubCodec;
        let packer = packer(config, &codec);
        let prepared = packer
            .prepare_entry(&input.join("Orphan.rsrc"))
            .unwrap()
            .unwrap();
        assert_eq!(prepared.name, b"Orphan");
        match &prepared.node {
            Node::File(file) => {
                assert!(file.data.is_empty());
                assert_eq!(file.rsrc, fork);
            }
            Node::Folder(_) => panic!("expected a file"),
        }
    }

    #[test]
    fn ppc_only_binary_is_filtered() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp, 128);
        let input = config.input_root.clone();
        fs::write(input.join("PPCApp"), vec![0u8; 10]).unwrap();
        let fork = synthetic_fork(&[*b"cfrg"]);
        fs::write(input.join("PPCApp.rsrc"), apple_double(&fork)).unwrap();

        let codec = StubCodec;
        let packer = packer(config, &codec);
        match packer.prepare_entry(&input.join("PPCApp")) {
            Err(EntryError::Filtered(reason)) => assert!(reason.contains("non-68k")),
            other => panic!("expected a filter rejection, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn app_bundle_rejects_the_whole_subtree() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp, 128);
        let input = config.input_root.clone();
        let bundle = input.join("Stuff").join("Tool.app");
        fs::create_dir_all(&bundle).unwrap();
        fs::write(bundle.join("binary"), b"modern").unwrap();
        fs::write(input.join("Stuff").join("fine.txt"), b"ok").unwrap();

        let codec = StubCodec;
        let packer = packer(config, &codec);
        match packer.prepare_entry(&input.join("Stuff")) {
            Err(EntryError::Filtered(reason)) => assert!(reason.contains(".app")),
            other => panic!("expected a filter rejection, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn directory_trees_keep_their_shape() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp, 128);
        let input = config.input_root.clone();
        let nested = input.join("Games").join("Marathon");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("data"), vec![0u8; 700]).unwrap();
        fs::write(input.join("Games").join("note"), b"n").unwrap();

        let codec = StubCodec;
        let packer = packer(config, &codec);
        let prepared = packer.prepare_entry(&input.join("Games")).unwrap().unwrap();
        assert_eq!(prepared.bytes, 1024 + 512);
        let Node::Folder(folder) = &prepared.node else {
            panic!("expected a folder");
        };
        assert_eq!(folder.file_count(), 2);
        let Some(Node::Folder(sub)) = folder.children.get(b"Marathon".as_slice()) else {
            panic!("missing nested folder");
        };
        assert!(sub.children.contains_key(b"data".as_slice()));
    }

    #[test]
    fn diskcopy_header_names_the_synthetic_folder() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp, 128);
        let input = config.input_root.clone();
        fs::write(
            input.join("tools.img"),
            diskcopy_bytes(b"Disk Tools", &[0u8; 512]),
        )
        .unwrap();

        let codec = PopulatedDecodeCodec;
        let packer = packer(config, &codec);
        let prepared = packer
            .prepare_entry(&input.join("tools.img"))
            .unwrap()
            .unwrap();
        assert_eq!(prepared.name, b"Disk Tools");
        let Node::Folder(folder) = &prepared.node else {
            panic!("expected a folder");
        };
        assert!(folder.children.contains_key(b"System".as_slice()));
        // 700-byte decoded file, block aligned
        assert_eq!(prepared.bytes, 1024);
    }

    #[test]
    fn empty_diskcopy_name_falls_back_to_the_file_stem() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp, 128);
        let input = config.input_root.clone();
        fs::write(input.join("backup.img"), diskcopy_bytes(b"", &[0u8; 512])).unwrap();

        let codec = StubCodec;
        let packer = packer(config, &codec);
        let prepared = packer
            .prepare_entry(&input.join("backup.img"))
            .unwrap()
            .unwrap();
        assert_eq!(prepared.name, b"backup");
    }

    #[test]
    fn long_diskcopy_names_are_truncated_to_the_folder_limit() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp, 128);
        let input = config.input_root.clone();
        fs::write(
            input.join("big.img"),
            diskcopy_bytes(b"An Extremely Long Volume Name!", &[0u8; 512]),
        )
        .unwrap();

        let codec = StubCodec;
        let packer = packer(config, &codec);
        let prepared = packer
            .prepare_entry(&input.join("big.img"))
            .unwrap()
            .unwrap();
        assert_eq!(prepared.name.len(), crate::volume::FOLDER_NAME_MAX);
        assert_eq!(prepared.name, b"An Extremely Long".to_vec());
    }

    #[test]
    fn unreadable_image_contents_are_skipped_not_fatal() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp, 128);
        let input = config.input_root.clone();
        fs::write(input.join("bad.dsk"), b"not a filesystem").unwrap();

        let codec = BrokenDecodeCodec;
        let packer = packer(config, &codec);
        let prepared = packer
            .prepare_entry(&input.join("bad.dsk"))
            .unwrap()
            .unwrap();
        assert_eq!(prepared.name, b"bad");
        let Node::Folder(folder) = &prepared.node else {
            panic!("expected a folder");
        };
        assert!(folder.is_empty());
        assert_eq!(prepared.bytes, 0);
    }

    #[test]
    fn app_bundle_extension_matches_case_insensitively() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp, 128);
        let input = config.input_root.clone();
        let bundle = input.join("Tool.APP");
        fs::create_dir_all(&bundle).unwrap();
        fs::write(bundle.join("binary"), b"modern").unwrap();

        let codec = StubCodec;
        let packer = packer(config, &codec);
        match packer.prepare_entry(&bundle) {
            Err(EntryError::Filtered(reason)) => assert!(reason.contains(".app")),
            other => panic!("expected a filter rejection, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn over_long_label_is_rejected_up_front() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp, 128);
        config.volume_label = "An Exceptionally Long Volume Label".to_string();

        let codec = StubCodec;
        let err = VolumePacker::new(config, test_driver(), vec![0u8; 1536], &codec).unwrap_err();
        assert!(format!("{err}").contains("volume name"));
    }

    #[test]
    fn final_flush_emits_a_volume_even_under_budget() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(&temp, 128);
        config.start_index = 7;
        let input = config.input_root.clone();
        fs::write(input.join("tiny"), b"t").unwrap();

        let codec = StubCodec;
        let manifest = packer(config, &codec).run().unwrap();
        assert_eq!(manifest.volumes.len(), 1);
        assert_eq!(manifest.volumes[0].index, 7);
        assert_eq!(manifest.volumes[0].output, "collection.7.scsi");
    }
}
