//! HFS image encoding and decoding via the hfsutils suite.
//!
//! hfsutils manipulates HFS images without mounting them, the same way the
//! FAT side of the world uses mtools. `hformat` creates the filesystem in
//! place, `hmkdir`/`hcopy` populate it, `hls`/`hcopy` read it back out.
//! Files cross the boundary MacBinary-encoded so both forks and Finder
//! metadata survive.
//!
//! hfsutils keeps its current-mount state in `$HOME/.hcwd`, so this codec
//! must not be used from multiple threads. The pipeline is sequential.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use super::codec::HfsCodec;
use super::{macbinary, FileEntry, Folder, Node, Volume};
use crate::process::Cmd;

pub struct HfsutilsCodec;

impl HfsutilsCodec {
    pub fn new() -> Self {
        Self
    }

    fn copy_in(&self, staging: &Path, hfs_dir: &str, name: &[u8], file: &FileEntry) -> Result<()> {
        let encoded = macbinary::encode(name, file)?;
        let local = staging.join("transfer.bin");
        fs::write(&local, encoded).context("writing MacBinary staging file")?;

        let dest = format!("{}{}", hfs_dir, String::from_utf8_lossy(name));
        Cmd::new("hcopy")
            .arg("-m")
            .arg_path(&local)
            .arg(&dest)
            .error_msg(&format!("hcopy into image failed for '{dest}'"))
            .run()
    }

    fn write_folder(&self, staging: &Path, hfs_dir: &str, folder: &Folder) -> Result<()> {
        for (name, node) in &folder.children {
            match node {
                Node::File(file) => self.copy_in(staging, hfs_dir, name, file)?,
                Node::Folder(sub) => {
                    let sub_path = format!("{}{}:", hfs_dir, String::from_utf8_lossy(name));
                    Cmd::new("hmkdir")
                        .arg(&sub_path)
                        .error_msg(&format!("hmkdir failed for '{sub_path}'"))
                        .run()?;
                    self.write_folder(staging, &sub_path, sub)?;
                }
            }
        }
        Ok(())
    }

    fn read_folder(&self, staging: &Path, hfs_dir: &str) -> Result<Folder> {
        let listing = Cmd::new("hls")
            .args(["-1", "-F"])
            .arg(hfs_dir)
            .error_msg(&format!("hls failed for '{hfs_dir}'"))
            .run_capture()?;

        let mut folder = Folder::new();
        for line in listing.lines() {
            let entry = line.trim_end();
            if entry.is_empty() {
                continue;
            }
            if let Some(dir_name) = entry.strip_suffix(':') {
                let sub_path = format!("{hfs_dir}{dir_name}:");
                let sub = self.read_folder(staging, &sub_path)?;
                folder.insert(dir_name.as_bytes().to_vec(), Node::Folder(sub));
            } else {
                // hls -F marks executables with '*'
                let file_name = entry.strip_suffix('*').unwrap_or(entry);
                let local = staging.join("transfer.bin");
                let src = format!("{hfs_dir}{file_name}");
                Cmd::new("hcopy")
                    .arg("-m")
                    .arg(&src)
                    .arg_path(&local)
                    .error_msg(&format!("hcopy out of image failed for '{src}'"))
                    .run()?;
                let raw = fs::read(&local).context("reading MacBinary staging file")?;
                let (_, file) = macbinary::decode(&raw)
                    .with_context(|| format!("decoding MacBinary transfer of '{src}'"))?;
                folder.insert(file_name.as_bytes().to_vec(), Node::File(file));
            }
        }
        Ok(folder)
    }
}

impl Default for HfsutilsCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl HfsCodec for HfsutilsCodec {
    fn encode(&self, volume: &Volume, size_bytes: u64) -> Result<Vec<u8>> {
        let staging = tempfile::tempdir().context("creating hfsutils staging directory")?;
        let image_path = staging.path().join("volume.hfs");

        {
            let image = fs::File::create(&image_path)
                .with_context(|| format!("creating HFS image '{}'", image_path.display()))?;
            image.set_len(size_bytes).context("sizing HFS image")?;
        }

        Cmd::new("hformat")
            .arg("-l")
            .arg(volume.name.as_str())
            .arg_path(&image_path)
            .error_msg("hformat failed")
            .run()?;
        Cmd::new("hmount")
            .arg_path(&image_path)
            .error_msg("hmount failed")
            .run()?;
        let populate = self.write_folder(staging.path(), ":", &volume.root);
        let unmount = Cmd::new("humount").error_msg("humount failed").run();
        populate?;
        unmount?;

        let encoded = fs::read(&image_path).context("reading back encoded HFS image")?;
        if encoded.len() as u64 != size_bytes {
            bail!(
                "internal invariant violated: encoded HFS image is {} bytes, expected {}",
                encoded.len(),
                size_bytes
            );
        }
        Ok(encoded)
    }

    fn decode(&self, image: &[u8]) -> Result<Folder> {
        let staging = tempfile::tempdir().context("creating hfsutils staging directory")?;
        let image_path = staging.path().join("volume.hfs");
        fs::write(&image_path, image).context("writing HFS image for decode")?;

        Cmd::new("hmount")
            .arg_path(&image_path)
            .error_msg("hmount failed")
            .run()?;
        let tree = self.read_folder(staging.path(), ":");
        let unmount = Cmd::new("humount").error_msg("humount failed").run();
        let tree = tree?;
        unmount?;
        Ok(tree)
    }
}
