//! Archive expansion via the external `unar` tool.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::process::Cmd;

/// Expand an archive into `scratch_dir` and return the extracted directory.
///
/// `unar -d` forces a directory named after the archive stem, `-s` skips
/// files already present from a previous run, and `-forks visible` writes
/// resource forks as sidecar files the packer knows how to merge.
pub fn extract_archive(archive: &Path, scratch_dir: &Path) -> Result<PathBuf> {
    let stem = archive
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    Cmd::new("unar")
        .args(["-o"])
        .arg_path(scratch_dir)
        .args(["-s", "-d", "-p", "", "-q", "-forks", "visible"])
        .arg_path(archive)
        .error_msg(&format!("there was an error extracting '{}'", archive.display()))
        .run()?;

    Ok(scratch_dir.join(stem))
}
