//! Run manifest: a JSON record of every volume a run emitted.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

const RUN_MANIFEST_FILENAME: &str = "run-manifest.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub created_at_utc: String,
    pub target_blocks: u32,
    pub overhead_ratio: f64,
    pub volumes: Vec<VolumeRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeRecord {
    pub index: u32,
    pub output: String,
    pub files: u64,
    pub packed_bytes: u64,
    pub written_at_utc: String,
}

impl RunManifest {
    pub fn new(target_blocks: u32, overhead_ratio: f64) -> Self {
        Self {
            created_at_utc: utc_timestamp(),
            target_blocks,
            overhead_ratio,
            volumes: Vec::new(),
        }
    }
}

pub fn utc_timestamp() -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

/// Write the manifest next to the output images.
pub fn write_manifest(output_dir: &Path, manifest: &RunManifest) -> Result<PathBuf> {
    let path = output_dir.join(RUN_MANIFEST_FILENAME);
    let json = serde_json::to_vec_pretty(manifest).context("serializing run manifest")?;
    fs::write(&path, json)
        .with_context(|| format!("writing run manifest '{}'", path.display()))?;
    Ok(path)
}
