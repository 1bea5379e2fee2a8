use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use macvolumes::disk::driver::{load_driver_binary, load_driver_spec};
use macvolumes::packer::manifest::write_manifest;
use macvolumes::preflight::{check_required_tools, REQUIRED_TOOLS};
use macvolumes::volume::HfsutilsCodec;
use macvolumes::{PackerConfig, VolumePacker};

/// 1 GiB in 512-byte blocks.
const DEFAULT_TARGET_BLOCKS: u32 = 2_097_152;

fn usage() -> &'static str {
    "Usage:\n  macvolumes <download_dir> <scratch_dir> [options]\n\nOptions:\n  --output-dir <dir>            where images land (default '.')\n  --target-blocks <n>           image size in 512-byte blocks (default 2097152, 1 GiB)\n  --volume-start-index <n>      index of the first volume (default 0)\n  --hfs-ratio <r>               usable fraction of each image (default 0.85)\n  --driver-config <path>        driver TOML (default 'driver.toml')\n  --driver <path>               driver binary (default 'driver.bin')\n  --label <name>                volume name prefix (default 'Collection')\n  -v, --verbose                 per-file progress"
}

fn main() -> Result<()> {
    let mut positional: Vec<String> = Vec::new();
    let mut output_dir = PathBuf::from(".");
    let mut target_blocks = DEFAULT_TARGET_BLOCKS;
    let mut start_index = 0u32;
    let mut overhead_ratio = 0.85f64;
    let mut driver_config = PathBuf::from("driver.toml");
    let mut driver_binary = PathBuf::from("driver.bin");
    let mut volume_label = "Collection".to_string();
    let mut verbose = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--output-dir" => output_dir = PathBuf::from(flag_value(&mut args, &arg)?),
            "--target-blocks" => {
                target_blocks = flag_value(&mut args, &arg)?
                    .parse()
                    .context("parsing --target-blocks")?
            }
            "--volume-start-index" => {
                start_index = flag_value(&mut args, &arg)?
                    .parse()
                    .context("parsing --volume-start-index")?
            }
            "--hfs-ratio" => {
                overhead_ratio = flag_value(&mut args, &arg)?
                    .parse()
                    .context("parsing --hfs-ratio")?
            }
            "--driver-config" => driver_config = PathBuf::from(flag_value(&mut args, &arg)?),
            "--driver" => driver_binary = PathBuf::from(flag_value(&mut args, &arg)?),
            "--label" => volume_label = flag_value(&mut args, &arg)?,
            "-v" | "--verbose" => verbose = true,
            "-h" | "--help" => {
                println!("{}", usage());
                return Ok(());
            }
            other if !other.starts_with('-') => positional.push(other.to_string()),
            other => bail!("unknown option '{}'\n{}", other, usage()),
        }
    }

    let [download_dir, scratch_dir] = positional.as_slice() else {
        bail!(usage());
    };

    check_required_tools(REQUIRED_TOOLS)?;

    let input_root = PathBuf::from(download_dir);
    if !input_root.is_dir() {
        bail!("download directory '{}' does not exist", input_root.display());
    }
    let scratch_dir = PathBuf::from(scratch_dir);
    std::fs::create_dir_all(&scratch_dir)
        .with_context(|| format!("creating scratch directory '{}'", scratch_dir.display()))?;
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating output directory '{}'", output_dir.display()))?;

    let driver = load_driver_spec(&driver_config)?;
    let driver_bin = load_driver_binary(&driver_binary)?;

    let config = PackerConfig {
        input_root,
        scratch_dir,
        output_dir: output_dir.clone(),
        target_blocks,
        start_index,
        overhead_ratio,
        volume_label,
        verbose,
    };

    let codec = HfsutilsCodec::new();
    let packer = VolumePacker::new(config, driver, driver_bin, &codec)?;
    let manifest = packer.run()?;

    let manifest_path = write_manifest(&output_dir, &manifest)?;
    println!("run manifest at {}", manifest_path.display());
    Ok(())
}

fn flag_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next()
        .with_context(|| format!("missing value for '{flag}'"))
}
