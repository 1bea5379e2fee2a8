//! Preflight checks for host tool availability.
//!
//! Validates that the external tools the pipeline shells out to exist before
//! any volume is started. This prevents cryptic mid-run failures after hours
//! of packing.

use anyhow::{bail, Result};

/// Check if a command exists on the host system.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Required host tools for building volume images.
///
/// Each tuple is (command_name, package_name).
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("unar", "unar"),
    ("hformat", "hfsutils"),
    ("hmount", "hfsutils"),
    ("humount", "hfsutils"),
    ("hmkdir", "hfsutils"),
    ("hcopy", "hfsutils"),
    ("hls", "hfsutils"),
];

/// Check that specific tools are available.
///
/// Returns `Err` listing every missing tool and the package providing it.
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<()> {
    let mut missing = Vec::new();

    for (tool, package) in tools {
        if !command_exists(tool) {
            missing.push((*tool, *package));
        }
    }

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(t, p)| format!("  {} (install: {})", t, p))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("Missing required host tools:\n{}", msg);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tool_is_reported() {
        let err = check_required_tools(&[("definitely-not-a-real-tool-xyz", "nowhere")])
            .unwrap_err();
        assert!(format!("{err}").contains("definitely-not-a-real-tool-xyz"));
    }

    #[test]
    fn empty_tool_list_passes() {
        assert!(check_required_tools(&[]).is_ok());
    }
}
