//! Guard against the report clobbering an input file.

use anyhow::{bail, Result};
use std::path::Path;

/// Validates that a report path is safe to overwrite.
///
/// Checks:
/// - The report must be a `.json` file
/// - The report cannot be any of the input files (library, queries, crate tree)
/// - The report cannot live inside the crate membership directory
pub fn validate_output_path(
    output: &Path,
    inputs: &[&Path],
    crate_dir: Option<&Path>,
) -> Result<()> {
    let is_json = output
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if !is_json {
        bail!(
            "Safety check failed: report '{}' must have a .json extension",
            output.display()
        );
    }

    for input in inputs {
        if same_file(output, input) {
            bail!(
                "Safety check failed: report '{}' cannot be the same as input '{}'",
                output.display(),
                input.display()
            );
        }
    }

    // Membership files are <crate_id>.json, so a report there would be read back as a crate
    if let Some(dir) = crate_dir {
        let parent = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        if same_file(parent, dir) {
            bail!(
                "Safety check failed: report '{}' cannot be written into crate directory '{}'",
                output.display(),
                dir.display()
            );
        }
    }

    Ok(())
}

/// Path equality, resolved through the filesystem when both sides exist.
fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
