//! Output file naming.
//!
//! Masked rasters keep the input's stem and extension with a suffix added:
//! - `field.tif` → `field_mask.tif`
//! - `/data/plot 12.TIFF` → `plot 12_mask.TIFF`
//!
//! Input directories never leak into the output name; outputs always land in
//! the working folder unless an explicit path with a directory is given.

use std::path::{Path, PathBuf};

/// File name (no directory) of the masked output for `input`.
pub fn mask_filename(input: &Path, suffix: &str) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    match input.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    }
}

/// File name of the optional binary mask PNG for `input`.
pub fn binary_mask_filename(input: &Path, suffix: &str) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    format!("{stem}{suffix}_bin.png")
}

/// Where the masked output for `input` is written.
///
/// - `out_file` with a directory component is used as given.
/// - A bare `out_file` name is placed in `working_folder`.
/// - Without `out_file`, the derived [`mask_filename`] is placed in `working_folder`.
pub fn resolve_output_path(
    input: &Path,
    out_file: Option<&Path>,
    working_folder: &Path,
    suffix: &str,
) -> PathBuf {
    match out_file {
        Some(out) if has_directory(out) => out.to_path_buf(),
        Some(out) => working_folder.join(out),
        None => working_folder.join(mask_filename(input, suffix)),
    }
}

fn has_directory(path: &Path) -> bool {
    path.parent().is_some_and(|p| !p.as_os_str().is_empty())
}
