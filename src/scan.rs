//! Input discovery.
//!
//! The caller names files and/or directories. Directories are walked
//! recursively; files are kept when their extension is one the raster
//! backend can read. The result is sorted so runs are reproducible.
//!
//! ## Rules
//!
//! - Extensions are matched case-insensitively (`.TIF` is a TIFF).
//! - Hidden entries (leading `.`) inside walked directories are skipped.
//! - Named files that do not exist are reported as missing, not as errors;
//!   the run masks whatever it can reach.
//! - A run with no supported input at all is an error ([`check_continue`]).

use crate::raster::supported_raster_extensions;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("No TIFF files were specified for processing")]
    NoSupportedFiles,
}

/// Inputs discovered for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanResult {
    /// Files that will be masked, sorted.
    pub inputs: Vec<PathBuf>,
    /// Named paths that do not exist.
    pub missing: Vec<PathBuf>,
    /// Named files with an unsupported extension.
    pub unsupported: Vec<PathBuf>,
}

/// True when `path` has an extension the raster backend can read.
pub fn is_supported(path: &Path) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    supported_raster_extensions().contains(&ext.as_str())
}

/// Fail fast when none of the named candidates could be masked.
pub fn check_continue(candidates: &[PathBuf]) -> Result<(), ScanError> {
    if candidates.iter().any(|p| p.is_dir() || is_supported(p)) {
        Ok(())
    } else {
        Err(ScanError::NoSupportedFiles)
    }
}

/// Expand `candidates` into the list of rasters to mask.
pub fn scan(candidates: &[PathBuf]) -> Result<ScanResult, ScanError> {
    let mut result = ScanResult::default();

    for candidate in candidates {
        if candidate.is_dir() {
            result.inputs.extend(walk_directory(candidate)?);
        } else if !is_supported(candidate) {
            result.unsupported.push(candidate.clone());
        } else if candidate.is_file() {
            result.inputs.push(candidate.clone());
        } else {
            result.missing.push(candidate.clone());
        }
    }

    result.inputs.sort();
    result.inputs.dedup();
    if result.inputs.is_empty() && result.missing.is_empty() {
        return Err(ScanError::NoSupportedFiles);
    }
    Ok(result)
}

fn walk_directory(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let mut found = Vec::new();
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && is_supported(entry.path()) {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}
