//! CLI output formatting.
//!
//! Each input leads with its file name; details (output path, plant
//! fraction, CRS) follow as indented context lines.
//!
//! ## Check
//!
//! ```text
//! Inputs (2)
//!     field_a.tif
//!         Source: /data/field_a.tif
//!     field_b.tif
//!         Source: /data/field_b.tif
//! Missing (1)
//!     /data/gone.tif
//! ```
//!
//! ## Mask
//!
//! ```text
//! field_a.tif
//!     Output: /work/field_a_mask.tif
//!     Plant: 41.2% (1234 of 2996 pixels)
//!     CRS: EPSG:32612
//! field_b.tif (skipped: georeferenced without ground extent)
//!
//! Masked 1 file, skipped 1
//! ```
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout.

use crate::process::{MaskedFile, ProcessEvent, ProcessResult, SkippedFile};
use crate::scan::ScanResult;
use std::path::Path;

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format the discovered inputs.
pub fn format_scan_output(result: &ScanResult) -> Vec<String> {
    let mut lines = vec![format!("Inputs ({})", result.inputs.len())];
    for input in &result.inputs {
        lines.push(format!("    {}", display_name(input)));
        lines.push(format!("        Source: {}", input.display()));
    }
    if !result.missing.is_empty() {
        lines.push(format!("Missing ({})", result.missing.len()));
        lines.extend(result.missing.iter().map(|p| format!("    {}", p.display())));
    }
    if !result.unsupported.is_empty() {
        lines.push(format!("Unsupported ({})", result.unsupported.len()));
        lines.extend(
            result
                .unsupported
                .iter()
                .map(|p| format!("    {}", p.display())),
        );
    }
    lines
}

pub fn print_scan_output(result: &ScanResult) {
    for line in format_scan_output(result) {
        println!("{}", line);
    }
}

// ============================================================================
// Mask
// ============================================================================

fn format_masked(file: &MaskedFile) -> Vec<String> {
    let mut lines = vec![
        display_name(&file.input),
        format!("    Output: {}", file.output.display()),
    ];
    if let Some(mask) = &file.mask_output {
        lines.push(format!("    Mask: {}", mask.display()));
    }
    lines.push(format!(
        "    Plant: {:.1}% ({} of {} pixels)",
        file.foreground_fraction * 100.0,
        file.foreground_pixels,
        file.total_pixels
    ));
    if let Some(epsg) = file.epsg {
        lines.push(format!("    CRS: EPSG:{epsg}"));
    }
    lines
}

fn format_skipped(file: &SkippedFile) -> Vec<String> {
    vec![format!(
        "{} (skipped: {})",
        display_name(&file.input),
        file.reason
    )]
}

/// Format a single progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::Masked(file) => format_masked(file),
        ProcessEvent::Skipped(file) => format_skipped(file),
    }
}

/// One-line summary of a finished run.
pub fn format_process_summary(result: &ProcessResult) -> String {
    let masked = plural(result.masked.len(), "file");
    if result.skipped.is_empty() {
        format!("Masked {masked}")
    } else {
        format!("Masked {masked}, skipped {}", result.skipped.len())
    }
}

pub fn print_process_summary(result: &ProcessResult) {
    println!();
    println!("{}", format_process_summary(result));
}
