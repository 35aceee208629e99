//! # Soilmask
//!
//! Separates plants from soil in RGB orthomosaics. Every pixel whose
//! green-to-red ratio reaches a threshold is kept as plant; every other pixel
//! has its colour bands zeroed. Georeferencing survives the round trip, so the
//! masked raster drops straight back onto the map.
//!
//! # Pipeline
//!
//! ```text
//! 1. Scan     files/dirs  →  input list          (walk, filter by extension)
//! 2. Mask     raster      →  plant/soil mask     (row tiles in parallel)
//! 3. Apply    raster+mask →  <stem>_mask.<ext>   (soil RGB set to 0)
//! 4. Report   run         →  result.json         (per-file plant fraction)
//! ```
//!
//! The classification core ([`engine`]) works on in-memory `ndarray` views
//! and never touches disk; [`raster`] handles TIFF/PNG decoding, GeoTIFF tags
//! and atomic writes behind the [`raster::RasterBackend`] trait, so the
//! pipeline in [`process`] can be tested against a mock.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Threshold type, ratio classifier, mask computation and application |
//! | [`raster`] | Raster I/O: TIFF and PNG decoding, GeoTIFF tags, atomic writes |
//! | [`scan`] | Input discovery: files, recursive directories, extension filter |
//! | [`process`] | Per-file pipeline, progress events, result record |
//! | [`config`] | `soilmask.toml` loading, validation, merging with stock defaults |
//! | [`naming`] | Output file names (`field.tif` → `field_mask.tif`) |
//! | [`types`] | Transformer identity and the JSON result record |
//! | [`output`] | CLI output formatting |
//!
//! # Classification Rule
//!
//! With red `R`, green `G` and threshold `t > 0`:
//!
//! - `R > 0`: plant when `G / R >= t`
//! - `R == 0`: plant when `G > 0`; a black pixel is soil
//!
//! Blue and any band past it never influence the decision. Bands past blue
//! (alpha, NIR) are copied through unchanged.

pub mod config;
pub mod engine;
pub mod naming;
pub mod output;
pub mod process;
pub mod raster;
pub mod scan;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
