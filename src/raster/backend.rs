//! Raster accessor trait and shared types.
//!
//! The [`RasterBackend`] trait covers what a masking run needs from disk:
//! read a raster, write the masked raster, and optionally dump the binary
//! mask. The production implementation is
//! [`FileBackend`](super::file_backend::FileBackend); tests use the recording
//! mock below so the processing pipeline can run without touching disk.

use super::geo::GeoMetadata;
use ndarray::{Array3, ArrayView2};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Unsupported raster format: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("Unsupported pixel layout in {path}: {detail}")]
    UnsupportedLayout { path: PathBuf, detail: String },
}

/// A decoded raster: `(height, width, bands)` samples plus georeferencing.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub pixels: Array3<u8>,
    pub geo: GeoMetadata,
}

impl Raster {
    /// A raster without georeferencing.
    pub fn new(pixels: Array3<u8>) -> Self {
        Self {
            pixels,
            geo: GeoMetadata::default(),
        }
    }

    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    pub fn bands(&self) -> usize {
        self.pixels.dim().2
    }
}

/// How a raster is written.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOptions {
    /// Deflate-compress TIFF output.
    pub compress: bool,
    /// Key/value pairs embedded as GDAL metadata (TIFF only).
    pub metadata: BTreeMap<String, String>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compress: true,
            metadata: BTreeMap::new(),
        }
    }
}

/// Loads and stores rasters.
///
/// Writes must be all-or-nothing: a failed write leaves no file at `path`.
pub trait RasterBackend: Sync {
    /// Decode a raster with its georeferencing.
    fn read(&self, path: &Path) -> Result<Raster, RasterError>;

    /// Encode `raster` to `path`, carrying its georeferencing over.
    fn write(&self, path: &Path, raster: &Raster, options: &WriteOptions)
    -> Result<(), RasterError>;

    /// Write a single-band mask as an 8-bit grayscale image.
    fn write_mask(&self, path: &Path, mask: ArrayView2<'_, u8>) -> Result<(), RasterError>;
}
