//! Raster accessor: loading and saving pixel arrays.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Read GeoTIFF** | `tiff::decoder::Decoder` + GeoTIFF tag capture |
//! | **Write GeoTIFF** | `tiff::encoder::TiffEncoder` (Deflate) + tag replay |
//! | **Read/write PNG** | `image` crate |
//! | **Mask dump** | `image::GrayImage` → PNG |
//!
//! The module is split into:
//! - **Backend**: [`RasterBackend`] trait, [`Raster`], [`RasterError`]
//! - **Geo**: [`GeoMetadata`] georeferencing tags, EPSG and bounds lookup
//! - **File backend**: [`FileBackend`], the on-disk implementation

pub mod backend;
pub mod file_backend;
pub mod geo;

pub use backend::{Raster, RasterBackend, RasterError, WriteOptions};
pub use file_backend::{FileBackend, supported_raster_extensions};
pub use geo::{GeoBounds, GeoMetadata};
