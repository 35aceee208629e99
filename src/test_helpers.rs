//! Shared fixtures for the soilmask test suite.

use crate::raster::{GeoMetadata, Raster};
use ndarray::Array3;

/// Colour of even columns in [`striped_image`]: green clearly above red.
pub const PLANT: [u8; 3] = [60, 140, 50];
/// Colour of odd columns in [`striped_image`]: red above green.
pub const SOIL: [u8; 3] = [150, 110, 90];

/// Georeferencing of a 1 cm UTM 12N orthomosaic with NoData 0.
pub fn utm_metadata() -> GeoMetadata {
    GeoMetadata {
        pixel_scale: Some(vec![0.01, 0.01, 0.0]),
        tiepoints: Some(vec![0.0, 0.0, 0.0, 409000.0, 3660000.0, 0.0]),
        transformation: None,
        geo_key_directory: Some(vec![
            1, 1, 0, 3, //
            1024, 0, 1, 1, //
            1025, 0, 1, 1, //
            3072, 0, 1, 32612,
        ]),
        geo_double_params: None,
        geo_ascii_params: Some("WGS 84 / UTM zone 12N|".to_string()),
        nodata: Some("0".to_string()),
    }
}

/// A `(height, width, bands)` image alternating plant and soil columns.
///
/// Even columns are [`PLANT`], odd columns [`SOIL`], each shifted up by
/// `row % 8` so rows differ. A fourth band is an opaque alpha channel;
/// any further bands hold `17 * band`.
pub fn striped_image(height: usize, width: usize, bands: usize) -> Array3<u8> {
    Array3::from_shape_fn((height, width, bands), |(row, col, band)| {
        let base = if col % 2 == 0 { PLANT } else { SOIL };
        match band {
            0..=2 => base[band] + (row % 8) as u8,
            3 => 255,
            _ => (17 * band) as u8,
        }
    })
}

/// A georeferenced [`striped_image`] raster.
pub fn striped_raster(height: usize, width: usize) -> Raster {
    Raster {
        pixels: striped_image(height, width, 3),
        geo: utm_metadata(),
    }
}
