//! Mask construction and application.
//!
//! [`compute_mask`] turns a pixel array into a binary plant/soil mask and the
//! foreground fraction; [`apply_mask`] blacks out the RGB bands of soil pixels.
//! Both operate on `ndarray` views so callers can pass a whole image or one
//! tile of a larger raster.

use super::classify::{FOREGROUND, RatioClassifier};
use super::params::ThresholdRatio;
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, ArrayViewMut3, Axis, Zip};
use rayon::prelude::*;
use thiserror::Error;

/// Rows per classification tile when the caller does not choose.
pub const DEFAULT_TILE_ROWS: usize = 256;

/// Bands touched by the mask. Anything after blue (alpha, NoData) passes through.
const RGB_BANDS: usize = 3;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MaskError {
    #[error("Ratio value for soil masking must be a positive number: {0}")]
    InvalidParameter(f64),
    #[error("Image has no pixels ({height}x{width})")]
    EmptyImage { height: usize, width: usize },
    #[error("Mask is {mask_height}x{mask_width} but image is {height}x{width}")]
    ShapeMismatch {
        height: usize,
        width: usize,
        mask_height: usize,
        mask_width: usize,
    },
    #[error("Image has {0} band(s); red, green and blue are required")]
    InsufficientBands(usize),
}

/// Binary mask plus the counts behind the foreground fraction.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskOutcome {
    /// `(height, width)`, every element [`FOREGROUND`] or `0`.
    pub mask: Array2<u8>,
    pub foreground_pixels: usize,
    pub total_pixels: usize,
}

impl MaskOutcome {
    /// Share of plant pixels, in `[0.0, 1.0]`.
    pub fn foreground_fraction(&self) -> f64 {
        self.foreground_pixels as f64 / self.total_pixels as f64
    }
}

/// Classify every pixel of `pixels` against `threshold_ratio`.
///
/// Fails with [`MaskError::InvalidParameter`] for a non-positive ratio,
/// [`MaskError::InsufficientBands`] below three bands and
/// [`MaskError::EmptyImage`] when there is nothing to count.
pub fn compute_mask(
    pixels: ArrayView3<'_, u8>,
    threshold_ratio: f64,
) -> Result<MaskOutcome, MaskError> {
    let threshold = ThresholdRatio::new(threshold_ratio)?;
    RatioClassifier::new(threshold).compute_mask(pixels, DEFAULT_TILE_ROWS)
}

impl RatioClassifier {
    /// Build the mask for a whole image, classifying row tiles in parallel.
    ///
    /// The result does not depend on `tile_rows`; it only sets the unit of
    /// work handed to each rayon worker.
    pub fn compute_mask(
        &self,
        pixels: ArrayView3<'_, u8>,
        tile_rows: usize,
    ) -> Result<MaskOutcome, MaskError> {
        let (height, width, bands) = pixels.dim();
        if bands < RGB_BANDS {
            return Err(MaskError::InsufficientBands(bands));
        }
        let total_pixels = height * width;
        if total_pixels == 0 {
            return Err(MaskError::EmptyImage { height, width });
        }

        let tile_rows = tile_rows.max(1);
        let mut mask = Array2::<u8>::zeros((height, width));
        let tiles: Vec<_> = pixels
            .axis_chunks_iter(Axis(0), tile_rows)
            .zip(mask.axis_chunks_iter_mut(Axis(0), tile_rows))
            .collect();
        let foreground_pixels: usize = tiles
            .into_par_iter()
            .map(|(tile, mask_tile)| self.classify_tile(tile, mask_tile))
            .sum();

        Ok(MaskOutcome {
            mask,
            foreground_pixels,
            total_pixels,
        })
    }
}

/// Return a copy of `pixels` with the RGB bands of soil pixels set to zero.
///
/// Bands past blue are copied unchanged regardless of the mask.
pub fn apply_mask(
    pixels: ArrayView3<'_, u8>,
    mask: ArrayView2<'_, u8>,
) -> Result<Array3<u8>, MaskError> {
    check_shapes(pixels.dim(), mask.dim())?;
    let mut masked = pixels.to_owned();
    select_rgb(masked.view_mut(), mask);
    Ok(masked)
}

/// [`apply_mask`] without the copy, for callers that no longer need the original.
pub fn apply_mask_in_place(
    mut pixels: ArrayViewMut3<'_, u8>,
    mask: ArrayView2<'_, u8>,
) -> Result<(), MaskError> {
    check_shapes(pixels.dim(), mask.dim())?;
    select_rgb(pixels.view_mut(), mask);
    Ok(())
}

fn check_shapes(
    (height, width, bands): (usize, usize, usize),
    (mask_height, mask_width): (usize, usize),
) -> Result<(), MaskError> {
    if bands < RGB_BANDS {
        return Err(MaskError::InsufficientBands(bands));
    }
    if (height, width) != (mask_height, mask_width) {
        return Err(MaskError::ShapeMismatch {
            height,
            width,
            mask_height,
            mask_width,
        });
    }
    Ok(())
}

fn select_rgb(mut pixels: ArrayViewMut3<'_, u8>, mask: ArrayView2<'_, u8>) {
    for band in 0..RGB_BANDS {
        Zip::from(pixels.index_axis_mut(Axis(2), band))
            .and(&mask)
            .par_for_each(|value, &m| {
                *value = if m == FOREGROUND { *value } else { 0 };
            });
    }
}
