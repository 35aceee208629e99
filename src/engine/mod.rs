//! Ratio mask engine: the numeric core.
//!
//! | Step | Function |
//! |---|---|
//! | **Validate threshold** | [`ThresholdRatio::new`] |
//! | **Classify pixels** | [`RatioClassifier`] (256×256 lookup table) |
//! | **Build mask + fraction** | [`compute_mask`] / [`RatioClassifier::compute_mask`] |
//! | **Black out soil** | [`apply_mask`] / [`apply_mask_in_place`] |
//!
//! Pixel arrays are `(height, width, bands)` `u8` cubes with red, green and
//! blue in bands 0–2. Nothing here touches the filesystem; the
//! [`raster`](crate::raster) module owns loading and saving.

mod classify;
mod mask;
mod params;

pub use classify::{BACKGROUND, FOREGROUND, RatioClassifier};
pub use mask::{
    DEFAULT_TILE_ROWS, MaskError, MaskOutcome, apply_mask, apply_mask_in_place, compute_mask,
};
pub use params::{DEFAULT_RATIO, ThresholdRatio};
