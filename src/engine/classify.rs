//! Per-pixel plant/soil classification.
//!
//! A pixel only contributes two bytes to the decision (red and green), so
//! every possible outcome fits in a 256×256 table. [`RatioClassifier`] builds
//! that table once per threshold and the scan becomes a lookup per pixel,
//! with no division or branch in the hot loop.
//!
//! ## Decision rule
//!
//! | Red | Green | Result |
//! |---|---|---|
//! | `0` | `0` | soil |
//! | `0` | `> 0` | plant, whatever the threshold |
//! | `> 0` | any | plant iff `G / R >= threshold` |

use super::params::ThresholdRatio;
use ndarray::{ArrayView3, ArrayViewMut2, Axis, Zip};

/// Mask value for plant (foreground) pixels.
pub const FOREGROUND: u8 = 255;
/// Mask value for soil (background) pixels.
pub const BACKGROUND: u8 = 0;

const RED_BAND: usize = 0;
const GREEN_BAND: usize = 1;

/// Classifies (red, green) pairs against a fixed threshold.
///
/// Holds no mutable state, so one instance can be shared across rayon workers
/// and reused for every tile of an image.
#[derive(Clone)]
pub struct RatioClassifier {
    threshold: ThresholdRatio,
    table: Box<[u8]>,
}

impl RatioClassifier {
    pub fn new(threshold: ThresholdRatio) -> Self {
        let t = threshold.value();
        let mut table = vec![BACKGROUND; 256 * 256].into_boxed_slice();
        for red in 0..=255u8 {
            for green in 0..=255u8 {
                table[table_index(red, green)] = if classify_pair(red, green, t) {
                    FOREGROUND
                } else {
                    BACKGROUND
                };
            }
        }
        Self { threshold, table }
    }

    pub fn threshold(&self) -> ThresholdRatio {
        self.threshold
    }

    /// Mask value for a single pixel.
    #[inline]
    pub fn classify(&self, red: u8, green: u8) -> u8 {
        self.table[table_index(red, green)]
    }

    /// Classify one tile into its slice of the mask.
    ///
    /// `tile` is `(rows, cols, bands ≥ 2)` and `mask` must be `(rows, cols)`.
    /// Returns the number of foreground pixels written. Tiles carry no state
    /// between calls, so any partition of an image gives the same mask.
    pub fn classify_tile(
        &self,
        tile: ArrayView3<'_, u8>,
        mut mask: ArrayViewMut2<'_, u8>,
    ) -> usize {
        let red = tile.index_axis(Axis(2), RED_BAND);
        let green = tile.index_axis(Axis(2), GREEN_BAND);
        let mut foreground = 0usize;
        Zip::from(&mut mask)
            .and(&red)
            .and(&green)
            .for_each(|m, &r, &g| {
                *m = self.classify(r, g);
                foreground += usize::from(*m == FOREGROUND);
            });
        foreground
    }
}

impl std::fmt::Debug for RatioClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RatioClassifier")
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

#[inline]
fn table_index(red: u8, green: u8) -> usize {
    (usize::from(red) << 8) | usize::from(green)
}

/// Reference decision for one pixel; the lookup table is filled from this.
fn classify_pair(red: u8, green: u8, threshold: f64) -> bool {
    if red == 0 {
        return green > 0;
    }
    f64::from(green) / f64::from(red) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    fn classifier(t: f64) -> RatioClassifier {
        RatioClassifier::new(ThresholdRatio::new(t).unwrap())
    }

    #[test]
    fn boundary_ratio_is_foreground() {
        let c = classifier(1.25);
        assert_eq!(c.classify(100, 125), FOREGROUND);
        assert_eq!(c.classify(100, 124), BACKGROUND);
    }

    #[test]
    fn zero_red_depends_only_on_green() {
        for t in [0.01, 1.0, 50.0, 1e9] {
            let c = classifier(t);
            assert_eq!(c.classify(0, 0), BACKGROUND, "threshold {t}");
            assert_eq!(c.classify(0, 5), FOREGROUND, "threshold {t}");
            assert_eq!(c.classify(0, 1), FOREGROUND, "threshold {t}");
        }
    }

    #[test]
    fn equal_channels_meet_unit_threshold() {
        let c = classifier(1.0);
        for v in 1..=255u8 {
            assert_eq!(c.classify(v, v), FOREGROUND);
        }
    }

    #[test]
    fn table_matches_direct_division() {
        let c = classifier(0.7);
        for red in 1..=255u8 {
            for green in 0..=255u8 {
                let expected = f64::from(green) / f64::from(red) >= 0.7;
                assert_eq!(c.classify(red, green) == FOREGROUND, expected, "r={red} g={green}");
            }
        }
    }

    #[test]
    fn classify_tile_counts_foreground() {
        let c = classifier(1.0);
        // Two pixels: (10, 20, 0) plant, (50, 40, 0) soil
        let tile = Array3::from_shape_vec((1, 2, 3), vec![10, 20, 0, 50, 40, 0]).unwrap();
        let mut mask = Array2::<u8>::zeros((1, 2));

        let count = c.classify_tile(tile.view(), mask.view_mut());

        assert_eq!(count, 1);
        assert_eq!(mask, ndarray::arr2(&[[FOREGROUND, BACKGROUND]]));
    }

    #[test]
    fn debug_hides_table() {
        let rendered = format!("{:?}", classifier(1.5));
        assert!(rendered.contains("1.5"));
        assert!(!rendered.contains("table"));
    }
}
