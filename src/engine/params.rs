//! Parameter types for the ratio mask engine.
//!
//! ## Types
//!
//! - [`ThresholdRatio`]: minimum green/red ratio for a plant pixel (default 1.0).
//!   Rejected on construction when not strictly positive and finite.

use super::mask::MaskError;
use std::fmt;

/// Default green-to-red ratio separating plant from soil.
pub const DEFAULT_RATIO: f64 = 1.0;

/// Lower bound of the green/red ratio for a pixel to count as plant.
///
/// The comparison is inclusive: a pixel whose ratio equals the threshold is
/// foreground.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct ThresholdRatio(f64);

impl ThresholdRatio {
    pub fn new(value: f64) -> Result<Self, MaskError> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(MaskError::InvalidParameter(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for ThresholdRatio {
    fn default() -> Self {
        Self(DEFAULT_RATIO)
    }
}

impl TryFrom<f64> for ThresholdRatio {
    type Error = MaskError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for ThresholdRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
