//! Run configuration.
//!
//! Handles loading, validating, and merging a `soilmask.toml` file. Stock
//! defaults are overridden by the user file, and command-line flags override
//! both (see `main.rs`).
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [mask]
//! ratio = 1.0               # Minimum green/red ratio for a plant pixel
//!
//! [output]
//! suffix = "_mask"          # Appended to the input stem for output names
//! compress = true           # Deflate-compress TIFF output
//! write_mask = false        # Also write the binary mask as a PNG
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! tile_rows = 256           # Rows per classification tile
//! ```
//!
//! Config files are sparse; override just the values you want. Unknown keys
//! are rejected to catch typos early.

use crate::engine::{DEFAULT_RATIO, DEFAULT_TILE_ROWS, ThresholdRatio};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration for a masking run.
///
/// All fields have defaults; a user file only lists what it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SoilmaskConfig {
    /// Classification settings.
    pub mask: MaskConfig,
    /// Output naming and encoding.
    pub output: OutputConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl SoilmaskConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if ThresholdRatio::new(self.mask.ratio).is_err() {
            return Err(ConfigError::Validation(format!(
                "mask.ratio must be a positive number, got {}",
                self.mask.ratio
            )));
        }
        if self.output.suffix.is_empty() {
            return Err(ConfigError::Validation(
                "output.suffix must not be empty".into(),
            ));
        }
        if self.processing.tile_rows == 0 {
            return Err(ConfigError::Validation(
                "processing.tile_rows must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// The validated threshold. Call after [`validate`](Self::validate).
    pub fn threshold(&self) -> Result<ThresholdRatio, ConfigError> {
        ThresholdRatio::new(self.mask.ratio).map_err(|e| ConfigError::Validation(e.to_string()))
    }
}

/// Classification settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaskConfig {
    /// Lower bound of the green-to-red ratio for a plant pixel (e.g. 0.75 or 1.2).
    pub ratio: f64,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            ratio: DEFAULT_RATIO,
        }
    }
}

/// Output naming and encoding settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Appended to the input file stem: `field.tif` → `field_mask.tif`.
    pub suffix: String,
    /// Deflate-compress TIFF output.
    pub compress: bool,
    /// Also write the single-band mask as `<stem><suffix>_bin.png`.
    pub write_mask: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            suffix: "_mask".to_string(),
            compress: true,
            write_mask: false,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel classification workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
    /// Image rows handed to each worker at a time.
    pub tile_rows: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_processes: None,
            tile_rows: DEFAULT_TILE_ROWS,
        }
    }
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// The base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(SoilmaskConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config does not serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<SoilmaskConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SoilmaskConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file, or the stock defaults when `path` is `None`.
///
/// An explicitly named file must exist.
pub fn load_config(path: Option<&Path>) -> Result<SoilmaskConfig, ConfigError> {
    let overlay = match path {
        Some(p) => {
            let content = fs::read_to_string(p)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        }
        None => None,
    };
    resolve_config(overlay)
}

/// Returns a fully-commented stock `soilmask.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Soilmask Configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Command-line flags win over this file.

# ---------------------------------------------------------------------------
# Classification
# ---------------------------------------------------------------------------
[mask]
# Lower bound of the green-to-red ratio for a pixel to be kept as plant.
# A pixel whose ratio equals this value is kept. Pixels with no red at all
# are kept whenever they have any green.
ratio = 1.0

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# Appended to the input file stem when no explicit output file is given:
# field.tif -> field_mask.tif
suffix = "_mask"

# Deflate-compress TIFF output.
compress = true

# Also write the binary plant/soil mask as <stem><suffix>_bin.png
# (white = plant, black = soil).
write_mask = false

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum number of parallel workers. Omit for auto (= number of CPU cores).
# Values larger than the core count are clamped down.
# max_processes = 4

# Image rows classified per work unit.
tile_rows = 256
"##
}
