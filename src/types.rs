//! Shared types: transformer identity and the run's result record.
//!
//! The result record is what a calling pipeline reads back after a run. Its
//! JSON shape is fixed:
//!
//! ```json
//! {
//!   "code": 0,
//!   "file": [{
//!     "path": "/work/field_mask.tif",
//!     "key": "stereoTop",
//!     "metadata": {"data": {"name": "soilmask", "version": "1.0", "ratio": 0.42}}
//!   }]
//! }
//! ```
//!
//! Failures carry a negative `code` and an `error` message instead of `file`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result code of a successful run.
pub const CODE_SUCCESS: i32 = 0;
/// Result code when masking a file failed.
pub const CODE_PROCESSING_FAILED: i32 = -1001;
/// Result code when no input could be masked at all.
pub const CODE_NO_INPUT_FILES: i32 = -1002;

/// Who produced an output: embedded in rasters and copied into result records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub author_email: String,
    pub contributors: Vec<String>,
    /// Sensor the outputs are filed under.
    pub sensor: String,
    pub transformer_type: String,
    pub repository: String,
}

impl TransformerInfo {
    pub fn soilmask() -> Self {
        Self {
            name: "soilmask".to_string(),
            version: "1.0".to_string(),
            description: "Soil masks images through green:red ratio comparison".to_string(),
            author: "Chris Schnaufer".to_string(),
            author_email: "schnaufer@arizona.edu".to_string(),
            contributors: vec!["Andrew French".to_string()],
            sensor: "stereoTop".to_string(),
            transformer_type: "rgbmask".to_string(),
            repository: env!("CARGO_PKG_REPOSITORY").to_string(),
        }
    }

    /// Key/value pairs embedded in each output raster.
    pub fn raster_metadata(&self) -> BTreeMap<String, String> {
        [
            ("transformer_name", &self.name),
            ("transformer_version", &self.version),
            ("transformer_author", &self.author),
            ("transformer_description", &self.description),
            ("transformer_repo", &self.repository),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
    }
}

impl Default for TransformerInfo {
    fn default() -> Self {
        Self::soilmask()
    }
}

/// Outcome of a run as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<Vec<FileRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResultRecord {
    pub fn success(files: Vec<FileRecord>) -> Self {
        Self {
            code: CODE_SUCCESS,
            file: Some(files),
            error: None,
        }
    }

    pub fn failure(code: i32, error: impl Into<String>) -> Self {
        Self {
            code,
            file: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == CODE_SUCCESS
    }
}

/// One written output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub key: String,
    pub metadata: FileMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub data: TransformerData,
}

/// Per-file numbers: `ratio` is the foreground (plant) fraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerData {
    pub name: String,
    pub version: String,
    pub ratio: f64,
}
