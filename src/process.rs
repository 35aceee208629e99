//! Masking pipeline.
//!
//! Takes the inputs found by [`scan`](crate::scan) and, for each raster:
//!
//! ```text
//! read → classify (row tiles in parallel) → zero soil pixels → write
//! ```
//!
//! ## Outputs
//!
//! For `field.tif` with default settings, the working folder receives:
//!
//! ```text
//! work/
//! ├── field_mask.tif        # RGB(A) with soil pixels zeroed, georeferencing kept
//! ├── field_mask_bin.png    # only with write_mask: 255 = plant, 0 = soil
//! └── result.json           # ResultRecord for the whole run
//! ```
//!
//! A raster that names an EPSG code but has no computable ground extent is
//! skipped with a warning. A run where every input is skipped still succeeds,
//! with an empty file list. Any other failure aborts the run.

use crate::config::{ConfigError, SoilmaskConfig};
use crate::engine::{MaskError, RatioClassifier, ThresholdRatio, apply_mask_in_place};
use crate::naming::{binary_mask_filename, resolve_output_path};
use crate::raster::{FileBackend, GeoBounds, RasterBackend, RasterError, WriteOptions};
use crate::scan::ScanError;
use crate::types::{
    CODE_NO_INPUT_FILES, CODE_PROCESSING_FAILED, FileMetadata, FileRecord, ResultRecord,
    TransformerData, TransformerInfo,
};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Name of the result record written to the working folder.
pub const RESULT_FILENAME: &str = "result.json";

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Raster error: {0}")]
    Raster(#[from] RasterError),
    #[error("Masking failed: {0}")]
    Mask(#[from] MaskError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to mask {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: Box<ProcessError>,
    },
}

impl ProcessError {
    /// Code reported in the [`ResultRecord`] for this failure.
    pub fn result_code(&self) -> i32 {
        match self {
            ProcessError::Scan(ScanError::NoSupportedFiles) => CODE_NO_INPUT_FILES,
            ProcessError::File { source, .. } => source.result_code(),
            _ => CODE_PROCESSING_FAILED,
        }
    }
}

/// Settings for one masking run.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub threshold: ThresholdRatio,
    /// Explicit output path; only meaningful with a single input.
    pub out_file: Option<PathBuf>,
    pub working_folder: PathBuf,
    pub suffix: String,
    pub compress: bool,
    pub write_mask: bool,
    pub tile_rows: usize,
}

impl ProcessOptions {
    /// Build options from a validated config, writing into `working_folder`.
    pub fn from_config(
        config: &SoilmaskConfig,
        working_folder: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            threshold: config.threshold()?,
            out_file: None,
            working_folder: working_folder.into(),
            suffix: config.output.suffix.clone(),
            compress: config.output.compress,
            write_mask: config.output.write_mask,
            tile_rows: config.processing.tile_rows,
        })
    }
}

/// One raster that was masked and written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaskedFile {
    pub input: PathBuf,
    pub output: PathBuf,
    pub mask_output: Option<PathBuf>,
    pub foreground_pixels: usize,
    pub total_pixels: usize,
    /// Fraction of pixels classified as plant, in `[0, 1]`.
    pub foreground_fraction: f64,
    pub epsg: Option<u16>,
    pub bounds: Option<GeoBounds>,
}

/// One raster left untouched, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFile {
    pub input: PathBuf,
    pub reason: String,
}

/// Everything a run did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessResult {
    pub masked: Vec<MaskedFile>,
    pub skipped: Vec<SkippedFile>,
}

impl ProcessResult {
    /// The caller-facing record: one entry per written output.
    pub fn to_record(&self, info: &TransformerInfo) -> ResultRecord {
        let files = self
            .masked
            .iter()
            .map(|file| FileRecord {
                path: file.output.display().to_string(),
                key: info.sensor.clone(),
                metadata: FileMetadata {
                    data: TransformerData {
                        name: info.name.clone(),
                        version: info.version.clone(),
                        ratio: file.foreground_fraction,
                    },
                },
            })
            .collect();
        ResultRecord::success(files)
    }
}

/// Progress reported while a run is under way.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    Masked(MaskedFile),
    Skipped(SkippedFile),
}

pub fn process(
    inputs: &[PathBuf],
    options: &ProcessOptions,
    events: Option<Sender<ProcessEvent>>,
) -> Result<ProcessResult, ProcessError> {
    let backend = FileBackend::new();
    process_with_backend(&backend, inputs, options, events)
}

/// Mask every input using a specific backend (allows testing with mock).
pub fn process_with_backend(
    backend: &impl RasterBackend,
    inputs: &[PathBuf],
    options: &ProcessOptions,
    events: Option<Sender<ProcessEvent>>,
) -> Result<ProcessResult, ProcessError> {
    if inputs.is_empty() {
        return Err(ScanError::NoSupportedFiles.into());
    }
    if options.out_file.is_some() && inputs.len() > 1 {
        warn!(
            count = inputs.len(),
            "Explicit output file given for several inputs; later outputs overwrite earlier ones"
        );
    }

    std::fs::create_dir_all(&options.working_folder)?;

    let classifier = RatioClassifier::new(options.threshold);
    let info = TransformerInfo::soilmask();
    let write_options = WriteOptions {
        compress: options.compress,
        metadata: info.raster_metadata(),
    };

    let mut result = ProcessResult::default();
    for input in inputs {
        let outcome = mask_file(backend, &classifier, input, options, &write_options).map_err(
            |source| ProcessError::File {
                path: input.clone(),
                source: Box::new(source),
            },
        )?;
        match outcome {
            FileOutcome::Masked(file) => {
                if let Some(tx) = &events {
                    tx.send(ProcessEvent::Masked(file.clone())).ok();
                }
                result.masked.push(file);
            }
            FileOutcome::Skipped(file) => {
                if let Some(tx) = &events {
                    tx.send(ProcessEvent::Skipped(file.clone())).ok();
                }
                result.skipped.push(file);
            }
        }
    }

    Ok(result)
}

enum FileOutcome {
    Masked(MaskedFile),
    Skipped(SkippedFile),
}

fn mask_file(
    backend: &impl RasterBackend,
    classifier: &RatioClassifier,
    input: &Path,
    options: &ProcessOptions,
    write_options: &WriteOptions,
) -> Result<FileOutcome, ProcessError> {
    debug!(path = %input.display(), "Reading raster");
    let mut raster = backend.read(input)?;

    let epsg = raster.geo.epsg();
    let bounds = raster.geo.bounds(raster.width(), raster.height());
    if let (Some(code), None) = (epsg, &bounds) {
        warn!(
            path = %input.display(),
            epsg = code,
            "Raster has an EPSG code but no usable ground extent, skipping"
        );
        return Ok(FileOutcome::Skipped(SkippedFile {
            input: input.to_path_buf(),
            reason: format!("EPSG:{code} without ground extent"),
        }));
    }

    let outcome = classifier.compute_mask(raster.pixels.view(), options.tile_rows)?;
    apply_mask_in_place(raster.pixels.view_mut(), outcome.mask.view())?;

    let output = resolve_output_path(
        input,
        options.out_file.as_deref(),
        &options.working_folder,
        &options.suffix,
    );
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    backend.write(&output, &raster, write_options)?;

    let mask_output = if options.write_mask {
        let path = options
            .working_folder
            .join(binary_mask_filename(input, &options.suffix));
        backend.write_mask(&path, outcome.mask.view())?;
        Some(path)
    } else {
        None
    };

    let foreground_fraction = outcome.foreground_fraction();
    info!(
        input = %input.display(),
        output = %output.display(),
        plant_fraction = foreground_fraction,
        epsg = ?epsg,
        "Masked raster"
    );

    Ok(FileOutcome::Masked(MaskedFile {
        input: input.to_path_buf(),
        output,
        mask_output,
        foreground_pixels: outcome.foreground_pixels,
        total_pixels: outcome.total_pixels,
        foreground_fraction,
        epsg,
        bounds,
    }))
}

/// Write `record` as pretty JSON to `<working_folder>/result.json`.
///
/// The JSON goes to a temp file in the same folder first and is renamed into
/// place, so a reader never sees a half-written record.
pub fn write_result_record(
    record: &ResultRecord,
    working_folder: &Path,
) -> Result<PathBuf, ProcessError> {
    std::fs::create_dir_all(working_folder)?;
    let path = working_folder.join(RESULT_FILENAME);
    let mut tmp = NamedTempFile::new_in(working_folder)?;
    serde_json::to_writer_pretty(&mut tmp, record)?;
    tmp.flush()?;
    tmp.persist(&path).map_err(|e| e.error)?;
    Ok(path)
}
