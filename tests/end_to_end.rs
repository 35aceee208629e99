//! End-to-end tests: real GeoTIFF/PNG files on disk, masked through the
//! library pipeline and through the `soilmask` binary.
//!
//! Run with: `cargo test --test end_to_end`

use ndarray::Array3;
use soilmask_ratio::config::SoilmaskConfig;
use soilmask_ratio::process::{self, ProcessOptions, RESULT_FILENAME};
use soilmask_ratio::raster::{FileBackend, GeoMetadata, Raster, RasterBackend, WriteOptions};
use soilmask_ratio::types::{CODE_NO_INPUT_FILES, ResultRecord, TransformerInfo};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const PLANT: [u8; 3] = [40, 180, 30];
const SOIL: [u8; 3] = [160, 120, 100];

/// Left half plant, right half soil, with a black pixel in the top-left corner.
fn half_plant(height: usize, width: usize) -> Array3<u8> {
    Array3::from_shape_fn((height, width, 3), |(row, col, band)| {
        if row == 0 && col == 0 {
            0
        } else if col < width / 2 {
            PLANT[band]
        } else {
            SOIL[band]
        }
    })
}

fn utm_geo() -> GeoMetadata {
    GeoMetadata {
        pixel_scale: Some(vec![0.02, 0.02, 0.0]),
        tiepoints: Some(vec![0.0, 0.0, 0.0, 409000.0, 3660000.0, 0.0]),
        geo_key_directory: Some(vec![1, 1, 0, 2, 1024, 0, 1, 1, 3072, 0, 1, 32612]),
        geo_ascii_params: Some("WGS 84 / UTM zone 12N|".to_string()),
        nodata: Some("0".to_string()),
        ..GeoMetadata::default()
    }
}

fn write_input(path: &Path, raster: &Raster) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    FileBackend::new()
        .write(path, raster, &WriteOptions::default())
        .unwrap();
}

fn default_options(working_folder: &Path) -> ProcessOptions {
    ProcessOptions::from_config(&SoilmaskConfig::default(), working_folder).unwrap()
}

// ===========================================================================
// Library pipeline
// ===========================================================================

#[test]
fn geotiff_is_masked_and_keeps_georeferencing() {
    let inputs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let input = inputs.path().join("field.tif");
    let raster = Raster {
        pixels: half_plant(8, 10),
        geo: utm_geo(),
    };
    write_input(&input, &raster);

    let result = process::process(&[input.clone()], &default_options(work.path()), None).unwrap();

    let output = work.path().join("field_mask.tif");
    assert_eq!(result.masked.len(), 1);
    assert_eq!(result.masked[0].output, output);
    // 40 plant pixels minus the black corner
    assert_eq!(result.masked[0].foreground_pixels, 39);
    assert_eq!(result.masked[0].total_pixels, 80);

    let masked = FileBackend::new().read(&output).unwrap();
    assert_eq!(masked.geo.epsg(), Some(32612));
    assert_eq!(masked.geo.tiepoints, raster.geo.tiepoints);
    assert_eq!(masked.geo.pixel_scale, raster.geo.pixel_scale);
    assert_eq!(masked.pixels.dim(), (8, 10, 3));
    for ((row, col, band), &value) in masked.pixels.indexed_iter() {
        let expected = if col < 5 && (row, col) != (0, 0) {
            PLANT[band]
        } else {
            0
        };
        assert_eq!(value, expected, "pixel ({row}, {col}) band {band}");
    }

    let bounds = result.masked[0].bounds.unwrap();
    assert!((bounds.max_x - bounds.min_x - 0.2).abs() < 1e-9);
    assert!((bounds.max_y - bounds.min_y - 0.16).abs() < 1e-9);
}

#[test]
fn input_file_is_left_untouched() {
    let inputs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let input = inputs.path().join("field.tif");
    write_input(&input, &Raster::new(half_plant(4, 4)));
    let before = std::fs::read(&input).unwrap();

    process::process(&[input.clone()], &default_options(work.path()), None).unwrap();

    assert_eq!(std::fs::read(&input).unwrap(), before);
}

#[test]
fn higher_threshold_masks_more() {
    let inputs = TempDir::new().unwrap();
    let input = inputs.path().join("field.png");
    write_input(&input, &Raster::new(half_plant(6, 6)));

    let fraction = |ratio: f64| {
        let work = TempDir::new().unwrap();
        let mut config = SoilmaskConfig::default();
        config.mask.ratio = ratio;
        let options = ProcessOptions::from_config(&config, work.path()).unwrap();
        process::process(&[input.clone()], &options, None).unwrap().masked[0].foreground_fraction
    };

    // SOIL has G/R = 0.75, PLANT has G/R = 4.5
    let loose = fraction(0.5);
    let default = fraction(1.0);
    let strict = fraction(10.0);
    assert!(loose > default);
    assert!(default > strict);
    assert_eq!(strict, 0.0);
}

#[test]
fn png_with_binary_mask() {
    let inputs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let input = inputs.path().join("plot.png");
    write_input(&input, &Raster::new(half_plant(2, 4)));
    let mut options = default_options(work.path());
    options.write_mask = true;

    process::process(&[input], &options, None).unwrap();

    assert!(work.path().join("plot_mask.png").exists());
    let mask = image::open(work.path().join("plot_mask_bin.png"))
        .unwrap()
        .to_luma8();
    assert_eq!(mask.into_raw(), vec![0, 255, 0, 0, 255, 255, 0, 0]);
}

#[test]
fn output_embeds_transformer_metadata() {
    let inputs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let input = inputs.path().join("field.tif");
    write_input(&input, &Raster::new(half_plant(2, 2)));

    process::process(&[input], &default_options(work.path()), None).unwrap();

    let bytes = std::fs::read(work.path().join("field_mask.tif")).unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("<Item name=\"transformer_name\">soilmask</Item>"));
}

#[test]
fn result_record_matches_outputs() {
    let inputs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let a = inputs.path().join("a.tif");
    let b = inputs.path().join("b.tif");
    write_input(&a, &Raster::new(half_plant(4, 4)));
    write_input(&b, &Raster::new(half_plant(4, 8)));

    let result = process::process(&[a, b], &default_options(work.path()), None).unwrap();
    let record = result.to_record(&TransformerInfo::soilmask());
    let path = process::write_result_record(&record, work.path()).unwrap();

    let loaded: ResultRecord =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert!(loaded.is_success());
    let files = loaded.file.unwrap();
    let paths: Vec<PathBuf> = files.iter().map(|f| PathBuf::from(&f.path)).collect();
    assert_eq!(
        paths,
        vec![work.path().join("a_mask.tif"), work.path().join("b_mask.tif")]
    );
    assert!((files[0].metadata.data.ratio - 7.0 / 16.0).abs() < 1e-12);
    assert!((files[1].metadata.data.ratio - 15.0 / 32.0).abs() < 1e-12);
}

// ===========================================================================
// Binary
// ===========================================================================

fn soilmask() -> Command {
    Command::new(env!("CARGO_BIN_EXE_soilmask"))
}

fn read_record(working_folder: &Path) -> ResultRecord {
    let content = std::fs::read_to_string(working_folder.join(RESULT_FILENAME)).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[test]
fn cli_masks_directory() {
    let inputs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    write_input(&inputs.path().join("a.tif"), &Raster::new(half_plant(4, 4)));
    write_input(
        &inputs.path().join("nested/b.tif"),
        &Raster {
            pixels: half_plant(4, 4),
            geo: utm_geo(),
        },
    );

    let status = soilmask()
        .args(["--log-level", "warn", "mask"])
        .arg(inputs.path())
        .arg("--working-folder")
        .arg(work.path())
        .arg("--ratio")
        .arg("1.2")
        .status()
        .unwrap();

    assert!(status.success());
    assert!(work.path().join("a_mask.tif").exists());
    assert!(work.path().join("b_mask.tif").exists());
    let record = read_record(work.path());
    assert_eq!(record.code, 0);
    assert_eq!(record.file.unwrap().len(), 2);
}

#[test]
fn cli_explicit_out_file() {
    let inputs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let input = inputs.path().join("field.tif");
    write_input(&input, &Raster::new(half_plant(2, 2)));

    let status = soilmask()
        .arg("mask")
        .arg(&input)
        .arg("--working-folder")
        .arg(work.path())
        .args(["--out-file", "custom.tif", "--no-compress"])
        .status()
        .unwrap();

    assert!(status.success());
    assert!(work.path().join("custom.tif").exists());
    assert!(!work.path().join("field_mask.tif").exists());
}

#[test]
fn cli_without_supported_inputs_fails_with_record() {
    let inputs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let notes = inputs.path().join("notes.txt");
    std::fs::write(&notes, "not a raster").unwrap();

    let status = soilmask()
        .arg("mask")
        .arg(&notes)
        .arg("--working-folder")
        .arg(work.path())
        .status()
        .unwrap();

    assert!(!status.success());
    let record = read_record(work.path());
    assert_eq!(record.code, CODE_NO_INPUT_FILES);
    assert_eq!(
        record.error.as_deref(),
        Some("No TIFF files were specified for processing")
    );
}

#[test]
fn cli_rejects_non_positive_ratio() {
    let inputs = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let input = inputs.path().join("field.tif");
    write_input(&input, &Raster::new(half_plant(2, 2)));

    let status = soilmask()
        .arg("mask")
        .arg(&input)
        .arg("--working-folder")
        .arg(work.path())
        .args(["--ratio", "0"])
        .status()
        .unwrap();

    assert!(!status.success());
    assert!(!work.path().join("field_mask.tif").exists());
    assert!(read_record(work.path()).code < 0);
}

#[test]
fn cli_gen_config_is_valid_toml() {
    let out = soilmask().arg("gen-config").output().unwrap();
    assert!(out.status.success());

    let text = String::from_utf8(out.stdout).unwrap();
    let parsed: SoilmaskConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed, SoilmaskConfig::default());
}
