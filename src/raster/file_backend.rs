//! Filesystem raster backend.
//!
//! ## Format mapping
//!
//! | Extension | Read | Write |
//! |---|---|---|
//! | `.tif`, `.tiff` | `tiff` decoder, 8-bit RGB(A) | `tiff` encoder, RGB8/RGBA8, Deflate |
//! | `.png` | `image` crate (RGB or RGBA) | `image` crate |
//!
//! TIFF reads keep the GeoTIFF tags and fill the pixel array one strip (or
//! tile) at a time. TIFF writes replay those tags and add a GDAL metadata
//! block.
//!
//! Every write goes to a temporary file in the destination directory and is
//! renamed into place only after encoding succeeded.

use super::backend::{Raster, RasterBackend, RasterError, WriteOptions};
use super::geo::{self, GeoMetadata};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use ndarray::{Array3, ArrayView2, ArrayView3, s};
use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, Write};
use std::path::Path;
use tiff::ColorType;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::{self, ColorType as EncodeColorType};
use tiff::encoder::compression::{Compression, Deflate, Uncompressed};
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

/// Extensions the backend can read and write, lowercase without the dot.
const SUPPORTED_EXTENSIONS: &[&str] = &["tif", "tiff", "png"];

/// `PlanarConfiguration` value for interleaved (`RGBRGB...`) samples.
const PLANAR_CHUNKY: u16 = 1;

/// Returns the raster extensions the backend understands.
pub fn supported_raster_extensions() -> &'static [&'static str] {
    SUPPORTED_EXTENSIONS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RasterFormat {
    Tiff,
    Png,
}

fn format_of(path: &Path) -> Result<RasterFormat, RasterError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "tif" | "tiff" => Ok(RasterFormat::Tiff),
        "png" => Ok(RasterFormat::Png),
        _ => Err(RasterError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Pure Rust backend on top of the `tiff` and `image` crates.
pub struct FileBackend;

impl FileBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FileBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn unsupported(path: &Path, detail: impl Into<String>) -> RasterError {
    RasterError::UnsupportedLayout {
        path: path.to_path_buf(),
        detail: detail.into(),
    }
}

fn read_tiff(path: &Path) -> Result<Raster, RasterError> {
    let file = File::open(path)?;
    // Orthomosaics routinely exceed the default decoding limits; memory is
    // bounded by the destination array, which is allocated once below.
    let mut decoder = Decoder::new(BufReader::new(file))?.with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions()?;
    let bands = match decoder.colortype()? {
        ColorType::RGB(8) => 3,
        ColorType::RGBA(8) => 4,
        other => return Err(unsupported(path, format!("{other:?}, expected 8-bit RGB(A)"))),
    };
    let planar = decoder
        .find_tag(Tag::PlanarConfiguration)?
        .map(|v| v.into_u16())
        .transpose()?;
    if planar.is_some_and(|p| p != PLANAR_CHUNKY) {
        return Err(unsupported(path, "planar sample layout, expected interleaved"));
    }
    let geo = GeoMetadata::read_from(&mut decoder)?;

    let mut pixels = Array3::<u8>::zeros((height as usize, width as usize, bands));
    let (chunk_width, chunk_height) = decoder.chunk_dimensions();
    let chunks_across = width.div_ceil(chunk_width);
    let chunk_count = chunks_across * height.div_ceil(chunk_height);

    for chunk in 0..chunk_count {
        let samples = match decoder.read_chunk(chunk)? {
            DecodingResult::U8(samples) => samples,
            _ => return Err(unsupported(path, "samples are not 8-bit")),
        };
        let (data_width, data_height) = decoder.chunk_data_dimensions(chunk);
        let (data_width, data_height) = (data_width as usize, data_height as usize);
        let data = ArrayView3::from_shape((data_height, data_width, bands), &samples)
            .map_err(|e| unsupported(path, format!("chunk {chunk}: {e}")))?;

        let top = (chunk / chunks_across * chunk_height) as usize;
        let left = (chunk % chunks_across * chunk_width) as usize;
        pixels
            .slice_mut(s![top..top + data_height, left..left + data_width, ..])
            .assign(&data);
    }

    Ok(Raster { pixels, geo })
}

fn read_png(path: &Path) -> Result<Raster, RasterError> {
    let img = image::open(path)?;
    let (width, height) = (img.width() as usize, img.height() as usize);
    let (bands, samples) = if img.color().has_alpha() {
        (4, img.to_rgba8().into_raw())
    } else {
        (3, img.to_rgb8().into_raw())
    };
    let pixels = Array3::from_shape_vec((height, width, bands), samples)
        .map_err(|e| unsupported(path, e.to_string()))?;
    Ok(Raster::new(pixels))
}

/// Interleaved samples in row-major `(y, x, band)` order.
fn interleaved(raster: &Raster) -> Vec<u8> {
    raster.pixels.as_standard_layout().iter().copied().collect()
}

/// Everything an encoded TIFF image carries besides its pixel type.
struct TiffPayload<'a> {
    width: u32,
    height: u32,
    samples: &'a [u8],
    geo: &'a GeoMetadata,
    metadata: Option<&'a str>,
}

fn encode_tiff<W: Write + Seek>(
    writer: W,
    path: &Path,
    raster: &Raster,
    options: &WriteOptions,
) -> Result<(), RasterError> {
    let mut encoder = TiffEncoder::new(writer)?;
    let samples = interleaved(raster);
    let metadata = (!options.metadata.is_empty())
        .then(|| geo::gdal_metadata_xml(&options.metadata));
    let payload = TiffPayload {
        width: raster.width() as u32,
        height: raster.height() as u32,
        samples: &samples,
        geo: &raster.geo,
        metadata: metadata.as_deref(),
    };

    match (raster.bands(), options.compress) {
        (3, true) => {
            encode_tiff_image::<_, colortype::RGB8, _>(&mut encoder, &payload, Deflate::default())
        }
        (3, false) => {
            encode_tiff_image::<_, colortype::RGB8, _>(&mut encoder, &payload, Uncompressed)
        }
        (4, true) => {
            encode_tiff_image::<_, colortype::RGBA8, _>(&mut encoder, &payload, Deflate::default())
        }
        (4, false) => {
            encode_tiff_image::<_, colortype::RGBA8, _>(&mut encoder, &payload, Uncompressed)
        }
        (bands, _) => Err(unsupported(
            path,
            format!("{bands} bands; TIFF output supports 3 (RGB) or 4 (RGBA)"),
        )),
    }
}

fn encode_tiff_image<W, C, D>(
    encoder: &mut TiffEncoder<W>,
    payload: &TiffPayload<'_>,
    compression: D,
) -> Result<(), RasterError>
where
    W: Write + Seek,
    C: EncodeColorType<Inner = u8>,
    D: Compression,
{
    let mut image =
        encoder.new_image_with_compression::<C, D>(payload.width, payload.height, compression)?;
    payload.geo.write_to(image.encoder())?;
    if let Some(xml) = payload.metadata {
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(geo::GDAL_METADATA), xml)?;
    }
    image.write_data(payload.samples)?;
    Ok(())
}

fn encode_png<W: Write + Seek>(
    writer: &mut W,
    path: &Path,
    raster: &Raster,
) -> Result<(), RasterError> {
    let (width, height) = (raster.width() as u32, raster.height() as u32);
    let samples = interleaved(raster);
    let img = match raster.bands() {
        3 => RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8),
        4 => RgbaImage::from_raw(width, height, samples).map(DynamicImage::ImageRgba8),
        bands => {
            return Err(unsupported(
                path,
                format!("{bands} bands; PNG output supports 3 (RGB) or 4 (RGBA)"),
            ));
        }
    };
    let img = img.ok_or_else(|| unsupported(path, "sample count does not match dimensions"))?;
    img.write_to(writer, ImageFormat::Png)?;
    Ok(())
}

/// Run `encode` against a temporary sibling of `path`, then move it into place.
///
/// On any error the temporary file is dropped (and deleted) and `path` is
/// left untouched.
fn write_atomically<F>(path: &Path, encode: F) -> Result<(), RasterError>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<(), RasterError>,
{
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        encode(&mut writer)?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| RasterError::Io(e.error))?;
    Ok(())
}

impl RasterBackend for FileBackend {
    fn read(&self, path: &Path) -> Result<Raster, RasterError> {
        match format_of(path)? {
            RasterFormat::Tiff => read_tiff(path),
            RasterFormat::Png => read_png(path),
        }
    }

    fn write(
        &self,
        path: &Path,
        raster: &Raster,
        options: &WriteOptions,
    ) -> Result<(), RasterError> {
        let format = format_of(path)?;
        write_atomically(path, |writer| match format {
            RasterFormat::Tiff => encode_tiff(writer, path, raster, options),
            RasterFormat::Png => encode_png(writer, path, raster),
        })
    }

    fn write_mask(&self, path: &Path, mask: ArrayView2<'_, u8>) -> Result<(), RasterError> {
        let (height, width) = mask.dim();
        let samples: Vec<u8> = mask.as_standard_layout().iter().copied().collect();
        let img = GrayImage::from_raw(width as u32, height as u32, samples)
            .ok_or_else(|| unsupported(path, "mask sample count does not match dimensions"))?;
        write_atomically(path, |writer| {
            img.write_to(writer, ImageFormat::Png)?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{striped_image, utm_metadata};
    use std::collections::BTreeMap;

    #[test]
    fn supported_extensions_cover_tiff_and_png() {
        let exts = supported_raster_extensions();
        for expected in &["tif", "tiff", "png"] {
            assert!(exts.contains(expected), "expected {expected}");
        }
    }

    #[test]
    fn format_detection_is_case_insensitive() {
        assert_eq!(format_of(Path::new("a.TIF")).unwrap(), RasterFormat::Tiff);
        assert_eq!(format_of(Path::new("a.Tiff")).unwrap(), RasterFormat::Tiff);
        assert_eq!(format_of(Path::new("a.png")).unwrap(), RasterFormat::Png);
        assert!(matches!(
            format_of(Path::new("a.jpg")),
            Err(RasterError::UnsupportedFormat(_))
        ));
        assert!(format_of(Path::new("noext")).is_err());
    }

    #[test]
    fn tiff_keeps_pixels_and_georeferencing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("field.tif");
        let raster = Raster {
            pixels: striped_image(6, 9, 3),
            geo: utm_metadata(),
        };

        let backend = FileBackend::new();
        backend.write(&path, &raster, &WriteOptions::default()).unwrap();
        let loaded = backend.read(&path).unwrap();

        assert_eq!(loaded.pixels, raster.pixels);
        assert_eq!(loaded.geo.epsg(), Some(32612));
        assert_eq!(loaded.geo.pixel_scale, raster.geo.pixel_scale);
        assert_eq!(loaded.geo.tiepoints, raster.geo.tiepoints);
        assert_eq!(loaded.geo.geo_key_directory, raster.geo.geo_key_directory);
        assert_eq!(loaded.geo.nodata.as_deref(), Some("0"));
    }

    #[test]
    fn tiff_rgba_uncompressed() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("alpha.tiff");
        let raster = Raster::new(striped_image(4, 5, 4));
        let options = WriteOptions {
            compress: false,
            metadata: BTreeMap::new(),
        };

        let backend = FileBackend::new();
        backend.write(&path, &raster, &options).unwrap();
        let loaded = backend.read(&path).unwrap();

        assert_eq!(loaded.pixels, raster.pixels);
        assert!(!loaded.geo.is_georeferenced());
    }

    #[test]
    fn tiff_embeds_gdal_metadata() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("meta.tif");
        let mut metadata = BTreeMap::new();
        metadata.insert("transformer_name".to_string(), "soilmask".to_string());
        let options = WriteOptions {
            compress: true,
            metadata,
        };

        FileBackend::new()
            .write(&path, &Raster::new(striped_image(2, 2, 3)), &options)
            .unwrap();

        let mut decoder = Decoder::new(BufReader::new(File::open(&path).unwrap())).unwrap();
        let xml = decoder
            .find_tag(Tag::from_u16_exhaustive(geo::GDAL_METADATA))
            .unwrap()
            .unwrap()
            .into_string()
            .unwrap();
        assert!(xml.contains("<Item name=\"transformer_name\">soilmask</Item>"));
    }

    #[test]
    fn png_roundtrip_rgb() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("plot.png");
        let raster = Raster::new(striped_image(3, 7, 3));

        let backend = FileBackend::new();
        backend.write(&path, &raster, &WriteOptions::default()).unwrap();

        assert_eq!(backend.read(&path).unwrap(), raster);
    }

    #[test]
    fn unsupported_band_count_leaves_no_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("five.tif");
        let raster = Raster::new(striped_image(2, 2, 5));

        let result = FileBackend::new().write(&path, &raster, &WriteOptions::default());

        assert!(matches!(result, Err(RasterError::UnsupportedLayout { .. })));
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn write_mask_as_grayscale_png() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("mask.png");
        let mask = ndarray::arr2(&[[255u8, 0, 255], [0, 0, 255]]);

        FileBackend::new().write_mask(&path, mask.view()).unwrap();

        let img = image::open(&path).unwrap().to_luma8();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.into_raw(), vec![255, 0, 255, 0, 0, 255]);
    }

    #[test]
    fn tiff_read_assembles_many_strips() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("strips.tif");
        let pixels = striped_image(10, 7, 3);
        let samples: Vec<u8> = pixels.iter().copied().collect();
        {
            let mut encoder = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
            let mut image = encoder.new_image::<colortype::RGB8>(7, 10).unwrap();
            // 3 + 3 + 3 + 1 rows, so the last strip is short
            image.rows_per_strip(3).unwrap();
            image.write_data(&samples).unwrap();
        }

        let mut decoder = Decoder::new(BufReader::new(File::open(&path).unwrap())).unwrap();
        assert_eq!(decoder.chunk_dimensions(), (7, 3));
        assert_eq!(decoder.dimensions().unwrap(), (7, 10));

        let loaded = FileBackend::new().read(&path).unwrap();
        assert_eq!(loaded.pixels, pixels);
    }

    /// Little-endian, uncompressed 1×1 TIFF declaring RGB with 5 samples.
    fn five_sample_tiff() -> Vec<u8> {
        const SHORT: u16 = 3;
        const LONG: u16 = 4;
        let entries: [(u16, u16, u32, u32); 10] = [
            (256, SHORT, 1, 1),   // ImageWidth
            (257, SHORT, 1, 1),   // ImageLength
            (258, SHORT, 5, 134), // BitsPerSample, stored after the IFD
            (259, SHORT, 1, 1),   // Compression: none
            (262, SHORT, 1, 2),   // PhotometricInterpretation: RGB
            (273, LONG, 1, 144),  // StripOffsets
            (277, SHORT, 1, 5),   // SamplesPerPixel
            (278, SHORT, 1, 1),   // RowsPerStrip
            (279, LONG, 1, 5),    // StripByteCounts
            (284, SHORT, 1, 1),   // PlanarConfiguration: chunky
        ];
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"II");
        bytes.extend_from_slice(&42u16.to_le_bytes());
        bytes.extend_from_slice(&8u32.to_le_bytes());
        bytes.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        for (tag, kind, count, value) in entries {
            bytes.extend_from_slice(&tag.to_le_bytes());
            bytes.extend_from_slice(&kind.to_le_bytes());
            bytes.extend_from_slice(&count.to_le_bytes());
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(bytes.len(), 134);
        for _ in 0..5 {
            bytes.extend_from_slice(&8u16.to_le_bytes());
        }
        bytes.extend_from_slice(&[10, 20, 30, 40, 50]);
        bytes
    }

    #[test]
    fn five_band_tiff_read_is_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("five.tif");
        std::fs::write(&path, five_sample_tiff()).unwrap();

        let result = FileBackend::new().read(&path);

        assert!(matches!(
            result,
            Err(RasterError::Tiff(_) | RasterError::UnsupportedLayout { .. })
        ));
    }

    #[test]
    fn read_nonexistent_file_errors() {
        let result = FileBackend::new().read(Path::new("/nonexistent/field.tif"));
        assert!(matches!(result, Err(RasterError::Io(_))));
    }

    #[test]
    fn read_unsupported_extension_errors() {
        let result = FileBackend::new().read(Path::new("/data/field.jpg"));
        assert!(matches!(result, Err(RasterError::UnsupportedFormat(_))));
    }
}
