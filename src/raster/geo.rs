//! GeoTIFF georeferencing carried from input to output.
//!
//! The masked raster must land on exactly the same ground footprint as its
//! source, so every georeferencing tag is read verbatim and written back
//! unchanged. Only enough of the GeoKey directory is interpreted to report
//! the EPSG code and the image bounds.
//!
//! | Tag | Code | Type |
//! |---|---|---|
//! | ModelPixelScale | 33550 | `f64 × 3` |
//! | ModelTiepoint | 33922 | `f64 × 6n` |
//! | ModelTransformation | 34264 | `f64 × 16` |
//! | GeoKeyDirectory | 34735 | `u16 × (4 + 4k)` |
//! | GeoDoubleParams | 34736 | `f64` |
//! | GeoAsciiParams | 34737 | ASCII |
//! | GDAL_METADATA | 42112 | ASCII (XML), written only |
//! | GDAL_NODATA | 42113 | ASCII |

use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{Read, Seek, Write};
use tiff::decoder::Decoder;
use tiff::encoder::DirectoryEncoder;
use tiff::encoder::TiffKind;
use tiff::tags::Tag;
use tiff::TiffResult;

pub(crate) const MODEL_PIXEL_SCALE: u16 = 33550;
pub(crate) const MODEL_TIEPOINT: u16 = 33922;
pub(crate) const MODEL_TRANSFORMATION: u16 = 34264;
pub(crate) const GEO_KEY_DIRECTORY: u16 = 34735;
pub(crate) const GEO_DOUBLE_PARAMS: u16 = 34736;
pub(crate) const GEO_ASCII_PARAMS: u16 = 34737;
pub(crate) const GDAL_METADATA: u16 = 42112;
pub(crate) const GDAL_NODATA: u16 = 42113;

const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;
const USER_DEFINED: u16 = 32767;

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Georeferencing tags of a raster. Empty for plain images.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoMetadata {
    pub pixel_scale: Option<Vec<f64>>,
    pub tiepoints: Option<Vec<f64>>,
    pub transformation: Option<Vec<f64>>,
    pub geo_key_directory: Option<Vec<u16>>,
    pub geo_double_params: Option<Vec<f64>>,
    pub geo_ascii_params: Option<String>,
    /// Per-dataset NoData value as GDAL writes it (e.g. `"0"`).
    pub nodata: Option<String>,
}

/// Ground extent of a georeferenced raster, in CRS units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl GeoMetadata {
    /// True when the raster declares a coordinate reference system.
    pub fn is_georeferenced(&self) -> bool {
        self.geo_key_directory.is_some()
    }

    pub fn has_bounds(&self) -> bool {
        self.bounds(1, 1).is_some()
    }

    /// EPSG code from the projected CRS key, falling back to the geographic one.
    pub fn epsg(&self) -> Option<u16> {
        let dir = self.geo_key_directory.as_deref()?;
        let key_value = |wanted: u16| {
            dir.get(4..)?
                .chunks_exact(4)
                .find(|entry| entry[0] == wanted && entry[1] == 0)
                .map(|entry| entry[3])
                .filter(|&code| code != 0 && code != USER_DEFINED)
        };
        key_value(PROJECTED_CS_TYPE_KEY).or_else(|| key_value(GEOGRAPHIC_TYPE_KEY))
    }

    /// Bounds of a `width × height` raster.
    ///
    /// Uses the first tiepoint with the pixel scale, or the affine
    /// transformation matrix when no tiepoint/scale pair is present.
    pub fn bounds(&self, width: usize, height: usize) -> Option<GeoBounds> {
        let (w, h) = (width as f64, height as f64);
        let placement = self
            .tiepoints
            .as_deref()
            .zip(self.pixel_scale.as_deref())
            .filter(|(tie, scale)| tie.len() >= 6 && scale.len() >= 2);
        if let Some((tie, scale)) = placement {
            let min_x = tie[3] - tie[0] * scale[0];
            let max_y = tie[4] + tie[1] * scale[1];
            return Some(GeoBounds {
                min_x,
                min_y: max_y - h * scale[1],
                max_x: min_x + w * scale[0],
                max_y,
            });
        }

        let m = self.transformation.as_deref().filter(|m| m.len() >= 16)?;
        let project = |i: f64, j: f64| (m[0] * i + m[1] * j + m[3], m[4] * i + m[5] * j + m[7]);
        let corners = [project(0.0, 0.0), project(w, 0.0), project(0.0, h), project(w, h)];
        let fold = |pick: fn(&(f64, f64)) -> f64, init: f64, f: fn(f64, f64) -> f64| {
            corners.iter().map(pick).fold(init, f)
        };
        Some(GeoBounds {
            min_x: fold(|c| c.0, f64::INFINITY, f64::min),
            min_y: fold(|c| c.1, f64::INFINITY, f64::min),
            max_x: fold(|c| c.0, f64::NEG_INFINITY, f64::max),
            max_y: fold(|c| c.1, f64::NEG_INFINITY, f64::max),
        })
    }

    /// Read every georeferencing tag present in the current TIFF directory.
    pub(crate) fn read_from<R: Read + Seek>(decoder: &mut Decoder<R>) -> TiffResult<Self> {
        let f64_tag = |d: &mut Decoder<R>, code: u16| -> TiffResult<Option<Vec<f64>>> {
            d.find_tag(tag(code))?.map(|v| v.into_f64_vec()).transpose()
        };
        let ascii_tag = |d: &mut Decoder<R>, code: u16| -> TiffResult<Option<String>> {
            d.find_tag(tag(code))?.map(|v| v.into_string()).transpose()
        };

        Ok(Self {
            pixel_scale: f64_tag(decoder, MODEL_PIXEL_SCALE)?,
            tiepoints: f64_tag(decoder, MODEL_TIEPOINT)?,
            transformation: f64_tag(decoder, MODEL_TRANSFORMATION)?,
            geo_key_directory: decoder
                .find_tag(tag(GEO_KEY_DIRECTORY))?
                .map(|v| v.into_u16_vec())
                .transpose()?,
            geo_double_params: f64_tag(decoder, GEO_DOUBLE_PARAMS)?,
            geo_ascii_params: ascii_tag(decoder, GEO_ASCII_PARAMS)?,
            nodata: ascii_tag(decoder, GDAL_NODATA)?,
        })
    }

    /// Emit the tags into an image directory that is being encoded.
    pub(crate) fn write_to<W: Write + Seek, K: TiffKind>(
        &self,
        dir: &mut DirectoryEncoder<'_, W, K>,
    ) -> TiffResult<()> {
        if let Some(v) = &self.pixel_scale {
            dir.write_tag(tag(MODEL_PIXEL_SCALE), v.as_slice())?;
        }
        if let Some(v) = &self.tiepoints {
            dir.write_tag(tag(MODEL_TIEPOINT), v.as_slice())?;
        }
        if let Some(v) = &self.transformation {
            dir.write_tag(tag(MODEL_TRANSFORMATION), v.as_slice())?;
        }
        if let Some(v) = &self.geo_key_directory {
            dir.write_tag(tag(GEO_KEY_DIRECTORY), v.as_slice())?;
        }
        if let Some(v) = &self.geo_double_params {
            dir.write_tag(tag(GEO_DOUBLE_PARAMS), v.as_slice())?;
        }
        if let Some(v) = &self.geo_ascii_params {
            dir.write_tag(tag(GEO_ASCII_PARAMS), v.as_str())?;
        }
        if let Some(v) = &self.nodata {
            dir.write_tag(tag(GDAL_NODATA), v.as_str())?;
        }
        Ok(())
    }
}

/// Render key/value pairs as a GDAL metadata domain block.
pub(crate) fn gdal_metadata_xml(items: &BTreeMap<String, String>) -> String {
    let mut xml = String::from("<GDALMetadata>\n");
    for (name, value) in items {
        xml.push_str(&format!(
            "  <Item name=\"{}\">{}</Item>\n",
            escape_xml(name),
            escape_xml(value)
        ));
    }
    xml.push_str("</GDALMetadata>");
    xml
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
