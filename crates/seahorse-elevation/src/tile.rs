//! Single-band GeoTIFF elevation tile.

use crate::geometry::{BoundingBox, Point};
use crate::{ElevationError, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::ColorType;

/// Slack accepted at the grid edges, relative to the grid size.
const EDGE_TOLERANCE: f64 = 1e-9;

/// Affine map from pixel (column, row) to geographic (x, y).
///
/// Coefficients follow the GDAL ordering:
/// `x = c[0] + col * c[1] + row * c[2]`, `y = c[3] + col * c[4] + row * c[5]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    /// North-up transform with its origin at the top-left corner of `bbox`.
    pub fn from_bounds(bbox: &BoundingBox, width: u32, height: u32) -> Self {
        GeoTransform([
            bbox.min_x,
            bbox.width() / width as f64,
            0.0,
            bbox.max_y,
            0.0,
            -bbox.height() / height as f64,
        ])
    }

    /// Pixel (col, row) to geographic (x, y).
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let c = &self.0;
        (
            c[0] + col * c[1] + row * c[2],
            c[3] + col * c[4] + row * c[5],
        )
    }

    /// The inverse map, geographic (x, y) to fractional pixel (col, row).
    pub fn invert(&self) -> Result<GeoTransform> {
        let c = &self.0;
        let det = c[1] * c[5] - c[2] * c[4];
        if det == 0.0 || !det.is_finite() {
            return Err(ElevationError::InvalidGeoTiff(format!(
                "geotransform {:?} is not invertible",
                self.0
            )));
        }

        let a = c[5] / det;
        let b = -c[2] / det;
        let d = -c[4] / det;
        let e = c[1] / det;
        Ok(GeoTransform([
            -(a * c[0] + b * c[3]),
            a,
            b,
            -(d * c[0] + e * c[3]),
            d,
            e,
        ]))
    }

    /// Pixel width and height in geographic units (height is negative for north-up).
    pub fn pixel_size(&self) -> (f64, f64) {
        (self.0[1], self.0[5])
    }
}

/// An open elevation raster.
///
/// The underlying file stays open for the lifetime of the value and is closed
/// when it is dropped. Pixels are read one strip or tile at a time; the most
/// recently decoded chunk is kept, so neighbouring points don't decode twice.
pub struct RasterTile {
    path: PathBuf,
    decoder: Decoder<BufReader<File>>,
    width: u32,
    height: u32,
    geo_transform: Option<GeoTransform>,
    no_data_value: Option<f32>,
    chunk: Option<(u32, Vec<f32>)>,
}

impl std::fmt::Debug for RasterTile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterTile")
            .field("path", &self.path)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("geo_transform", &self.geo_transform)
            .field("no_data_value", &self.no_data_value)
            .finish()
    }
}

impl RasterTile {
    /// Open a GeoTIFF read-only.
    ///
    /// Fails unless the raster has exactly one band.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut decoder = Decoder::new(BufReader::new(file))?;

        // 1/3 arc-second tiles are 10812 x 10812; a single strip or tile is far
        // smaller, but some producers write one strip per image.
        let mut limits = Limits::default();
        limits.decoding_buffer_size = 1024 * 1024 * 1024; // 1 GB
        limits.intermediate_buffer_size = 1024 * 1024 * 1024; // 1 GB
        limits.ifd_value_size = 1024 * 1024 * 1024;
        decoder = decoder.with_limits(limits);

        match decoder.colortype()? {
            ColorType::Gray(_) => {}
            other => {
                return Err(ElevationError::UnsupportedRaster(format!(
                    "{}: expected a single band, found {:?}",
                    path.display(),
                    other
                )))
            }
        }

        let (width, height) = decoder.dimensions()?;
        let geo_transform = Self::read_geotransform(&mut decoder)?;
        let no_data_value = Self::read_nodata_value(&mut decoder);

        Ok(Self {
            path: path.to_path_buf(),
            decoder,
            width,
            height,
            geo_transform,
            no_data_value,
            chunk: None,
        })
    }

    /// Read the geotransform from GeoTIFF tags, if present.
    fn read_geotransform<R: std::io::Read + std::io::Seek>(
        decoder: &mut Decoder<R>,
    ) -> Result<Option<GeoTransform>> {
        // A full 4x4 model transformation takes precedence
        if let Ok(m) = decoder.get_tag_f64_vec(Tag::ModelTransformationTag) {
            if m.len() >= 16 {
                return Ok(Some(GeoTransform([m[3], m[0], m[1], m[7], m[4], m[5]])));
            }
            return Err(ElevationError::InvalidGeoTiff(format!(
                "ModelTransformationTag has {} values, expected 16",
                m.len()
            )));
        }

        let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag);
        let pixel_scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag);

        match (tiepoint, pixel_scale) {
            (Ok(tiepoint), Ok(scale)) => {
                if tiepoint.len() < 6 || scale.len() < 2 {
                    return Err(ElevationError::InvalidGeoTiff(format!(
                        "tiepoint/pixel scale too short ({} / {} values)",
                        tiepoint.len(),
                        scale.len()
                    )));
                }
                // Tiepoint format: [i, j, k, x, y, z], pixel (i, j) sits at (x, y)
                let (i, j) = (tiepoint[0], tiepoint[1]);
                let (x, y) = (tiepoint[3], tiepoint[4]);
                let (scale_x, scale_y) = (scale[0], scale[1]);

                Ok(Some(GeoTransform([
                    x - i * scale_x,
                    scale_x,
                    0.0,
                    y + j * scale_y,
                    0.0,
                    -scale_y,
                ])))
            }
            _ => Ok(None),
        }
    }

    /// Try to read the no-data value from the GDAL_NODATA tag.
    fn read_nodata_value<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<f32> {
        decoder
            .get_tag_ascii_string(Tag::GdalNodata)
            .ok()
            .and_then(|s| s.trim_matches(|c: char| c == '\0' || c.is_whitespace()).parse().ok())
    }

    /// Get the dimensions of this tile in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Geotransform stored in the file, if any.
    pub fn geo_transform(&self) -> Option<GeoTransform> {
        self.geo_transform
    }

    /// No-data value from the `GDAL_NODATA` tag, if the file has one.
    pub fn no_data_value(&self) -> Option<f32> {
        self.no_data_value
    }


    /// Elevation at `point`.
    ///
    /// The point is mapped to a pixel through the inverse geotransform. When
    /// the file carries no georeferencing, the transform is derived from
    /// `bbox` (the catalog's extent for this tile). Geographic containment is
    /// not checked here; a point mapping outside the pixel grid is an error.
    ///
    /// Returns `Ok(None)` when the pixel holds the no-data value or NaN.
    pub fn sample(&mut self, bbox: &BoundingBox, point: &Point) -> Result<Option<f32>> {
        let transform = match self.geo_transform {
            Some(t) => t,
            None => GeoTransform::from_bounds(bbox, self.width, self.height),
        };
        let (col, row) = transform.invert()?.apply(point.x, point.y);
        let (col_idx, row_idx) = self.pixel_index(point, col, row)?;

        let value = self.read_pixel(col_idx, row_idx)?;
        if value.is_nan() {
            return Ok(None);
        }
        if let Some(nodata) = self.no_data_value {
            if (value - nodata).abs() < 0.001 {
                return Ok(None);
            }
        }
        Ok(Some(value))
    }

    /// Truncate a fractional pixel position to indices inside the grid.
    ///
    /// The far right and bottom edges belong to the last column and row, so
    /// a point on the tile's closed boundary still samples. Positions within
    /// rounding error of an edge are snapped onto it.
    fn pixel_index(&self, point: &Point, col: f64, row: f64) -> Result<(u32, u32)> {
        let width = self.width as f64;
        let height = self.height as f64;
        let col = snap_to_edges(col, width);
        let row = snap_to_edges(row, height);

        if !(0.0..=width).contains(&col) || !(0.0..=height).contains(&row) {
            return Err(ElevationError::PixelOutOfBounds {
                x: point.x,
                y: point.y,
                row,
                col,
                width: self.width,
                height: self.height,
            });
        }

        let col_idx = (col.trunc() as u32).min(self.width - 1);
        let row_idx = (row.trunc() as u32).min(self.height - 1);
        Ok((col_idx, row_idx))
    }

    /// Read one pixel, decoding the strip or tile that holds it.
    fn read_pixel(&mut self, col: u32, row: u32) -> Result<f32> {
        let (chunk_width, chunk_height) = self.decoder.chunk_dimensions();
        let chunks_across = self.width.div_ceil(chunk_width);
        let chunk_index = (row / chunk_height) * chunks_across + col / chunk_width;
        let (data_width, _) = self.decoder.chunk_data_dimensions(chunk_index);
        let offset = ((row % chunk_height) * data_width + col % chunk_width) as usize;

        if !matches!(self.chunk, Some((index, _)) if index == chunk_index) {
            let data = decode_samples(self.decoder.read_chunk(chunk_index)?);
            self.chunk = Some((chunk_index, data));
        }

        let data = self
            .chunk
            .as_ref()
            .map(|(_, data)| data.as_slice())
            .unwrap_or_default();

        data.get(offset).copied().ok_or_else(|| {
            ElevationError::InvalidGeoTiff(format!(
                "{}: chunk {} shorter than expected",
                self.path.display(),
                chunk_index
            ))
        })
    }
}

/// Pull `pos` onto 0 or `extent` when it misses by floating-point noise.
fn snap_to_edges(pos: f64, extent: f64) -> f64 {
    let tolerance = EDGE_TOLERANCE * extent.max(1.0);
    if (pos - extent).abs() <= tolerance {
        extent
    } else if pos.abs() <= tolerance {
        0.0
    } else {
        pos
    }
}

/// Convert decoded samples of any numeric type to f32.
fn decode_samples(result: DecodingResult) -> Vec<f32> {
    match result {
        DecodingResult::F32(data) => data,
        DecodingResult::F64(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I16(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I32(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U16(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U32(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U8(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I8(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U64(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I64(data) => data.into_iter().map(|v| v as f32).collect(),
    }
}
