//! Error types for the elevation crate.

use thiserror::Error;

/// Errors that can occur while resolving elevations.
#[derive(Debug, Error)]
pub enum ElevationError {
    /// I/O error reading or writing the tile cache.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding error.
    #[error("TIFF decode error: {0}")]
    TiffDecode(#[from] tiff::TiffError),

    /// Invalid GeoTIFF - missing or malformed georeferencing.
    #[error("Invalid GeoTIFF: {0}")]
    InvalidGeoTiff(String),

    /// Raster layout this crate does not sample (multi-band, planar, ...).
    #[error("Unsupported raster: {0}")]
    UnsupportedRaster(String),

    /// Point maps outside the pixel extent of the raster.
    ///
    /// Points are filtered by the catalog bounding box before sampling, so this
    /// means the catalog metadata and the raster extent disagree.
    #[error(
        "Point ({x}, {y}) maps to pixel (row {row:.2}, col {col:.2}) outside raster extent {width}x{height}"
    )]
    PixelOutOfBounds {
        /// Point x coordinate.
        x: f64,
        /// Point y coordinate.
        y: f64,
        /// Fractional row index.
        row: f64,
        /// Fractional column index.
        col: f64,
        /// Raster width in pixels.
        width: u32,
        /// Raster height in pixels.
        height: u32,
    },

    /// HTTP request error when querying the catalog or fetching tiles.
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Remote server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// Requested URL.
        url: String,
        /// Status code returned.
        status: u16,
    },

    /// Catalog response could not be decoded.
    #[error("Catalog response decode error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catalog answered but reported errors instead of results.
    #[error("Catalog rejected query: {}", .0.join("; "))]
    CatalogRejected(Vec<String>),

    /// A download URL does not yield a usable cache key.
    #[error("Invalid cache key derived from {0:?}")]
    InvalidCacheKey(String),

    /// A cached tile has no matching catalog item, even after a name lookup.
    ///
    /// The cache and catalog disagree; remove the file to recover.
    #[error("No catalog item found for cached tile {key}")]
    MissingProvenance {
        /// Cache key (file name) of the orphaned tile.
        key: String,
    },

    /// Download worker pool could not be created.
    #[error("Failed to build download pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// Invalid accessor configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Failure while downloading a tile into the cache.
    #[error("Acquisition of tile {key} failed: {source}")]
    Acquisition {
        /// Cache key of the tile being fetched.
        key: String,
        /// Underlying error.
        source: Box<ElevationError>,
    },

    /// Failure while matching a cached tile to catalog metadata.
    #[error("Resolution of cached tile {key} failed: {source}")]
    Resolution {
        /// Cache key of the tile being resolved.
        key: String,
        /// Underlying error.
        source: Box<ElevationError>,
    },

    /// Failure while sampling a point from a tile.
    #[error("Sampling tile {key} failed{}: {source}", point_suffix(.point_id))]
    Sampling {
        /// Cache key of the tile being sampled.
        key: String,
        /// Point being sampled, if the failure is point specific.
        point_id: Option<i64>,
        /// Underlying error.
        source: Box<ElevationError>,
    },
}

fn point_suffix(point_id: &Option<i64>) -> String {
    match point_id {
        Some(id) => format!(" at point {}", id),
        None => String::new(),
    }
}

impl ElevationError {
    pub(crate) fn acquisition(key: &str, source: ElevationError) -> Self {
        ElevationError::Acquisition {
            key: key.to_string(),
            source: Box::new(source),
        }
    }

    pub(crate) fn resolution(key: &str, source: ElevationError) -> Self {
        ElevationError::Resolution {
            key: key.to_string(),
            source: Box::new(source),
        }
    }

    pub(crate) fn sampling(key: &str, point_id: Option<i64>, source: ElevationError) -> Self {
        ElevationError::Sampling {
            key: key.to_string(),
            point_id,
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_messages_name_tile_and_point() {
        let err = ElevationError::sampling(
            "USGS_13_n48w123.tif",
            Some(42),
            ElevationError::InvalidGeoTiff("zero pixel size".to_string()),
        );
        let msg = err.to_string();
        assert!(msg.contains("USGS_13_n48w123.tif"), "{}", msg);
        assert!(msg.contains("point 42"), "{}", msg);

        let err = ElevationError::resolution(
            "orphan.tif",
            ElevationError::MissingProvenance {
                key: "orphan.tif".to_string(),
            },
        );
        assert!(err.to_string().starts_with("Resolution of cached tile orphan.tif"));
    }

    #[test]
    fn test_catalog_rejected_joins_messages() {
        let err = ElevationError::CatalogRejected(vec!["bad bbox".into(), "bad dataset".into()]);
        assert_eq!(err.to_string(), "Catalog rejected query: bad bbox; bad dataset");
    }
}
