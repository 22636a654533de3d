//! # seahorse-elevation
//!
//! Ground elevation for point records, sampled from USGS 3DEP GeoTIFF tiles
//! published through The National Map.
//!
//! ## Overview
//!
//! Given a batch of points (longitude `x`, latitude `y`), the
//! [`ElevationAccessor`]:
//!
//! - asks the National Map products API which tiles cover the points'
//!   bounding box,
//! - downloads the missing 1/3 arc-second tiles into a local cache directory,
//!   a few at a time,
//! - samples each cached tile at the points inside its footprint.
//!
//! Tiles are named like `USGS_13_n48w123_20240327.tif`, where `n48w123` is the
//! 1x1 degree cell with its north-west corner at 48°N, 123°W. The cache keeps
//! the file name from the download URL, so the same cell is only fetched once
//! across runs.
//!
//! ## Example
//!
//! ```no_run
//! use seahorse_elevation::{AccessorConfig, ElevationAccessor, Point, Points};
//!
//! let mut points: Points = vec![
//!     Point::new(1, -122.3321, 47.6062),
//!     Point::new(2, -122.1215, 47.6740),
//! ]
//! .into();
//!
//! let config = AccessorConfig::default();
//! let mut accessor = ElevationAccessor::connect(&config, &points)?;
//! let summary = accessor.get_elevation(&mut points)?;
//!
//! for point in points.iter() {
//!     println!("{}: {:?}", point.id, point.elevation);
//! }
//! println!("{} tiles downloaded", summary.tiles_downloaded);
//! # Ok::<(), seahorse_elevation::ElevationError>(())
//! ```

mod accessor;
mod cache;
mod catalog;
mod config;
mod error;
mod geometry;
mod tile;

pub use accessor::{DownloadStats, ElevationAccessor, ElevationSummary};
pub use cache::{CacheEntry, TileCache};
pub use catalog::{
    cache_key, CatalogClient, CatalogItem, CatalogQuery, NationalMapClient, QueryFilter,
    QueryResult, NATIONAL_MAP_ENDPOINT,
};
pub use config::{
    AccessorConfig, DEFAULT_CACHE_DIR, DEFAULT_DATASET, DEFAULT_DOWNLOAD_CONCURRENCY,
    DEFAULT_FORMAT, DEFAULT_RESOLUTION_TAG, DEFAULT_TIMEOUT_SECS,
};
pub use error::ElevationError;
pub use geometry::{BoundingBox, Point, Points};
pub use tile::{GeoTransform, RasterTile};

/// Result type for elevation operations.
pub type Result<T> = std::result::Result<T, ElevationError>;
