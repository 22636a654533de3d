//! Accessor configuration, loadable from YAML.

use crate::catalog::NATIONAL_MAP_ENDPOINT;
use crate::{ElevationError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Catalog dataset holding the elevation product.
pub const DEFAULT_DATASET: &str = "National Elevation Dataset (NED) 1/3 arc-second";

/// Product format requested from the catalog.
pub const DEFAULT_FORMAT: &str = "GeoTIFF";

/// Title fragment selecting the 1/3 arc-second (~10 m) tiles.
pub const DEFAULT_RESOLUTION_TAG: &str = "USGS 13 arc-second";

/// Default local cache directory.
pub const DEFAULT_CACHE_DIR: &str = "dem_cache";

/// Default request timeout. 1/3 arc-second tiles are several hundred MB.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Default number of concurrent tile downloads.
pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 4;

/// Settings for [`crate::ElevationAccessor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessorConfig {
    /// Catalog products endpoint.
    pub endpoint: String,
    /// Catalog dataset name every query is pinned to.
    pub dataset: String,
    /// Product format every query is pinned to.
    pub format: String,
    /// Only items whose title contains this are downloaded.
    pub resolution_tag: String,
    /// Directory holding downloaded tiles.
    pub cache_dir: PathBuf,
    /// Timeout for each catalog request and download.
    pub timeout_secs: u64,
    /// Upper bound on parallel downloads.
    pub download_concurrency: usize,
}

impl Default for AccessorConfig {
    fn default() -> Self {
        Self {
            endpoint: NATIONAL_MAP_ENDPOINT.to_string(),
            dataset: DEFAULT_DATASET.to_string(),
            format: DEFAULT_FORMAT.to_string(),
            resolution_tag: DEFAULT_RESOLUTION_TAG.to_string(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            download_concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
        }
    }
}

impl AccessorConfig {
    /// Parse a YAML document. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: AccessorConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Check that every setting is usable.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(ElevationError::Config("endpoint must not be empty".into()));
        }
        if self.dataset.trim().is_empty() {
            return Err(ElevationError::Config("dataset must not be empty".into()));
        }
        if self.resolution_tag.is_empty() {
            return Err(ElevationError::Config("resolution_tag must not be empty".into()));
        }
        if self.timeout_secs == 0 {
            return Err(ElevationError::Config("timeout_secs must be positive".into()));
        }
        if self.download_concurrency == 0 {
            return Err(ElevationError::Config(
                "download_concurrency must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
