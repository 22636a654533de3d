//! Client for the USGS National Map products catalog (TNM Access API).
//!
//! Every query is pinned to one dataset and one product format, and filtered
//! either by a bounding box or by a free-text name token:
//!
//! `https://tnmaccess.nationalmap.gov/api/v1/products?datasets=...&prodFormats=GeoTIFF&bbox=minX,minY,maxX,maxY`
//!
//! The client performs exactly one HTTP request per call. Retries and paging
//! are left to the caller.

use crate::cache::validate_key;
use crate::config::AccessorConfig;
use crate::geometry::{BoundingBox, Points};
use crate::{ElevationError, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::time::Duration;

/// Default TNM Access products endpoint.
pub const NATIONAL_MAP_ENDPOINT: &str = "https://tnmaccess.nationalmap.gov/api/v1/products";

/// What a catalog query is filtered by.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFilter {
    /// Items intersecting a geographic box.
    BoundingBox(BoundingBox),
    /// Items matching a free-text token, e.g. `n48w123`.
    Name(String),
}

/// A single catalog request: endpoint plus query parameters.
#[derive(Debug, Clone)]
pub struct CatalogQuery {
    endpoint: String,
    params: BTreeMap<String, String>,
}

impl CatalogQuery {
    /// Create a query constrained to one dataset and product format.
    pub fn new(endpoint: &str, dataset: &str, format: &str) -> Self {
        let mut query = Self {
            endpoint: endpoint.to_string(),
            params: BTreeMap::new(),
        };
        query.set_param("datasets", dataset);
        query.set_param("prodFormats", format);
        query
    }

    /// Create a query and apply `filter` to it.
    pub fn with_filter(endpoint: &str, dataset: &str, format: &str, filter: &QueryFilter) -> Self {
        let mut query = Self::new(endpoint, dataset, format);
        match filter {
            QueryFilter::BoundingBox(bbox) => query.set_param("bbox", &bbox.bbox_param()),
            QueryFilter::Name(name) => query.set_param("q", name),
        }
        query
    }

    /// Set or replace a query parameter.
    pub fn set_param(&mut self, key: &str, value: &str) {
        self.params.insert(key.to_string(), value.to_string());
    }

    /// Drop a query parameter if present.
    pub fn remove_param(&mut self, key: &str) {
        self.params.remove(key);
    }

    /// Current value of a query parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Full request URL with encoded parameters.
    pub fn url(&self) -> Result<Url> {
        Url::parse_with_params(&self.endpoint, &self.params)
            .map_err(|e| ElevationError::Config(format!("invalid catalog endpoint {:?}: {}", self.endpoint, e)))
    }
}

/// Decoded catalog response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Number of items matching the query.
    #[serde(default)]
    pub total: usize,
    /// Returned items.
    #[serde(default)]
    pub items: Vec<CatalogItem>,
    /// Errors reported by the service.
    #[serde(default)]
    pub errors: Vec<serde_json::Value>,
    /// Informational messages.
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,
    /// Items excluded by service-side filtering.
    #[serde(default)]
    pub filtered_out: usize,
}

impl QueryResult {
    /// Find the item whose cache key equals `key`.
    ///
    /// Items with an unusable download URL are skipped.
    pub fn find_by_key(&self, key: &str) -> Option<&CatalogItem> {
        self.items
            .iter()
            .find(|item| item.cache_key().map_or(false, |k| k == key))
    }

    fn error_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| match e {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }
}

/// One raster product listed by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub title: String,
    #[serde(rename = "downloadURL")]
    pub download_url: String,
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub size_in_bytes: u64,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub publication_date: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub meta_url: Option<String>,
    #[serde(default)]
    pub datasets: Vec<String>,
}

impl CatalogItem {
    /// Cache key for the item's local copy.
    pub fn cache_key(&self) -> Result<String> {
        cache_key(&self.download_url)
    }

    /// True if any of `points` lies within the item's bounding box.
    pub fn intersects(&self, points: &Points) -> bool {
        points.is_intersecting(&self.bounding_box)
    }
}

/// Derive the cache key from a download URL.
///
/// The key is the last `/`-separated segment, query-unescaped. The same tile
/// always maps to the same key, whichever query discovered it. Keys the cache
/// would refuse or hide (empty, leading `.`, path separators) are rejected.
pub fn cache_key(download_url: &str) -> Result<String> {
    let segment = download_url
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .replace('+', " ");
    let key = urlencoding::decode(&segment)
        .map_err(|_| ElevationError::InvalidCacheKey(download_url.to_string()))?
        .into_owned();

    validate_key(&key).map_err(|_| ElevationError::InvalidCacheKey(download_url.to_string()))?;
    Ok(key)
}

/// Source of catalog listings and tile content.
pub trait CatalogClient: Sync {
    /// Run one catalog query.
    fn query(&self, filter: &QueryFilter) -> Result<QueryResult>;

    /// Stream an item's content into `sink`, returning the bytes written.
    fn download(&self, item: &CatalogItem, sink: &mut dyn Write) -> Result<u64>;
}

/// HTTP client for the National Map catalog.
#[derive(Debug, Clone)]
pub struct NationalMapClient {
    endpoint: String,
    dataset: String,
    format: String,
    http: reqwest::blocking::Client,
}

impl NationalMapClient {
    /// Build a client from accessor configuration.
    pub fn new(config: &AccessorConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            dataset: config.dataset.clone(),
            format: config.format.clone(),
            http,
        })
    }

    /// Build the request for `filter` without sending it.
    pub fn build_query(&self, filter: &QueryFilter) -> CatalogQuery {
        CatalogQuery::with_filter(&self.endpoint, &self.dataset, &self.format, filter)
    }
}

impl CatalogClient for NationalMapClient {
    fn query(&self, filter: &QueryFilter) -> Result<QueryResult> {
        let url = self.build_query(filter).url()?;
        tracing::debug!(%url, "Querying catalog");

        let response = self.http.get(url.clone()).send()?;
        if !response.status().is_success() {
            return Err(ElevationError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes()?;
        let result: QueryResult = serde_json::from_slice(&body)?;

        if !result.errors.is_empty() {
            return Err(ElevationError::CatalogRejected(result.error_messages()));
        }

        tracing::debug!(total = result.total, items = result.items.len(), "Catalog answered");
        Ok(result)
    }

    fn download(&self, item: &CatalogItem, sink: &mut dyn Write) -> Result<u64> {
        let mut response = self.http.get(&item.download_url).send()?;
        if !response.status().is_success() {
            return Err(ElevationError::HttpStatus {
                url: item.download_url.clone(),
                status: response.status().as_u16(),
            });
        }

        Ok(response.copy_to(sink)?)
    }
}
