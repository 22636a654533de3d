//! Elevation accessor: catalog query, tile cache and sampling in one place.
//!
//! [`ElevationAccessor::get_elevation`] runs three phases in order:
//!
//! 1. **Acquisition** - download every tile of the required resolution that
//!    intersects the points and is not cached yet. Downloads run on a bounded
//!    worker pool and all finish before the next phase starts.
//! 2. **Resolution** - match every cached file back to a catalog item, first
//!    in the current query result, then through a name lookup.
//! 3. **Sampling** - open each tile once and fill in the points inside it that
//!    have no elevation yet.
//!
//! A point covered by two tiles takes its value from whichever tile is sampled
//! first and is never overwritten. Any failure aborts the whole call; tiles
//! already downloaded stay in the cache.

use crate::cache::{CacheEntry, TileCache};
use crate::catalog::{CatalogClient, CatalogItem, NationalMapClient, QueryFilter, QueryResult};
use crate::config::AccessorConfig;
use crate::geometry::Points;
use crate::tile::RasterTile;
use crate::{ElevationError, Result};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Download statistics for the accessor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadStats {
    /// Number of tiles downloaded this session.
    pub tiles_downloaded: usize,
    /// Total bytes downloaded this session.
    pub bytes_downloaded: u64,
}

/// Outcome of one [`ElevationAccessor::get_elevation`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ElevationSummary {
    /// Tiles fetched into the cache by this call.
    pub tiles_downloaded: usize,
    /// Tiles opened for sampling.
    pub tiles_sampled: usize,
    /// Points that received an elevation.
    pub points_sampled: usize,
    /// Points still without elevation afterwards.
    pub points_unresolved: usize,
}

/// Caching front end over a tile catalog.
///
/// Owns the catalog result for the points' bounding box and an index of the
/// local cache. The index is re-read from disk after every download batch
/// and whenever [`refresh_cache_index`](Self::refresh_cache_index) is called.
pub struct ElevationAccessor<C: CatalogClient> {
    client: C,
    resolution_tag: String,
    download_concurrency: usize,
    query_result: QueryResult,
    cache: TileCache,
    cache_index: Vec<CacheEntry>,
    tiles_downloaded: AtomicUsize,
    bytes_downloaded: AtomicU64,
}

impl<C: CatalogClient> std::fmt::Debug for ElevationAccessor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevationAccessor")
            .field("cache_dir", &self.cache.dir())
            .field("resolution_tag", &self.resolution_tag)
            .field("items", &self.query_result.items.len())
            .field("cached", &self.cache_index.len())
            .finish()
    }
}

impl ElevationAccessor<NationalMapClient> {
    /// Create an accessor talking to the National Map over HTTP.
    pub fn connect(config: &AccessorConfig, points: &Points) -> Result<Self> {
        let client = NationalMapClient::new(config)?;
        Self::new(client, config, points)
    }
}

impl<C: CatalogClient> ElevationAccessor<C> {
    /// Query the catalog for the points' bounding box and index the cache.
    ///
    /// An empty point collection has no region to query; the accessor starts
    /// with an empty catalog result.
    pub fn new(client: C, config: &AccessorConfig, points: &Points) -> Result<Self> {
        config.validate()?;

        let query_result = if points.is_empty() {
            QueryResult::default()
        } else {
            let bbox = points.bounding_box();
            info!(bbox = %bbox.bbox_param(), points = points.len(), "Querying catalog");
            client.query(&QueryFilter::BoundingBox(bbox))?
        };

        let cache = TileCache::open(&config.cache_dir)?;
        let cache_index = cache.list()?;
        debug!(
            items = query_result.items.len(),
            cached = cache_index.len(),
            "Accessor ready"
        );

        Ok(Self {
            client,
            resolution_tag: config.resolution_tag.clone(),
            download_concurrency: config.download_concurrency,
            query_result,
            cache,
            cache_index,
            tiles_downloaded: AtomicUsize::new(0),
            bytes_downloaded: AtomicU64::new(0),
        })
    }

    /// Catalog result of the initial bounding-box query.
    pub fn query_result(&self) -> &QueryResult {
        &self.query_result
    }

    /// Current cache index.
    pub fn cache_index(&self) -> &[CacheEntry] {
        &self.cache_index
    }

    /// Re-read the cache index from disk.
    pub fn refresh_cache_index(&mut self) -> Result<()> {
        self.cache_index = self.cache.list()?;
        Ok(())
    }

    /// Get download statistics for this session.
    pub fn download_stats(&self) -> DownloadStats {
        DownloadStats {
            tiles_downloaded: self.tiles_downloaded.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
        }
    }

    /// Fill in the elevation of every point covered by a tile.
    ///
    /// Points that already have an elevation are left alone, as are points no
    /// tile covers.
    pub fn get_elevation(&mut self, points: &mut Points) -> Result<ElevationSummary> {
        let tiles_downloaded = self.acquire(points)?;
        let resolved = self.resolve()?;
        let (tiles_sampled, points_sampled) = sample_tiles(&resolved, points)?;

        let summary = ElevationSummary {
            tiles_downloaded,
            tiles_sampled,
            points_sampled,
            points_unresolved: points.unresolved(),
        };
        info!(
            downloaded = summary.tiles_downloaded,
            sampled = summary.points_sampled,
            unresolved = summary.points_unresolved,
            "Elevation pass complete"
        );
        Ok(summary)
    }

    /// Download missing tiles of the required resolution that cover `points`.
    fn acquire(&mut self, points: &Points) -> Result<usize> {
        let mut pending: Vec<(String, &CatalogItem)> = Vec::new();

        for item in &self.query_result.items {
            if !item.title.contains(&self.resolution_tag) {
                debug!(title = %item.title, "Skipping item of another resolution");
                continue;
            }
            if !item.intersects(points) {
                continue;
            }
            let key = item
                .cache_key()
                .map_err(|e| ElevationError::acquisition(&item.download_url, e))?;
            if self.cache.contains(&key) {
                debug!(key = %key, "Tile already cached");
                continue;
            }
            if pending.iter().any(|(k, _)| *k == key) {
                continue;
            }
            pending.push((key, item));
        }

        if pending.is_empty() {
            return Ok(0);
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.download_concurrency.min(pending.len()))
            .build()?;

        let client = &self.client;
        let cache = &self.cache;
        let tiles_downloaded = &self.tiles_downloaded;
        let bytes_downloaded = &self.bytes_downloaded;

        pool.install(|| {
            pending.par_iter().try_for_each(|(key, item)| {
                info!(url = %item.download_url, key = %key, "Downloading tile");
                let mut written = 0;
                cache
                    .write_with(key, |file| {
                        written = client.download(item, file)?;
                        Ok(written)
                    })
                    .map_err(|e| ElevationError::acquisition(key, e))?;

                if item.size_in_bytes > 0 && item.size_in_bytes != written {
                    warn!(
                        key = %key,
                        expected = item.size_in_bytes,
                        actual = written,
                        "Downloaded size differs from catalog"
                    );
                }
                tiles_downloaded.fetch_add(1, Ordering::Relaxed);
                bytes_downloaded.fetch_add(written, Ordering::Relaxed);
                Ok::<(), ElevationError>(())
            })
        })?;

        let count = pending.len();
        self.cache_index = self.cache.list()?;
        Ok(count)
    }

    /// Pair every cache entry with the catalog item it was downloaded from.
    fn resolve(&self) -> Result<Vec<(CacheEntry, CatalogItem)>> {
        let mut lookups: HashMap<String, QueryResult> = HashMap::new();
        let mut resolved = Vec::with_capacity(self.cache_index.len());

        for entry in &self.cache_index {
            let item = self
                .resolve_entry(entry, &mut lookups)
                .map_err(|e| ElevationError::resolution(&entry.name, e))?;
            resolved.push((entry.clone(), item));
        }

        Ok(resolved)
    }

    fn resolve_entry(
        &self,
        entry: &CacheEntry,
        lookups: &mut HashMap<String, QueryResult>,
    ) -> Result<CatalogItem> {
        if let Some(item) = self.query_result.find_by_key(&entry.name) {
            return Ok(item.clone());
        }

        let missing = || ElevationError::MissingProvenance {
            key: entry.name.clone(),
        };
        let token = entry.name_token().ok_or_else(missing)?;

        if !lookups.contains_key(token) {
            warn!(key = %entry.name, token, "Cached tile not in current query, looking it up by name");
            let result = self.client.query(&QueryFilter::Name(token.to_string()))?;
            lookups.insert(token.to_string(), result);
        }

        lookups
            .get(token)
            .and_then(|result| result.find_by_key(&entry.name))
            .cloned()
            .ok_or_else(missing)
    }
}

/// Sample each resolved tile for the points it covers that lack elevation.
///
/// Returns (tiles opened, points filled).
fn sample_tiles(resolved: &[(CacheEntry, CatalogItem)], points: &mut Points) -> Result<(usize, usize)> {
    let mut tiles_sampled = 0;
    let mut points_sampled = 0;

    for (entry, item) in resolved {
        let pending: Vec<_> = item
            .bounding_box
            .intersect_mut(points)
            .into_iter()
            .filter(|p| !p.has_elevation())
            .collect();
        if pending.is_empty() {
            continue;
        }

        let mut tile = RasterTile::open(entry.path())
            .map_err(|e| ElevationError::sampling(&entry.name, None, e))?;

        let mut filled = 0;
        for point in pending {
            let value = tile
                .sample(&item.bounding_box, point)
                .map_err(|e| ElevationError::sampling(&entry.name, Some(point.id), e))?;
            match value {
                Some(elevation) => {
                    point.elevation = Some(elevation as f64);
                    filled += 1;
                }
                None => debug!(key = %entry.name, point = point.id, "No data at point"),
            }
        }

        info!(key = %entry.name, points = filled, "Sampled tile");
        tiles_sampled += 1;
        points_sampled += filled;
    }

    Ok((tiles_sampled, points_sampled))
}
