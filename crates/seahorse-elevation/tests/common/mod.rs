//! Shared fixtures: synthetic GeoTIFF tiles and an in-memory catalog.

#![allow(dead_code)]

use seahorse_elevation::{
    AccessorConfig, BoundingBox, CatalogClient, CatalogItem, ElevationError, QueryFilter,
    QueryResult, Result,
};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

pub const TITLE_13: &str = "USGS 13 arc-second n48w123 1 x 1 degree";
pub const TITLE_1M: &str = "USGS one meter x55y530 WA";

/// A single-band float32 GeoTIFF.
pub struct GeoTiffFixture {
    pub width: u32,
    pub height: u32,
    pub values: Vec<f32>,
    /// Top-left corner and pixel size; `None` writes no geotags.
    pub georef: Option<(f64, f64, f64)>,
    pub nodata: Option<&'static str>,
    pub rows_per_strip: Option<u32>,
}

impl GeoTiffFixture {
    /// `width` x `height` pixels with value `row * 100 + col`, covering `bbox`.
    pub fn graded(bbox: &BoundingBox, width: u32, height: u32) -> Self {
        let values = (0..height)
            .flat_map(|row| (0..width).map(move |col| (row * 100 + col) as f32))
            .collect();
        Self {
            width,
            height,
            values,
            georef: Some((bbox.min_x, bbox.max_y, bbox.width() / width as f64)),
            nodata: None,
            rows_per_strip: None,
        }
    }

    /// Constant-valued tile covering `bbox`.
    pub fn flat(bbox: &BoundingBox, width: u32, height: u32, value: f32) -> Self {
        Self {
            values: vec![value; (width * height) as usize],
            ..Self::graded(bbox, width, height)
        }
    }

    pub fn without_georef(mut self) -> Self {
        self.georef = None;
        self
    }

    pub fn with_nodata(mut self, nodata: &'static str) -> Self {
        self.nodata = Some(nodata);
        self
    }

    pub fn with_rows_per_strip(mut self, rows: u32) -> Self {
        self.rows_per_strip = Some(rows);
        self
    }

    pub fn set(&mut self, col: u32, row: u32, value: f32) {
        self.values[(row * self.width + col) as usize] = value;
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut cursor).unwrap();
            let mut image = encoder
                .new_image::<colortype::Gray32Float>(self.width, self.height)
                .unwrap();

            if let Some(rows) = self.rows_per_strip {
                image.rows_per_strip(rows).unwrap();
            }
            if let Some((x, y, size)) = self.georef {
                image
                    .encoder()
                    .write_tag(Tag::ModelPixelScaleTag, &[size, size, 0.0][..])
                    .unwrap();
                image
                    .encoder()
                    .write_tag(Tag::ModelTiepointTag, &[0.0, 0.0, 0.0, x, y, 0.0][..])
                    .unwrap();
            }
            if let Some(nodata) = self.nodata {
                image
                    .encoder()
                    .write_tag(Tag::GdalNodata, nodata)
                    .unwrap();
            }

            image.write_data(&self.values).unwrap();
        }
        cursor.into_inner()
    }

    pub fn write_to(&self, path: &Path) {
        let mut file = File::create(path).unwrap();
        file.write_all(&self.to_bytes()).unwrap();
    }
}

/// Catalog item for a tile served at `https://dem.example.test/<name>`.
pub fn item(title: &str, name: &str, bbox: BoundingBox) -> CatalogItem {
    CatalogItem {
        title: title.to_string(),
        download_url: format!("https://dem.example.test/StagedProducts/Elevation/13/TIFF/{name}"),
        bounding_box: bbox,
        size_in_bytes: 0,
        format: "GeoTIFF".to_string(),
        source_id: None,
        publication_date: None,
        last_updated: None,
        meta_url: None,
        datasets: vec![],
    }
}

/// In-memory catalog. Clones share their counters.
#[derive(Clone, Default)]
pub struct FakeCatalog {
    items: Vec<CatalogItem>,
    by_name: HashMap<String, Vec<CatalogItem>>,
    files: HashMap<String, Vec<u8>>,
    downloads: Arc<AtomicUsize>,
    name_queries: Arc<AtomicUsize>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// List `item` in bounding-box queries and serve `bytes` for it.
    pub fn with_tile(mut self, item: CatalogItem, bytes: Vec<u8>) -> Self {
        self.files.insert(item.download_url.clone(), bytes);
        self.items.push(item);
        self
    }

    /// List `item` in bounding-box queries without serving it.
    pub fn with_listing(mut self, item: CatalogItem) -> Self {
        self.items.push(item);
        self
    }

    /// Answer name queries for `token` with `item`.
    pub fn with_name_lookup(mut self, token: &str, item: CatalogItem) -> Self {
        self.by_name.entry(token.to_string()).or_default().push(item);
        self
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn name_queries(&self) -> usize {
        self.name_queries.load(Ordering::SeqCst)
    }
}

impl CatalogClient for FakeCatalog {
    fn query(&self, filter: &QueryFilter) -> Result<QueryResult> {
        let items: Vec<CatalogItem> = match filter {
            QueryFilter::BoundingBox(bbox) => self
                .items
                .iter()
                .filter(|item| item.bounding_box.intersects(bbox))
                .cloned()
                .collect(),
            QueryFilter::Name(token) => {
                self.name_queries.fetch_add(1, Ordering::SeqCst);
                self.by_name.get(token).cloned().unwrap_or_default()
            }
        };

        Ok(QueryResult {
            total: items.len(),
            items,
            ..QueryResult::default()
        })
    }

    fn download(&self, item: &CatalogItem, sink: &mut dyn Write) -> Result<u64> {
        let bytes = self
            .files
            .get(&item.download_url)
            .ok_or_else(|| ElevationError::HttpStatus {
                url: item.download_url.clone(),
                status: 404,
            })?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        sink.write_all(bytes)?;
        Ok(bytes.len() as u64)
    }
}

pub fn config_for(cache_dir: &Path) -> AccessorConfig {
    AccessorConfig {
        cache_dir: cache_dir.to_path_buf(),
        download_concurrency: 2,
        ..AccessorConfig::default()
    }
}
