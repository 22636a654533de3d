//! Directory-backed store of downloaded tiles.
//!
//! Each tile is a single file named by its cache key (see
//! [`crate::catalog::cache_key`]). There is no metadata sidecar: which catalog
//! item a file came from is worked out again at runtime from its name.
//!
//! Writes go to a hidden temporary file in the cache directory and are renamed
//! onto the key only once complete, so readers never see a partial tile.

use crate::{ElevationError, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::Builder;
use tracing::warn;

/// A tile file present in the cache.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CacheEntry {
    /// Cache directory the file lives in.
    pub dir: PathBuf,
    /// File name, equal to the cache key.
    pub name: String,
}

impl CacheEntry {
    /// Full path of the cached file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }

    /// Token used to look the tile up by name in the catalog.
    ///
    /// USGS tiles are named like `USGS_13_n48w123_20240327.tif`; the
    /// second-to-last `_` field (`n48w123`) identifies the cell.
    pub fn name_token(&self) -> Option<&str> {
        let mut fields = self.name.rsplit('_');
        fields.next()?;
        fields.next().filter(|token| !token.is_empty())
    }
}

/// Local tile cache rooted at one directory.
#[derive(Debug, Clone)]
pub struct TileCache {
    dir: PathBuf,
}

impl TileCache {
    /// Open the cache, creating the directory if it doesn't exist.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Get the cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a tile with `key` is (or would be) stored at.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Check if a tile is cached locally.
    pub fn contains(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }

    /// Enumerate the cache directory.
    ///
    /// Always reads the directory afresh. Hidden files (in-flight downloads)
    /// and subdirectories are skipped; entries are sorted by name.
    pub fn list(&self) -> Result<Vec<CacheEntry>> {
        let mut entries = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str().map(str::to_string) else {
                warn!(file = ?file_name, dir = %self.dir.display(), "Skipping cache file with non-UTF-8 name");
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            entries.push(CacheEntry {
                dir: self.dir.clone(),
                name,
            });
        }

        entries.sort();
        Ok(entries)
    }

    /// Store `bytes` under `key`.
    pub fn write(&self, key: &str, bytes: &[u8]) -> Result<CacheEntry> {
        self.write_with(key, |file| {
            file.write_all(bytes)?;
            Ok(bytes.len() as u64)
        })
    }

    /// Store content produced by `fill` under `key`.
    ///
    /// `fill` writes into a temporary file; the file is synced and renamed onto
    /// the key only if `fill` succeeds. On error the temporary is removed and
    /// nothing appears under the key.
    pub fn write_with<F>(&self, key: &str, fill: F) -> Result<CacheEntry>
    where
        F: FnOnce(&mut File) -> Result<u64>,
    {
        validate_key(key)?;

        let mut temp = Builder::new()
            .prefix(".")
            .suffix(".partial")
            .tempfile_in(&self.dir)?;

        fill(temp.as_file_mut())?;
        temp.as_file().sync_all()?;
        temp.persist(self.path_for(key)).map_err(|e| e.error)?;

        Ok(CacheEntry {
            dir: self.dir.clone(),
            name: key.to_string(),
        })
    }
}

/// Reject keys that would escape the directory or be hidden from [`TileCache::list`].
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty()
        || key.starts_with('.')
        || key.contains(['/', '\\'])
    {
        return Err(ElevationError::InvalidCacheKey(key.to_string()));
    }
    Ok(())
}
