//! Local feature cache of one report run.
//!
//! Entries live in the feature store directory as `<key>.json`, where the key
//! is the simplified layer name. The raw service answer behind each entry is
//! kept next to it in the payload directory.

use std::fs;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use super::CacheError;
use crate::geometry::FeatureSet;

lazy_static! {
    static ref NAME_SEPARATORS: Regex = Regex::new(r"[^A-Za-z0-9_]+").unwrap();
}

/// Filesystem-safe cache key for a layer display name.
///
/// Every run of characters outside `[A-Za-z0-9_]` becomes one underscore, so
/// `Zoning (CLIPPED)` maps to `Zoning_CLIPPED_`.
pub fn simplify_layer_name(name: &str) -> String {
    NAME_SEPARATORS.replace_all(name.trim(), "_").into_owned()
}

#[derive(Debug, Clone)]
pub struct FeatureCache {
    store_dir: PathBuf,
    payload_dir: PathBuf,
}

impl FeatureCache {
    pub fn open(store_dir: impl Into<PathBuf>, payload_dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let cache = Self {
            store_dir: store_dir.into(),
            payload_dir: payload_dir.into(),
        };
        for dir in [&cache.store_dir, &cache.payload_dir] {
            fs::create_dir_all(dir).map_err(|source| CacheError::Io {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(cache)
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    pub fn path_for(&self, layer_name: &str) -> PathBuf {
        self.store_dir
            .join(format!("{}.json", simplify_layer_name(layer_name)))
    }

    pub fn contains(&self, layer_name: &str) -> bool {
        self.path_for(layer_name).is_file()
    }

    pub fn read(&self, layer_name: &str) -> Result<FeatureSet, CacheError> {
        let path = self.path_for(layer_name);
        if !path.is_file() {
            return Err(CacheError::Missing(simplify_layer_name(layer_name)));
        }
        let raw = fs::read_to_string(&path).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| CacheError::Corrupt { path, source })
    }

    /// Store a feature set under the layer's key, replacing any previous entry.
    pub fn write(&self, layer_name: &str, features: &FeatureSet) -> Result<PathBuf, CacheError> {
        let path = self.path_for(layer_name);
        write_json(&path, features)?;
        log::debug!("Cached {} features at {}", features.features.len(), path.display());
        Ok(path)
    }

    /// Keep the raw response a cache entry was built from.
    pub fn write_payload(&self, layer_name: &str, body: &Value) -> Result<PathBuf, CacheError> {
        let path = self
            .payload_dir
            .join(format!("{}.json", simplify_layer_name(layer_name)));
        write_json(&path, body)?;
        Ok(path)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CacheError> {
    let raw = serde_json::to_string(value).map_err(|source| CacheError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, raw).map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })
}
