//! Layer localization: remote feature layers copied into the run's local
//! feature cache and swapped into pre-styled template layers.

pub mod cache;
pub mod localizer;


pub use cache::{simplify_layer_name, FeatureCache};
pub use localizer::LayerLocalizer;

use std::path::PathBuf;

use thiserror::Error;

use crate::host::HostError;
use crate::service::ServiceError;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cache entry {path} is not a feature set: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cache entry '{0}' does not exist")]
    Missing(String),
}

#[derive(Debug, Error)]
pub enum LocalizeError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Host(#[from] HostError),
}
