//! Derived data for table layers: AOI clip + dissolve, then per-feature area
//! and share-of-total fields.

pub mod area;
pub mod dissolve;


pub use area::recompute_area_fields;
pub use dissolve::{clip_and_dissolve, restore_field_names, Statistic};

use thiserror::Error;

/// Suffix appended to a table layer's name once it has been clipped and dissolved.
pub const CLIPPED_DISSOLVED_SUFFIX: &str = "(CLIPPED_DISSOLVED)";

#[derive(Debug, Error)]
pub enum DeriveError {
    #[error("unknown dissolve statistic '{0}'")]
    UnknownStatistic(String),
    #[error("AOI has no polygon to clip against")]
    EmptyAoi,
    #[error("layer is in wkid {layer} but the AOI is in wkid {aoi}")]
    SpatialReferenceMismatch { layer: i64, aoi: i64 },
}

pub fn clipped_layer_name(name: &str) -> String {
    format!("{} {}", name, CLIPPED_DISSOLVED_SUFFIX)
}
