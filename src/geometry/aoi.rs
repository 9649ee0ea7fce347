//! Working AOI geometry and the per-run AOI cache.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{EsriGeometry, FeatureSet, Ring, SpatialReference};

/// Every feature of the AOI merged into one polygon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AoiGeometry {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rings: Vec<Ring>,
    #[serde(rename = "curveRings", default, skip_serializing_if = "Vec::is_empty")]
    pub curve_rings: Vec<Value>,
    #[serde(rename = "spatialReference", default, skip_serializing_if = "Option::is_none")]
    pub spatial_reference: Option<SpatialReference>,
}

impl AoiGeometry {
    pub fn wkid(&self) -> Option<i64> {
        self.spatial_reference
            .as_ref()
            .and_then(|sr| sr.latest_wkid.or(sr.wkid))
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty() && self.curve_rings.is_empty()
    }

    pub fn to_esri_geometry(&self) -> EsriGeometry {
        EsriGeometry {
            rings: (!self.rings.is_empty()).then(|| self.rings.clone()),
            curve_rings: (!self.curve_rings.is_empty()).then(|| self.curve_rings.clone()),
            spatial_reference: self.spatial_reference.clone(),
            ..EsriGeometry::default()
        }
    }

    /// JSON text for the `geometry` form field of a polygon-filtered request.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Concatenate the rings and curve rings of every feature, in input order.
///
/// The spatial reference is taken from the first feature that declares one on
/// its geometry, falling back to the feature set's own reference.
pub fn resolve_geometry(aoi: &FeatureSet) -> AoiGeometry {
    let mut merged = AoiGeometry::default();

    for geometry in aoi.features.iter().filter_map(|f| f.geometry.as_ref()) {
        if merged.spatial_reference.is_none() {
            merged.spatial_reference = geometry.spatial_reference.clone();
        }
        if let Some(rings) = &geometry.rings {
            merged.rings.extend(rings.iter().cloned());
        }
        if let Some(curve_rings) = &geometry.curve_rings {
            merged.curve_rings.extend(curve_rings.iter().cloned());
        }
    }

    if merged.spatial_reference.is_none() {
        merged.spatial_reference = aoi.spatial_reference.clone();
    }

    merged
}

/// What a run knows about one AOI layer.
///
/// The geometry is computed once; `definitions` holds the raw query response
/// fetched for each table layer and is never invalidated within a run.
#[derive(Debug, Default)]
pub struct AoiInfo {
    geometry: Option<AoiGeometry>,
    definitions: HashMap<String, FeatureSet>,
}

impl AoiInfo {
    pub fn geometry(&self) -> Option<&AoiGeometry> {
        self.geometry.as_ref()
    }

    pub fn geometry_or_resolve(&mut self, aoi: &FeatureSet) -> &AoiGeometry {
        self.geometry.get_or_insert_with(|| resolve_geometry(aoi))
    }

    pub fn definition(&self, layer: &str) -> Option<&FeatureSet> {
        self.definitions.get(layer)
    }

    pub fn has_definition(&self, layer: &str) -> bool {
        self.definitions.contains_key(layer)
    }

    pub fn insert_definition(&mut self, layer: impl Into<String>, features: FeatureSet) {
        self.definitions.entry(layer.into()).or_insert(features);
    }
}

/// AOI infos keyed by AOI layer name. Lives for one report run.
#[derive(Debug, Default)]
pub struct AoiRegistry {
    infos: HashMap<String, AoiInfo>,
}

impl AoiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&mut self, aoi_name: &str) -> &mut AoiInfo {
        self.infos.entry(aoi_name.to_string()).or_default()
    }

    pub fn get(&self, aoi_name: &str) -> Option<&AoiInfo> {
        self.infos.get(aoi_name)
    }

    pub fn geometry(&self, aoi_name: &str) -> Option<&AoiGeometry> {
        self.get(aoi_name).and_then(AoiInfo::geometry)
    }
}
