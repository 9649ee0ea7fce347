//! Geometry model shared by the AOI resolver, the localizer and the attribute deriver.
//!
//! Feature payloads follow the ArcGIS REST JSON shape: a feature set carries a
//! spatial reference and a list of features, each feature an attribute map and
//! an optional geometry made of `rings` (plain polygon rings) and/or
//! `curveRings` (rings that may contain curve segments).

pub mod aoi;
pub mod extent;
pub mod measure;
pub mod overlay;


pub use aoi::{resolve_geometry, AoiGeometry, AoiInfo, AoiRegistry};
pub use extent::{buffer_extent, parse_extent_string, resolve_extent, ExtentInput};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Spatial reference id of Web Mercator as the feature services expect it.
pub const WEB_MERCATOR_WKID: i64 = 102100;
/// Spatial reference id of WGS84 geographic coordinates.
pub const WGS84_WKID: i64 = 4326;

pub const POLYGON_GEOMETRY_TYPE: &str = "esriGeometryPolygon";
pub const POINT_GEOMETRY_TYPE: &str = "esriGeometryPoint";
pub const ENVELOPE_GEOMETRY_TYPE: &str = "esriGeometryEnvelope";

/// Errors raised while interpreting extents and geometries.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("extent string '{0}' needs four coordinates (xmin ymin xmax ymax)")]
    ExtentTokens(String),
    #[error("extent coordinate '{0}' is not a number")]
    ExtentCoordinate(String),
    #[error("extent is not finite: {0:?}")]
    NonFiniteExtent(Extent),
    #[error("buffer percent must be a finite, non-negative number (got {0})")]
    InvalidBuffer(f64),
}

/// Axis-aligned rectangle in map units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    #[serde(alias = "XMin")]
    pub xmin: f64,
    #[serde(alias = "YMin")]
    pub ymin: f64,
    #[serde(alias = "XMax")]
    pub xmax: f64,
    #[serde(alias = "YMax")]
    pub ymax: f64,
}

impl Extent {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn width(&self) -> f64 {
        (self.xmax - self.xmin).abs()
    }

    pub fn height(&self) -> f64 {
        (self.ymax - self.ymin).abs()
    }

    pub fn is_finite(&self) -> bool {
        self.xmin.is_finite() && self.ymin.is_finite() && self.xmax.is_finite() && self.ymax.is_finite()
    }

    /// Envelope string accepted by the feature-query `geometry` field.
    pub fn to_envelope_string(&self) -> String {
        format!("{},{},{},{}", self.xmin, self.ymin, self.xmax, self.ymax)
    }

    /// Smallest extent covering every point of every ring, if there is any point.
    pub fn from_rings(rings: &[Ring]) -> Option<Self> {
        let mut points = rings
            .iter()
            .flatten()
            .filter_map(|coord| Some((*coord.first()?, *coord.get(1)?)));
        let (x, y) = points.next()?;
        let seed = Extent::new(x, y, x, y);
        Some(points.fold(seed, |acc, (x, y)| {
            Extent::new(acc.xmin.min(x), acc.ymin.min(y), acc.xmax.max(x), acc.ymax.max(y))
        }))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wkid: Option<i64>,
    #[serde(rename = "latestWkid", default, skip_serializing_if = "Option::is_none")]
    pub latest_wkid: Option<i64>,
}

impl SpatialReference {
    pub fn from_wkid(wkid: i64) -> Self {
        Self {
            wkid: Some(wkid),
            latest_wkid: None,
        }
    }
}

/// One ring: a list of `[x, y, ...]` coordinates. Extra ordinates (z, m) are carried along untouched.
pub type Ring = Vec<Vec<f64>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EsriGeometry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rings: Option<Vec<Ring>>,
    #[serde(rename = "curveRings", default, skip_serializing_if = "Option::is_none")]
    pub curve_rings: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(rename = "spatialReference", default, skip_serializing_if = "Option::is_none")]
    pub spatial_reference: Option<SpatialReference>,
}

impl EsriGeometry {
    pub fn polygon(rings: Vec<Ring>) -> Self {
        Self {
            rings: Some(rings),
            ..Self::default()
        }
    }

    pub fn point(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn is_polygon(&self) -> bool {
        self.rings.as_ref().is_some_and(|rings| !rings.is_empty())
            || self.curve_rings.as_ref().is_some_and(|rings| !rings.is_empty())
    }

    pub fn is_point(&self) -> bool {
        self.x.is_some() && self.y.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<EsriGeometry>,
}

impl Feature {
    /// Case-insensitive attribute lookup; services disagree on `OBJECTID` vs `objectid`.
    pub fn attribute(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field).or_else(|| {
            self.attributes
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(field))
                .map(|(_, value)| value)
        })
    }
}

/// Feature collection as returned by a feature-service `query`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    #[serde(rename = "geometryType", default, skip_serializing_if = "Option::is_none")]
    pub geometry_type: Option<String>,
    #[serde(rename = "spatialReference", default, skip_serializing_if = "Option::is_none")]
    pub spatial_reference: Option<SpatialReference>,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FeatureSet {
    pub fn wkid(&self) -> Option<i64> {
        self.spatial_reference
            .as_ref()
            .and_then(|sr| sr.latest_wkid.or(sr.wkid))
    }

    /// Polygon sources either say so, or (when the type is absent) carry rings.
    pub fn is_polygon(&self) -> bool {
        match self.geometry_type.as_deref() {
            Some(kind) => kind == POLYGON_GEOMETRY_TYPE,
            None => self
                .features
                .iter()
                .filter_map(|feature| feature.geometry.as_ref())
                .any(EsriGeometry::is_polygon),
        }
    }
}

/// Render an attribute value the way it should appear in document text.
pub fn attribute_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
