//! Form payloads for feature and image service requests.

use indexmap::IndexMap;

use crate::geometry::{
    AoiGeometry, Extent, ENVELOPE_GEOMETRY_TYPE, POINT_GEOMETRY_TYPE, POLYGON_GEOMETRY_TYPE,
    WEB_MERCATOR_WKID,
};

pub const TOKEN_FIELD: &str = "token";

/// Spatial filter attached to a request.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryFilter {
    /// Buffered bounding box, always in Web Mercator.
    Envelope(Extent),
    /// Exact AOI polygon; `inSR` follows the polygon's own reference.
    Polygon(AoiGeometry),
    /// A single location, e.g. the AOI centroid.
    Point { x: f64, y: f64, wkid: Option<i64> },
}

/// Ordered form fields of one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormPayload {
    fields: IndexMap<String, String>,
}

impl FormPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Just `f=json`.
    pub fn json() -> Self {
        Self::new().with("f", "json")
    }

    /// Base of every feature query: all fields, all rows, Web Mercator input.
    pub fn feature_query() -> Self {
        Self::json()
            .with("outFields", "*")
            .with("where", "1=1")
            .with("inSR", WEB_MERCATOR_WKID.to_string())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.fields.shift_remove(key)
    }

    /// Copy of this payload with `key` dropped and every other field untouched.
    pub fn without(&self, key: &str) -> Self {
        let mut copy = self.clone();
        copy.remove(key);
        copy
    }

    /// Attach the access token when there is one.
    pub fn with_token(self, token: Option<&str>) -> Self {
        match token.filter(|token| !token.is_empty()) {
            Some(token) => self.with(TOKEN_FIELD, token),
            None => self,
        }
    }

    pub fn with_filter(self, filter: &GeometryFilter) -> Self {
        match filter {
            GeometryFilter::Envelope(extent) => self
                .with("geometry", extent.to_envelope_string())
                .with("geometryType", ENVELOPE_GEOMETRY_TYPE),
            GeometryFilter::Polygon(geometry) => {
                let payload = self
                    .with("geometry", geometry.to_json())
                    .with("geometryType", POLYGON_GEOMETRY_TYPE);
                match geometry.wkid() {
                    Some(wkid) => payload.with("inSR", wkid.to_string()),
                    None => payload,
                }
            }
            GeometryFilter::Point { x, y, wkid } => {
                let payload = self
                    .with("geometry", format!("{},{}", x, y))
                    .with("geometryType", POINT_GEOMETRY_TYPE);
                match wkid {
                    Some(wkid) => payload.with("inSR", wkid.to_string()),
                    None => payload,
                }
            }
        }
    }

    pub fn fields(&self) -> &IndexMap<String, String> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
