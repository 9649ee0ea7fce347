//! Replacement descriptors as written in the config.
//!
//! ```json
//! {"type": "query", "service": "https://.../MapServer/3", "return_field": "NAME",
//!  "in_aoi": "Area of Interest", "prepend": "County: "}
//! ```

use serde::Deserialize;
use serde_json::Value;

use super::TemplateError;

fn default_where() -> String {
    "1=1".to_string()
}

fn default_multiple_value_placeholder() -> String {
    "Multiple Values".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReplacementDescriptor {
    #[serde(flatten)]
    pub kind: ReplacementKind,
    #[serde(default)]
    pub prepend: String,
    #[serde(default)]
    pub append: String,
}

impl ReplacementDescriptor {
    pub fn from_value(raw: &Value) -> Result<Self, TemplateError> {
        ReplacementDescriptor::deserialize(raw).map_err(TemplateError::Descriptor)
    }

    pub fn wrap(&self, value: &str) -> String {
        format!("{}{}{}", self.prepend, value, self.append)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ReplacementKind {
    #[serde(rename = "text")]
    Text {
        #[serde(default)]
        value: Value,
    },
    #[serde(rename = "query")]
    Query(QuerySpec),
    #[serde(rename = "identify")]
    Identify(StatisticsSpec),
    #[serde(rename = "computeStatisticsHistograms", alias = "statistics")]
    Statistics(StatisticsSpec),
    #[serde(rename = "calculate")]
    Calculate(CalculateSpec),
}

/// Which AOI a request is filtered by: a named AOI layer, or `true` for the run's AOI.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AoiFilter {
    Named(String),
    Flag(bool),
}

impl AoiFilter {
    pub fn aoi_name<'a>(&'a self, default_aoi: &'a str) -> Option<&'a str> {
        match self {
            AoiFilter::Named(name) if !name.is_empty() => Some(name),
            AoiFilter::Named(_) | AoiFilter::Flag(false) => None,
            AoiFilter::Flag(true) => Some(default_aoi),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuerySpec {
    pub service: String,
    #[serde(rename = "where", default = "default_where")]
    pub where_clause: String,
    pub return_field: String,
    #[serde(default)]
    pub in_aoi: Option<AoiFilter>,
    /// Filter by the AOI centroid instead of its polygon.
    #[serde(default)]
    pub use_centroid: bool,
    #[serde(default = "default_multiple_value_placeholder")]
    pub multiple_value_placeholder: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatisticsSpec {
    pub service: String,
    #[serde(default)]
    pub pixel_size: Option<f64>,
    #[serde(default)]
    pub rendering_rule: Option<Value>,
    #[serde(default)]
    pub in_aoi: Option<AoiFilter>,
    /// Statistic to report (`min`, `max`, `mean`, ...).
    #[serde(default)]
    pub calc: Option<String>,
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub conversion_coefficient: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculateProperty {
    Area,
    Centroid,
}

fn default_property() -> CalculateProperty {
    CalculateProperty::Area
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CalculateSpec {
    /// Feature-cache entry to read.
    pub layer: String,
    #[serde(default = "default_property")]
    pub property: CalculateProperty,
    #[serde(default)]
    pub area_unit: Option<String>,
}
