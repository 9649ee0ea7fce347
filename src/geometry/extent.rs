//! Extent parsing and percentage buffering.

use serde::{Deserialize, Serialize};

use super::{Extent, GeometryError};
use crate::warnings::WarningLog;

/// Externally supplied extent: either a structured object or the
/// whitespace-separated `xmin ymin xmax ymax` string a service caller sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtentInput {
    Structured(Extent),
    Text(String),
}

impl From<Extent> for ExtentInput {
    fn from(extent: Extent) -> Self {
        ExtentInput::Structured(extent)
    }
}

impl ExtentInput {
    pub fn to_extent(&self) -> Result<Extent, GeometryError> {
        let extent = match self {
            ExtentInput::Structured(extent) => *extent,
            ExtentInput::Text(raw) => parse_extent_string(raw)?,
        };
        if !extent.is_finite() {
            return Err(GeometryError::NonFiniteExtent(extent));
        }
        Ok(extent)
    }
}

/// Parse `xmin ymin xmax ymax`. Tokens past the fourth are ignored.
pub fn parse_extent_string(raw: &str) -> Result<Extent, GeometryError> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(GeometryError::ExtentTokens(raw.to_string()));
    }

    let mut coords = [0.0_f64; 4];
    for (slot, token) in coords.iter_mut().zip(&tokens) {
        *slot = token
            .parse::<f64>()
            .map_err(|_| GeometryError::ExtentCoordinate(token.to_string()))?;
    }

    Ok(Extent::new(coords[0], coords[1], coords[2], coords[3]))
}

/// Grow each axis on both sides by `buffer_percent / 100` of that axis' span.
pub fn buffer_extent(extent: Extent, buffer_percent: f64) -> Result<Extent, GeometryError> {
    if !buffer_percent.is_finite() || buffer_percent < 0.0 {
        return Err(GeometryError::InvalidBuffer(buffer_percent));
    }
    if !extent.is_finite() {
        return Err(GeometryError::NonFiniteExtent(extent));
    }

    let ratio = buffer_percent / 100.0;
    let dx = extent.width() * ratio;
    let dy = extent.height() * ratio;

    Ok(Extent::new(
        extent.xmin - dx,
        extent.ymin - dy,
        extent.xmax + dx,
        extent.ymax + dy,
    ))
}

/// Resolve a raw extent into a buffered one. Failures become a warning and `None`.
pub fn resolve_extent(
    raw: &ExtentInput,
    buffer_percent: f64,
    warnings: &mut WarningLog,
) -> Option<Extent> {
    match raw
        .to_extent()
        .and_then(|extent| buffer_extent(extent, buffer_percent))
    {
        Ok(extent) => Some(extent),
        Err(err) => {
            warnings.add(format!("WARNING: Could not buffer the input extent: {}", err));
            None
        }
    }
}
