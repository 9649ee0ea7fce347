//! Typed views over service responses.
//!
//! A body that does not have the shape its request kind promises is reported
//! as [`ServiceError::Malformed`]; a body carrying an `error` object becomes
//! [`ServiceError::Remote`].

use serde::Deserialize;
use serde_json::{Map, Value};

use super::ServiceError;
use crate::geometry::FeatureSet;

/// The `error` object of a failed ArcGIS REST call.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Vec<Value>,
}

pub fn remote_error(body: &Value) -> Option<RemoteError> {
    let error = body.get("error")?;
    Some(serde_json::from_value(error.clone()).unwrap_or_default())
}

/// Pass `body` through unless it carries an `error` object.
pub fn check(url: &str, body: Value) -> Result<Value, ServiceError> {
    match remote_error(&body) {
        Some(error) => Err(ServiceError::Remote {
            url: url.to_string(),
            code: error.code,
            message: error.message,
        }),
        None => Ok(body),
    }
}

pub fn parse_feature_set(url: &str, body: Value) -> Result<FeatureSet, ServiceError> {
    let body = check(url, body)?;
    if !body.get("features").is_some_and(Value::is_array) {
        return Err(ServiceError::Malformed {
            url: url.to_string(),
            message: "response has no features array".to_string(),
        });
    }
    serde_json::from_value(body).map_err(|err| ServiceError::Malformed {
        url: url.to_string(),
        message: err.to_string(),
    })
}

/// `{"statistics": [{<statName>: <value>, ...}, ...]}`; one entry per band.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatisticsResponse {
    pub statistics: Vec<Map<String, Value>>,
}

impl StatisticsResponse {
    /// Named statistic of the first band. Numeric strings are accepted.
    pub fn value(&self, statistic: &str) -> Option<f64> {
        let band = self.statistics.first()?;
        let value = band.get(statistic).or_else(|| {
            band.iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(statistic))
                .map(|(_, value)| value)
        })?;
        match value {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }
}

pub fn parse_statistics(url: &str, body: Value) -> Result<StatisticsResponse, ServiceError> {
    let body = check(url, body)?;
    serde_json::from_value(body).map_err(|err| ServiceError::Malformed {
        url: url.to_string(),
        message: err.to_string(),
    })
}
