//! Add-features: push caller-supplied features into a feature service layer.

use serde_json::Value;
use thiserror::Error;

use crate::service::{endpoint, post_with_token_retry, FormPayload, RestClient, ServiceError};

#[derive(Debug, Error)]
pub enum AddFeaturesError {
    #[error("Invalid addFeaturesParams JSON, try again")]
    InvalidParams(#[source] serde_json::Error),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Parse the features argument. Escaped quotes (`\"`) are accepted.
pub fn parse_features(raw: &str) -> Result<Value, AddFeaturesError> {
    let cleaned = raw.replace("\\\"", "\"");
    serde_json::from_str(&cleaned).map_err(AddFeaturesError::InvalidParams)
}

/// POST `features` to `{service_url}/addFeatures`.
///
/// An expired token is dropped and the request sent once more without it.
pub async fn add_features(
    client: &dyn RestClient,
    service_url: &str,
    features: &Value,
    token: Option<&str>,
) -> Result<Value, AddFeaturesError> {
    let payload = FormPayload::json()
        .with_token(token)
        .with("features", features.to_string());

    let url = endpoint(service_url, "addFeatures");
    log::info!("Adding features to {}", url);
    Ok(post_with_token_retry(client, &url, &payload).await?)
}
