//! Feature-service seam.
//!
//! Every remote call in a report run goes through [`RestClient::post_form`]:
//! feature queries, image statistics, add-features and portal token requests.
//! The retry policies for expired tokens and oversized statistics requests
//! live in [`retry`] and are shared by every caller.

pub mod http;
pub mod payload;
pub mod response;
pub mod retry;


pub use http::HttpRestClient;
pub use payload::{FormPayload, GeometryFilter};
pub use response::{parse_feature_set, parse_statistics, remote_error, RemoteError, StatisticsResponse};
pub use retry::{post_statistics, post_with_token_retry};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Error code a service returns when the token attached to a request has expired or is invalid.
pub const TOKEN_EXPIRED_CODE: i64 = 498;
/// Error code an image service returns when a statistics request covers too many pixels.
pub const REQUEST_TOO_LARGE_CODE: i64 = 400;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("malformed response from {url}: {message}")]
    Malformed { url: String, message: String },
    #[error("{url} returned error {code}: {message}")]
    Remote {
        url: String,
        code: i64,
        message: String,
    },
    #[error("{url} rejected the request as too large after {attempts} attempts")]
    RetriesExhausted { url: String, attempts: u32 },
}

impl ServiceError {
    /// Remote error code, when the service answered with one.
    pub fn code(&self) -> Option<i64> {
        match self {
            ServiceError::Remote { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Form-encoded POST against an ArcGIS-style REST endpoint.
///
/// Implementations return the decoded JSON body as is, including bodies that
/// carry an `error` object; interpreting those is the caller's job.
#[async_trait]
pub trait RestClient: Send + Sync {
    async fn post_form(&self, url: &str, payload: &FormPayload) -> Result<Value, ServiceError>;
}

/// Join a service URL and an operation name (`query`, `addFeatures`, ...).
pub fn endpoint(service_url: &str, operation: &str) -> String {
    format!("{}/{}", service_url.trim_end_matches('/'), operation)
}
