//! reqwest-backed [`RestClient`].

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{FormPayload, RestClient, ServiceError};

const USER_AGENT: &str = "aoi-report/0.1";

pub struct HttpRestClient {
    client: reqwest::Client,
}

impl HttpRestClient {
    /// Build the shared client. With `verify_tls` off, invalid certificates are accepted.
    pub fn new(verify_tls: bool) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(900))
            .timeout(Duration::from_secs(300))
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .map_err(|err| ServiceError::Transport {
                url: String::new(),
                message: format!("failed to create HTTP client: {}", err),
            })?;

        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RestClient for HttpRestClient {
    async fn post_form(&self, url: &str, payload: &FormPayload) -> Result<Value, ServiceError> {
        log::debug!("POST {} ({} fields)", url, payload.len());

        let response = self
            .client
            .post(url)
            .form(payload.fields())
            .send()
            .await
            .map_err(|err| ServiceError::Transport {
                url: url.to_string(),
                message: err.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|err| ServiceError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        })?;

        // ArcGIS reports most failures inside a 200 body; only fall back to
        // the status when the body is not JSON.
        serde_json::from_str(&text).map_err(|err| {
            if status.is_success() {
                ServiceError::Malformed {
                    url: url.to_string(),
                    message: err.to_string(),
                }
            } else {
                ServiceError::Remote {
                    url: url.to_string(),
                    code: i64::from(status.as_u16()),
                    message: text.chars().take(200).collect(),
                }
            }
        })
    }
}
