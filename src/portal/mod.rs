//! Portal token acquisition.
//!
//! Three ways to sign in, tried in this order of configuration presence:
//! username/password against `generateToken`, an OAuth refresh token, and
//! OAuth client credentials. A run without a token still goes ahead; secured
//! layers simply fail to localize.


use serde_json::Value;
use thiserror::Error;

use crate::config::PortalConfig;
use crate::service::{post_with_token_retry, FormPayload, RestClient, ServiceError};
use crate::warnings::WarningLog;

const DEFAULT_REFERER: &str = "http://localhost";
const TOKEN_EXPIRATION_MINUTES: &str = "120";

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("no portal URL configured")]
    MissingUrl,
    #[error("no portal credentials configured")]
    MissingCredentials,
    #[error("portal request failed: {0}")]
    Service(#[from] ServiceError),
    #[error("portal response has no '{0}' field")]
    MissingToken(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalCredentials {
    UsernamePassword { username: String, password: String },
    RefreshToken { client_id: String, refresh_token: String },
    ClientCredentials { client_id: String, client_secret: String },
}

impl PortalCredentials {
    pub fn from_config(portal: &PortalConfig) -> Option<Self> {
        if let (Some(username), Some(password)) = (&portal.username, &portal.password) {
            return Some(PortalCredentials::UsernamePassword {
                username: username.clone(),
                password: password.clone(),
            });
        }
        if let (Some(client_id), Some(refresh_token)) = (&portal.client_id, &portal.refresh_token) {
            return Some(PortalCredentials::RefreshToken {
                client_id: client_id.clone(),
                refresh_token: refresh_token.clone(),
            });
        }
        if let (Some(client_id), Some(client_secret)) = (&portal.client_id, &portal.client_secret) {
            return Some(PortalCredentials::ClientCredentials {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
            });
        }
        None
    }

    /// Endpoint, payload and the response field holding the token.
    fn request(&self, portal_url: &str, referer: &str) -> (String, FormPayload, &'static str) {
        let base = portal_url.trim_end_matches('/');
        match self {
            PortalCredentials::UsernamePassword { username, password } => (
                format!("{}/sharing/rest/generateToken", base),
                FormPayload::json()
                    .with("username", username.as_str())
                    .with("password", password.as_str())
                    .with("client", "referer")
                    .with("referer", referer)
                    .with("expiration", TOKEN_EXPIRATION_MINUTES),
                "token",
            ),
            PortalCredentials::RefreshToken {
                client_id,
                refresh_token,
            } => (
                format!("{}/sharing/rest/oauth2/token", base),
                FormPayload::json()
                    .with("client_id", client_id.as_str())
                    .with("refresh_token", refresh_token.as_str())
                    .with("grant_type", "refresh_token"),
                "access_token",
            ),
            PortalCredentials::ClientCredentials {
                client_id,
                client_secret,
            } => (
                format!("{}/sharing/rest/oauth2/token", base),
                FormPayload::json()
                    .with("client_id", client_id.as_str())
                    .with("client_secret", client_secret.as_str())
                    .with("grant_type", "client_credentials"),
                "access_token",
            ),
        }
    }
}

pub async fn acquire_token(client: &dyn RestClient, portal: &PortalConfig) -> Result<String, PortalError> {
    let credentials = PortalCredentials::from_config(portal).ok_or(PortalError::MissingCredentials)?;
    let portal_url = portal.url.as_deref().ok_or(PortalError::MissingUrl)?;
    let referer = portal.referer.as_deref().unwrap_or(DEFAULT_REFERER);

    let (url, payload, field) = credentials.request(portal_url, referer);
    let body = post_with_token_retry(client, &url, &payload).await?;

    body.get(field)
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or(PortalError::MissingToken(field))
}

/// Token for the run, or `None` with a warning when signing in fails.
pub async fn sign_in(client: &dyn RestClient, portal: &PortalConfig, warnings: &mut WarningLog) -> Option<String> {
    match acquire_token(client, portal).await {
        Ok(token) => {
            log::info!("Signed in to portal");
            Some(token)
        }
        Err(PortalError::MissingCredentials) => {
            log::info!("No portal credentials configured, continuing without a token");
            None
        }
        Err(err) => {
            warnings.add(format!(
                "WARNING: Could not sign in to portal ({}), some layers may not be added",
                err
            ));
            None
        }
    }
}
