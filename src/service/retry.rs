//! Retry policies shared by every remote call.

use serde_json::Value;

use super::payload::TOKEN_FIELD;
use super::response::{check, remote_error};
use super::{FormPayload, RestClient, ServiceError, REQUEST_TOO_LARGE_CODE, TOKEN_EXPIRED_CODE};

/// Send once; on a 498 answer to a request that carried a token, drop the
/// token from `payload` and send exactly once more. The second answer is
/// returned as is, whatever it says.
async fn send_with_token_retry(
    client: &dyn RestClient,
    url: &str,
    payload: &mut FormPayload,
) -> Result<Value, ServiceError> {
    let body = client.post_form(url, payload).await?;

    let expired = remote_error(&body).is_some_and(|error| error.code == TOKEN_EXPIRED_CODE);
    if expired && payload.remove(TOKEN_FIELD).is_some() {
        log::warn!("Token rejected by {}, retrying without token", url);
        return client.post_form(url, payload).await;
    }

    Ok(body)
}

/// POST `payload` to `url`, recovering from an expired token once.
pub async fn post_with_token_retry(
    client: &dyn RestClient,
    url: &str,
    payload: &FormPayload,
) -> Result<Value, ServiceError> {
    let mut payload = payload.clone();
    let body = send_with_token_retry(client, url, &mut payload).await?;
    check(url, body)
}

/// POST an image statistics request.
///
/// After the token retry, every "request too large" answer doubles
/// `pixel_size` and resends, at most `max_retries` times. Without a pixel
/// size the first 400 is returned as a remote error.
pub async fn post_statistics(
    client: &dyn RestClient,
    url: &str,
    payload: &FormPayload,
    pixel_size: Option<f64>,
    max_retries: u32,
) -> Result<Value, ServiceError> {
    let mut payload = payload.clone();
    if let Some(size) = pixel_size {
        payload.insert("pixelSize", pixel_size_field(size));
    }

    let mut body = send_with_token_retry(client, url, &mut payload).await?;
    let mut pixel_size = pixel_size;
    let mut retries = 0;

    while let (Some(size), true) = (pixel_size, is_too_large(&body)) {
        if retries >= max_retries {
            return Err(ServiceError::RetriesExhausted {
                url: url.to_string(),
                attempts: retries + 1,
            });
        }
        let grown = size * 2.0;
        log::debug!("{} rejected pixel size {}, retrying with {}", url, size, grown);
        payload.insert("pixelSize", pixel_size_field(grown));
        pixel_size = Some(grown);
        retries += 1;
        body = client.post_form(url, &payload).await?;
    }

    check(url, body)
}

fn is_too_large(body: &Value) -> bool {
    remote_error(body).is_some_and(|error| error.code == REQUEST_TOO_LARGE_CODE)
}

pub fn pixel_size_field(size: f64) -> String {
    format!("{},{}", size, size)
}
