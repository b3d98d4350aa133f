//! Response helpers shared by both connectors.

use crate::error::{HandshakeError, Result};
use reqwest::Response;
use serde::de::DeserializeOwned;

/// Fails on a non-2xx status, otherwise returns the body as text.
pub(crate) async fn read_text(response: Response) -> Result<String> {
    let response = response.error_for_status()?;
    Ok(response.text().await?)
}

/// Fails on a non-2xx status, otherwise decodes the body as `T`.
///
/// A body that does not match `T` is the platform's fault, not the caller's,
/// so it is reported as [`HandshakeError::Protocol`].
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let url = response.url().clone();
    let body = read_text(response).await?;
    decode(&body, url.as_str())
}

pub(crate) fn decode<T: DeserializeOwned>(body: &str, origin: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        HandshakeError::protocol(format!("unexpected response from {origin}: {e}"))
    })
}
