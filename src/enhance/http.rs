//! JSON-over-HTTP enhancement client.
//!
//! # Wire Format
//!
//! ```text
//! POST {endpoint}
//! Authorization: Bearer {credential}
//!
//! { "image": "<base64>", "mime_type": "image/png", "quality": "2K" }
//! ```
//!
//! A successful response carries the result the same way:
//!
//! ```text
//! { "image": "<base64>", "mime_type": "image/png", "finish_reason": "STOP" }
//! ```
//!
//! Non-2xx responses become a [`VendorError`] with the HTTP status, so the
//! orchestrator can tell authorization failures from other errors.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::VendorError;

use super::client::EnhancementClient;
use super::credential::Credential;
use super::quality::QualityLevel;

/// Default request timeout.
pub const DEFAULT_ENHANCE_TIMEOUT: Duration = Duration::from_secs(120);

/// Finish reason reported when the vendor blocks an image.
const SAFETY_FINISH_REASON: &str = "SAFETY";

/// Longest slice of an error body copied into a [`VendorError`].
const MAX_ERROR_BODY: usize = 512;

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct EnhanceRequestBody<'a> {
    image: String,
    mime_type: &'a str,
    quality: QualityLevel,
}

#[derive(Debug, Deserialize)]
struct EnhanceResponseBody {
    #[serde(default)]
    image: Option<String>,

    #[serde(default)]
    finish_reason: Option<String>,
}

// =============================================================================
// Client
// =============================================================================

/// [`EnhancementClient`] that talks to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpEnhancementClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpEnhancementClient {
    /// Create a client for `endpoint` with a per-request timeout.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, VendorError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VendorError::new(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EnhancementClient for HttpEnhancementClient {
    async fn enhance(
        &self,
        image: Bytes,
        quality: QualityLevel,
        credential: &Credential,
    ) -> Result<Bytes, VendorError> {
        let mime_type = image::guess_format(&image)
            .map(|format| format.to_mime_type())
            .unwrap_or("image/png");

        let body = EnhanceRequestBody {
            image: STANDARD.encode(&image),
            mime_type,
            quality,
        };

        debug!(endpoint = %self.endpoint, %quality, bytes = image.len(), "Sending enhancement request");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| VendorError::new(format!("request failed: {e}")))?;

        let status = response.status().as_u16();
        let payload = response
            .bytes()
            .await
            .map_err(|e| VendorError::new(format!("failed to read response: {e}")))?;

        interpret_response(status, &payload)
    }
}

/// Turn an HTTP status and body into the enhanced image or a vendor error.
pub fn interpret_response(status: u16, body: &[u8]) -> Result<Bytes, VendorError> {
    if !(200..300).contains(&status) {
        let text = String::from_utf8_lossy(body);
        let text: String = text.chars().take(MAX_ERROR_BODY).collect();
        warn!(status, "Enhancement service returned an error");
        return Err(VendorError::with_status(
            status,
            format!("HTTP {status}: {text}"),
        ));
    }

    let parsed: EnhanceResponseBody = serde_json::from_slice(body)
        .map_err(|e| VendorError::new(format!("malformed response: {e}")))?;

    if parsed.finish_reason.as_deref() == Some(SAFETY_FINISH_REASON) {
        return Err(VendorError::new("image was blocked by the safety policy"));
    }

    let encoded = parsed
        .image
        .filter(|data| !data.is_empty())
        .ok_or_else(|| VendorError::new("no image returned"))?;

    let decoded = STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| VendorError::new(format!("invalid base64 image: {e}")))?;

    Ok(Bytes::from(decoded))
}

// =============================================================================
// Tests
// =============================================================================
