//! Enhancement client abstraction.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::VendorError;

use super::credential::Credential;
use super::quality::QualityLevel;

/// Trait for services that return an improved version of an image.
///
/// This abstraction lets the orchestrator work with any vendor (or a mock in
/// tests). Implementations make a single attempt per call; retries and
/// error classification belong to the caller. Timeouts are the
/// implementation's concern.
#[async_trait]
pub trait EnhancementClient: Send + Sync {
    /// Enhance `image` at `quality`.
    ///
    /// # Arguments
    /// * `image` - Encoded source image (PNG for sliced tiles)
    /// * `quality` - Requested output tier
    /// * `credential` - Secret authorizing the call
    ///
    /// # Returns
    /// The encoded enhanced image.
    async fn enhance(
        &self,
        image: Bytes,
        quality: QualityLevel,
        credential: &Credential,
    ) -> Result<Bytes, VendorError>;
}
