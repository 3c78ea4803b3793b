//! Enhancement Orchestrator driving one tile through an enhancement call.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   request_enhancement()                         │
//! │  1. Fetch credential          4. Call client (single attempt)   │
//! │  2. Begin (atomic in registry) 5. Classify failure              │
//! │  3. Short-circuit no-ops      6. Store result (if still current)│
//! └─────────────────────────────────────────────────────────────────┘
//!           │                    │                    │
//!           ▼                    ▼                    ▼
//!   ┌──────────────────┐  ┌──────────────┐  ┌───────────────────┐
//!   │CredentialProvider│  │ TileRegistry │  │ EnhancementClient │
//!   └──────────────────┘  └──────────────┘  └───────────────────┘
//! ```
//!
//! The transition into `Enhancing` happens inside one registry update, before
//! the client is awaited. A second request for the same tile therefore sees
//! `Enhancing` and returns without calling the service.
//!
//! A request future dropped mid-call (for example by a disconnecting HTTP
//! client) does not strand the tile: it is moved to `Failed` so it can be
//! retried.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{EnhanceError, VendorError};
use crate::tile::{BeginEnhancement, Tile, TileId, TileRegistry};

use super::client::EnhancementClient;
use super::credential::CredentialProvider;
use super::quality::QualityLevel;

/// Vendor message fragments that indicate an authorization failure.
const PERMISSION_MARKERS: [&str; 3] = ["403", "permission", "requested entity was not found"];

/// Failure recorded for a tile whose request was dropped before completing.
const ABANDONED_MESSAGE: &str = "enhancement request abandoned before completion";

// =============================================================================
// Outcome
// =============================================================================

/// What a successful call to
/// [`EnhancementOrchestrator::request_enhancement`] did.
#[derive(Debug, Clone)]
pub enum EnhancementOutcome {
    /// The service returned an image; this is the updated tile.
    Enhanced(Tile),

    /// Another request for this tile is outstanding; nothing was sent.
    InFlight,

    /// The tile was already enhanced; nothing was sent.
    AlreadyEnhanced,

    /// The tile set was replaced while the request was in flight; the
    /// result was discarded.
    Superseded,
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Runs enhancement requests against a shared [`TileRegistry`].
///
/// # Type Parameters
///
/// * `C` - The enhancement client
/// * `P` - The credential provider
pub struct EnhancementOrchestrator<C, P> {
    registry: Arc<TileRegistry>,
    client: Arc<C>,
    credentials: Arc<P>,
}

impl<C, P> EnhancementOrchestrator<C, P>
where
    C: EnhancementClient,
    P: CredentialProvider,
{
    pub fn new(registry: Arc<TileRegistry>, client: Arc<C>, credentials: Arc<P>) -> Self {
        Self {
            registry,
            client,
            credentials,
        }
    }

    /// Enhance one tile at `quality`.
    ///
    /// No-ops (tile already enhancing or enhanced) are reported through
    /// [`EnhancementOutcome`] rather than as errors. Nothing is retried.
    ///
    /// # Errors
    ///
    /// - [`EnhanceError::CredentialMissing`] before any network call
    /// - [`EnhanceError::TileNotFound`] if `tile_id` is not in the current set
    /// - [`EnhanceError::PermissionDenied`] / [`EnhanceError::Service`] when
    ///   the client fails; the tile is left `Failed`
    pub async fn request_enhancement(
        &self,
        tile_id: &TileId,
        quality: QualityLevel,
    ) -> Result<EnhancementOutcome, EnhanceError> {
        let credential = self
            .credentials
            .credential()
            .ok_or(EnhanceError::CredentialMissing)?;

        let begin = self
            .registry
            .update(tile_id, |tile| tile.begin_enhancement(quality))
            .await
            .ok_or_else(|| EnhanceError::TileNotFound {
                tile_id: tile_id.to_string(),
            })?;

        let image = match begin {
            BeginEnhancement::Started { image } => image,
            BeginEnhancement::InFlight => {
                debug!(tile_id = %tile_id, "Enhancement already in flight");
                return Ok(EnhancementOutcome::InFlight);
            }
            BeginEnhancement::AlreadyEnhanced => {
                debug!(tile_id = %tile_id, "Tile already enhanced");
                return Ok(EnhancementOutcome::AlreadyEnhanced);
            }
        };

        let pending = PendingEnhancement::new(Arc::clone(&self.registry), tile_id.clone());
        info!(tile_id = %tile_id, %quality, "Requesting enhancement");

        let result = self
            .client
            .enhance(image, quality, &credential)
            .await
            .and_then(|enhanced| {
                if enhanced.is_empty() {
                    Err(VendorError::new("no image returned"))
                } else {
                    Ok(enhanced)
                }
            });

        match result {
            Ok(enhanced) => {
                let updated = self
                    .registry
                    .update(tile_id, |tile| {
                        tile.complete_enhancement(enhanced);
                        tile.clone()
                    })
                    .await;
                pending.settle();

                match updated {
                    Some(tile) => {
                        info!(tile_id = %tile_id, %quality, "Tile enhanced");
                        Ok(EnhancementOutcome::Enhanced(tile))
                    }
                    None => {
                        debug!(tile_id = %tile_id, "Discarding result for superseded tile");
                        Ok(EnhancementOutcome::Superseded)
                    }
                }
            }
            Err(vendor_error) => {
                let error = classify(&vendor_error);
                let message = error.to_string();

                let recorded = self
                    .registry
                    .update(tile_id, |tile| tile.fail_enhancement(message))
                    .await;
                pending.settle();
                if recorded.is_none() {
                    debug!(tile_id = %tile_id, "Failure for superseded tile");
                }

                warn!(tile_id = %tile_id, %quality, error = %error, "Enhancement failed");
                Err(error)
            }
        }
    }

    pub fn registry(&self) -> &Arc<TileRegistry> {
        &self.registry
    }

    pub fn credentials(&self) -> &Arc<P> {
        &self.credentials
    }
}

// =============================================================================
// Pending Guard
// =============================================================================

/// Held while a tile is `Enhancing` on behalf of one request.
///
/// Dropping it unsettled moves the tile to `Failed` on a background task.
struct PendingEnhancement {
    registry: Arc<TileRegistry>,
    tile_id: TileId,
    settled: bool,
}

impl PendingEnhancement {
    fn new(registry: Arc<TileRegistry>, tile_id: TileId) -> Self {
        Self {
            registry,
            tile_id,
            settled: false,
        }
    }

    /// The outcome has been written to the registry.
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for PendingEnhancement {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(tile_id = %self.tile_id, "No runtime to release abandoned tile");
            return;
        };

        warn!(tile_id = %self.tile_id, "Enhancement request dropped in flight");
        let registry = Arc::clone(&self.registry);
        let tile_id = self.tile_id.clone();
        runtime.spawn(async move {
            registry
                .update(&tile_id, |tile| tile.fail_enhancement(ABANDONED_MESSAGE))
                .await;
        });
    }
}

/// Map a raw client failure onto the enhancement error taxonomy.
///
/// HTTP 401/403, or a message mentioning a 403, a permission problem or an
/// unknown entity, is [`EnhanceError::PermissionDenied`]; anything else is
/// [`EnhanceError::Service`].
pub fn classify(error: &VendorError) -> EnhanceError {
    let message = error.message.clone();

    if matches!(error.status, Some(401) | Some(403)) {
        return EnhanceError::PermissionDenied { message };
    }

    let lower = message.to_lowercase();
    if PERMISSION_MARKERS.iter().any(|marker| lower.contains(marker)) {
        EnhanceError::PermissionDenied { message }
    } else {
        EnhanceError::Service { message }
    }
}

// =============================================================================
// Tests
// =============================================================================
