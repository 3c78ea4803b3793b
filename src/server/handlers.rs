//! HTTP request handlers for the Tilesmith API.
//!
//! # Endpoints
//!
//! - `POST /split?rows={r}&cols={c}` - Split the request body into a new tile set
//! - `GET /tiles` - List the current tile set
//! - `GET /tiles/{id}` - Tile metadata
//! - `GET /tiles/{id}/image` - Download the best available image of a tile
//! - `POST /tiles/{id}/enhance?quality={1K|2K|4K}` - Enhance one tile
//! - `GET /export` - Download every tile as a zip archive
//! - `GET|PUT|DELETE /credential` - Manage the enhancement credential
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::enhance::{
    Credential, CredentialProvider, CredentialStore, EnhancementClient, EnhancementOrchestrator,
    EnhancementOutcome, QualityLevel,
};
use crate::error::{EnhanceError, ExportError, SliceError};
use crate::export::{archive_filename, BundleExporter};
use crate::tile::{
    validate_grid, ImageSlicer, Tile, TileId, TileRegistry, TileSet, TileStatus,
    MAX_GRID_DIMENSION,
};

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<C: EnhancementClient> {
    /// The current tile set
    pub registry: Arc<TileRegistry>,

    /// Enhancement driver sharing `registry` and `credentials`
    pub orchestrator: Arc<EnhancementOrchestrator<C, CredentialStore>>,

    /// Runtime-settable enhancement credential
    pub credentials: Arc<CredentialStore>,

    pub slicer: ImageSlicer,

    pub exporter: BundleExporter,

    /// Upper bound for rows and columns of a split
    pub max_grid: u32,
}

impl<C: EnhancementClient> AppState<C> {
    /// Create state with an empty registry around `client` and `credentials`.
    pub fn new(client: C, credentials: CredentialStore) -> Self {
        let registry = Arc::new(TileRegistry::new());
        let credentials = Arc::new(credentials);
        let orchestrator = Arc::new(EnhancementOrchestrator::new(
            Arc::clone(&registry),
            Arc::new(client),
            Arc::clone(&credentials),
        ));

        Self {
            registry,
            orchestrator,
            credentials,
            slicer: ImageSlicer::new(),
            exporter: BundleExporter::new(),
            max_grid: MAX_GRID_DIMENSION,
        }
    }

    /// Use `exporter` for archive downloads.
    pub fn with_exporter(mut self, exporter: BundleExporter) -> Self {
        self.exporter = exporter;
        self
    }

    /// Override the rows/cols bound.
    pub fn with_max_grid(mut self, max_grid: u32) -> Self {
        self.max_grid = max_grid;
        self
    }
}

impl<C: EnhancementClient> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            orchestrator: Arc::clone(&self.orchestrator),
            credentials: Arc::clone(&self.credentials),
            slicer: self.slicer.clone(),
            exporter: self.exporter.clone(),
            max_grid: self.max_grid,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Query parameters for split requests.
#[derive(Debug, Deserialize)]
pub struct SplitQueryParams {
    #[serde(default = "default_grid")]
    pub rows: u32,

    #[serde(default = "default_grid")]
    pub cols: u32,
}

fn default_grid() -> u32 {
    3
}

/// Query parameters for enhance requests.
#[derive(Debug, Deserialize)]
pub struct EnhanceQueryParams {
    /// Requested tier (defaults to 1K)
    #[serde(default)]
    pub quality: QualityLevel,
}

/// Body of `PUT /credential`.
#[derive(Debug, Deserialize)]
pub struct CredentialRequest {
    pub api_key: String,
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_geometry")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

/// Metadata for one tile.
#[derive(Debug, Serialize)]
pub struct TileSummary {
    pub id: TileId,
    pub row: u32,
    pub col: u32,

    /// Source region in pixels
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,

    pub status: TileStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_quality: Option<QualityLevel>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhanced_quality: Option<QualityLevel>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Size of the original crop in bytes
    pub original_bytes: usize,

    /// Size of the enhanced image in bytes, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhanced_bytes: Option<usize>,
}

impl From<&Tile> for TileSummary {
    fn from(tile: &Tile) -> Self {
        let rect = tile.rect();
        Self {
            id: tile.id().clone(),
            row: tile.row(),
            col: tile.col(),
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            status: tile.status(),
            requested_quality: tile.requested_quality(),
            enhanced_quality: tile.enhanced_quality(),
            last_error: tile.last_error().map(str::to_string),
            original_bytes: tile.original_image().len(),
            enhanced_bytes: tile.enhanced_image().map(|image| image.len()),
        }
    }
}

/// The current tile set.
#[derive(Debug, Serialize)]
pub struct TileSetResponse {
    pub rows: u32,
    pub cols: u32,

    /// Source image width in pixels
    pub width: u32,

    /// Source image height in pixels
    pub height: u32,

    /// Tiles in row-major order
    pub tiles: Vec<TileSummary>,
}

impl From<&TileSet> for TileSetResponse {
    fn from(set: &TileSet) -> Self {
        let (width, height) = set.source_dimensions();
        Self {
            rows: set.rows(),
            cols: set.cols(),
            width,
            height,
            tiles: set.iter().map(TileSummary::from).collect(),
        }
    }
}

/// Result of an enhance request.
#[derive(Debug, Serialize)]
pub struct EnhanceResponse {
    /// One of "enhanced", "in_flight", "already_enhanced", "superseded"
    pub outcome: &'static str,

    /// Current state of the tile (absent when superseded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile: Option<TileSummary>,
}

/// Credential status. Never includes the secret.
#[derive(Debug, Serialize)]
pub struct CredentialStatusResponse {
    pub configured: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Errors returned by handlers.
#[derive(Debug)]
pub enum ApiError {
    Slice(SliceError),
    Enhance(EnhanceError),
    Export(ExportError),
    TileNotFound(String),
    BadRequest(String),
    Internal(String),
}

impl From<SliceError> for ApiError {
    fn from(err: SliceError) -> Self {
        ApiError::Slice(err)
    }
}

impl From<EnhanceError> for ApiError {
    fn from(err: EnhanceError) -> Self {
        ApiError::Enhance(err)
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        ApiError::Export(err)
    }
}

/// Convert ApiError to HTTP response.
///
/// This implementation logs errors appropriately based on their severity:
/// - 4xx errors are logged at WARN level (client errors)
/// - 5xx errors are logged at ERROR level (server errors)
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            ApiError::Slice(err @ SliceError::InvalidGeometry { .. }) => {
                (StatusCode::BAD_REQUEST, "invalid_geometry", err.to_string())
            }
            ApiError::Slice(err @ SliceError::Decode { .. }) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "decode_error",
                err.to_string(),
            ),
            ApiError::Slice(err @ SliceError::Encode { .. }) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "encode_error",
                err.to_string(),
            ),

            ApiError::Enhance(err @ EnhanceError::CredentialMissing) => (
                StatusCode::PRECONDITION_REQUIRED,
                "credential_missing",
                err.to_string(),
            ),
            ApiError::Enhance(err @ EnhanceError::PermissionDenied { .. }) => {
                (StatusCode::FORBIDDEN, "permission_denied", err.to_string())
            }
            ApiError::Enhance(err @ EnhanceError::Service { .. }) => {
                (StatusCode::BAD_GATEWAY, "service_error", err.to_string())
            }
            ApiError::Enhance(err @ EnhanceError::TileNotFound { .. }) => {
                (StatusCode::NOT_FOUND, "not_found", err.to_string())
            }

            ApiError::Export(err @ ExportError::EmptySet) => {
                (StatusCode::CONFLICT, "empty_set", err.to_string())
            }
            ApiError::Export(err @ ExportError::Archive(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "archive_error",
                err.to_string(),
            ),

            ApiError::TileNotFound(id) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Tile not found: {}", id),
            ),
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, "invalid_request", message.clone())
            }
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                message.clone(),
            ),
        };

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let body = ErrorResponse::with_status(error_type, message, status);
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Split the uploaded image and replace the current tile set.
pub async fn split_handler<C: EnhancementClient + 'static>(
    State(state): State<AppState<C>>,
    Query(params): Query<SplitQueryParams>,
    body: Bytes,
) -> Result<Json<TileSetResponse>, ApiError> {
    validate_grid(params.rows, params.cols, state.max_grid)?;
    if body.is_empty() {
        return Err(ApiError::BadRequest(
            "Request body must contain an image".to_string(),
        ));
    }

    // Decoding and PNG encoding are CPU-bound
    let slicer = state.slicer.clone();
    let (rows, cols) = (params.rows, params.cols);
    let tile_set = tokio::task::spawn_blocking(move || slicer.slice(&body, rows, cols))
        .await
        .map_err(|e| ApiError::Internal(format!("split task failed: {}", e)))??;

    let response = TileSetResponse::from(&tile_set);
    let generation = state.registry.replace_all(tile_set).await;
    info!(rows, cols, generation, "New tile set");

    Ok(Json(response))
}

/// List the current tile set.
pub async fn tiles_handler<C: EnhancementClient + 'static>(
    State(state): State<AppState<C>>,
) -> Json<TileSetResponse> {
    let snapshot = state.registry.snapshot().await;
    Json(TileSetResponse::from(&snapshot))
}

/// Metadata for one tile.
pub async fn tile_handler<C: EnhancementClient + 'static>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> Result<Json<TileSummary>, ApiError> {
    let tile = find_tile(&state, id).await?;
    Ok(Json(TileSummary::from(&tile)))
}

/// Download the best available image of one tile.
pub async fn tile_image_handler<C: EnhancementClient + 'static>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let tile = find_tile(&state, id).await?;
    let exported = state.exporter.export_single(&tile);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, exported.content_type.to_string()),
            (header::CONTENT_DISPOSITION, attachment(&exported.filename)),
        ],
        exported.data,
    )
        .into_response())
}

/// Enhance one tile.
///
/// Responds `200` once the service returned, or `202` when another request
/// for the same tile is still outstanding.
///
/// The orchestration runs on its own task so that a client disconnecting
/// mid-call does not cut the enhancement short.
pub async fn enhance_handler<C: EnhancementClient + 'static>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
    Query(params): Query<EnhanceQueryParams>,
) -> Result<Response, ApiError> {
    let tile_id = TileId::from(id);
    let orchestrator = Arc::clone(&state.orchestrator);
    let task_tile_id = tile_id.clone();
    let quality = params.quality;

    let outcome = tokio::spawn(async move {
        orchestrator
            .request_enhancement(&task_tile_id, quality)
            .await
    })
    .await
    .map_err(|e| ApiError::Internal(format!("enhancement task failed: {}", e)))??;

    let (status, label, tile) = match outcome {
        EnhancementOutcome::Enhanced(tile) => (StatusCode::OK, "enhanced", Some(tile)),
        EnhancementOutcome::InFlight => (
            StatusCode::ACCEPTED,
            "in_flight",
            state.registry.get(&tile_id).await,
        ),
        EnhancementOutcome::AlreadyEnhanced => (
            StatusCode::OK,
            "already_enhanced",
            state.registry.get(&tile_id).await,
        ),
        EnhancementOutcome::Superseded => (StatusCode::OK, "superseded", None),
    };

    let body = EnhanceResponse {
        outcome: label,
        tile: tile.as_ref().map(TileSummary::from),
    };
    Ok((status, Json(body)).into_response())
}

/// Download every tile of the current set as a zip archive.
pub async fn export_handler<C: EnhancementClient + 'static>(
    State(state): State<AppState<C>>,
) -> Result<Response, ApiError> {
    let snapshot = state.registry.snapshot().await;
    let exporter = state.exporter.clone();

    let archive = tokio::task::spawn_blocking(move || exporter.export_all(&snapshot))
        .await
        .map_err(|e| ApiError::Internal(format!("export task failed: {}", e)))??;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, attachment(&archive_filename())),
        ],
        archive,
    )
        .into_response())
}

/// Report whether a credential is configured.
pub async fn credential_status_handler<C: EnhancementClient + 'static>(
    State(state): State<AppState<C>>,
) -> Json<CredentialStatusResponse> {
    Json(credential_status(&state.credentials))
}

/// Store a new credential.
pub async fn set_credential_handler<C: EnhancementClient + 'static>(
    State(state): State<AppState<C>>,
    Json(request): Json<CredentialRequest>,
) -> Result<Json<CredentialStatusResponse>, ApiError> {
    let credential = Credential::new(request.api_key)
        .ok_or_else(|| ApiError::BadRequest("api_key must not be blank".to_string()))?;
    state.credentials.set(credential);
    Ok(Json(credential_status(&state.credentials)))
}

/// Remove the stored credential.
pub async fn clear_credential_handler<C: EnhancementClient + 'static>(
    State(state): State<AppState<C>>,
) -> StatusCode {
    state.credentials.clear();
    StatusCode::NO_CONTENT
}

// =============================================================================
// Helpers
// =============================================================================

async fn find_tile<C: EnhancementClient>(state: &AppState<C>, id: String) -> Result<Tile, ApiError> {
    let tile_id = TileId::from(id);
    state
        .registry
        .get(&tile_id)
        .await
        .ok_or_else(|| ApiError::TileNotFound(tile_id.to_string()))
}

fn credential_status(store: &CredentialStore) -> CredentialStatusResponse {
    let credential = store.credential();
    CredentialStatusResponse {
        configured: credential.is_some(),
        fingerprint: credential.map(|c| c.fingerprint()),
    }
}

fn attachment(filename: &str) -> String {
    format!("attachment; filename=\"{}\"", filename)
}

// =============================================================================
// Tests
// =============================================================================
