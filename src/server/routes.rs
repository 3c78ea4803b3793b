//! Router configuration for Tilesmith.
//!
//! # Route Structure
//!
//! ```text
//! /health                    - Health check (public)
//! /split                     - Split an uploaded image (protected)
//! /tiles                     - Current tile set (protected)
//! /tiles/{id}                - Tile metadata (protected)
//! /tiles/{id}/image          - Tile image download (protected)
//! /tiles/{id}/enhance        - Enhance a tile (protected)
//! /export                    - Zip of all tiles (protected)
//! /credential                - Enhancement credential (protected)
//! ```
//!
//! "Protected" routes require a bearer token only when one is configured.
//!
//! # Example
//!
//! ```ignore
//! use tilesmith::enhance::{CredentialStore, HttpEnhancementClient, DEFAULT_ENHANCE_TIMEOUT};
//! use tilesmith::server::{create_router, AppState, RouterConfig};
//!
//! let client = HttpEnhancementClient::new("https://enhance.example.com/v1", DEFAULT_ENHANCE_TIMEOUT)?;
//! let state = AppState::new(client, CredentialStore::new());
//! let router = create_router(state, RouterConfig::new().with_access_token("token"));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use http::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::{auth_middleware, AccessTokenAuth};
use super::handlers::{
    clear_credential_handler, credential_status_handler, enhance_handler, export_handler,
    health_handler, set_credential_handler, split_handler, tile_handler, tile_image_handler,
    tiles_handler, AppState,
};
use crate::enhance::EnhancementClient;

/// Default request body limit (50 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone)]
pub struct RouterConfig {
    /// Bearer token required on protected routes (None = open)
    pub access_token: Option<String>,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Largest accepted request body in bytes
    pub max_upload_bytes: usize,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Open router: no access token, any CORS origin, 50 MiB uploads, tracing on.
    pub fn new() -> Self {
        Self {
            access_token: None,
            cors_origins: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            enable_tracing: true,
        }
    }

    /// Require `Authorization: Bearer {token}` on protected routes.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// This function builds the complete Axum router with:
/// - Public routes (health check)
/// - API routes, behind the access token if one is configured
/// - Body size limit, CORS and (optional) request tracing
pub fn create_router<C>(state: AppState<C>, config: RouterConfig) -> Router
where
    C: EnhancementClient + 'static,
{
    let api_routes = Router::new()
        .route("/split", post(split_handler::<C>))
        .route("/tiles", get(tiles_handler::<C>))
        .route("/tiles/{id}", get(tile_handler::<C>))
        .route("/tiles/{id}/image", get(tile_image_handler::<C>))
        .route("/tiles/{id}/enhance", post(enhance_handler::<C>))
        .route("/export", get(export_handler::<C>))
        .route(
            "/credential",
            get(credential_status_handler::<C>)
                .put(set_credential_handler::<C>)
                .delete(clear_credential_handler::<C>),
        )
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes));

    let api_routes = match &config.access_token {
        Some(token) => api_routes.layer(middleware::from_fn_with_state(
            AccessTokenAuth::new(token),
            auth_middleware,
        )),
        None => api_routes,
    };

    let router = Router::new()
        .route("/health", get(health_handler))
        .merge(api_routes)
        .layer(build_cors_layer(&config));

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .expose_headers([CONTENT_DISPOSITION])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
