//! HTTP server layer for Tilesmith.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │     POST /split   GET /tiles   POST /tiles/{id}/enhance   ...   │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  handlers   │  │    auth     │  │        routes           │  │
//! │  │ (requests)  │  │ (bearer)    │  │  (router config)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!               TileRegistry · EnhancementOrchestrator
//! ```

pub mod auth;
pub mod handlers;
pub mod routes;

pub use auth::{auth_middleware, AccessTokenAuth, AuthError};
pub use handlers::{
    ApiError, AppState, CredentialRequest, CredentialStatusResponse, EnhanceQueryParams,
    EnhanceResponse, ErrorResponse, HealthResponse, SplitQueryParams, TileSetResponse,
    TileSummary,
};
pub use routes::{create_router, RouterConfig, DEFAULT_MAX_UPLOAD_BYTES};
