//! # Tilesmith
//!
//! Splits an image into a grid of tiles, enhances individual tiles through an
//! external image-enhancement service, and bundles the results for download.
//!
//! ## Features
//!
//! - **Deterministic tiling**: Exact row-major partition of the source, one PNG per cell
//! - **Per-tile enhancement**: At most one request in flight per tile; results
//!   for tiles from a replaced split are discarded
//! - **Best-available export**: Single images or a zip of every tile, preferring
//!   enhanced images
//! - **HTTP service**: Axum routes for split, list, enhance, export and
//!   credential management, with optional bearer-token access control
//!
//! ## Architecture
//!
//! - [`tile`] - Geometry, slicing, tile model and the registry
//! - [`enhance`] - Enhancement client trait, HTTP client, credentials, orchestrator
//! - [`export`] - Single-image and zip export
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use tilesmith::{BundleExporter, ImageSlicer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = std::fs::read("photo.jpg")?;
//! let tiles = ImageSlicer::new().slice(&source, 3, 3)?;
//! let archive = BundleExporter::new().export_all(&tiles)?;
//! std::fs::write("tiles.zip", &archive)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod enhance;
pub mod error;
pub mod export;
pub mod server;
pub mod tile;

// Re-export commonly used types
pub use config::{Cli, Command, EnhanceArgs, ServeConfig, SplitConfig};
pub use enhance::{
    Credential, CredentialProvider, CredentialStore, EnhancementClient, EnhancementOrchestrator,
    EnhancementOutcome, EnvCredentialProvider, HttpEnhancementClient, QualityLevel,
};
pub use error::{EnhanceError, ExportError, SliceError, VendorError};
pub use export::{archive_filename, BundleExporter, ExportedImage};
pub use server::{create_router, AppState, RouterConfig};
pub use tile::{
    compute_geometry, ImageSlicer, Tile, TileId, TileRect, TileRegistry, TileSet, TileStatus,
};
