//! Tile layer.
//!
//! This module turns a source image into a set of tiles and keeps track of
//! the current set while tiles move through enhancement.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          source image bytes             │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              ImageSlicer                │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │ TileGeometry │  │   PNG encoder   │  │
//! │  │ (row-major   │  │  (crop →        │  │
//! │  │   cells)     │  │   encode)       │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │ TileSet
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │             TileRegistry                │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`compute_geometry`]: Partition of image dimensions into [`TileRect`] cells
//! - [`ImageSlicer`]: Decodes the source and encodes one PNG per cell
//! - [`Tile`]: One crop plus its enhancement state
//! - [`TileSet`]: Tiles of one split, row-major
//! - [`TileRegistry`]: The current working set, addressable by [`TileId`]

mod geometry;
mod model;
mod registry;
mod slicer;

pub use geometry::{compute_geometry, validate_grid, TileRect, MAX_GRID_DIMENSION};
pub use model::{BeginEnhancement, Tile, TileId, TileSet, TileStatus};
pub use registry::TileRegistry;
pub use slicer::{ImageSlicer, TILE_FORMAT};
