//! Tile entities and their enhancement state machine.
//!
//! ```text
//!            begin              complete
//!   Idle ──────────► Enhancing ──────────► Enhanced
//!                     ▲    │
//!               begin │    │ fail
//!                     │    ▼
//!                     Failed
//! ```
//!
//! `Enhanced` is terminal: a second `begin` is reported as
//! [`BeginEnhancement::AlreadyEnhanced`] and changes nothing.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enhance::QualityLevel;
use crate::error::SliceError;

use super::geometry::TileRect;

// =============================================================================
// Identifiers and Status
// =============================================================================

/// Opaque tile identifier, unique for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileId(String);

impl TileId {
    /// Allocate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TileId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TileId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Enhancement status of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TileStatus {
    #[default]
    Idle,
    Enhancing,
    Enhanced,
    Failed,
}

/// Result of asking a tile to enter the `Enhancing` state.
#[derive(Debug, Clone)]
pub enum BeginEnhancement {
    /// The tile moved to `Enhancing`; send this image to the service.
    Started { image: Bytes },

    /// An enhancement is already outstanding for this tile.
    InFlight,

    /// The tile already holds an enhanced image.
    AlreadyEnhanced,
}

// =============================================================================
// Tile
// =============================================================================

/// One rectangular crop of a source image.
#[derive(Debug, Clone)]
pub struct Tile {
    id: TileId,
    rect: TileRect,
    original_image: Bytes,
    enhanced_image: Option<Bytes>,
    status: TileStatus,
    requested_quality: Option<QualityLevel>,
    enhanced_quality: Option<QualityLevel>,
    last_error: Option<String>,
}

impl Tile {
    /// Create an idle tile for the given cell.
    ///
    /// # Errors
    ///
    /// Returns [`SliceError::Encode`] if `original_image` is empty.
    pub fn new(rect: TileRect, original_image: Bytes) -> Result<Self, SliceError> {
        if original_image.is_empty() {
            return Err(SliceError::Encode {
                row: rect.row,
                col: rect.col,
                message: "encoded tile is empty".to_string(),
            });
        }

        Ok(Self {
            id: TileId::generate(),
            rect,
            original_image,
            enhanced_image: None,
            status: TileStatus::Idle,
            requested_quality: None,
            enhanced_quality: None,
            last_error: None,
        })
    }

    pub fn id(&self) -> &TileId {
        &self.id
    }

    pub fn row(&self) -> u32 {
        self.rect.row
    }

    pub fn col(&self) -> u32 {
        self.rect.col
    }

    /// Source region this tile was cropped from.
    pub fn rect(&self) -> &TileRect {
        &self.rect
    }

    pub fn original_image(&self) -> &Bytes {
        &self.original_image
    }

    pub fn enhanced_image(&self) -> Option<&Bytes> {
        self.enhanced_image.as_ref()
    }

    pub fn status(&self) -> TileStatus {
        self.status
    }

    /// Quality of the outstanding (or most recent failed) attempt.
    pub fn requested_quality(&self) -> Option<QualityLevel> {
        self.requested_quality
    }

    /// Quality the stored enhanced image was produced at.
    pub fn enhanced_quality(&self) -> Option<QualityLevel> {
        self.enhanced_quality
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_enhanced(&self) -> bool {
        self.status == TileStatus::Enhanced
    }

    /// Enhanced image if present, otherwise the original.
    pub fn best_image(&self) -> &Bytes {
        self.enhanced_image.as_ref().unwrap_or(&self.original_image)
    }

    /// Try to move into `Enhancing` at `quality`.
    ///
    /// Only `Idle` and `Failed` tiles start; the others are left untouched.
    pub fn begin_enhancement(&mut self, quality: QualityLevel) -> BeginEnhancement {
        match self.status {
            TileStatus::Enhancing => BeginEnhancement::InFlight,
            TileStatus::Enhanced => BeginEnhancement::AlreadyEnhanced,
            TileStatus::Idle | TileStatus::Failed => {
                self.status = TileStatus::Enhancing;
                self.requested_quality = Some(quality);
                self.last_error = None;
                BeginEnhancement::Started {
                    image: self.original_image.clone(),
                }
            }
        }
    }

    /// Store the service result. Returns `false` unless the tile was
    /// `Enhancing`.
    pub fn complete_enhancement(&mut self, image: Bytes) -> bool {
        if self.status != TileStatus::Enhancing {
            return false;
        }
        self.status = TileStatus::Enhanced;
        self.enhanced_image = Some(image);
        self.enhanced_quality = self.requested_quality.take();
        true
    }

    /// Record a failed attempt. Returns `false` unless the tile was
    /// `Enhancing`.
    pub fn fail_enhancement(&mut self, message: impl Into<String>) -> bool {
        if self.status != TileStatus::Enhancing {
            return false;
        }
        self.status = TileStatus::Failed;
        self.last_error = Some(message.into());
        true
    }
}

// =============================================================================
// Tile Set
// =============================================================================

/// Tiles produced by one split, in row-major order.
#[derive(Debug, Clone, Default)]
pub struct TileSet {
    rows: u32,
    cols: u32,
    source_width: u32,
    source_height: u32,
    tiles: Vec<Tile>,
}

impl TileSet {
    /// Build a set from tiles already in row-major order.
    pub fn new(rows: u32, cols: u32, source_dimensions: (u32, u32), tiles: Vec<Tile>) -> Self {
        Self {
            rows,
            cols,
            source_width: source_dimensions.0,
            source_height: source_dimensions.1,
            tiles,
        }
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// `(width, height)` of the image the set was cut from.
    pub fn source_dimensions(&self) -> (u32, u32) {
        (self.source_width, self.source_height)
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tile> {
        self.tiles.iter()
    }

    pub fn into_tiles(self) -> Vec<Tile> {
        self.tiles
    }
}

impl<'a> IntoIterator for &'a TileSet {
    type Item = &'a Tile;
    type IntoIter = std::slice::Iter<'a, Tile>;

    fn into_iter(self) -> Self::IntoIter {
        self.tiles.iter()
    }
}

// =============================================================================
// Tests
// =============================================================================
