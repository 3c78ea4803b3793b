//! Image slicer.
//!
//! Decodes a source image, crops one region per grid cell and re-encodes
//! each crop as a standalone PNG.
//!
//! # Design Decisions
//!
//! - **Always PNG**: tiles are lossless regardless of the source container,
//!   so a JPEG source is decoded once and never re-compressed lossily.
//!
//! - **Format sniffing**: the source format is guessed from its magic bytes;
//!   file names and MIME types are not trusted.
//!
//! - **All or nothing**: a failure on any cell aborts the split and no
//!   partial [`TileSet`] is returned.

use std::io::Cursor;

use bytes::Bytes;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use tracing::debug;

use crate::error::SliceError;

use super::geometry::{compute_geometry, TileRect};
use super::model::{Tile, TileSet};

/// Format every tile is encoded in.
pub const TILE_FORMAT: ImageFormat = ImageFormat::Png;

// =============================================================================
// Slicer
// =============================================================================

/// Splits encoded images into PNG tiles.
///
/// # Example
///
/// ```ignore
/// use tilesmith::tile::ImageSlicer;
///
/// let slicer = ImageSlicer::new();
/// let tiles = slicer.slice(&std::fs::read("photo.jpg")?, 3, 3)?;
/// assert_eq!(tiles.len(), 9);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ImageSlicer {}

impl ImageSlicer {
    pub fn new() -> Self {
        Self {}
    }

    /// Decode `source` and split it into a `rows x cols` tile set.
    ///
    /// # Errors
    ///
    /// - [`SliceError::Decode`] if `source` is not a supported raster image
    /// - [`SliceError::InvalidGeometry`] if the grid cannot partition the image
    /// - [`SliceError::Encode`] if a tile cannot be encoded
    pub fn slice(&self, source: &[u8], rows: u32, cols: u32) -> Result<TileSet, SliceError> {
        let image = self.decode(source)?;
        let (width, height) = image.dimensions();
        let geometry = compute_geometry(width, height, rows, cols)?;

        let tiles = self.slice_with_geometry(&image, &geometry)?;
        debug!(rows, cols, width, height, tiles = tiles.len(), "Sliced image");

        Ok(TileSet::new(rows, cols, (width, height), tiles))
    }

    /// Crop and encode one tile per geometry cell, in the given order.
    ///
    /// Cells must lie inside the image.
    pub fn slice_with_geometry(
        &self,
        image: &DynamicImage,
        geometry: &[TileRect],
    ) -> Result<Vec<Tile>, SliceError> {
        let (width, height) = image.dimensions();

        geometry
            .iter()
            .map(|rect| {
                if rect.width == 0
                    || rect.height == 0
                    || rect.right() > width
                    || rect.bottom() > height
                {
                    return Err(SliceError::InvalidGeometry {
                        reason: format!(
                            "cell ({}, {}) at {}x{}+{}+{} is outside a {}x{} image",
                            rect.row,
                            rect.col,
                            rect.width,
                            rect.height,
                            rect.x,
                            rect.y,
                            width,
                            height
                        ),
                    });
                }

                let crop = image.crop_imm(rect.x, rect.y, rect.width, rect.height);
                let encoded = encode_png(&crop).map_err(|message| SliceError::Encode {
                    row: rect.row,
                    col: rect.col,
                    message,
                })?;

                Tile::new(*rect, encoded)
            })
            .collect()
    }

    /// Decode an image, guessing its format from the content.
    pub fn decode(&self, source: &[u8]) -> Result<DynamicImage, SliceError> {
        reader(source)?
            .decode()
            .map_err(|e| SliceError::Decode {
                message: e.to_string(),
            })
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn reader(source: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, SliceError> {
    if source.is_empty() {
        return Err(SliceError::Decode {
            message: "source image is empty".to_string(),
        });
    }

    ImageReader::new(Cursor::new(source))
        .with_guessed_format()
        .map_err(|e| SliceError::Decode {
            message: e.to_string(),
        })
}

fn encode_png(image: &DynamicImage) -> Result<Bytes, String> {
    let mut output = Cursor::new(Vec::new());
    image
        .write_to(&mut output, TILE_FORMAT)
        .map_err(|e| e.to_string())?;
    Ok(Bytes::from(output.into_inner()))
}

// =============================================================================
// Tests
// =============================================================================
