//! Grid geometry for splitting an image into tiles.
//!
//! Cell boundaries are placed at the integer floor of the ideal fractional
//! boundary, so column `c` of an image `W` pixels wide starts at
//! `floor(c * W / cols)` and the final boundary is exactly `W`:
//!
//! ```text
//!   W = 10, cols = 3
//!
//!   0        3        6          10
//!   ├────────┼────────┼──────────┤
//!   │  c=0   │  c=1   │   c=2    │
//!   └────────┴────────┴──────────┘
//! ```
//!
//! Tiles never overlap, never leave a gap, and differ in size by at most one
//! pixel. When the image size divides evenly this is the same as
//! `x = col * (W / cols)`.

use serde::Serialize;

use crate::error::SliceError;

/// Recommended upper bound for rows and columns, applied by callers.
pub const MAX_GRID_DIMENSION: u32 = 10;

/// One cell of a tile grid, in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TileRect {
    /// Zero-based grid row
    pub row: u32,

    /// Zero-based grid column
    pub col: u32,

    /// Left edge in pixels
    pub x: u32,

    /// Top edge in pixels
    pub y: u32,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,
}

impl TileRect {
    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// Compute the row-major partition of a `width x height` image into
/// `rows x cols` cells.
///
/// # Errors
///
/// Returns [`SliceError::InvalidGeometry`] if any dimension is zero, or if
/// the grid is finer than the image (a cell would be empty).
pub fn compute_geometry(
    width: u32,
    height: u32,
    rows: u32,
    cols: u32,
) -> Result<Vec<TileRect>, SliceError> {
    if rows == 0 || cols == 0 {
        return Err(SliceError::InvalidGeometry {
            reason: format!("grid must have at least one row and column, got {rows}x{cols}"),
        });
    }
    if width == 0 || height == 0 {
        return Err(SliceError::InvalidGeometry {
            reason: format!("image has no pixels ({width}x{height})"),
        });
    }
    if cols > width || rows > height {
        return Err(SliceError::InvalidGeometry {
            reason: format!("{rows}x{cols} grid is finer than a {width}x{height} image"),
        });
    }

    let mut rects = Vec::with_capacity(rows as usize * cols as usize);
    for row in 0..rows {
        let y = boundary(row, height, rows);
        let y_end = boundary(row + 1, height, rows);
        for col in 0..cols {
            let x = boundary(col, width, cols);
            let x_end = boundary(col + 1, width, cols);
            rects.push(TileRect {
                row,
                col,
                x,
                y,
                width: x_end - x,
                height: y_end - y,
            });
        }
    }

    Ok(rects)
}

/// Check a requested grid against the caller-side bound `1..=max`.
pub fn validate_grid(rows: u32, cols: u32, max: u32) -> Result<(), SliceError> {
    let in_range = |n: u32| (1..=max).contains(&n);
    if in_range(rows) && in_range(cols) {
        Ok(())
    } else {
        Err(SliceError::InvalidGeometry {
            reason: format!("rows and cols must be between 1 and {max}, got {rows}x{cols}"),
        })
    }
}

#[inline]
fn boundary(index: u32, extent: u32, parts: u32) -> u32 {
    // u64 keeps index * extent from overflowing for large images
    ((index as u64 * extent as u64) / parts as u64) as u32
}

// =============================================================================
// Tests
// =============================================================================
