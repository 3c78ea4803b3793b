//! Tile Registry holding the current working set.
//!
//! The registry provides:
//! - Lookup of tiles by stable [`TileId`]
//! - Atomic replacement of the whole set when a new split is made
//! - Single-tile updates that silently ignore ids from a superseded set
//!
//! Every mutation happens under one write lock acquisition and never spans
//! an `.await`, so a check-then-transition inside [`TileRegistry::update`]
//! cannot interleave with another task.
//!
//! # Example
//!
//! ```ignore
//! use tilesmith::tile::{ImageSlicer, TileRegistry};
//!
//! let registry = TileRegistry::new();
//! registry.replace_all(ImageSlicer::new().slice(&source, 2, 2)?).await;
//!
//! let first = registry.snapshot().await.tiles()[0].id().clone();
//! registry.update(&first, |tile| tile.fail_enhancement("stale")).await;
//! ```

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use super::model::{Tile, TileId, TileSet};

/// Mutable state behind the registry lock.
#[derive(Default)]
struct RegistryState {
    /// Incremented on every `replace_all`
    generation: u64,

    rows: u32,
    cols: u32,
    source_dimensions: (u32, u32),

    /// Row-major order of the current set
    order: Vec<TileId>,

    tiles: HashMap<TileId, Tile>,
}

/// Addressable store for the current tile set.
///
/// # Thread Safety
///
/// The registry is safe to share across tasks via `Arc`.
#[derive(Default)]
pub struct TileRegistry {
    state: RwLock<RegistryState>,
}

impl TileRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of a tile by id.
    pub async fn get(&self, id: &TileId) -> Option<Tile> {
        let state = self.state.read().await;
        state.tiles.get(id).cloned()
    }

    /// Copy of the current set in row-major order.
    pub async fn snapshot(&self) -> TileSet {
        let state = self.state.read().await;
        let tiles = state
            .order
            .iter()
            .filter_map(|id| state.tiles.get(id).cloned())
            .collect();
        TileSet::new(state.rows, state.cols, state.source_dimensions, tiles)
    }

    /// Swap in a new working set, discarding the previous one.
    ///
    /// Tiles of the old set become unreachable: later `get` and `update`
    /// calls with their ids find nothing.
    ///
    /// # Returns
    ///
    /// The new generation number.
    pub async fn replace_all(&self, tile_set: TileSet) -> u64 {
        let rows = tile_set.rows();
        let cols = tile_set.cols();
        let source_dimensions = tile_set.source_dimensions();
        let tiles = tile_set.into_tiles();

        let order: Vec<TileId> = tiles.iter().map(|t| t.id().clone()).collect();
        let tiles: HashMap<TileId, Tile> =
            tiles.into_iter().map(|t| (t.id().clone(), t)).collect();

        let mut state = self.state.write().await;
        let discarded = state.tiles.len();
        state.generation += 1;
        state.rows = rows;
        state.cols = cols;
        state.source_dimensions = source_dimensions;
        state.order = order;
        state.tiles = tiles;

        debug!(
            generation = state.generation,
            tiles = state.tiles.len(),
            discarded,
            "Replaced tile set"
        );
        state.generation
    }

    /// Apply `mutation` to exactly one tile.
    ///
    /// Returns `None` without calling `mutation` when `id` is not in the
    /// current set (for instance because the set was replaced while an
    /// enhancement was in flight).
    pub async fn update<F, R>(&self, id: &TileId, mutation: F) -> Option<R>
    where
        F: FnOnce(&mut Tile) -> R,
    {
        let mut state = self.state.write().await;
        match state.tiles.get_mut(id) {
            Some(tile) => Some(mutation(tile)),
            None => {
                debug!(tile_id = %id, "Ignoring update for unknown tile");
                None
            }
        }
    }

    /// Drop every tile.
    pub async fn clear(&self) -> u64 {
        self.replace_all(TileSet::default()).await
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.tiles.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.tiles.is_empty()
    }

    /// Number of `replace_all` calls so far.
    pub async fn generation(&self) -> u64 {
        self.state.read().await.generation
    }
}

// =============================================================================
// Tests
// =============================================================================
