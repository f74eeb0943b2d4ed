//! In-memory [`BlockAccess`] implementation.
//!
//! Stores only non-air cells, keyed per world with an
//! [`FxHashMap`](rustc_hash::FxHashMap). Every effective write is recorded as
//! a [`BlockChange`] so callers can inspect what a transaction touched.

use rustc_hash::FxHashMap;

use crate::access::{BlockAccess, WorldError};
use crate::block::BlockState;
use crate::pos::{BlockLocation, BlockPos, WorldId};

/// One effective block write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockChange {
    /// The modified cell.
    pub at: BlockLocation,
    /// State before the write.
    pub old: BlockState,
    /// State after the write.
    pub new: BlockState,
}

/// A set of loaded worlds held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryWorld {
    worlds: FxHashMap<WorldId, FxHashMap<BlockPos, BlockState>>,
    changes: Vec<BlockChange>,
}

impl MemoryWorld {
    /// Creates a server with no loaded worlds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a server with one empty, loaded world.
    pub fn with_world(name: &str) -> Self {
        let mut world = Self::new();
        world.load_world(WorldId::new(name));
        world
    }

    /// Loads an empty world. Loading an already-loaded world is a no-op.
    pub fn load_world(&mut self, world: WorldId) {
        self.worlds.entry(world).or_default();
    }

    /// Unloads a world, discarding its blocks.
    pub fn unload_world(&mut self, world: &WorldId) -> bool {
        self.worlds.remove(world).is_some()
    }

    /// Places `state` at `at` without recording a change.
    ///
    /// Intended for building fixtures. Writes to unloaded worlds are ignored
    /// with a warning.
    pub fn put(&mut self, at: &BlockLocation, state: BlockState) {
        let Some(blocks) = self.worlds.get_mut(&at.world) else {
            tracing::warn!("MemoryWorld::put into unloaded world {}", at.world);
            return;
        };
        if state.is_air() {
            blocks.remove(&at.pos);
        } else {
            blocks.insert(at.pos, state);
        }
    }

    /// Number of non-air cells across all worlds.
    pub fn len(&self) -> usize {
        self.worlds.values().map(FxHashMap::len).sum()
    }

    /// Returns `true` if no world contains a non-air cell.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recorded writes, oldest first.
    pub fn changes(&self) -> &[BlockChange] {
        &self.changes
    }

    /// Takes and clears the recorded writes.
    pub fn drain_changes(&mut self) -> Vec<BlockChange> {
        std::mem::take(&mut self.changes)
    }
}

impl BlockAccess for MemoryWorld {
    fn is_world_loaded(&self, world: &WorldId) -> bool {
        self.worlds.contains_key(world)
    }

    fn block(&self, at: &BlockLocation) -> BlockState {
        self.worlds
            .get(&at.world)
            .and_then(|blocks| blocks.get(&at.pos))
            .cloned()
            .unwrap_or_default()
    }

    fn set_block(&mut self, at: &BlockLocation, state: BlockState) -> Result<(), WorldError> {
        let Some(blocks) = self.worlds.get_mut(&at.world) else {
            return Err(WorldError::WorldNotLoaded(at.world.clone()));
        };

        let old = blocks.get(&at.pos).cloned().unwrap_or_default();

        // Skip if the cell already holds the requested state.
        if old == state {
            return Ok(());
        }

        if state.is_air() {
            blocks.remove(&at.pos);
        } else {
            blocks.insert(at.pos, state.clone());
        }

        self.changes.push(BlockChange {
            at: at.clone(),
            old,
            new: state,
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
