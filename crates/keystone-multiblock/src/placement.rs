//! The placement transaction.
//!
//! 1. Snapshot every cell the instance will occupy.
//! 2. Build the instance: create the entity, apply persisted fields when
//!    restoring, run `on_load`, then index it (registering and persisting on
//!    construction, indexing only on restore).
//! 3. On any failure after the snapshot, write every snapshotted state back
//!    and return the original error.
//!
//! Indexing is the last step, so a failure never leaves a partial instance in
//! the registry.

use std::sync::Arc;

use keystone_world::{BlockAccess, BlockLocation, BlockState, WorldId};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::data::{CodecError, EntityContext, EntityError};
use crate::instance::MultiblockInstance;
use crate::multiblock::MultiblockType;
use crate::registry::{InstanceRegistry, RegistryError};
use crate::search;
use crate::transform::Transform;

/// Errors that abort a placement.
#[derive(Debug, Error)]
pub enum PlacementError {
    /// The origin's world is not loaded.
    #[error("world {0} is not loaded")]
    WorldNotLoaded(WorldId),
    /// Persisted fields could not be applied to the new entity.
    #[error("cannot restore entity fields: {0}")]
    Codec(#[from] CodecError),
    /// The entity's load hook failed.
    #[error(transparent)]
    Entity(#[from] EntityError),
    /// The instance overlaps an existing one.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Why an instance is being placed.
#[derive(Debug)]
pub enum PlacementMode {
    /// A fresh structure: register and persist.
    Construct,
    /// A stored row: apply these fields and index without persisting.
    Restore(Map<String, Value>),
}

/// Places an instance of `kind` at `origin` under `transform`.
///
/// Returns the origin of the new instance.
///
/// # Errors
///
/// See [`PlacementError`]. Every cell is back in its snapshotted state when
/// an error is returned.
pub fn place<W: BlockAccess>(
    world: &mut W,
    registry: &mut InstanceRegistry,
    kind: &Arc<MultiblockType>,
    origin: BlockLocation,
    transform: Transform,
    mode: PlacementMode,
) -> Result<BlockLocation, PlacementError> {
    if !world.is_world_loaded(&origin.world) {
        return Err(PlacementError::WorldNotLoaded(origin.world));
    }

    let snapshot: Vec<(BlockLocation, BlockState)> =
        search::cells_at(kind.pattern(), &origin, transform)
            .into_iter()
            .map(|cell| {
                let state = world.block(&cell);
                (cell, state)
            })
            .collect();

    match build(world, registry, kind, origin, transform, mode) {
        Ok(origin) => Ok(origin),
        Err(e) => {
            rollback(world, snapshot);
            Err(e)
        }
    }
}

fn build<W: BlockAccess>(
    world: &mut W,
    registry: &mut InstanceRegistry,
    kind: &Arc<MultiblockType>,
    origin: BlockLocation,
    transform: Transform,
    mode: PlacementMode,
) -> Result<BlockLocation, PlacementError> {
    let mut instance = MultiblockInstance::new(Arc::clone(kind), origin.clone(), transform);

    if let Some(mut entity) = kind.create_entity(&origin) {
        if let PlacementMode::Restore(fields) = &mode {
            kind.decode_entity(entity.as_mut(), fields, registry.serializers())?;
        }
        entity.on_load(&mut EntityContext {
            origin: &origin,
            transform,
            world,
        })?;
        instance.set_entity(Some(entity));
    }

    match mode {
        PlacementMode::Construct => {
            registry.register(instance)?;
            tracing::info!("Constructed multiblock {} at {origin}", kind.id());
        }
        PlacementMode::Restore(_) => {
            registry.restore(instance)?;
            if let Some(restored) = registry.get(&origin) {
                kind.behavior().on_load(restored);
            }
        }
    }
    Ok(origin)
}

/// Writes every snapshotted state back. A failed write is logged and does
/// not stop the others.
fn rollback<W: BlockAccess>(world: &mut W, snapshot: Vec<(BlockLocation, BlockState)>) {
    for (cell, state) in snapshot {
        if let Err(e) = world.set_block(&cell, state) {
            tracing::warn!("Failed to restore block at {cell} during rollback: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
