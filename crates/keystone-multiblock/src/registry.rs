//! The live instance registry.
//!
//! Two indices are kept in lockstep:
//!
//! - `origins`: origin → instance (owns the instance)
//! - `cells`: every occupied absolute cell → owning origin
//!
//! so lookups by any cell are O(1). Every mutation is mirrored to the
//! [`InstanceStore`]; a store failure is logged and never undoes the
//! in-memory change.

use std::sync::Arc;

use keystone_world::{BlockAccess, BlockLocation, ChunkPos, Identifier, WorldId};
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::data::{SerializerRegistry, payload_from_str};
use crate::instance::MultiblockInstance;
use crate::placement::{self, PlacementError, PlacementMode};
use crate::search::Occupancy;
use crate::store::{InstanceStore, StoreError};
use crate::type_registry::MultiblockTypeRegistry;

/// Errors returned when indexing an instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A cell (or the origin) of the new instance is already owned.
    #[error("{at} already belongs to the multiblock at {owner}")]
    Occupied {
        /// The contested cell.
        at: BlockLocation,
        /// Origin of the current owner.
        owner: BlockLocation,
    },
}

/// Outcome of [`InstanceRegistry::load`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Rows restored into the registry.
    pub loaded: usize,
    /// Rows naming a type that is not registered.
    pub unknown_type: usize,
    /// Rows in a world that is not loaded.
    pub unloaded_world: usize,
    /// Rows the store could not decode, rows with a malformed id or
    /// payload, and rows whose entity refused to load.
    pub corrupt: usize,
    /// Rows overlapping an instance restored earlier.
    pub conflicts: usize,
}

impl LoadReport {
    /// Total rows skipped for any reason.
    pub fn skipped(&self) -> usize {
        self.unknown_type + self.unloaded_world + self.corrupt + self.conflicts
    }
}

/// Owns every live [`MultiblockInstance`] and its persistence.
pub struct InstanceRegistry {
    origins: FxHashMap<BlockLocation, MultiblockInstance>,
    cells: FxHashMap<BlockLocation, BlockLocation>,
    store: Box<dyn InstanceStore>,
    serializers: Arc<SerializerRegistry>,
}

impl InstanceRegistry {
    /// Creates an empty registry persisting to `store`. Entity fields are
    /// encoded and decoded with the codecs in `serializers`.
    pub fn new(store: Box<dyn InstanceStore>, serializers: Arc<SerializerRegistry>) -> Self {
        Self {
            origins: FxHashMap::default(),
            cells: FxHashMap::default(),
            store,
            serializers,
        }
    }

    /// The codecs used for entity payloads.
    pub fn serializers(&self) -> &Arc<SerializerRegistry> {
        &self.serializers
    }

    // -- Indexing ---------------------------------------------------------------

    /// The owner of any cell of `instance`, or of its origin.
    fn conflict(&self, instance: &MultiblockInstance) -> Option<RegistryError> {
        if self.origins.contains_key(instance.origin()) {
            return Some(RegistryError::Occupied {
                at: instance.origin().clone(),
                owner: instance.origin().clone(),
            });
        }
        instance.cells().into_iter().find_map(|cell| {
            self.cells.get(&cell).map(|owner| RegistryError::Occupied {
                owner: owner.clone(),
                at: cell,
            })
        })
    }

    fn index(&mut self, instance: MultiblockInstance) -> Result<BlockLocation, RegistryError> {
        if let Some(err) = self.conflict(&instance) {
            return Err(err);
        }
        let origin = instance.origin().clone();
        for cell in instance.cells() {
            self.cells.insert(cell, origin.clone());
        }
        self.origins.insert(origin.clone(), instance);
        Ok(origin)
    }

    /// Indexes `instance` and persists it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Occupied`] without changing anything if the
    /// instance overlaps an existing one. A store failure is only logged.
    pub fn register(&mut self, instance: MultiblockInstance) -> Result<(), RegistryError> {
        let origin = self.index(instance)?;
        self.save(&origin);
        tracing::debug!("Registered multiblock at {origin}");
        Ok(())
    }

    /// Indexes `instance` without writing to the store.
    pub fn restore(&mut self, instance: MultiblockInstance) -> Result<(), RegistryError> {
        self.index(instance).map(|_| ())
    }

    /// Removes the instance owning `at` (any cell, or the origin) from both
    /// indices, runs its unload hooks and deletes its row.
    pub fn remove(&mut self, at: &BlockLocation) -> Option<MultiblockInstance> {
        let origin = self.origin_of(at)?.clone();
        let mut instance = self.origins.remove(&origin)?;
        for cell in instance.cells() {
            self.cells.remove(&cell);
        }

        if let Some(entity) = instance.entity_mut() {
            entity.on_unload();
        }
        instance.kind().behavior().on_unload(&instance);

        if let Err(e) = self.store.delete(&origin) {
            tracing::error!("Failed to delete multiblock row at {origin}: {e}");
        }
        tracing::debug!("Removed multiblock {} at {origin}", instance.id());
        Some(instance)
    }

    // -- Queries ------------------------------------------------------------------

    /// The origin of the instance owning `at` (any cell, or the origin).
    pub fn origin_of(&self, at: &BlockLocation) -> Option<&BlockLocation> {
        self.cells
            .get(at)
            .or_else(|| self.origins.get_key_value(at).map(|(origin, _)| origin))
    }

    /// The instance whose origin is `origin`.
    pub fn get(&self, origin: &BlockLocation) -> Option<&MultiblockInstance> {
        self.origins.get(origin)
    }

    /// The instance whose origin is `origin`, mutably.
    pub fn get_mut(&mut self, origin: &BlockLocation) -> Option<&mut MultiblockInstance> {
        self.origins.get_mut(origin)
    }

    /// The instance occupying the cell `at`.
    pub fn get_at(&self, at: &BlockLocation) -> Option<&MultiblockInstance> {
        self.cells.get(at).and_then(|origin| self.origins.get(origin))
    }

    /// The instance occupying the cell `at`, mutably.
    pub fn get_at_mut(&mut self, at: &BlockLocation) -> Option<&mut MultiblockInstance> {
        let origin = self.cells.get(at)?;
        self.origins.get_mut(origin)
    }

    /// Returns `true` if `at` is a cell of any instance.
    pub fn is_part_of_multiblock(&self, at: &BlockLocation) -> bool {
        self.cells.contains_key(at)
    }

    /// Origins of the instances whose origin lies in `chunk` of `world`,
    /// sorted.
    pub fn instances_in_chunk(&self, world: &WorldId, chunk: ChunkPos) -> Vec<BlockLocation> {
        let mut origins: Vec<BlockLocation> = self
            .origins
            .keys()
            .filter(|origin| origin.world == *world && origin.chunk() == chunk)
            .cloned()
            .collect();
        origins.sort();
        origins
    }

    /// Iterates live instances in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &MultiblockInstance> + '_ {
        self.origins.values()
    }

    /// Iterates live instances mutably in no particular order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut MultiblockInstance> + '_ {
        self.origins.values_mut()
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.origins.len()
    }

    /// Returns `true` if no instance is live.
    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    /// Number of indexed cells across all instances.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    // -- Persistence --------------------------------------------------------------

    /// Writes the instance at `origin` to the store. Returns `false` if there
    /// is no such instance or the write failed (the failure is logged).
    pub fn save(&mut self, origin: &BlockLocation) -> bool {
        match self.origins.get_mut(origin) {
            Some(instance) => persist(self.store.as_mut(), &self.serializers, instance),
            None => false,
        }
    }

    /// Writes every live instance. Returns how many were written.
    pub fn save_all(&mut self) -> usize {
        let mut saved = 0;
        for instance in self.origins.values_mut() {
            if persist(self.store.as_mut(), &self.serializers, instance) {
                saved += 1;
            }
        }
        saved
    }

    /// Restores every stored row, skipping rows that cannot be restored.
    ///
    /// Restored instances are indexed without being written back. Each
    /// entity has its persisted fields applied and its `on_load` run; the
    /// type's `on_load` callback follows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only if the schema cannot be ensured or the
    /// table cannot be queried. Per-row problems, including rows the store
    /// cannot decode, are counted in the report.
    pub fn load<W: BlockAccess>(
        &mut self,
        types: &MultiblockTypeRegistry,
        world: &mut W,
    ) -> Result<LoadReport, StoreError> {
        self.store.ensure_schema()?;
        let rows = self.store.load_all()?;
        let mut report = LoadReport::default();

        for row in rows {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    tracing::warn!("Skipping multiblock row: {e}");
                    report.corrupt += 1;
                    continue;
                }
            };
            let origin = row.origin();

            let Ok(id) = Identifier::parse(&row.id) else {
                tracing::warn!("Skipping multiblock at {origin}: malformed id {:?}", row.id);
                report.corrupt += 1;
                continue;
            };
            let Some(kind) = types.get(&id) else {
                tracing::warn!("Skipping multiblock at {origin}: unknown type {id}");
                report.unknown_type += 1;
                continue;
            };
            if !world.is_world_loaded(&origin.world) {
                tracing::warn!("Skipping multiblock {id} at {origin}: world not loaded");
                report.unloaded_world += 1;
                continue;
            }
            let payload = match payload_from_str(&row.data) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!("Skipping multiblock {id} at {origin}: {e}");
                    report.corrupt += 1;
                    continue;
                }
            };

            match placement::place(
                world,
                self,
                kind,
                origin.clone(),
                row.transform(),
                PlacementMode::Restore(payload),
            ) {
                Ok(_) => report.loaded += 1,
                Err(PlacementError::Registry(e)) => {
                    tracing::warn!("Skipping multiblock {id} at {origin}: {e}");
                    report.conflicts += 1;
                }
                Err(e) => {
                    tracing::warn!("Skipping multiblock {id} at {origin}: {e}");
                    report.corrupt += 1;
                }
            }
        }

        tracing::info!(
            "Loaded {} multiblocks ({} skipped)",
            report.loaded,
            report.skipped()
        );
        Ok(report)
    }
}

impl Occupancy for InstanceRegistry {
    fn is_occupied(&self, at: &BlockLocation) -> bool {
        self.is_part_of_multiblock(at)
    }
}

fn persist(
    store: &mut dyn InstanceStore,
    serializers: &SerializerRegistry,
    instance: &mut MultiblockInstance,
) -> bool {
    let row = match instance.to_stored(serializers) {
        Ok(row) => row,
        Err(e) => {
            tracing::error!(
                "Failed to encode multiblock {} at {}: {e}",
                instance.id(),
                instance.origin()
            );
            return false;
        }
    };
    match store.upsert(&row) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(
                "Failed to save multiblock {} at {}: {e}",
                instance.id(),
                instance.origin()
            );
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
