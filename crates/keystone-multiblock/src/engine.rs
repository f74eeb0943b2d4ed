//! The engine facade the host server talks to.
//!
//! Owns the [`InstanceRegistry`] together with the injected type registry,
//! the multiblock configuration and the seeded RNG used for random ticks.
//! The injected serializer registry is handed to the instance registry,
//! which encodes and decodes every entity payload with it. Everything runs
//! on the host's main thread.

use std::path::Path;
use std::sync::Arc;

use keystone_config::{Config, MultiblockConfig};
use keystone_world::{BlockAccess, BlockLocation, ChunkPos, WorldId};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::data::SerializerRegistry;
use crate::hooks::{
    self, EnvironmentalChange, ExplosionSource, InteractAction, InteractOutcome, Interactor,
    Projectile,
};
use crate::instance::MultiblockInstance;
use crate::multiblock::ActionResult;
use crate::registry::{InstanceRegistry, LoadReport};
use crate::schedule::{EngineJob, RepeatingTask, Scheduler};
use crate::store::{InstanceStore, SqliteStore, StoreError};
use crate::type_registry::MultiblockTypeRegistry;

/// Multiblock recognition and lifecycle engine.
pub struct MultiblockEngine {
    registry: InstanceRegistry,
    types: Arc<MultiblockTypeRegistry>,
    config: MultiblockConfig,
    rng: ChaCha8Rng,
    tick: u64,
}

impl MultiblockEngine {
    /// Creates an engine persisting to `store`.
    pub fn new(
        types: Arc<MultiblockTypeRegistry>,
        serializers: Arc<SerializerRegistry>,
        store: Box<dyn InstanceStore>,
        config: MultiblockConfig,
    ) -> Self {
        Self {
            registry: InstanceRegistry::new(store, serializers),
            types,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            config,
            tick: 0,
        }
    }

    /// Creates an engine backed by the SQLite file named in `config`, under
    /// `data_dir`.
    pub fn open(
        types: Arc<MultiblockTypeRegistry>,
        serializers: Arc<SerializerRegistry>,
        config: &Config,
        data_dir: &Path,
    ) -> Result<Self, StoreError> {
        let path = config.storage.database_path(data_dir);
        tracing::info!("Opening multiblock database {}", path.display());
        let store = SqliteStore::open(&path)?;
        Ok(Self::new(
            types,
            serializers,
            Box::new(store),
            config.multiblock.clone(),
        ))
    }

    /// Restores persisted instances, then schedules the tick and autosave
    /// jobs on `scheduler`.
    ///
    /// A store that cannot be read is logged and leaves the registry empty;
    /// the jobs are scheduled either way.
    pub fn load<W: BlockAccess>(&mut self, world: &mut W, scheduler: &mut impl Scheduler) -> LoadReport {
        let report = match self.registry.load(&self.types, world) {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Failed to load multiblocks: {e}");
                LoadReport::default()
            }
        };

        scheduler.schedule_repeating(RepeatingTask {
            job: EngineJob::Tick,
            delay: 0,
            period: self.config.tick_period_ticks,
        });
        scheduler.schedule_repeating(RepeatingTask {
            job: EngineJob::Autosave,
            delay: self.config.autosave_delay_ticks,
            period: self.config.autosave_period_ticks,
        });
        report
    }

    /// Runs a job handed back by the scheduler.
    pub fn run_job(&mut self, job: EngineJob) {
        match job {
            EngineJob::Tick => {
                self.tick();
            }
            EngineJob::Autosave => {
                self.autosave();
            }
        }
    }

    /// Server-ticks every tickable instance, and random-ticks each of them
    /// with the configured probability. Returns how many were ticked.
    pub fn tick(&mut self) -> usize {
        self.tick += 1;
        let tick = self.tick;
        let chance = self.config.random_tick_chance;
        let mut ticked = 0;
        for instance in self.registry.iter_mut() {
            if instance.tick_if_applicable(tick) {
                ticked += 1;
                instance.random_tick(tick, chance, &mut self.rng);
            }
        }
        ticked
    }

    /// Re-persists every live instance. Returns how many were written.
    pub fn autosave(&mut self) -> usize {
        let saved = self.registry.save_all();
        tracing::info!("Saved {saved} multiblocks");
        saved
    }

    /// Persists everything before the host stops.
    pub fn shutdown(&mut self) -> usize {
        let saved = self.registry.save_all();
        tracing::info!("Saved {saved} multiblocks on shutdown");
        saved
    }

    /// Replaces the multiblock settings. The RNG keeps its stream; jobs
    /// already scheduled keep their cadence.
    pub fn apply_config(&mut self, config: MultiblockConfig) {
        tracing::debug!("Applied multiblock config: {config:?}");
        self.config = config;
    }

    // -- Hooks --------------------------------------------------------------------

    /// See [`hooks::on_block_break`].
    pub fn on_block_break(&mut self, breaker: &Interactor, at: &BlockLocation) -> ActionResult {
        hooks::on_block_break(&mut self.registry, breaker, at)
    }

    /// See [`hooks::on_explosion`].
    pub fn on_explosion(&mut self, source: &ExplosionSource, cells: &mut Vec<BlockLocation>) -> usize {
        hooks::on_explosion(&mut self.registry, source, cells)
    }

    /// See [`hooks::on_interact`].
    pub fn on_interact<W: BlockAccess>(
        &mut self,
        world: &mut W,
        interactor: &Interactor,
        action: InteractAction,
        clicked: &BlockLocation,
    ) -> InteractOutcome {
        hooks::on_interact(&mut self.registry, &self.types, world, interactor, action, clicked)
    }

    /// See [`hooks::on_redstone`].
    pub fn on_redstone(&mut self, at: &BlockLocation, old: u8, new: u8) -> u8 {
        hooks::on_redstone(&mut self.registry, at, old, new)
    }

    /// See [`hooks::on_projectile_hit`].
    pub fn on_projectile_hit(&mut self, projectile: &Projectile, at: &BlockLocation) -> ActionResult {
        hooks::on_projectile_hit(&mut self.registry, projectile, at)
    }

    /// See [`hooks::on_environmental_change`].
    pub fn on_environmental_change(&self, change: EnvironmentalChange, at: &BlockLocation) -> bool {
        hooks::on_environmental_change(&self.registry, change, at)
    }

    /// See [`hooks::on_piston`].
    pub fn on_piston(&self, moved: &[BlockLocation]) -> bool {
        hooks::on_piston(&self.registry, moved)
    }

    /// See [`hooks::on_chunk_load`].
    pub fn on_chunk_load<W: BlockAccess>(
        &mut self,
        world: &mut W,
        world_id: &WorldId,
        chunk: ChunkPos,
    ) -> usize {
        hooks::on_chunk_load(&mut self.registry, world, world_id, chunk)
    }

    /// See [`hooks::on_chunk_unload`].
    pub fn on_chunk_unload(&mut self, world: &WorldId, chunk: ChunkPos) -> usize {
        hooks::on_chunk_unload(&mut self.registry, world, chunk)
    }

    // -- Accessors ----------------------------------------------------------------

    /// The instance occupying `at`.
    pub fn get_at(&self, at: &BlockLocation) -> Option<&MultiblockInstance> {
        self.registry.get_at(at)
    }

    /// Returns `true` if `at` is a cell of any instance.
    pub fn is_part_of_multiblock(&self, at: &BlockLocation) -> bool {
        self.registry.is_part_of_multiblock(at)
    }

    /// Removes the instance owning `at` without asking its callbacks.
    pub fn remove(&mut self, at: &BlockLocation) -> Option<MultiblockInstance> {
        self.registry.remove(at)
    }

    /// The live instances.
    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    /// The live instances, mutably.
    pub fn registry_mut(&mut self) -> &mut InstanceRegistry {
        &mut self.registry
    }

    /// The injected type registry.
    pub fn types(&self) -> &Arc<MultiblockTypeRegistry> {
        &self.types
    }

    /// The injected serializer registry used for every entity payload.
    pub fn serializers(&self) -> &Arc<SerializerRegistry> {
        self.registry.serializers()
    }

    /// The active multiblock settings.
    pub fn config(&self) -> &MultiblockConfig {
        &self.config
    }

    /// Ticks run so far.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
