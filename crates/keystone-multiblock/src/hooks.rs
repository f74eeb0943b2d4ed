//! Event entry points.
//!
//! The host's event dispatcher calls these and applies the returned verdict:
//! [`ActionResult::Suppress`] (or `true` from a protection hook) means the
//! host cancels the underlying event. Every hook resolves the touched cell to
//! its owning instance first; cells outside any instance are left alone.

use std::sync::Arc;

use keystone_world::{BlockAccess, BlockLocation, ChunkPos, Identifier, WorldId};

use crate::data::EntityContext;
use rustc_hash::FxHashSet;

use crate::multiblock::ActionResult;
use crate::placement::{self, PlacementMode};
use crate::registry::InstanceRegistry;
use crate::search;
use crate::type_registry::MultiblockTypeRegistry;

// ---------------------------------------------------------------------------
// Event payloads
// ---------------------------------------------------------------------------

/// The player behind an interaction or break.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Interactor {
    /// Player name.
    pub name: String,
    /// Whether the player is sneaking.
    pub sneaking: bool,
    /// Item in the main hand, if any.
    pub held_item: Option<Identifier>,
}

impl Interactor {
    /// A non-sneaking player with an empty hand.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the sneaking flag.
    pub fn sneaking(mut self, sneaking: bool) -> Self {
        self.sneaking = sneaking;
        self
    }

    /// Sets the held item.
    pub fn holding(mut self, item: Identifier) -> Self {
        self.held_item = Some(item);
        self
    }
}

/// Which mouse action triggered an interaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InteractAction {
    /// Use; the only action that can construct.
    RightClick,
    /// Attack.
    LeftClick,
}

/// What caused an explosion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExplosionSource {
    /// An entity exploded (creeper, primed TNT, ...).
    Entity(Identifier),
    /// A block exploded (bed, respawn anchor, ...).
    Block(BlockLocation),
}

/// A projectile that struck a cell.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Projectile {
    /// Projectile entity type.
    pub kind: Option<Identifier>,
    /// Name of the shooter, if it was a player.
    pub shooter: Option<String>,
}

/// World changes that never happen to an owned cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EnvironmentalChange {
    /// Gravity or attachment update.
    PhysicsUpdate,
    /// Fire consumed the block.
    Burn,
    /// Ice or snow melted, coral died.
    Fade,
    /// Snow or ice formed.
    Form,
    /// A crop or sapling grew.
    Grow,
    /// The block caught fire.
    Ignite,
    /// Grass, mycelium or fire spread.
    Spread,
    /// Leaves decayed.
    LeavesDecay,
    /// A sponge soaked up water.
    SpongeAbsorb,
    /// A sign's text changed.
    SignChange,
}

/// Result of [`on_interact`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InteractOutcome {
    /// No instance was touched and nothing was built.
    Ignored,
    /// An existing instance handled the click.
    Interacted(ActionResult),
    /// A new instance was built with this origin.
    Constructed(BlockLocation),
    /// A structure matched but its construct callback refused it.
    ConstructSuppressed,
    /// A structure matched but placement failed and was rolled back.
    Failed,
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

/// A player broke `at`. On [`ActionResult::Proceed`] the owning instance is
/// removed.
pub fn on_block_break(
    registry: &mut InstanceRegistry,
    breaker: &Interactor,
    at: &BlockLocation,
) -> ActionResult {
    let Some(instance) = registry.get_at_mut(at) else {
        return ActionResult::Proceed;
    };
    let kind = Arc::clone(instance.kind());
    let result = kind.behavior().on_break(breaker, instance, at);
    if !result.is_suppressed() {
        registry.remove(at);
    }
    result
}

/// An explosion is about to destroy `cells`.
///
/// Each affected instance is asked once. Cells of instances that suppress are
/// dropped from `cells`; the other instances are removed. Returns how many
/// instances were removed.
pub fn on_explosion(
    registry: &mut InstanceRegistry,
    source: &ExplosionSource,
    cells: &mut Vec<BlockLocation>,
) -> usize {
    let owners: Vec<Option<BlockLocation>> = cells
        .iter()
        .map(|cell| registry.get_at(cell).map(|i| i.origin().clone()))
        .collect();

    let mut visited = FxHashSet::default();
    let mut suppressed = FxHashSet::default();
    let mut removed = 0;
    for origin in owners.iter().flatten() {
        if !visited.insert(origin.clone()) {
            continue;
        }
        let Some(instance) = registry.get_mut(origin) else {
            continue;
        };
        let kind = Arc::clone(instance.kind());
        if kind.behavior().on_explosion(source, instance).is_suppressed() {
            suppressed.insert(origin.clone());
        } else if registry.remove(origin).is_some() {
            removed += 1;
        }
    }

    if !suppressed.is_empty() {
        let mut owners = owners.into_iter();
        cells.retain(|_| match owners.next().flatten() {
            Some(origin) => !suppressed.contains(&origin),
            None => true,
        });
    }
    removed
}

/// A player clicked `clicked`.
///
/// An owning instance gets its interact callback. Otherwise a right click by
/// a non-sneaking player tries to construct: every type whose trigger matches
/// the clicked block is searched in registration order, and the first match
/// is placed with `clicked` as its origin.
pub fn on_interact<W: BlockAccess>(
    registry: &mut InstanceRegistry,
    types: &MultiblockTypeRegistry,
    world: &mut W,
    interactor: &Interactor,
    action: InteractAction,
    clicked: &BlockLocation,
) -> InteractOutcome {
    if let Some(instance) = registry.get_at_mut(clicked) {
        let kind = Arc::clone(instance.kind());
        return InteractOutcome::Interacted(kind.behavior().on_interact(interactor, instance, clicked));
    }
    if action != InteractAction::RightClick || interactor.sneaking {
        return InteractOutcome::Ignored;
    }

    let state = world.block(clicked);
    for kind in types.iter() {
        if !kind.trigger().matches(&state) {
            continue;
        }
        let Some(transform) = search::matches_layout(kind.pattern(), clicked, &*world, &*registry)
        else {
            continue;
        };
        if kind
            .behavior()
            .on_construct(interactor, clicked, transform)
            .is_suppressed()
        {
            tracing::debug!("Construction of {} at {clicked} suppressed", kind.id());
            return InteractOutcome::ConstructSuppressed;
        }
        return match placement::place(
            world,
            registry,
            kind,
            clicked.clone(),
            transform,
            PlacementMode::Construct,
        ) {
            Ok(origin) => InteractOutcome::Constructed(origin),
            Err(e) => {
                tracing::warn!("Failed to construct {} at {clicked}: {e}", kind.id());
                InteractOutcome::Failed
            }
        };
    }
    InteractOutcome::Ignored
}

/// Redstone power at `at` changes from `old` to `new`. Returns the signal the
/// host should apply.
pub fn on_redstone(registry: &mut InstanceRegistry, at: &BlockLocation, old: u8, new: u8) -> u8 {
    match registry.get_at_mut(at) {
        Some(instance) => {
            let kind = Arc::clone(instance.kind());
            kind.behavior().on_redstone(instance, old, new)
        }
        None => new,
    }
}

/// A projectile struck `at`.
pub fn on_projectile_hit(
    registry: &mut InstanceRegistry,
    projectile: &Projectile,
    at: &BlockLocation,
) -> ActionResult {
    let Some(instance) = registry.get_at_mut(at) else {
        return ActionResult::Proceed;
    };
    let kind = Arc::clone(instance.kind());
    kind.behavior().on_projectile_hit(projectile, instance)
}

/// Returns `true` if `change` at `at` must be cancelled.
pub fn on_environmental_change(
    registry: &InstanceRegistry,
    change: EnvironmentalChange,
    at: &BlockLocation,
) -> bool {
    let cancel = registry.is_part_of_multiblock(at);
    if cancel {
        tracing::trace!("Cancelled {change:?} at {at}");
    }
    cancel
}

/// Returns `true` if a piston moving `moved` must be cancelled.
pub fn on_piston(registry: &InstanceRegistry, moved: &[BlockLocation]) -> bool {
    moved.iter().any(|cell| registry.is_part_of_multiblock(cell))
}

/// A chunk was loaded. Instances whose origin lies in it and that were
/// unloaded with the chunk get their entity `on_load` run again and resume
/// ticking. The type `on_load` callback then runs for every instance in the
/// chunk. Returns how many instances the chunk holds.
///
/// An entity that fails to reload is logged and stays unloaded.
pub fn on_chunk_load<W: BlockAccess>(
    registry: &mut InstanceRegistry,
    world: &mut W,
    world_id: &WorldId,
    chunk: ChunkPos,
) -> usize {
    let origins = registry.instances_in_chunk(world_id, chunk);
    for origin in &origins {
        let Some(instance) = registry.get_mut(origin) else {
            continue;
        };
        if !instance.is_loaded() {
            let transform = instance.transform();
            let reloaded = match instance.entity_mut() {
                Some(entity) => entity.on_load(&mut EntityContext {
                    origin,
                    transform,
                    world: &mut *world,
                }),
                None => Ok(()),
            };
            if let Err(e) = reloaded {
                tracing::warn!("Multiblock {} at {origin} failed to reload: {e}", instance.id());
                continue;
            }
            instance.set_loaded(true);
        }
        instance.kind().behavior().on_load(instance);
    }
    origins.len()
}

/// A chunk is about to unload. Every loaded instance whose origin lies in it
/// is saved, then its entity and type `on_unload` callbacks run and it stops
/// ticking. The instances stay indexed. Returns how many there were.
pub fn on_chunk_unload(registry: &mut InstanceRegistry, world: &WorldId, chunk: ChunkPos) -> usize {
    let origins: Vec<BlockLocation> = registry
        .instances_in_chunk(world, chunk)
        .into_iter()
        .filter(|origin| registry.get(origin).is_some_and(|i| i.is_loaded()))
        .collect();
    for origin in &origins {
        registry.save(origin);
        if let Some(instance) = registry.get_mut(origin) {
            if let Some(entity) = instance.entity_mut() {
                entity.on_unload();
            }
            instance.kind().behavior().on_unload(instance);
            instance.set_loaded(false);
        }
    }
    if !origins.is_empty() {
        tracing::debug!(
            "Unloaded {} multiblocks in chunk ({}, {}) of {world}",
            origins.len(),
            chunk.x,
            chunk.z
        );
    }
    origins.len()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::data::{EntityError, MultiblockEntity, SerializerRegistry};
    use crate::instance::MultiblockInstance;
    use crate::multiblock::{MultiblockBehavior, MultiblockType};
    use crate::pattern::{Choice, PatternDefinition};
    use crate::store::{InstanceStore, SqliteStore};
    use crate::transform::Transform;
    use keystone_world::{BlockState, MemoryWorld};

    fn id(s: &str) -> Identifier {
        Identifier::parse(s).unwrap()
    }

    fn state(s: &str) -> BlockState {
        BlockState::of(id(s))
    }

    /// Records callbacks and answers with fixed verdicts.
    #[derive(Default)]
    struct Recorder {
        suppress: bool,
        redstone: u8,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn verdict(&self) -> ActionResult {
            if self.suppress {
                ActionResult::Suppress
            } else {
                ActionResult::Proceed
            }
        }

        fn log(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }
    }

    impl MultiblockBehavior for Recorder {
        fn on_load(&self, _instance: &MultiblockInstance) {
            self.log("load");
        }

        fn on_unload(&self, _instance: &MultiblockInstance) {
            self.log("unload");
        }

        fn on_construct(&self, _: &Interactor, _: &BlockLocation, _: Transform) -> ActionResult {
            self.log("construct");
            self.verdict()
        }

        fn on_interact(&self, _: &Interactor, _: &mut MultiblockInstance, _: &BlockLocation) -> ActionResult {
            self.log("interact");
            self.verdict()
        }

        fn on_break(&self, _: &Interactor, _: &mut MultiblockInstance, _: &BlockLocation) -> ActionResult {
            self.log("break");
            self.verdict()
        }

        fn on_explosion(&self, _: &ExplosionSource, _: &mut MultiblockInstance) -> ActionResult {
            self.log("explosion");
            self.verdict()
        }

        fn on_redstone(&self, _: &mut MultiblockInstance, _old: u8, _new: u8) -> u8 {
            self.redstone
        }
    }

    fn bar_type(behavior: Recorder) -> MultiblockType {
        let pattern = PatternDefinition::builder(id("test:bar"))
            .cell(0, 0, 0, Choice::Material(id("test:core")))
            .cell(1, 0, 0, Choice::Material(id("test:frame")))
            .cell(2, 0, 0, Choice::Material(id("test:frame")))
            .build()
            .unwrap();
        MultiblockType::builder(pattern).behavior(behavior).build()
    }

    fn bar(behavior: Recorder) -> Arc<MultiblockType> {
        Arc::new(bar_type(behavior))
    }

    fn registry() -> InstanceRegistry {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        InstanceRegistry::new(Box::new(store), Arc::new(SerializerRegistry::with_defaults()))
    }

    fn placed(kind: &Arc<MultiblockType>, x: i32) -> InstanceRegistry {
        let mut registry = registry();
        registry
            .register(MultiblockInstance::new(
                Arc::clone(kind),
                BlockLocation::at("w", x, 0, 0),
                Transform::IDENTITY,
            ))
            .unwrap();
        registry
    }

    #[test]
    fn test_break_proceed_removes_instance() {
        let kind = bar(Recorder::default());
        let mut registry = placed(&kind, 0);

        let result = on_block_break(&mut registry, &Interactor::new("alex"), &BlockLocation::at("w", 2, 0, 0));
        assert_eq!(result, ActionResult::Proceed);
        assert!(registry.is_empty());
        assert!(!registry.is_part_of_multiblock(&BlockLocation::at("w", 0, 0, 0)));
    }

    #[test]
    fn test_break_suppressed_keeps_instance() {
        let kind = bar(Recorder {
            suppress: true,
            ..Recorder::default()
        });
        let mut registry = placed(&kind, 0);

        let result = on_block_break(&mut registry, &Interactor::new("alex"), &BlockLocation::at("w", 1, 0, 0));
        assert_eq!(result, ActionResult::Suppress);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_break_outside_any_instance() {
        let mut registry = registry();
        let result = on_block_break(&mut registry, &Interactor::new("alex"), &BlockLocation::at("w", 0, 0, 0));
        assert_eq!(result, ActionResult::Proceed);
    }

    #[test]
    fn test_explosion_asks_each_instance_once() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let kind = bar(Recorder {
            suppress: true,
            calls: Arc::clone(&calls),
            ..Recorder::default()
        });
        let mut registry = placed(&kind, 0);

        let mut cells = vec![
            BlockLocation::at("w", 0, 0, 0),
            BlockLocation::at("w", 1, 0, 0),
            BlockLocation::at("w", 5, 0, 0),
            BlockLocation::at("w", 2, 0, 0),
        ];
        let removed = on_explosion(&mut registry, &ExplosionSource::Entity(id("test:creeper")), &mut cells);

        assert_eq!(removed, 0);
        assert_eq!(cells, vec![BlockLocation::at("w", 5, 0, 0)]);
        assert_eq!(*calls.lock().unwrap(), vec!["explosion"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_explosion_removes_unsuppressed_instances() {
        let kind = bar(Recorder::default());
        let mut registry = placed(&kind, 0);

        let mut cells = vec![BlockLocation::at("w", 1, 0, 0), BlockLocation::at("w", 2, 0, 0)];
        let removed = on_explosion(&mut registry, &ExplosionSource::Block(BlockLocation::at("w", 9, 0, 0)), &mut cells);

        assert_eq!(removed, 1);
        assert_eq!(cells.len(), 2);
        assert!(registry.is_empty());
    }

    fn built_world() -> MemoryWorld {
        let mut world = MemoryWorld::with_world("w");
        world.put(&BlockLocation::at("w", 0, 0, 0), state("test:core"));
        world.put(&BlockLocation::at("w", 1, 0, 0), state("test:frame"));
        world.put(&BlockLocation::at("w", 2, 0, 0), state("test:frame"));
        world
    }

    #[test]
    fn test_interact_constructs_then_interacts() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut types = MultiblockTypeRegistry::new();
        types
            .register(bar_type(Recorder {
                calls: Arc::clone(&calls),
                ..Recorder::default()
            }))
            .unwrap();

        let mut world = built_world();
        let mut registry = registry();
        let player = Interactor::new("alex");
        let origin = BlockLocation::at("w", 0, 0, 0);

        let outcome = on_interact(&mut registry, &types, &mut world, &player, InteractAction::RightClick, &origin);
        assert_eq!(outcome, InteractOutcome::Constructed(origin.clone()));
        assert_eq!(registry.len(), 1);

        let outcome = on_interact(
            &mut registry,
            &types,
            &mut world,
            &player,
            InteractAction::LeftClick,
            &BlockLocation::at("w", 2, 0, 0),
        );
        assert_eq!(outcome, InteractOutcome::Interacted(ActionResult::Proceed));
        assert_eq!(*calls.lock().unwrap(), vec!["construct", "interact"]);
    }

    #[test]
    fn test_interact_needs_right_click_without_sneaking() {
        let mut types = MultiblockTypeRegistry::new();
        types.register(bar_type(Recorder::default())).unwrap();
        let mut world = built_world();
        let mut registry = registry();
        let origin = BlockLocation::at("w", 0, 0, 0);

        let sneaking = Interactor::new("alex").sneaking(true);
        let outcome = on_interact(&mut registry, &types, &mut world, &sneaking, InteractAction::RightClick, &origin);
        assert_eq!(outcome, InteractOutcome::Ignored);

        let outcome = on_interact(
            &mut registry,
            &types,
            &mut world,
            &Interactor::new("alex"),
            InteractAction::LeftClick,
            &origin,
        );
        assert_eq!(outcome, InteractOutcome::Ignored);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_construct_suppressed() {
        let mut types = MultiblockTypeRegistry::new();
        types
            .register(bar_type(Recorder {
                suppress: true,
                ..Recorder::default()
            }))
            .unwrap();
        let mut world = built_world();
        let mut registry = registry();

        let outcome = on_interact(
            &mut registry,
            &types,
            &mut world,
            &Interactor::new("alex"),
            InteractAction::RightClick,
            &BlockLocation::at("w", 0, 0, 0),
        );
        assert_eq!(outcome, InteractOutcome::ConstructSuppressed);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_redstone_passthrough_and_override() {
        let kind = bar(Recorder {
            redstone: 7,
            ..Recorder::default()
        });
        let mut registry = placed(&kind, 0);

        assert_eq!(on_redstone(&mut registry, &BlockLocation::at("w", 1, 0, 0), 0, 15), 7);
        assert_eq!(on_redstone(&mut registry, &BlockLocation::at("w", 8, 0, 0), 0, 15), 15);
    }

    #[test]
    fn test_projectile_defaults_to_proceed() {
        let kind = bar(Recorder::default());
        let mut registry = placed(&kind, 0);
        let result = on_projectile_hit(&mut registry, &Projectile::default(), &BlockLocation::at("w", 0, 0, 0));
        assert_eq!(result, ActionResult::Proceed);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_protection_hooks() {
        let kind = bar(Recorder::default());
        let registry = placed(&kind, 0);

        assert!(on_environmental_change(&registry, EnvironmentalChange::Burn, &BlockLocation::at("w", 2, 0, 0)));
        assert!(!on_environmental_change(&registry, EnvironmentalChange::Grow, &BlockLocation::at("w", 3, 0, 0)));
        assert!(on_piston(
            &registry,
            &[BlockLocation::at("w", 5, 0, 0), BlockLocation::at("w", 1, 0, 0)]
        ));
        assert!(!on_piston(&registry, &[BlockLocation::at("w", 5, 0, 0)]));
    }

    #[test]
    fn test_chunk_hooks() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let kind = bar(Recorder {
            calls: Arc::clone(&calls),
            ..Recorder::default()
        });
        let mut registry = placed(&kind, 0);
        let mut world = MemoryWorld::with_world("w");
        let w = WorldId::new("w");
        let origin = BlockLocation::at("w", 0, 0, 0);

        assert_eq!(on_chunk_load(&mut registry, &mut world, &w, ChunkPos::new(0, 0)), 1);
        assert_eq!(on_chunk_load(&mut registry, &mut world, &w, ChunkPos::new(1, 0)), 0);
        assert_eq!(on_chunk_unload(&mut registry, &w, ChunkPos::new(0, 0)), 1);
        assert!(!registry.get(&origin).unwrap().is_loaded());

        // Already unloaded: nothing to do.
        assert_eq!(on_chunk_unload(&mut registry, &w, ChunkPos::new(0, 0)), 0);

        assert_eq!(on_chunk_load(&mut registry, &mut world, &w, ChunkPos::new(0, 0)), 1);
        assert!(registry.get(&origin).unwrap().is_loaded());

        assert_eq!(*calls.lock().unwrap(), vec!["load", "unload", "load"]);
        assert_eq!(registry.len(), 1);
    }

    /// Counts its own load and unload hooks; refuses to load when `brittle`.
    #[derive(Default)]
    struct Lamp {
        loads: u32,
        unloads: u32,
        brittle: bool,
    }

    impl MultiblockEntity for Lamp {
        fn on_load(&mut self, _ctx: &mut EntityContext<'_>) -> Result<(), EntityError> {
            if self.brittle {
                return Err(EntityError::Load("filament broke".to_string()));
            }
            self.loads += 1;
            Ok(())
        }

        fn on_unload(&mut self) {
            self.unloads += 1;
        }
    }

    fn lamp_registry() -> (InstanceRegistry, BlockLocation) {
        let pattern = PatternDefinition::builder(id("test:lamp"))
            .cell(0, 0, 0, Choice::Any)
            .build()
            .unwrap();
        let kind = Arc::new(MultiblockType::builder(pattern).entity(|_| Lamp::default()).build());
        let origin = BlockLocation::at("w", 3, 0, 3);
        let mut instance = MultiblockInstance::new(Arc::clone(&kind), origin.clone(), Transform::IDENTITY);
        instance.set_entity(kind.create_entity(&origin));
        let mut registry = registry();
        registry.register(instance).unwrap();
        (registry, origin)
    }

    #[test]
    fn test_chunk_reload_runs_entity_load_once() {
        let (mut registry, origin) = lamp_registry();
        let mut world = MemoryWorld::with_world("w");
        let w = WorldId::new("w");
        let chunk = ChunkPos::new(0, 0);

        // Loading a chunk whose instances never unloaded does not reload them.
        on_chunk_load(&mut registry, &mut world, &w, chunk);
        assert_eq!(registry.get(&origin).unwrap().entity_as::<Lamp>().unwrap().loads, 0);

        on_chunk_unload(&mut registry, &w, chunk);
        on_chunk_load(&mut registry, &mut world, &w, chunk);
        let lamp = registry.get(&origin).unwrap().entity_as::<Lamp>().unwrap();
        assert_eq!((lamp.loads, lamp.unloads), (1, 1));
        assert!(registry.get(&origin).unwrap().is_loaded());
    }

    #[test]
    fn test_failed_chunk_reload_stays_unloaded() {
        let (mut registry, origin) = lamp_registry();
        let mut world = MemoryWorld::with_world("w");
        let w = WorldId::new("w");
        let chunk = ChunkPos::new(0, 0);

        on_chunk_unload(&mut registry, &w, chunk);
        registry.get_mut(&origin).unwrap().entity_as_mut::<Lamp>().unwrap().brittle = true;
        on_chunk_load(&mut registry, &mut world, &w, chunk);
        assert!(!registry.get(&origin).unwrap().is_loaded());

        registry.get_mut(&origin).unwrap().entity_as_mut::<Lamp>().unwrap().brittle = false;
        on_chunk_load(&mut registry, &mut world, &w, chunk);
        assert!(registry.get(&origin).unwrap().is_loaded());
    }
}
