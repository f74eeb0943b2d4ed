//! Multiblock types: a pattern plus everything its instances share.

use std::fmt;
use std::sync::Arc;

use keystone_world::{BlockLocation, Identifier};
use serde_json::{Map, Value};

use crate::data::{CodecError, DataSchema, ErasedSchema, MultiblockEntity, SerializerRegistry};
use crate::hooks::{ExplosionSource, Interactor, Projectile};
use crate::instance::MultiblockInstance;
use crate::pattern::{Choice, PatternDefinition};
use crate::transform::Transform;

// ---------------------------------------------------------------------------
// Callback vocabulary
// ---------------------------------------------------------------------------

/// Outcome of a cancellable callback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ActionResult {
    /// Let the action happen.
    #[default]
    Proceed,
    /// Cancel the action.
    Suppress,
}

impl ActionResult {
    /// Returns `true` for [`ActionResult::Suppress`].
    pub fn is_suppressed(self) -> bool {
        self == Self::Suppress
    }
}

/// What a tick handler sees.
pub struct TickContext<'a> {
    /// The ticking instance's origin.
    pub origin: &'a BlockLocation,
    /// The instance's orientation.
    pub transform: Transform,
    /// Server tick counter.
    pub tick: u64,
    /// The instance's entity, if its type has one.
    pub entity: Option<&'a mut (dyn MultiblockEntity + 'static)>,
}

impl TickContext<'_> {
    /// The entity downcast to `E`.
    pub fn entity_mut<E: MultiblockEntity>(&mut self) -> Option<&mut E> {
        self.entity.as_deref_mut()?.downcast_mut::<E>()
    }
}

/// A tick callback.
pub type TickHandler = Arc<dyn Fn(&mut TickContext<'_>) + Send + Sync>;

/// Whether and how instances of a type receive ticks. Fixed when the type is
/// built.
#[derive(Clone, Default)]
pub enum TickCapability {
    /// Instances are never ticked.
    #[default]
    NonTickable,
    /// Instances receive a server tick every tick job, and optionally a
    /// random tick.
    Tickable {
        /// Runs on every tick job.
        server: TickHandler,
        /// Runs with the configured random-tick probability.
        random: Option<TickHandler>,
    },
}

impl fmt::Debug for TickCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonTickable => f.write_str("NonTickable"),
            Self::Tickable { random, .. } => f
                .debug_struct("Tickable")
                .field("random", &random.is_some())
                .finish(),
        }
    }
}

/// Builds the entity for a new instance at the given origin.
pub type EntityFactory = Arc<dyn Fn(&BlockLocation) -> Box<dyn MultiblockEntity> + Send + Sync>;

/// Type-level callbacks. Every method has a default, so implementors only
/// override what they need.
pub trait MultiblockBehavior: Send + Sync {
    /// An instance became active (restored, or its chunk loaded).
    fn on_load(&self, _instance: &MultiblockInstance) {}

    /// An instance is going inactive (removed, or its chunk unloaded).
    fn on_unload(&self, _instance: &MultiblockInstance) {}

    /// A player completed the structure. Runs before placement;
    /// [`ActionResult::Suppress`] aborts construction.
    fn on_construct(
        &self,
        _interactor: &Interactor,
        _origin: &BlockLocation,
        _transform: Transform,
    ) -> ActionResult {
        ActionResult::Proceed
    }

    /// A player clicked a cell of an existing instance.
    fn on_interact(
        &self,
        _interactor: &Interactor,
        _instance: &mut MultiblockInstance,
        _clicked: &BlockLocation,
    ) -> ActionResult {
        ActionResult::Proceed
    }

    /// A player broke a cell of the instance.
    fn on_break(
        &self,
        _breaker: &Interactor,
        _instance: &mut MultiblockInstance,
        _broken: &BlockLocation,
    ) -> ActionResult {
        ActionResult::Proceed
    }

    /// An explosion is about to destroy cells of the instance.
    fn on_explosion(
        &self,
        _source: &ExplosionSource,
        _instance: &mut MultiblockInstance,
    ) -> ActionResult {
        ActionResult::Proceed
    }

    /// Redstone power at a cell changes from `old` to `new`. Returns the
    /// signal the host should apply.
    fn on_redstone(&self, _instance: &mut MultiblockInstance, _old: u8, _new: u8) -> u8 {
        0
    }

    /// A projectile struck a cell of the instance.
    fn on_projectile_hit(
        &self,
        _projectile: &Projectile,
        _instance: &mut MultiblockInstance,
    ) -> ActionResult {
        ActionResult::Proceed
    }
}

/// A behavior that keeps every default.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultBehavior;

impl MultiblockBehavior for DefaultBehavior {}

// ---------------------------------------------------------------------------
// MultiblockType
// ---------------------------------------------------------------------------

/// A registered multiblock type, shared by all its instances through `Arc`.
pub struct MultiblockType {
    pattern: PatternDefinition,
    trigger: Choice,
    tick: TickCapability,
    entity_factory: Option<EntityFactory>,
    schema: Option<Arc<dyn ErasedSchema>>,
    behavior: Arc<dyn MultiblockBehavior>,
}

impl MultiblockType {
    /// Starts a builder for a type matching `pattern`.
    pub fn builder(pattern: PatternDefinition) -> MultiblockTypeBuilder {
        MultiblockTypeBuilder {
            trigger: pattern.trigger().clone(),
            pattern,
            tick: TickCapability::NonTickable,
            entity_factory: None,
            schema: None,
            behavior: Arc::new(DefaultBehavior),
        }
    }

    /// The type id (same as the pattern id).
    pub fn id(&self) -> &Identifier {
        self.pattern.id()
    }

    /// The structure template.
    pub fn pattern(&self) -> &PatternDefinition {
        &self.pattern
    }

    /// The choice a clicked block must satisfy before a layout search runs.
    pub fn trigger(&self) -> &Choice {
        &self.trigger
    }

    /// How instances tick.
    pub fn tick_capability(&self) -> &TickCapability {
        &self.tick
    }

    /// Returns `true` if instances receive server ticks.
    pub fn is_tickable(&self) -> bool {
        matches!(self.tick, TickCapability::Tickable { .. })
    }

    /// Type-level callbacks.
    pub fn behavior(&self) -> &dyn MultiblockBehavior {
        self.behavior.as_ref()
    }

    /// Returns `true` if instances carry an entity.
    pub fn has_entity(&self) -> bool {
        self.entity_factory.is_some()
    }

    /// Builds a fresh entity for an instance at `origin`.
    pub fn create_entity(&self, origin: &BlockLocation) -> Option<Box<dyn MultiblockEntity>> {
        self.entity_factory.as_ref().map(|factory| factory(origin))
    }

    /// Encodes an entity's persisted fields with the codecs in
    /// `serializers`. Types without a schema encode to an empty object.
    pub fn encode_entity(
        &self,
        entity: &dyn MultiblockEntity,
        serializers: &SerializerRegistry,
    ) -> Result<Map<String, Value>, CodecError> {
        match &self.schema {
            Some(schema) => schema.encode(entity, serializers),
            None => Ok(Map::new()),
        }
    }

    /// Applies persisted fields to an entity.
    pub fn decode_entity(
        &self,
        entity: &mut dyn MultiblockEntity,
        map: &Map<String, Value>,
        serializers: &SerializerRegistry,
    ) -> Result<(), CodecError> {
        match &self.schema {
            Some(schema) => schema.decode(entity, map, serializers),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for MultiblockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiblockType")
            .field("id", self.id())
            .field("cells", &self.pattern.len())
            .field("tick", &self.tick)
            .field("entity", &self.has_entity())
            .finish()
    }
}

/// Builder returned by [`MultiblockType::builder`].
pub struct MultiblockTypeBuilder {
    pattern: PatternDefinition,
    trigger: Choice,
    tick: TickCapability,
    entity_factory: Option<EntityFactory>,
    schema: Option<Arc<dyn ErasedSchema>>,
    behavior: Arc<dyn MultiblockBehavior>,
}

impl MultiblockTypeBuilder {
    /// Overrides the trigger choice taken from the pattern.
    pub fn trigger(mut self, choice: Choice) -> Self {
        self.trigger = choice;
        self
    }

    /// Gives instances an entity with no persisted fields.
    pub fn entity<E: MultiblockEntity>(
        mut self,
        factory: impl Fn(&BlockLocation) -> E + Send + Sync + 'static,
    ) -> Self {
        let factory: EntityFactory = Arc::new(move |origin: &BlockLocation| {
            Box::new(factory(origin)) as Box<dyn MultiblockEntity>
        });
        self.entity_factory = Some(factory);
        self.schema = None;
        self
    }

    /// Gives instances an entity whose fields in `schema` are persisted.
    pub fn entity_with_schema<E: MultiblockEntity>(
        self,
        factory: impl Fn(&BlockLocation) -> E + Send + Sync + 'static,
        schema: DataSchema<E>,
    ) -> Self {
        let mut builder = self.entity(factory);
        let schema: Arc<dyn ErasedSchema> = Arc::new(schema);
        builder.schema = Some(schema);
        builder
    }

    /// Makes instances tickable with the given server-tick handler.
    pub fn on_tick(mut self, handler: impl Fn(&mut TickContext<'_>) + Send + Sync + 'static) -> Self {
        let random = match self.tick {
            TickCapability::Tickable { random, .. } => random,
            TickCapability::NonTickable => None,
        };
        self.tick = TickCapability::Tickable {
            server: Arc::new(handler),
            random,
        };
        self
    }

    /// Adds a random-tick handler. Also makes instances tickable.
    pub fn on_random_tick(
        mut self,
        handler: impl Fn(&mut TickContext<'_>) + Send + Sync + 'static,
    ) -> Self {
        let server: TickHandler = match self.tick {
            TickCapability::Tickable { server, .. } => server,
            TickCapability::NonTickable => Arc::new(|_: &mut TickContext<'_>| {}) as TickHandler,
        };
        self.tick = TickCapability::Tickable {
            server,
            random: Some(Arc::new(handler)),
        };
        self
    }

    /// Sets the type-level callbacks.
    pub fn behavior(mut self, behavior: impl MultiblockBehavior + 'static) -> Self {
        self.behavior = Arc::new(behavior);
        self
    }

    /// Finalizes the type.
    pub fn build(self) -> MultiblockType {
        MultiblockType {
            pattern: self.pattern,
            trigger: self.trigger,
            tick: self.tick,
            entity_factory: self.entity_factory,
            schema: self.schema,
            behavior: self.behavior,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
