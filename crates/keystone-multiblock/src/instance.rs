//! Live multiblock instances.

use std::fmt;
use std::sync::Arc;

use keystone_world::{BlockLocation, ChunkPos, Identifier};
use rand::Rng;

use crate::data::{CodecError, EMPTY_PAYLOAD, MultiblockEntity, SerializerRegistry, payload_to_string};
use crate::multiblock::{MultiblockType, TickCapability, TickContext};
use crate::pattern::{Choice, RelativeBlockPos};
use crate::search;
use crate::store::StoredInstance;
use crate::transform::Transform;

/// A placed multiblock: a type bound to an origin under a fixed transform.
///
/// The origin is the absolute position of the pattern's `(0, 0, 0)` and is
/// always block-aligned. The transform never changes after construction.
///
/// An instance whose chunk has unloaded stays indexed but is not ticked
/// until the chunk loads again.
pub struct MultiblockInstance {
    kind: Arc<MultiblockType>,
    origin: BlockLocation,
    transform: Transform,
    entity: Option<Box<dyn MultiblockEntity>>,
    loaded: bool,
}

impl MultiblockInstance {
    /// Creates an instance without an entity.
    pub fn new(kind: Arc<MultiblockType>, origin: BlockLocation, transform: Transform) -> Self {
        Self {
            kind,
            origin,
            transform,
            entity: None,
            loaded: true,
        }
    }

    /// The instance's type.
    pub fn kind(&self) -> &Arc<MultiblockType> {
        &self.kind
    }

    /// The type id.
    pub fn id(&self) -> &Identifier {
        self.kind.id()
    }

    /// The origin cell.
    pub fn origin(&self) -> &BlockLocation {
        &self.origin
    }

    /// The discovered orientation.
    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// The chunk column holding the origin.
    pub fn chunk(&self) -> ChunkPos {
        self.origin.chunk()
    }

    /// Every absolute cell of the instance, in pattern order.
    pub fn cells(&self) -> Vec<BlockLocation> {
        search::cells_at(self.kind.pattern(), &self.origin, self.transform)
    }

    /// Pattern offset of `at`, if `at` is a cell of this instance.
    fn offset_of(&self, at: &BlockLocation) -> Option<RelativeBlockPos> {
        if at.world != self.origin.world {
            return None;
        }
        let rel = RelativeBlockPos::new(
            at.pos.x - self.origin.pos.x,
            at.pos.y - self.origin.pos.y,
            at.pos.z - self.origin.pos.z,
        );
        let offset = self.transform.inverse(rel);
        self.kind.pattern().contains(offset).then_some(offset)
    }

    /// Returns `true` if `at` is a cell of this instance.
    pub fn contains(&self, at: &BlockLocation) -> bool {
        self.offset_of(at).is_some()
    }

    /// The pattern choice governing `at`, if `at` is a cell of this instance.
    pub fn choice_at_block(&self, at: &BlockLocation) -> Option<&Choice> {
        self.offset_of(at)
            .and_then(|offset| self.kind.pattern().choice(offset))
    }

    /// The entity, if the type has one.
    pub fn entity(&self) -> Option<&dyn MultiblockEntity> {
        self.entity.as_deref()
    }

    /// The entity, mutably.
    pub fn entity_mut(&mut self) -> Option<&mut (dyn MultiblockEntity + 'static)> {
        self.entity.as_deref_mut()
    }

    /// The entity downcast to `E`.
    pub fn entity_as<E: MultiblockEntity>(&self) -> Option<&E> {
        self.entity.as_deref()?.downcast_ref::<E>()
    }

    /// The entity downcast to `E`, mutably.
    pub fn entity_as_mut<E: MultiblockEntity>(&mut self) -> Option<&mut E> {
        self.entity.as_deref_mut()?.downcast_mut::<E>()
    }

    pub(crate) fn set_entity(&mut self, entity: Option<Box<dyn MultiblockEntity>>) {
        self.entity = entity;
    }

    /// Returns `false` while the chunk holding the origin is unloaded.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub(crate) fn set_loaded(&mut self, loaded: bool) {
        self.loaded = loaded;
    }

    /// Runs the type's server-tick handler. Returns `false` for
    /// non-tickable types and while unloaded.
    pub fn tick_if_applicable(&mut self, tick: u64) -> bool {
        if !self.loaded {
            return false;
        }
        let TickCapability::Tickable { server, .. } = self.kind.tick_capability() else {
            return false;
        };
        server(&mut TickContext {
            origin: &self.origin,
            transform: self.transform,
            tick,
            entity: self.entity.as_deref_mut(),
        });
        true
    }

    /// Runs the type's random-tick handler with probability `chance`.
    /// Returns `true` if the handler ran.
    pub fn random_tick(&mut self, tick: u64, chance: f64, rng: &mut impl Rng) -> bool {
        if !self.loaded {
            return false;
        }
        let TickCapability::Tickable {
            random: Some(random),
            ..
        } = self.kind.tick_capability()
        else {
            return false;
        };
        if rng.random::<f64>() >= chance {
            return false;
        }
        random(&mut TickContext {
            origin: &self.origin,
            transform: self.transform,
            tick,
            entity: self.entity.as_deref_mut(),
        });
        true
    }

    /// Runs the entity's save hook and encodes the instance as a storage row
    /// with the codecs in `serializers`.
    pub fn to_stored(&mut self, serializers: &SerializerRegistry) -> Result<StoredInstance, CodecError> {
        let data = match self.entity.as_deref_mut() {
            Some(entity) => {
                entity.on_save();
                payload_to_string(&self.kind.encode_entity(entity, serializers)?)
            }
            None => EMPTY_PAYLOAD.to_string(),
        };
        Ok(StoredInstance::new(
            &self.origin,
            self.kind.id(),
            self.transform,
            data,
        ))
    }
}

impl fmt::Debug for MultiblockInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiblockInstance")
            .field("id", self.id())
            .field("origin", &self.origin)
            .field("transform", &self.transform)
            .field("entity", &self.entity.is_some())
            .field("loaded", &self.loaded)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataSchema, SerializerRegistry};
    use crate::pattern::PatternDefinition;
    use crate::transform::Rotation;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn id(s: &str) -> Identifier {
        Identifier::parse(s).unwrap()
    }

    #[derive(Default)]
    struct Tank {
        level: u32,
        saves: u32,
    }

    impl MultiblockEntity for Tank {
        fn on_save(&mut self) {
            self.saves += 1;
        }
    }

    fn l_shape() -> PatternDefinition {
        PatternDefinition::builder(id("test:l"))
            .cell(0, 0, 0, Choice::Material(id("test:core")))
            .cell(1, 0, 0, Choice::Material(id("test:arm")))
            .cell(0, 1, 0, Choice::Any)
            .build()
            .unwrap()
    }

    fn tank_type() -> Arc<MultiblockType> {
        let registry = SerializerRegistry::with_defaults();
        let schema = DataSchema::builder(&registry)
            .field("level", |e: &Tank| &e.level, |e: &mut Tank| &mut e.level)
            .unwrap()
            .build();
        Arc::new(
            MultiblockType::builder(l_shape())
                .entity_with_schema(|_| Tank::default(), schema)
                .on_tick(|ctx| {
                    if let Some(tank) = ctx.entity_mut::<Tank>() {
                        tank.level += 1;
                    }
                })
                .on_random_tick(|ctx| {
                    if let Some(tank) = ctx.entity_mut::<Tank>() {
                        tank.level += 100;
                    }
                })
                .build(),
        )
    }

    #[test]
    fn test_choice_at_block_respects_transform() {
        let kind = Arc::new(MultiblockType::builder(l_shape()).build());
        let instance = MultiblockInstance::new(
            kind,
            BlockLocation::at("w", 10, 64, 10),
            Transform::new(Rotation::R180, false),
        );

        // R180 sends the arm to -x.
        assert!(matches!(
            instance.choice_at_block(&BlockLocation::at("w", 9, 64, 10)),
            Some(Choice::Material(m)) if *m == id("test:arm")
        ));
        assert!(instance.choice_at_block(&BlockLocation::at("w", 11, 64, 10)).is_none());
        assert!(instance.contains(&BlockLocation::at("w", 10, 65, 10)));
        assert!(instance.choice_at_block(&BlockLocation::at("other", 10, 64, 10)).is_none());
    }

    #[test]
    fn test_cells_match_contains() {
        let kind = Arc::new(MultiblockType::builder(l_shape()).build());
        let instance = MultiblockInstance::new(
            kind,
            BlockLocation::at("w", 0, 0, 0),
            Transform::new(Rotation::R90, true),
        );
        let cells = instance.cells();
        assert_eq!(cells.len(), 3);
        assert!(cells.iter().all(|c| instance.contains(c)));
    }

    #[test]
    fn test_tick_non_tickable() {
        let kind = Arc::new(MultiblockType::builder(l_shape()).build());
        let mut instance =
            MultiblockInstance::new(kind, BlockLocation::at("w", 0, 0, 0), Transform::IDENTITY);
        assert!(!instance.tick_if_applicable(0));
    }

    #[test]
    fn test_tick_reaches_entity() {
        let kind = tank_type();
        let origin = BlockLocation::at("w", 0, 0, 0);
        let mut instance = MultiblockInstance::new(Arc::clone(&kind), origin.clone(), Transform::IDENTITY);
        instance.set_entity(kind.create_entity(&origin));

        assert!(instance.tick_if_applicable(1));
        assert!(instance.tick_if_applicable(2));
        assert_eq!(instance.entity_as::<Tank>().unwrap().level, 2);
    }

    #[test]
    fn test_unloaded_instance_is_not_ticked() {
        let kind = tank_type();
        let origin = BlockLocation::at("w", 0, 0, 0);
        let mut instance = MultiblockInstance::new(Arc::clone(&kind), origin.clone(), Transform::IDENTITY);
        instance.set_entity(kind.create_entity(&origin));
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        instance.set_loaded(false);
        assert!(!instance.is_loaded());
        assert!(!instance.tick_if_applicable(1));
        assert!(!instance.random_tick(1, 1.0, &mut rng));
        assert_eq!(instance.entity_as::<Tank>().unwrap().level, 0);

        instance.set_loaded(true);
        assert!(instance.tick_if_applicable(2));
        assert_eq!(instance.entity_as::<Tank>().unwrap().level, 1);
    }

    #[test]
    fn test_random_tick_probability_bounds() {
        let kind = tank_type();
        let origin = BlockLocation::at("w", 0, 0, 0);
        let mut instance = MultiblockInstance::new(Arc::clone(&kind), origin.clone(), Transform::IDENTITY);
        instance.set_entity(kind.create_entity(&origin));
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        assert!(!instance.random_tick(0, 0.0, &mut rng));
        assert!(instance.random_tick(0, 1.0, &mut rng));
        assert_eq!(instance.entity_as::<Tank>().unwrap().level, 100);
    }

    #[test]
    fn test_to_stored_runs_save_hook() {
        let kind = tank_type();
        let origin = BlockLocation::at("w", -3, 70, 12);
        let mut instance =
            MultiblockInstance::new(Arc::clone(&kind), origin.clone(), Transform::new(Rotation::R270, true));
        instance.set_entity(kind.create_entity(&origin));
        instance.entity_as_mut::<Tank>().unwrap().level = 42;

        let row = instance.to_stored(&SerializerRegistry::with_defaults()).unwrap();
        assert_eq!(row.world, "w");
        assert_eq!((row.x, row.y, row.z), (-3, 70, 12));
        assert_eq!(row.id, "test:l");
        assert_eq!(row.rotation, 3);
        assert!(row.mirror);
        assert_eq!(row.data, r#"{"level":42}"#);
        assert_eq!(instance.entity_as::<Tank>().unwrap().saves, 1);
    }

    #[test]
    fn test_to_stored_without_entity() {
        let kind = Arc::new(MultiblockType::builder(l_shape()).build());
        let mut instance =
            MultiblockInstance::new(kind, BlockLocation::at("w", 0, 0, 0), Transform::IDENTITY);
        assert_eq!(
            instance.to_stored(&SerializerRegistry::with_defaults()).unwrap().data,
            EMPTY_PAYLOAD
        );
    }
}
