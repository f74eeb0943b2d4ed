//! Multiblock structure recognition and lifecycle engine.
//!
//! Declarative [`PatternDefinition`]s are matched against the world under every
//! rotation and mirror ([`search`]); a match is placed transactionally
//! ([`placement`]) into the [`InstanceRegistry`], which guarantees that no two
//! instances share a cell, persists every instance to SQLite ([`store`]) and
//! restores them at startup. The host drives everything through
//! [`MultiblockEngine`]: event [`hooks`] in, scheduled jobs ([`schedule`]) out.

pub mod data;
pub mod engine;
pub mod hooks;
pub mod instance;
pub mod multiblock;
pub mod pattern;
pub mod placement;
pub mod registry;
pub mod schedule;
pub mod search;
pub mod store;
pub mod transform;
pub mod type_registry;

pub use data::{
    CodecError, DataSchema, DataSchemaBuilder, EntityContext, EntityError, FieldCodec,
    MultiblockEntity, SchemaError, SerdeCodec, SerializerRegistry,
};
pub use engine::MultiblockEngine;
pub use hooks::{
    EnvironmentalChange, ExplosionSource, InteractAction, InteractOutcome, Interactor, Projectile,
};
pub use instance::MultiblockInstance;
pub use multiblock::{
    ActionResult, DefaultBehavior, MultiblockBehavior, MultiblockType, MultiblockTypeBuilder,
    TickCapability, TickContext,
};
pub use pattern::{Choice, LayoutBuilder, PatternBuilder, PatternDefinition, PatternError, RelativeBlockPos};
pub use placement::{PlacementError, PlacementMode};
pub use registry::{InstanceRegistry, LoadReport, RegistryError};
pub use schedule::{EngineJob, RepeatingTask, Scheduler, TickScheduler};
pub use search::{Occupancy, Unoccupied};
pub use store::{InstanceStore, SqliteStore, StoreError, StoredInstance};
pub use transform::{Rotation, Transform};
pub use type_registry::{MultiblockTypeRegistry, TypeRegistryError};
