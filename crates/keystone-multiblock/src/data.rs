//! Per-instance opaque data: the entity trait, field codecs and schemas.
//!
//! An entity's persisted state is a JSON object mapping field names to
//! encoded values. Which fields exist, and how each is encoded, is described
//! by a [`DataSchema`] built once per multiblock type. Codecs are looked up
//! by Rust type in a [`SerializerRegistry`] when the schema is built, so a
//! missing codec is reported at startup rather than on the first save.

use std::any::{Any, TypeId, type_name};
use std::marker::PhantomData;
use std::sync::Arc;

use keystone_world::{BlockAccess, BlockLocation, BlockPos, Identifier, WorldId};
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::transform::Transform;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced while encoding or decoding field values.
#[derive(Debug, Error)]
pub enum CodecError {
    /// No codec is registered for the Rust type.
    #[error("no codec registered for type {0}")]
    NoCodec(&'static str),
    /// The JSON value could not be converted.
    #[error("field {field}: {source}")]
    Json {
        /// Field being converted.
        field: String,
        /// Underlying serde_json error.
        #[source]
        source: serde_json::Error,
    },
    /// The stored payload is not a JSON object.
    #[error("payload is not a JSON object")]
    NotAnObject,
    /// The payload text is not valid JSON.
    #[error("malformed payload: {0}")]
    Malformed(#[source] serde_json::Error),
    /// A schema was used with an entity of a different Rust type.
    #[error("schema for {expected} used with a different entity type")]
    EntityType {
        /// Entity type the schema was built for.
        expected: &'static str,
    },
}

/// Errors produced while building a [`DataSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The serializer registry has no codec for a field's type.
    #[error("field {field}: no codec registered for type {type_name}")]
    NoCodec {
        /// Field name.
        field: String,
        /// Rust type of the field.
        type_name: &'static str,
    },
    /// Two fields share a name.
    #[error("duplicate field name: {0}")]
    DuplicateField(String),
}

/// Errors raised by entity lifecycle hooks.
#[derive(Debug, Error)]
pub enum EntityError {
    /// The entity refused to load.
    #[error("entity load failed: {0}")]
    Load(String),
    /// Persisted fields could not be applied.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// Upcasting helper so type-erased entities can be downcast to their
/// concrete type.
pub trait AsAny: Any {
    /// `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
    /// `self` as `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// What an entity sees while loading.
pub struct EntityContext<'a> {
    /// The owning instance's origin.
    pub origin: &'a BlockLocation,
    /// The owning instance's orientation.
    pub transform: Transform,
    /// The world. If the placement fails, only the pattern's cells are
    /// restored; writes elsewhere stay.
    pub world: &'a mut dyn BlockAccess,
}

/// Per-instance behavior and state attached to a multiblock instance.
///
/// Owned exclusively by its instance. Persisted fields are declared through
/// the type's [`DataSchema`], not by the entity itself.
pub trait MultiblockEntity: AsAny + Send {
    /// Runs after construction (and, on restore, after persisted fields are
    /// applied). An error aborts the placement.
    fn on_load(&mut self, _ctx: &mut EntityContext<'_>) -> Result<(), EntityError> {
        Ok(())
    }

    /// Runs before every serialization.
    fn on_save(&mut self) {}

    /// Runs when the instance is removed or its chunk unloads.
    fn on_unload(&mut self) {}
}

impl<'a> dyn MultiblockEntity + 'a {
    /// Downcasts to the concrete entity type.
    pub fn downcast_ref<E: MultiblockEntity>(&self) -> Option<&E> {
        self.as_any().downcast_ref::<E>()
    }

    /// Downcasts to the concrete entity type, mutably.
    pub fn downcast_mut<E: MultiblockEntity>(&mut self) -> Option<&mut E> {
        self.as_any_mut().downcast_mut::<E>()
    }
}

// ---------------------------------------------------------------------------
// Codecs
// ---------------------------------------------------------------------------

/// Converts values of one Rust type to and from JSON.
pub trait FieldCodec<T>: Send + Sync {
    /// Encodes `value`.
    fn encode(&self, value: &T) -> Result<Value, serde_json::Error>;
    /// Decodes `value`.
    fn decode(&self, value: &Value) -> Result<T, serde_json::Error>;
}

/// A [`FieldCodec`] for any serde type.
pub struct SerdeCodec<T>(PhantomData<fn() -> T>);

impl<T> SerdeCodec<T> {
    /// Creates the codec.
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for SerdeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned> FieldCodec<T> for SerdeCodec<T> {
    fn encode(&self, value: &T) -> Result<Value, serde_json::Error> {
        serde_json::to_value(value)
    }

    fn decode(&self, value: &Value) -> Result<T, serde_json::Error> {
        serde_json::from_value(value.clone())
    }
}

struct CodecEntry {
    type_name: &'static str,
    /// Holds an `Arc<dyn FieldCodec<T>>` for the keyed `T`.
    codec: Box<dyn Any + Send + Sync>,
}

/// Field codecs keyed by Rust type.
#[derive(Default)]
pub struct SerializerRegistry {
    codecs: FxHashMap<TypeId, CodecEntry>,
}

impl SerializerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with codecs for the primitive types, `String`,
    /// identifiers and positions.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_serde::<bool>();
        registry.register_serde::<i32>();
        registry.register_serde::<i64>();
        registry.register_serde::<u8>();
        registry.register_serde::<u32>();
        registry.register_serde::<u64>();
        registry.register_serde::<f32>();
        registry.register_serde::<f64>();
        registry.register_serde::<String>();
        registry.register_serde::<Vec<String>>();
        registry.register_serde::<Option<String>>();
        registry.register_serde::<Identifier>();
        registry.register_serde::<WorldId>();
        registry.register_serde::<BlockPos>();
        registry.register_serde::<BlockLocation>();
        registry
    }

    /// Registers (or replaces) the codec for `T`.
    pub fn register<T: 'static>(&mut self, codec: impl FieldCodec<T> + 'static) {
        let codec: Arc<dyn FieldCodec<T>> = Arc::new(codec);
        self.codecs.insert(
            TypeId::of::<T>(),
            CodecEntry {
                type_name: type_name::<T>(),
                codec: Box::new(codec),
            },
        );
    }

    /// Registers a [`SerdeCodec`] for `T`.
    pub fn register_serde<T: Serialize + DeserializeOwned + 'static>(&mut self) {
        self.register::<T>(SerdeCodec::<T>::new());
    }

    /// Returns `true` if a codec for `T` is registered.
    pub fn has<T: 'static>(&self) -> bool {
        self.codecs.contains_key(&TypeId::of::<T>())
    }

    /// Returns the codec for `T`.
    pub fn get<T: 'static>(&self) -> Option<Arc<dyn FieldCodec<T>>> {
        self.codecs
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.codec.downcast_ref::<Arc<dyn FieldCodec<T>>>())
            .cloned()
    }

    /// Encodes `value` with the codec for `T`.
    pub fn serialize<T: 'static>(&self, value: &T) -> Result<Value, CodecError> {
        let codec = self.get::<T>().ok_or(CodecError::NoCodec(type_name::<T>()))?;
        codec.encode(value).map_err(|source| CodecError::Json {
            field: type_name::<T>().to_string(),
            source,
        })
    }

    /// Decodes a `T` with the codec for `T`.
    pub fn deserialize<T: 'static>(&self, value: &Value) -> Result<T, CodecError> {
        let codec = self.get::<T>().ok_or(CodecError::NoCodec(type_name::<T>()))?;
        codec.decode(value).map_err(|source| CodecError::Json {
            field: type_name::<T>().to_string(),
            source,
        })
    }

    /// Number of registered codecs.
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    /// Returns `true` if no codec is registered.
    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    /// Type names with a registered codec, for diagnostics.
    pub fn type_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.codecs.values().map(|entry| entry.type_name)
    }
}

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

type EncodeFn<E> = Box<dyn Fn(&E, &SerializerRegistry) -> Result<Value, CodecError> + Send + Sync>;
type DecodeFn<E> =
    Box<dyn Fn(&mut E, &Value, &SerializerRegistry) -> Result<(), CodecError> + Send + Sync>;

struct SchemaField<E> {
    name: String,
    encode: EncodeFn<E>,
    decode: DecodeFn<E>,
}

/// The ordered persisted fields of entity type `E`.
pub struct DataSchema<E> {
    fields: Vec<SchemaField<E>>,
}

impl<E: MultiblockEntity> DataSchema<E> {
    /// Starts a schema whose field types are checked against `registry`.
    ///
    /// Values are converted with the codecs of the registry handed to
    /// [`encode`](Self::encode) and [`decode`](Self::decode), so a codec
    /// replaced after the schema is built still applies.
    pub fn builder(registry: &SerializerRegistry) -> DataSchemaBuilder<'_, E> {
        DataSchemaBuilder {
            registry,
            fields: Vec::new(),
        }
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Encodes every field of `entity` into a JSON object.
    pub fn encode(
        &self,
        entity: &E,
        registry: &SerializerRegistry,
    ) -> Result<Map<String, Value>, CodecError> {
        let mut map = Map::new();
        for field in &self.fields {
            map.insert(field.name.clone(), (field.encode)(entity, registry)?);
        }
        Ok(map)
    }

    /// Applies the fields present in `map` to `entity`. Absent fields keep
    /// their current value; unknown keys are ignored.
    pub fn decode(
        &self,
        entity: &mut E,
        map: &Map<String, Value>,
        registry: &SerializerRegistry,
    ) -> Result<(), CodecError> {
        for field in &self.fields {
            if let Some(value) = map.get(&field.name) {
                (field.decode)(entity, value, registry)?;
            }
        }
        Ok(())
    }
}

/// Builder returned by [`DataSchema::builder`].
pub struct DataSchemaBuilder<'r, E> {
    registry: &'r SerializerRegistry,
    fields: Vec<SchemaField<E>>,
}

impl<E: MultiblockEntity> DataSchemaBuilder<'_, E> {
    /// Declares a persisted field of type `T` reached through `get`/`get_mut`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::NoCodec`] if the registry has no codec for `T`
    /// and [`SchemaError::DuplicateField`] if `name` is already declared.
    pub fn field<T: 'static>(
        mut self,
        name: &str,
        get: fn(&E) -> &T,
        get_mut: fn(&mut E) -> &mut T,
    ) -> Result<Self, SchemaError> {
        if self.fields.iter().any(|f| f.name == name) {
            return Err(SchemaError::DuplicateField(name.to_string()));
        }
        if !self.registry.has::<T>() {
            return Err(SchemaError::NoCodec {
                field: name.to_string(),
                type_name: type_name::<T>(),
            });
        }

        let encode_name = name.to_string();
        let decode_name = name.to_string();
        self.fields.push(SchemaField {
            name: name.to_string(),
            encode: Box::new(move |entity: &E, registry: &SerializerRegistry| {
                let codec = registry.get::<T>().ok_or(CodecError::NoCodec(type_name::<T>()))?;
                codec.encode(get(entity)).map_err(|source| CodecError::Json {
                    field: encode_name.clone(),
                    source,
                })
            }),
            decode: Box::new(
                move |entity: &mut E, value: &Value, registry: &SerializerRegistry| {
                    let codec =
                        registry.get::<T>().ok_or(CodecError::NoCodec(type_name::<T>()))?;
                    *get_mut(entity) = codec.decode(value).map_err(|source| CodecError::Json {
                        field: decode_name.clone(),
                        source,
                    })?;
                    Ok(())
                },
            ),
        });
        Ok(self)
    }

    /// Finalizes the schema.
    pub fn build(self) -> DataSchema<E> {
        DataSchema {
            fields: self.fields,
        }
    }
}

/// A [`DataSchema`] with its entity type erased, as stored on a multiblock
/// type.
pub trait ErasedSchema: Send + Sync {
    /// Encodes `entity` into a JSON object.
    fn encode(
        &self,
        entity: &dyn MultiblockEntity,
        registry: &SerializerRegistry,
    ) -> Result<Map<String, Value>, CodecError>;
    /// Applies `map` to `entity`.
    fn decode(
        &self,
        entity: &mut dyn MultiblockEntity,
        map: &Map<String, Value>,
        registry: &SerializerRegistry,
    ) -> Result<(), CodecError>;
}

impl<E: MultiblockEntity> ErasedSchema for DataSchema<E> {
    fn encode(
        &self,
        entity: &dyn MultiblockEntity,
        registry: &SerializerRegistry,
    ) -> Result<Map<String, Value>, CodecError> {
        let entity = entity.downcast_ref::<E>().ok_or(CodecError::EntityType {
            expected: type_name::<E>(),
        })?;
        DataSchema::encode(self, entity, registry)
    }

    fn decode(
        &self,
        entity: &mut dyn MultiblockEntity,
        map: &Map<String, Value>,
        registry: &SerializerRegistry,
    ) -> Result<(), CodecError> {
        let entity = entity.downcast_mut::<E>().ok_or(CodecError::EntityType {
            expected: type_name::<E>(),
        })?;
        DataSchema::decode(self, entity, map, registry)
    }
}

// ---------------------------------------------------------------------------
// Payload text
// ---------------------------------------------------------------------------

/// The payload stored for an instance without persisted fields.
pub const EMPTY_PAYLOAD: &str = "{}";

/// Renders a field map as payload text.
pub fn payload_to_string(map: &Map<String, Value>) -> String {
    Value::Object(map.clone()).to_string()
}

/// Parses payload text into a field map.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] for invalid JSON and
/// [`CodecError::NotAnObject`] for any non-object value.
pub fn payload_from_str(text: &str) -> Result<Map<String, Value>, CodecError> {
    match serde_json::from_str::<Value>(text).map_err(CodecError::Malformed)? {
        Value::Object(map) => Ok(map),
        _ => Err(CodecError::NotAnObject),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Furnace {
        fuel: u32,
        owner: String,
        target: Option<String>,
        unsaved: bool,
    }

    impl MultiblockEntity for Furnace {
        fn on_save(&mut self) {
            self.unsaved = false;
        }
    }

    struct Other;
    impl MultiblockEntity for Other {}

    fn schema(registry: &SerializerRegistry) -> DataSchema<Furnace> {
        DataSchema::builder(registry)
            .field("fuel", |e: &Furnace| &e.fuel, |e: &mut Furnace| &mut e.fuel)
            .unwrap()
            .field("owner", |e: &Furnace| &e.owner, |e: &mut Furnace| &mut e.owner)
            .unwrap()
            .field("target", |e: &Furnace| &e.target, |e: &mut Furnace| &mut e.target)
            .unwrap()
            .build()
    }

    #[test]
    fn test_registry_has_defaults() {
        let registry = SerializerRegistry::with_defaults();
        assert!(registry.has::<u32>());
        assert!(registry.has::<String>());
        assert!(registry.has::<BlockLocation>());
        assert!(!registry.has::<Vec<u8>>());
        assert!(!SerializerRegistry::new().has::<u32>());
    }

    #[test]
    fn test_registry_serialize_round_trip() {
        let registry = SerializerRegistry::with_defaults();
        let loc = BlockLocation::at("world", 1, -2, 3);
        let value = registry.serialize(&loc).unwrap();
        assert_eq!(registry.deserialize::<BlockLocation>(&value).unwrap(), loc);
        assert!(matches!(
            registry.serialize(&vec![1u8]),
            Err(CodecError::NoCodec(_))
        ));
    }

    #[test]
    fn test_schema_requires_codec() {
        let registry = SerializerRegistry::new();
        let err = DataSchema::builder(&registry)
            .field("fuel", |e: &Furnace| &e.fuel, |e: &mut Furnace| &mut e.fuel)
            .err()
            .unwrap();
        assert!(matches!(err, SchemaError::NoCodec { ref field, .. } if field == "fuel"));
    }

    #[test]
    fn test_schema_rejects_duplicate_field() {
        let registry = SerializerRegistry::with_defaults();
        let err = DataSchema::builder(&registry)
            .field("fuel", |e: &Furnace| &e.fuel, |e: &mut Furnace| &mut e.fuel)
            .unwrap()
            .field("fuel", |e: &Furnace| &e.fuel, |e: &mut Furnace| &mut e.fuel)
            .err()
            .unwrap();
        assert_eq!(err, SchemaError::DuplicateField("fuel".to_string()));
    }

    #[test]
    fn test_schema_encode_decode_through_erased() {
        let registry = SerializerRegistry::with_defaults();
        let schema: Arc<dyn ErasedSchema> = Arc::new(schema(&registry));

        let mut entity: Box<dyn MultiblockEntity> = Box::new(Furnace {
            fuel: 12,
            owner: "steve".to_string(),
            target: Some("minecraft:iron_ingot".to_string()),
            unsaved: true,
        });
        let text = payload_to_string(&schema.encode(entity.as_ref(), &registry).unwrap());

        let mut restored: Box<dyn MultiblockEntity> = Box::new(Furnace::default());
        schema
            .decode(restored.as_mut(), &payload_from_str(&text).unwrap(), &registry)
            .unwrap();

        let restored = restored.downcast_ref::<Furnace>().unwrap();
        assert_eq!(restored.fuel, 12);
        assert_eq!(restored.owner, "steve");
        assert_eq!(restored.target.as_deref(), Some("minecraft:iron_ingot"));

        entity.on_save();
        assert!(!entity.downcast_ref::<Furnace>().unwrap().unsaved);
    }

    #[test]
    fn test_decode_keeps_absent_fields() {
        let registry = SerializerRegistry::with_defaults();
        let schema = schema(&registry);
        let mut entity = Furnace {
            fuel: 7,
            ..Furnace::default()
        };
        schema
            .decode(
                &mut entity,
                &payload_from_str(r#"{"owner":"alex","extra":1}"#).unwrap(),
                &registry,
            )
            .unwrap();
        assert_eq!(entity.fuel, 7);
        assert_eq!(entity.owner, "alex");
    }

    #[test]
    fn test_decode_type_mismatch_names_field() {
        let registry = SerializerRegistry::with_defaults();
        let mut entity = Furnace::default();
        let err = schema(&registry)
            .decode(&mut entity, &payload_from_str(r#"{"fuel":"lots"}"#).unwrap(), &registry)
            .unwrap_err();
        assert!(matches!(err, CodecError::Json { ref field, .. } if field == "fuel"));
    }

    #[test]
    fn test_erased_schema_rejects_wrong_entity() {
        let registry = SerializerRegistry::with_defaults();
        let schema: Arc<dyn ErasedSchema> = Arc::new(schema(&registry));
        let other: Box<dyn MultiblockEntity> = Box::new(Other);
        assert!(matches!(
            schema.encode(other.as_ref(), &registry),
            Err(CodecError::EntityType { .. })
        ));
    }

    /// Writes `u32` values as hex strings.
    struct HexCodec;

    impl FieldCodec<u32> for HexCodec {
        fn encode(&self, value: &u32) -> Result<Value, serde_json::Error> {
            Ok(Value::String(format!("{value:x}")))
        }

        fn decode(&self, value: &Value) -> Result<u32, serde_json::Error> {
            let text: String = serde_json::from_value(value.clone())?;
            u32::from_str_radix(&text, 16).map_err(<serde_json::Error as serde::de::Error>::custom)
        }
    }

    #[test]
    fn test_schema_uses_codecs_of_the_registry_it_is_given() {
        let defaults = SerializerRegistry::with_defaults();
        let schema = schema(&defaults);
        let mut hex = SerializerRegistry::with_defaults();
        hex.register::<u32>(HexCodec);

        let entity = Furnace {
            fuel: 255,
            ..Furnace::default()
        };
        assert_eq!(schema.encode(&entity, &defaults).unwrap()["fuel"], Value::from(255));
        let map = schema.encode(&entity, &hex).unwrap();
        assert_eq!(map["fuel"], Value::from("ff"));

        let mut restored = Furnace::default();
        schema.decode(&mut restored, &map, &hex).unwrap();
        assert_eq!(restored.fuel, 255);

        // A registry missing the codec fails at use, naming the type.
        assert!(matches!(
            schema.encode(&entity, &SerializerRegistry::new()),
            Err(CodecError::NoCodec(_))
        ));
    }

    #[test]
    fn test_payload_parsing() {
        assert!(payload_from_str(EMPTY_PAYLOAD).unwrap().is_empty());
        assert!(matches!(payload_from_str("[1,2]"), Err(CodecError::NotAnObject)));
        assert!(matches!(payload_from_str("{"), Err(CodecError::Malformed(_))));
    }
}
