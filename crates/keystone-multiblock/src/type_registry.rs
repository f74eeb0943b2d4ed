//! Multiblock type registry: maps [`Identifier`]s to shared [`MultiblockType`]s.
//!
//! The registry is built once during startup and then only read. Iteration
//! follows registration order, which is also the order construction tries
//! candidate types in.

use std::sync::Arc;

use keystone_world::Identifier;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::multiblock::MultiblockType;

/// Errors that can occur during type registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeRegistryError {
    /// A type with the same id has already been registered.
    #[error("duplicate multiblock type id: {0}")]
    DuplicateId(Identifier),
}

/// Maps type ids to types with O(1) lookup and stable iteration order.
#[derive(Default)]
pub struct MultiblockTypeRegistry {
    /// Dense list in registration order.
    types: Vec<Arc<MultiblockType>>,
    /// Reverse lookup: id -> index into `types`.
    by_id: FxHashMap<Identifier, usize>,
}

impl MultiblockTypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type and returns the shared handle.
    ///
    /// # Errors
    ///
    /// Returns [`TypeRegistryError::DuplicateId`] if a type with the same id
    /// already exists.
    pub fn register(&mut self, kind: MultiblockType) -> Result<Arc<MultiblockType>, TypeRegistryError> {
        if self.by_id.contains_key(kind.id()) {
            return Err(TypeRegistryError::DuplicateId(kind.id().clone()));
        }
        let kind = Arc::new(kind);
        self.by_id.insert(kind.id().clone(), self.types.len());
        self.types.push(Arc::clone(&kind));
        Ok(kind)
    }

    /// Returns the type registered under `id`.
    pub fn get(&self, id: &Identifier) -> Option<&Arc<MultiblockType>> {
        self.by_id.get(id).map(|&i| &self.types[i])
    }

    /// Parses `id` and looks it up. Malformed ids resolve to `None`.
    pub fn get_str(&self, id: &str) -> Option<&Arc<MultiblockType>> {
        Identifier::parse(id).ok().and_then(|id| self.get(&id))
    }

    /// Iterates types in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<MultiblockType>> + '_ {
        self.types.iter()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if no type is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
