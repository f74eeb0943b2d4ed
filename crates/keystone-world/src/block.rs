//! Block states as seen by the multiblock engine.
//!
//! The block registry itself lives in the host. A [`BlockState`] is the
//! engine's view of one cell: its material, the tags the host's registry
//! attaches to that material, and free-form state properties.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::identifier::Identifier;

/// Namespace of built-in materials.
const CORE_NAMESPACE: &str = "minecraft";

/// The state of a single world cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockState {
    /// Material identifier (e.g. `minecraft:iron_block`).
    pub material: Identifier,
    /// Tags the host block registry assigns to the material.
    #[serde(default)]
    pub tags: BTreeSet<Identifier>,
    /// Block state properties (e.g. `facing = north`).
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl BlockState {
    /// A state with the given material and no tags or properties.
    pub fn of(material: Identifier) -> Self {
        Self {
            material,
            tags: BTreeSet::new(),
            properties: BTreeMap::new(),
        }
    }

    /// The empty cell.
    pub fn air() -> Self {
        Self::of(air_material())
    }

    /// Adds a tag (builder style).
    pub fn with_tag(mut self, tag: Identifier) -> Self {
        self.tags.insert(tag);
        self
    }

    /// Sets a property (builder style).
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns `true` if this cell is empty.
    pub fn is_air(&self) -> bool {
        self.material.namespace() == CORE_NAMESPACE
            && matches!(self.material.path(), "air" | "cave_air" | "void_air")
    }

    /// Returns `true` if the material carries `tag`.
    pub fn has_tag(&self, tag: &Identifier) -> bool {
        self.tags.contains(tag)
    }
}

impl Default for BlockState {
    fn default() -> Self {
        Self::air()
    }
}

fn air_material() -> Identifier {
    Identifier::from_static(CORE_NAMESPACE, "air")
}
