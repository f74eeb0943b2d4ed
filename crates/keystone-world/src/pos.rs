//! Block, chunk and world positions.
//!
//! A [`Location`] is what the host hands us (world name plus floating-point
//! coordinates). [`Location::normalize`] floors it into a [`BlockLocation`],
//! which is the key type for every block-level index.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Chunk edge length in blocks along X and Z.
pub const CHUNK_WIDTH: i32 = 16;

// ---------------------------------------------------------------------------
// WorldId
// ---------------------------------------------------------------------------

/// Name of a world (dimension) on the host server.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorldId(pub String);

impl WorldId {
    /// Creates a world id from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The world name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// BlockPos / ChunkPos
// ---------------------------------------------------------------------------

/// Integer block coordinates inside a world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate (height).
    pub y: i32,
    /// Z coordinate.
    pub z: i32,
}

impl BlockPos {
    /// Creates a new block position.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns the position offset by `(dx, dy, dz)`.
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }

    /// Returns the chunk column containing this block.
    pub const fn chunk(self) -> ChunkPos {
        ChunkPos {
            x: self.x.div_euclid(CHUNK_WIDTH),
            z: self.z.div_euclid(CHUNK_WIDTH),
        }
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Chunk column coordinates (block coordinates divided by [`CHUNK_WIDTH`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPos {
    /// Chunk-grid X.
    pub x: i32,
    /// Chunk-grid Z.
    pub z: i32,
}

impl ChunkPos {
    /// Creates a new chunk position.
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

// ---------------------------------------------------------------------------
// BlockLocation / Location
// ---------------------------------------------------------------------------

/// A normalized location: a world plus integer block coordinates.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockLocation {
    /// The world the block lives in.
    pub world: WorldId,
    /// Block coordinates within the world.
    pub pos: BlockPos,
}

impl BlockLocation {
    /// Creates a block location.
    pub fn new(world: WorldId, pos: BlockPos) -> Self {
        Self { world, pos }
    }

    /// Shorthand for `BlockLocation::new(WorldId::new(world), BlockPos::new(x, y, z))`.
    pub fn at(world: &str, x: i32, y: i32, z: i32) -> Self {
        Self::new(WorldId::new(world), BlockPos::new(x, y, z))
    }

    /// Returns the location offset by `(dx, dy, dz)` in the same world.
    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            world: self.world.clone(),
            pos: self.pos.offset(dx, dy, dz),
        }
    }

    /// Returns the chunk column containing this block.
    pub fn chunk(&self) -> ChunkPos {
        self.pos.chunk()
    }
}

impl fmt::Display for BlockLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.world, self.pos)
    }
}

/// A free-form location as reported by the host (entity positions, hit points).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// The world.
    pub world: WorldId,
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl Location {
    /// Creates a location.
    pub fn new(world: WorldId, x: f64, y: f64, z: f64) -> Self {
        Self { world, x, y, z }
    }

    /// Truncates to the containing block (flooring, so `-0.5` lands in block `-1`).
    pub fn normalize(&self) -> BlockLocation {
        BlockLocation {
            world: self.world.clone(),
            pos: BlockPos::new(
                self.x.floor() as i32,
                self.y.floor() as i32,
                self.z.floor() as i32,
            ),
        }
    }
}

impl From<&Location> for BlockLocation {
    fn from(loc: &Location) -> Self {
        loc.normalize()
    }
}
