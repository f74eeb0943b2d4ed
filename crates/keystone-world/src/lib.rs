//! World collaborator interfaces for the Keystone engine: identifiers, block
//! and chunk positions, block states, and the [`BlockAccess`] contract the
//! host server implements.

pub mod access;
pub mod block;
pub mod identifier;
pub mod memory;
pub mod pos;

pub use access::{BlockAccess, WorldError};
pub use block::BlockState;
pub use identifier::{Identifier, IdentifierError};
pub use memory::{BlockChange, MemoryWorld};
pub use pos::{BlockLocation, BlockPos, CHUNK_WIDTH, ChunkPos, Location, WorldId};
