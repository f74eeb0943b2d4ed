//! The world collaborator contract used by the multiblock engine.

use thiserror::Error;

use crate::block::BlockState;
use crate::pos::{BlockLocation, WorldId};

/// Errors a host world may report for a block write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    /// The target world is not loaded on this server.
    #[error("world not loaded: {0}")]
    WorldNotLoaded(WorldId),
    /// The host refused the write (protected region, unloaded chunk, ...).
    #[error("block write rejected at {at}: {reason}")]
    Rejected {
        /// Target cell.
        at: BlockLocation,
        /// Host-supplied reason.
        reason: String,
    },
}

/// Read/write access to world blocks, implemented by the host.
///
/// All calls happen on the host's main thread.
pub trait BlockAccess {
    /// Returns `true` if `world` is currently loaded.
    fn is_world_loaded(&self, world: &WorldId) -> bool;

    /// Returns the state of the cell at `at`. Unknown cells read as air.
    fn block(&self, at: &BlockLocation) -> BlockState;

    /// Overwrites the cell at `at`.
    fn set_block(&mut self, at: &BlockLocation, state: BlockState) -> Result<(), WorldError>;
}
