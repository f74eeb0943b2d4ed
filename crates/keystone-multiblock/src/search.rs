//! Transform search: matching patterns against world state.
//!
//! All functions here are pure with respect to the engine. They only read
//! the world and the occupancy view they are given.

use keystone_world::{BlockAccess, BlockLocation};
use rustc_hash::FxHashSet;

use crate::pattern::{PatternDefinition, RelativeBlockPos};
use crate::transform::Transform;

/// Which absolute cells already belong to a multiblock instance.
pub trait Occupancy {
    /// Returns `true` if `at` is owned by an existing instance.
    fn is_occupied(&self, at: &BlockLocation) -> bool;
}

/// An occupancy view where nothing is owned.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unoccupied;

impl Occupancy for Unoccupied {
    fn is_occupied(&self, _at: &BlockLocation) -> bool {
        false
    }
}

impl Occupancy for FxHashSet<BlockLocation> {
    fn is_occupied(&self, at: &BlockLocation) -> bool {
        self.contains(at)
    }
}

/// The absolute cell at `rel` from `origin`.
pub fn absolute(origin: &BlockLocation, rel: RelativeBlockPos) -> BlockLocation {
    origin.offset(rel.x, rel.y, rel.z)
}

/// Every absolute cell `pattern` occupies at `origin` under `transform`, in
/// pattern order.
pub fn cells_at(
    pattern: &PatternDefinition,
    origin: &BlockLocation,
    transform: Transform,
) -> Vec<BlockLocation> {
    pattern
        .offsets()
        .map(|rel| absolute(origin, transform.apply(rel)))
        .collect()
}

/// Finds the first transform under which `pattern`, anchored at `trigger`,
/// matches the world without touching an occupied cell.
///
/// Transforms are tried in [`Transform::search_order`]. Returns `None` on a
/// structural mismatch.
pub fn matches_layout<W: BlockAccess + ?Sized, O: Occupancy + ?Sized>(
    pattern: &PatternDefinition,
    trigger: &BlockLocation,
    world: &W,
    occupancy: &O,
) -> Option<Transform> {
    Transform::search_order().find(|&transform| {
        pattern.cells().all(|(rel, choice)| {
            let abs = absolute(trigger, transform.apply(rel));
            !occupancy.is_occupied(&abs) && choice.matches(&world.block(&abs))
        })
    })
}

/// Returns `true` if `pattern` matches at `origin` under exactly `transform`.
///
/// Occupancy is not consulted.
pub fn matches_at<W: BlockAccess + ?Sized>(
    pattern: &PatternDefinition,
    origin: &BlockLocation,
    transform: Transform,
    world: &W,
) -> bool {
    pattern
        .cells()
        .all(|(rel, choice)| choice.matches(&world.block(&absolute(origin, transform.apply(rel)))))
}

/// Scans every origin that would place `clicked` inside the pattern's
/// bounding box and returns the first at which the unrotated pattern matches.
///
/// Offsets are visited y, then x, then z, each ascending. The candidate for
/// offset `o` is `clicked - o`.
pub fn find_origin_from<W: BlockAccess + ?Sized>(
    pattern: &PatternDefinition,
    clicked: &BlockLocation,
    world: &W,
) -> Option<BlockLocation> {
    let (min, max) = (pattern.min(), pattern.max());
    for dy in min.y..=max.y {
        for dx in min.x..=max.x {
            for dz in min.z..=max.z {
                let candidate = clicked.offset(-dx, -dy, -dz);
                if matches_at(pattern, &candidate, Transform::IDENTITY, world) {
                    return Some(candidate);
                }
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
