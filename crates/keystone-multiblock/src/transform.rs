//! Rotation/mirror transforms of pattern offsets.
//!
//! A transform mirrors first (negating X), then rotates in 90° steps about
//! the Y axis. Y is never changed.
//!
//! | rotation | `(x, z)` maps to |
//! |---|---|
//! | 0 | `(x, z)` |
//! | 1 | `(-z, x)` |
//! | 2 | `(-x, -z)` |
//! | 3 | `(z, -x)` |

use crate::pattern::RelativeBlockPos;

/// A quarter-turn rotation about the Y axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    /// No rotation.
    #[default]
    R0,
    /// One quarter turn.
    R90,
    /// Half turn.
    R180,
    /// Three quarter turns.
    R270,
}

impl Rotation {
    /// All rotations in search order.
    pub const ALL: [Rotation; 4] = [Self::R0, Self::R90, Self::R180, Self::R270];

    /// The rotation index `0..=3`.
    pub const fn index(self) -> u8 {
        match self {
            Self::R0 => 0,
            Self::R90 => 1,
            Self::R180 => 2,
            Self::R270 => 3,
        }
    }

    /// Converts an index to a rotation, wrapping modulo 4.
    pub const fn from_index(index: u8) -> Self {
        match index & 3 {
            0 => Self::R0,
            1 => Self::R90,
            2 => Self::R180,
            _ => Self::R270,
        }
    }

    /// The rotation that undoes this one.
    pub const fn inverse(self) -> Self {
        Self::from_index((4 - self.index()) & 3)
    }

    fn rotate(self, x: i32, z: i32) -> (i32, i32) {
        match self {
            Self::R0 => (x, z),
            Self::R90 => (-z, x),
            Self::R180 => (-x, -z),
            Self::R270 => (z, -x),
        }
    }
}

/// The orientation discovered for one multiblock instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Transform {
    /// Quarter turns about Y.
    pub rotation: Rotation,
    /// Whether X is negated before rotating.
    pub mirror: bool,
}

impl Transform {
    /// No rotation, no mirror.
    pub const IDENTITY: Self = Self::new(Rotation::R0, false);

    /// Creates a transform.
    pub const fn new(rotation: Rotation, mirror: bool) -> Self {
        Self { rotation, mirror }
    }

    /// Maps a pattern offset into world orientation.
    pub fn apply(self, pos: RelativeBlockPos) -> RelativeBlockPos {
        let x = if self.mirror { -pos.x } else { pos.x };
        let (x, z) = self.rotation.rotate(x, pos.z);
        RelativeBlockPos::new(x, pos.y, z)
    }

    /// Maps a world-oriented offset back to the pattern offset.
    pub fn inverse(self, pos: RelativeBlockPos) -> RelativeBlockPos {
        let (x, z) = self.rotation.inverse().rotate(pos.x, pos.z);
        let x = if self.mirror { -x } else { x };
        RelativeBlockPos::new(x, pos.y, z)
    }

    /// The eight transforms in search order: unmirrored first, rotations
    /// ascending within each mirror value.
    pub fn search_order() -> impl Iterator<Item = Transform> {
        [false, true]
            .into_iter()
            .flat_map(|mirror| Rotation::ALL.into_iter().map(move |r| Self::new(r, mirror)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_table() {
        let p = RelativeBlockPos::new(1, 5, 2);
        let at = |r| Transform::new(Rotation::from_index(r), false).apply(p);
        assert_eq!(at(0), RelativeBlockPos::new(1, 5, 2));
        assert_eq!(at(1), RelativeBlockPos::new(-2, 5, 1));
        assert_eq!(at(2), RelativeBlockPos::new(-1, 5, -2));
        assert_eq!(at(3), RelativeBlockPos::new(2, 5, -1));
    }

    #[test]
    fn test_mirror_applies_before_rotation() {
        let p = RelativeBlockPos::new(1, 0, 2);
        // Mirror -> (-1, 2), then R90 -> (-2, -1).
        assert_eq!(
            Transform::new(Rotation::R90, true).apply(p),
            RelativeBlockPos::new(-2, 0, -1)
        );
    }

    #[test]
    fn test_search_order() {
        let order: Vec<_> = Transform::search_order()
            .map(|t| (t.rotation.index(), t.mirror))
            .collect();
        assert_eq!(
            order,
            vec![
                (0, false),
                (1, false),
                (2, false),
                (3, false),
                (0, true),
                (1, true),
                (2, true),
                (3, true),
            ]
        );
    }

    #[test]
    fn test_rotation_index_wraps() {
        assert_eq!(Rotation::from_index(5), Rotation::R90);
        assert_eq!(Rotation::R90.inverse(), Rotation::R270);
        assert_eq!(Rotation::R0.inverse(), Rotation::R0);
    }
}
