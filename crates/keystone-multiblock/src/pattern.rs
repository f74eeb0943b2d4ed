//! Structure templates: relative offsets mapped to block choices.
//!
//! A [`PatternDefinition`] is immutable once built. It is shared by every
//! instance of a multiblock type and never carries per-instance state such as
//! the discovered rotation.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use keystone_world::{BlockState, Identifier};
use rustc_hash::FxHashMap;
use thiserror::Error;

// ---------------------------------------------------------------------------
// RelativeBlockPos
// ---------------------------------------------------------------------------

/// An integer offset from a multiblock origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelativeBlockPos {
    /// X offset.
    pub x: i32,
    /// Y offset.
    pub y: i32,
    /// Z offset.
    pub z: i32,
}

impl RelativeBlockPos {
    /// The origin offset `(0, 0, 0)`.
    pub const ORIGIN: Self = Self::new(0, 0, 0);

    /// Creates a new offset.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }
}

impl fmt::Display for RelativeBlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Choice
// ---------------------------------------------------------------------------

/// Custom block test used by [`Choice::Predicate`].
pub type BlockPredicate = Arc<dyn Fn(&BlockState) -> bool + Send + Sync>;

/// A structural requirement tested against one world block.
#[derive(Clone)]
pub enum Choice {
    /// Exactly this material.
    Material(Identifier),
    /// Any of these materials.
    AnyOf(BTreeSet<Identifier>),
    /// Any block whose material carries this tag.
    Tag(Identifier),
    /// An air cell.
    Empty,
    /// Anything, air included.
    Any,
    /// A custom test.
    Predicate(BlockPredicate),
}

impl Choice {
    /// Shorthand for [`Choice::Predicate`].
    pub fn predicate(test: impl Fn(&BlockState) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(test))
    }

    /// Shorthand for [`Choice::AnyOf`].
    pub fn any_of(materials: impl IntoIterator<Item = Identifier>) -> Self {
        Self::AnyOf(materials.into_iter().collect())
    }

    /// Returns `true` if `block` satisfies this requirement.
    pub fn matches(&self, block: &BlockState) -> bool {
        match self {
            Self::Material(id) => block.material == *id,
            Self::AnyOf(ids) => ids.contains(&block.material),
            Self::Tag(tag) => block.has_tag(tag),
            Self::Empty => block.is_air(),
            Self::Any => true,
            Self::Predicate(test) => test(block),
        }
    }
}

impl fmt::Debug for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Material(id) => f.debug_tuple("Material").field(id).finish(),
            Self::AnyOf(ids) => f.debug_tuple("AnyOf").field(ids).finish(),
            Self::Tag(tag) => f.debug_tuple("Tag").field(tag).finish(),
            Self::Empty => f.write_str("Empty"),
            Self::Any => f.write_str("Any"),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced while building a [`PatternDefinition`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// The pattern has no cells.
    #[error("pattern {0} has no cells")]
    Empty(Identifier),
    /// A layout character has no entry in the key.
    #[error("pattern {id}: character {ch:?} at layer {layer}, row {row}, column {column} is not defined in the key")]
    UndefinedKey {
        /// Pattern being built.
        id: Identifier,
        /// The offending character.
        ch: char,
        /// Layer index (y).
        layer: usize,
        /// Row index (z).
        row: usize,
        /// Column index (x).
        column: usize,
    },
}

// ---------------------------------------------------------------------------
// PatternDefinition
// ---------------------------------------------------------------------------

/// An immutable structure template.
///
/// Cells keep their insertion order, so matching and placement visit them
/// deterministically.
#[derive(Clone, Debug)]
pub struct PatternDefinition {
    id: Identifier,
    cells: Vec<(RelativeBlockPos, Choice)>,
    index: FxHashMap<RelativeBlockPos, usize>,
    trigger: Choice,
    min: RelativeBlockPos,
    max: RelativeBlockPos,
}

impl PatternDefinition {
    /// Starts a cell-by-cell builder.
    pub fn builder(id: Identifier) -> PatternBuilder {
        PatternBuilder::new(id)
    }

    /// Starts a character-layout builder.
    pub fn layout(id: Identifier) -> LayoutBuilder {
        LayoutBuilder::new(id)
    }

    /// The type id this pattern belongs to.
    pub fn id(&self) -> &Identifier {
        &self.id
    }

    /// Iterates `(offset, choice)` pairs in insertion order.
    pub fn cells(&self) -> impl Iterator<Item = (RelativeBlockPos, &Choice)> + '_ {
        self.cells.iter().map(|(pos, choice)| (*pos, choice))
    }

    /// Iterates the offsets in insertion order.
    pub fn offsets(&self) -> impl Iterator<Item = RelativeBlockPos> + '_ {
        self.cells.iter().map(|(pos, _)| *pos)
    }

    /// The choice required at `offset`, if the offset is part of the pattern.
    pub fn choice(&self, offset: RelativeBlockPos) -> Option<&Choice> {
        self.index.get(&offset).map(|&i| &self.cells[i].1)
    }

    /// Returns `true` if `offset` is part of the pattern.
    pub fn contains(&self, offset: RelativeBlockPos) -> bool {
        self.index.contains_key(&offset)
    }

    /// The choice a clicked block must satisfy to start construction.
    pub fn trigger(&self) -> &Choice {
        &self.trigger
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always `false`: empty patterns are rejected at build time.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Lower corner of the bounding box (includes the origin).
    pub fn min(&self) -> RelativeBlockPos {
        self.min
    }

    /// Upper corner of the bounding box (includes the origin).
    pub fn max(&self) -> RelativeBlockPos {
        self.max
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Builds a [`PatternDefinition`] one cell at a time.
///
/// Setting the same offset twice keeps the first position in iteration order
/// and the last choice.
pub struct PatternBuilder {
    id: Identifier,
    cells: Vec<(RelativeBlockPos, Choice)>,
    index: FxHashMap<RelativeBlockPos, usize>,
    trigger: Option<Choice>,
}

impl PatternBuilder {
    /// Creates an empty builder.
    pub fn new(id: Identifier) -> Self {
        Self {
            id,
            cells: Vec::new(),
            index: FxHashMap::default(),
            trigger: None,
        }
    }

    /// Requires `choice` at `(x, y, z)`.
    pub fn cell(mut self, x: i32, y: i32, z: i32, choice: Choice) -> Self {
        self.insert(RelativeBlockPos::new(x, y, z), choice);
        self
    }

    /// Overrides the trigger choice. Defaults to the choice at the origin, or
    /// [`Choice::Any`] if the origin is not part of the pattern.
    pub fn trigger(mut self, choice: Choice) -> Self {
        self.trigger = Some(choice);
        self
    }

    fn insert(&mut self, pos: RelativeBlockPos, choice: Choice) {
        match self.index.get(&pos) {
            Some(&i) => self.cells[i].1 = choice,
            None => {
                self.index.insert(pos, self.cells.len());
                self.cells.push((pos, choice));
            }
        }
    }

    /// Finalizes the pattern.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::Empty`] if no cell was added.
    pub fn build(self) -> Result<PatternDefinition, PatternError> {
        if self.cells.is_empty() {
            return Err(PatternError::Empty(self.id));
        }

        let (min, max) = self.cells.iter().fold(
            (RelativeBlockPos::ORIGIN, RelativeBlockPos::ORIGIN),
            |(min, max), (pos, _)| (min.min(*pos), max.max(*pos)),
        );

        let trigger = match self.trigger {
            Some(choice) => choice,
            None => self
                .index
                .get(&RelativeBlockPos::ORIGIN)
                .map(|&i| self.cells[i].1.clone())
                .unwrap_or(Choice::Any),
        };

        Ok(PatternDefinition {
            id: self.id,
            cells: self.cells,
            index: self.index,
            trigger,
            min,
            max,
        })
    }
}

/// Builds a [`PatternDefinition`] from character layers.
///
/// Layers stack bottom-up (`y = 0, 1, ...`). Each layer is a list of rows
/// (`z`), each row a string of characters (`x`). A space is not part of the
/// structure. The first occurrence of the trigger character becomes the
/// origin; without one the layout corner is the origin.
pub struct LayoutBuilder {
    id: Identifier,
    layers: Vec<Vec<String>>,
    key: FxHashMap<char, Choice>,
    trigger: Option<char>,
}

impl LayoutBuilder {
    /// Creates an empty layout.
    pub fn new(id: Identifier) -> Self {
        Self {
            id,
            layers: Vec::new(),
            key: FxHashMap::default(),
            trigger: None,
        }
    }

    /// Appends the next layer up.
    pub fn layer<S: AsRef<str>>(mut self, rows: &[S]) -> Self {
        self.layers
            .push(rows.iter().map(|row| row.as_ref().to_string()).collect());
        self
    }

    /// Maps `ch` to `choice`.
    pub fn key(mut self, ch: char, choice: Choice) -> Self {
        self.key.insert(ch, choice);
        self
    }

    /// Marks `ch` as the trigger character.
    pub fn trigger(mut self, ch: char) -> Self {
        self.trigger = Some(ch);
        self
    }

    /// Finalizes the layout.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::UndefinedKey`] for a non-space character with
    /// no key entry and [`PatternError::Empty`] if the layout has no cells.
    pub fn build(self) -> Result<PatternDefinition, PatternError> {
        let mut raw = Vec::new();
        for (layer, rows) in self.layers.iter().enumerate() {
            for (row, line) in rows.iter().enumerate() {
                for (column, ch) in line.chars().enumerate() {
                    if ch == ' ' {
                        continue;
                    }
                    let Some(choice) = self.key.get(&ch) else {
                        return Err(PatternError::UndefinedKey {
                            id: self.id,
                            ch,
                            layer,
                            row,
                            column,
                        });
                    };
                    let pos = RelativeBlockPos::new(column as i32, layer as i32, row as i32);
                    raw.push((pos, ch, choice.clone()));
                }
            }
        }

        let anchor = self
            .trigger
            .and_then(|t| raw.iter().find(|(_, ch, _)| *ch == t))
            .map(|(pos, _, _)| *pos)
            .unwrap_or(RelativeBlockPos::ORIGIN);

        let trigger = self
            .trigger
            .and_then(|t| self.key.get(&t).cloned())
            .unwrap_or(Choice::Any);

        let mut builder = PatternBuilder::new(self.id).trigger(trigger);
        for (pos, _, choice) in raw {
            builder = builder.cell(pos.x - anchor.x, pos.y - anchor.y, pos.z - anchor.z, choice);
        }
        builder.build()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identifier {
        Identifier::parse(s).unwrap()
    }

    fn material(s: &str) -> Choice {
        Choice::Material(id(s))
    }

    #[test]
    fn test_choice_variants() {
        let iron = BlockState::of(id("minecraft:iron_block"));
        let log = BlockState::of(id("minecraft:oak_log")).with_tag(id("minecraft:logs"));

        assert!(material("minecraft:iron_block").matches(&iron));
        assert!(!material("minecraft:iron_block").matches(&log));
        assert!(Choice::any_of([id("minecraft:gold_block"), id("minecraft:iron_block")]).matches(&iron));
        assert!(Choice::Tag(id("minecraft:logs")).matches(&log));
        assert!(!Choice::Tag(id("minecraft:logs")).matches(&iron));
        assert!(Choice::Empty.matches(&BlockState::air()));
        assert!(!Choice::Empty.matches(&iron));
        assert!(Choice::Any.matches(&BlockState::air()));
        assert!(Choice::predicate(|b| b.properties.contains_key("lit")).matches(
            &BlockState::of(id("minecraft:furnace")).with_property("lit", "true")
        ));
    }

    #[test]
    fn test_bounds_include_origin() {
        let pattern = PatternDefinition::builder(id("test:p"))
            .cell(2, 1, 3, Choice::Any)
            .cell(4, 2, 5, Choice::Any)
            .build()
            .unwrap();
        assert_eq!(pattern.min(), RelativeBlockPos::ORIGIN);
        assert_eq!(pattern.max(), RelativeBlockPos::new(4, 2, 5));
        assert!(matches!(pattern.trigger(), Choice::Any));
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert_eq!(
            PatternDefinition::builder(id("test:p")).build().unwrap_err(),
            PatternError::Empty(id("test:p"))
        );
    }

    #[test]
    fn test_duplicate_cell_keeps_last_choice() {
        let pattern = PatternDefinition::builder(id("test:p"))
            .cell(0, 0, 0, Choice::Any)
            .cell(1, 0, 0, Choice::Any)
            .cell(0, 0, 0, Choice::Empty)
            .build()
            .unwrap();
        assert_eq!(pattern.len(), 2);
        assert!(matches!(pattern.choice(RelativeBlockPos::ORIGIN), Some(Choice::Empty)));
        assert_eq!(pattern.offsets().next(), Some(RelativeBlockPos::ORIGIN));
    }

    #[test]
    fn test_layout_anchors_on_trigger() {
        // Layer 0:  "III"   Layer 1: " F "
        //           "ICI"
        let pattern = PatternDefinition::layout(id("test:furnace"))
            .layer(&["III", "ICI"])
            .layer(&[" F "])
            .key('I', material("minecraft:iron_block"))
            .key('C', material("minecraft:crafting_table"))
            .key('F', material("minecraft:furnace"))
            .trigger('C')
            .build()
            .unwrap();

        assert_eq!(pattern.len(), 7);
        assert!(matches!(
            pattern.choice(RelativeBlockPos::ORIGIN),
            Some(Choice::Material(m)) if *m == id("minecraft:crafting_table")
        ));
        assert!(matches!(
            pattern.trigger(),
            Choice::Material(m) if *m == id("minecraft:crafting_table")
        ));
        // Furnace sits one layer up, one row towards -z.
        assert!(pattern.contains(RelativeBlockPos::new(0, 1, -1)));
        assert!(!pattern.contains(RelativeBlockPos::new(-1, 1, -1)));
        assert_eq!(pattern.min(), RelativeBlockPos::new(-1, 0, -1));
        assert_eq!(pattern.max(), RelativeBlockPos::new(1, 1, 0));
    }

    #[test]
    fn test_layout_without_trigger_uses_corner() {
        let pattern = PatternDefinition::layout(id("test:p"))
            .layer(&["AB"])
            .key('A', material("test:a"))
            .key('B', material("test:b"))
            .build()
            .unwrap();
        assert!(pattern.contains(RelativeBlockPos::ORIGIN));
        assert!(pattern.contains(RelativeBlockPos::new(1, 0, 0)));
        assert!(matches!(pattern.trigger(), Choice::Any));
    }

    #[test]
    fn test_layout_undefined_key() {
        let err = PatternDefinition::layout(id("test:p"))
            .layer(&["A?"])
            .key('A', Choice::Any)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            PatternError::UndefinedKey { ch: '?', layer: 0, row: 0, column: 1, .. }
        ));
    }

    #[test]
    fn test_layout_all_spaces_is_empty() {
        let err = PatternDefinition::layout(id("test:p"))
            .layer(&["   "])
            .build()
            .unwrap_err();
        assert_eq!(err, PatternError::Empty(id("test:p")));
    }
}
