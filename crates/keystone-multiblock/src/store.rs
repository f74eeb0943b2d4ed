//! Instance persistence.
//!
//! One row per live instance in table `multiblocks`, keyed by the origin
//! `(world, x, y, z)`. Writes are upserts. [`SqliteStore`] is the production
//! backend; anything implementing [`InstanceStore`] can stand in for it.

use std::path::Path;

use keystone_world::{BlockLocation, Identifier};
use rusqlite::{Connection, Row, params};
use thiserror::Error;

use crate::transform::{Rotation, Transform};

/// Errors reported by an [`InstanceStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The backend cannot serve requests.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A single row could not be decoded.
    #[error("corrupt row {key}: {reason}")]
    CorruptRow {
        /// The row's raw key columns.
        key: String,
        /// What failed to decode.
        reason: String,
    },
}

/// One persisted instance, as stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredInstance {
    /// World name.
    pub world: String,
    /// Origin X.
    pub x: i32,
    /// Origin Y.
    pub y: i32,
    /// Origin Z.
    pub z: i32,
    /// Type id text (`namespace:path`).
    pub id: String,
    /// Rotation index `0..=3`.
    pub rotation: u8,
    /// Mirror flag.
    pub mirror: bool,
    /// JSON object payload.
    pub data: String,
}

impl StoredInstance {
    /// Builds a row for an instance at `origin`.
    pub fn new(origin: &BlockLocation, id: &Identifier, transform: Transform, data: String) -> Self {
        Self {
            world: origin.world.as_str().to_string(),
            x: origin.pos.x,
            y: origin.pos.y,
            z: origin.pos.z,
            id: id.to_string(),
            rotation: transform.rotation.index(),
            mirror: transform.mirror,
            data,
        }
    }

    /// The origin cell.
    pub fn origin(&self) -> BlockLocation {
        BlockLocation::at(&self.world, self.x, self.y, self.z)
    }

    /// The stored orientation.
    pub fn transform(&self) -> Transform {
        Transform::new(Rotation::from_index(self.rotation), self.mirror)
    }
}

/// Backend for persisted instance rows.
pub trait InstanceStore: Send {
    /// Creates the table if needed and migrates older layouts.
    fn ensure_schema(&mut self) -> Result<(), StoreError>;

    /// Inserts or replaces the row keyed by the row's origin.
    fn upsert(&mut self, row: &StoredInstance) -> Result<(), StoreError>;

    /// Deletes the row keyed by `origin`. Deleting a missing row succeeds.
    fn delete(&mut self, origin: &BlockLocation) -> Result<(), StoreError>;

    /// Reads every row, ordered by key. A row that cannot be decoded is an
    /// `Err` entry; the outer error means nothing could be read.
    fn load_all(&mut self) -> Result<Vec<Result<StoredInstance, StoreError>>, StoreError>;
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS multiblocks (
    world    TEXT    NOT NULL,
    x        INTEGER NOT NULL,
    y        INTEGER NOT NULL,
    z        INTEGER NOT NULL,
    id       TEXT    NOT NULL,
    rotation INTEGER NOT NULL DEFAULT 0,
    mirror   INTEGER NOT NULL DEFAULT 0,
    data     TEXT,
    PRIMARY KEY (world, x, y, z)
)";

/// Columns added after the first table layout, with their definitions.
const ADDED_COLUMNS: [(&str, &str); 2] = [
    ("rotation", "INTEGER NOT NULL DEFAULT 0"),
    ("mirror", "INTEGER NOT NULL DEFAULT 0"),
];

/// [`InstanceStore`] backed by a SQLite database.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            return Err(StoreError::Unavailable(format!(
                "cannot create {}: {e}",
                parent.display()
            )));
        }
        Ok(Self::from_connection(Connection::open(path)?))
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    /// Wraps an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn column_names(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare("PRAGMA table_info(multiblocks)")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }
}

impl InstanceStore for SqliteStore {
    fn ensure_schema(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch(CREATE_TABLE)?;

        let existing = self.column_names()?;
        for (name, definition) in ADDED_COLUMNS {
            if !existing.iter().any(|c| c == name) {
                tracing::info!("Migrating multiblocks table: adding column {name}");
                self.conn.execute_batch(&format!(
                    "ALTER TABLE multiblocks ADD COLUMN {name} {definition}"
                ))?;
            }
        }
        Ok(())
    }

    fn upsert(&mut self, row: &StoredInstance) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO multiblocks (world, x, y, z, id, rotation, mirror, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (world, x, y, z) DO UPDATE SET
                id = excluded.id,
                rotation = excluded.rotation,
                mirror = excluded.mirror,
                data = excluded.data",
            params![
                row.world,
                row.x,
                row.y,
                row.z,
                row.id,
                row.rotation,
                row.mirror,
                row.data
            ],
        )?;
        Ok(())
    }

    fn delete(&mut self, origin: &BlockLocation) -> Result<(), StoreError> {
        self.conn.execute(
            "DELETE FROM multiblocks WHERE world = ?1 AND x = ?2 AND y = ?3 AND z = ?4",
            params![origin.world.as_str(), origin.pos.x, origin.pos.y, origin.pos.z],
        )?;
        Ok(())
    }

    fn load_all(&mut self) -> Result<Vec<Result<StoredInstance, StoreError>>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT world, x, y, z, id, rotation, mirror, data
             FROM multiblocks ORDER BY world, x, y, z",
        )?;
        let mut rows = stmt.query([])?;
        let mut decoded = Vec::new();
        while let Some(row) = rows.next()? {
            decoded.push(decode_row(row).map_err(|e| StoreError::CorruptRow {
                key: row_key(row),
                reason: e.to_string(),
            }));
        }
        Ok(decoded)
    }
}

fn decode_row(row: &Row<'_>) -> rusqlite::Result<StoredInstance> {
    let rotation: Option<i64> = row.get(5)?;
    let mirror: Option<i64> = row.get(6)?;
    let data: Option<String> = row.get(7)?;
    Ok(StoredInstance {
        world: row.get(0)?,
        x: row.get(1)?,
        y: row.get(2)?,
        z: row.get(3)?,
        id: row.get(4)?,
        rotation: rotation.unwrap_or(0).rem_euclid(4) as u8,
        mirror: mirror.unwrap_or(0) != 0,
        data: data.unwrap_or_else(|| crate::data::EMPTY_PAYLOAD.to_string()),
    })
}

/// `(world, x, y, z)` as stored, for diagnostics.
fn row_key(row: &Row<'_>) -> String {
    let column = |i: usize| match row.get_ref(i) {
        Ok(value) => format!("{value:?}"),
        Err(_) => "?".to_string(),
    };
    format!("({}, {}, {}, {})", column(0), column(1), column(2), column(3))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
