//! Preset persistence over SQLite.
//!
//! Presets are keyed by (group name, preset name) so they survive across
//! processes; entity ids are per-run. The store is pure persistence: `load`
//! returns the stored snapshot rows and the engine applies them through the
//! rig so fan-out runs in one place.

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

/// One fixture's stored values within a preset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetLevel {
    pub fixture_name: String,
    pub intensity: u16,
    pub muted: bool,
}

pub struct PresetStore {
    conn: Connection,
}

impl PresetStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open preset database at {:?}", path))?;
        Self::with_connection(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS presets (
                group_name TEXT NOT NULL,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (group_name, name)
            );

            CREATE TABLE IF NOT EXISTS preset_levels (
                group_name TEXT NOT NULL,
                preset_name TEXT NOT NULL,
                fixture_name TEXT NOT NULL,
                intensity INTEGER NOT NULL,
                muted INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (group_name, preset_name, fixture_name),
                FOREIGN KEY (group_name, preset_name)
                    REFERENCES presets(group_name, name) ON DELETE CASCADE
            );
            "#,
        )?;
        Ok(())
    }

    /// Preset names of a group, in insertion order.
    pub fn list(&self, group_name: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM presets WHERE group_name = ?1 ORDER BY rowid")?;
        let names = stmt
            .query_map([group_name], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Create or overwrite a preset with the given snapshot.
    pub fn save(&mut self, name: &str, group_name: &str, levels: &[PresetLevel]) -> Result<()> {
        let tx = self.conn.transaction()?;

        // Delete-and-reinsert keeps an overwrite atomic and the name's rowid
        // (list order) stable via INSERT OR IGNORE.
        tx.execute(
            "INSERT OR IGNORE INTO presets (group_name, name) VALUES (?1, ?2)",
            params![group_name, name],
        )?;
        tx.execute(
            "DELETE FROM preset_levels WHERE group_name = ?1 AND preset_name = ?2",
            params![group_name, name],
        )?;
        for level in levels {
            tx.execute(
                "INSERT INTO preset_levels (group_name, preset_name, fixture_name, intensity, muted)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    group_name,
                    name,
                    level.fixture_name,
                    level.intensity as i64,
                    if level.muted { 1 } else { 0 },
                ],
            )?;
        }

        tx.commit()
            .with_context(|| format!("Failed to save preset {:?} for {:?}", name, group_name))
    }

    /// Stored snapshot rows of a preset. An unknown name yields an error.
    pub fn load(&self, name: &str, group_name: &str) -> Result<Vec<PresetLevel>> {
        let known: bool = self.conn.query_row(
            "SELECT COUNT(*) > 0 FROM presets WHERE group_name = ?1 AND name = ?2",
            params![group_name, name],
            |row| row.get(0),
        )?;
        if !known {
            anyhow::bail!("No preset {:?} for group {:?}", name, group_name);
        }

        let mut stmt = self.conn.prepare(
            "SELECT fixture_name, intensity, muted FROM preset_levels
             WHERE group_name = ?1 AND preset_name = ?2 ORDER BY rowid",
        )?;
        let levels = stmt
            .query_map(params![group_name, name], |row| {
                Ok(PresetLevel {
                    fixture_name: row.get(0)?,
                    intensity: row.get::<_, i64>(1)? as u16,
                    muted: row.get::<_, i64>(2)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(levels)
    }

    /// Delete a preset; its level rows cascade.
    pub fn delete(&mut self, name: &str, group_name: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM presets WHERE group_name = ?1 AND name = ?2",
            params![group_name, name],
        )?;
        Ok(())
    }
}
