use rusqlite::{Connection, Result};
use std::collections::HashMap;

/// Current database schema version
const CURRENT_VERSION: u32 = 3;

/// Migration system for managing database schema versions
pub struct MigrationManager;

impl MigrationManager {
    /// Initialize the database with the current schema
    /// This creates the schema_version table and applies all migrations
    pub fn initialize(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            [],
        )?;

        let current_version: u32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for version in (current_version + 1)..=CURRENT_VERSION {
            Self::apply_migration(conn, version)?;
        }

        Ok(())
    }

    /// Apply a specific migration by version number
    fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
        let migrations = get_migrations();
        if let Some(migration) = migrations.get(&version) {
            let tx = conn.unchecked_transaction()?;
            migration(&tx)?;
            tx.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [version],
            )?;
            tx.commit()?;
            Ok(())
        } else {
            Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_MISUSE),
                Some(format!("No migration found for version {}", version)),
            ))
        }
    }

    /// Get the current schema version
    pub fn get_version(conn: &Connection) -> Result<u32> {
        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
    }
}

/// Get all migrations indexed by version
fn get_migrations() -> HashMap<u32, fn(&rusqlite::Transaction) -> Result<(), rusqlite::Error>> {
    let mut migrations: HashMap<u32, fn(&rusqlite::Transaction) -> Result<(), rusqlite::Error>> = HashMap::new();
    migrations.insert(1, migration_v1);
    migrations.insert(2, migration_v2);
    migrations.insert(3, migration_v3);
    migrations
}

/// Migration v1: bank groups and their stage catalogs
fn migration_v1(tx: &rusqlite::Transaction) -> Result<(), rusqlite::Error> {
    tx.execute("PRAGMA foreign_keys=ON", [])?;

    tx.execute(
        "CREATE TABLE bank_groups (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            variant TEXT NOT NULL,
            created_ts INTEGER NOT NULL
        )",
        [],
    )?;

    // One row per stage of a group. Ids <= 100 are stages, > 100 sub-stages.
    tx.execute(
        "CREATE TABLE bank_groups_stages (
            group_id INTEGER NOT NULL REFERENCES bank_groups(id) ON DELETE CASCADE,
            stage_id INTEGER NOT NULL CHECK(stage_id > 0),
            name TEXT NOT NULL,
            side TEXT NOT NULL,
            priority INTEGER NOT NULL,
            is_hidden_substage INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (group_id, stage_id),
            UNIQUE (group_id, name)
        )",
        [],
    )?;

    tx.execute(
        "CREATE TABLE stages_lang (
            id INTEGER PRIMARY KEY,
            text TEXT NOT NULL
        )",
        [],
    )?;

    // Role specific label of a stage
    tx.execute(
        "CREATE TABLE stages (
            group_id INTEGER NOT NULL,
            stage_id INTEGER NOT NULL,
            role TEXT NOT NULL,
            lang INTEGER NULL REFERENCES stages_lang(id),
            PRIMARY KEY (group_id, stage_id, role),
            FOREIGN KEY (group_id, stage_id)
                REFERENCES bank_groups_stages(group_id, stage_id) ON DELETE CASCADE
        )",
        [],
    )?;

    Ok(())
}

/// Migration v2: statements
fn migration_v2(tx: &rusqlite::Transaction) -> Result<(), rusqlite::Error> {
    tx.execute(
        "CREATE TABLE statements (
            id INTEGER PRIMARY KEY,
            uuid TEXT NOT NULL UNIQUE,
            group_id INTEGER NOT NULL REFERENCES bank_groups(id),
            stage_id INTEGER NOT NULL,
            substage_id INTEGER NOT NULL DEFAULT 0,
            scoring_wait INTEGER NOT NULL DEFAULT 0,
            scoring_next_stages TEXT NULL,
            created_ts INTEGER NOT NULL,
            modified_ts INTEGER NOT NULL
        )",
        [],
    )?;

    tx.execute(
        "CREATE INDEX idx_statements_group ON statements(group_id)",
        [],
    )?;

    Ok(())
}

/// Migration v3: row version for compare-and-set saves
fn migration_v3(tx: &rusqlite::Transaction) -> Result<(), rusqlite::Error> {
    tx.execute(
        "ALTER TABLE statements ADD COLUMN version INTEGER NOT NULL DEFAULT 0",
        [],
    )?;

    Ok(())
}
