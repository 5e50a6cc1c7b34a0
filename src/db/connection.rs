use rusqlite::Connection;
use std::path::Path;
use anyhow::{Context, Result};
use crate::db::migrations::MigrationManager;

/// Database connection manager
pub struct DbConnection;

impl DbConnection {
    /// Connect to the database at `db_path`, creating it and parent directories if needed
    pub fn connect_at(db_path: &Path) -> Result<Connection> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
        Self::prepare(conn)
    }

    /// Connect to an in-memory database (for testing)
    pub fn connect_in_memory() -> Result<Connection> {
        let conn = Connection::open_in_memory()
            .context("Failed to open in-memory database")?;
        Self::prepare(conn)
    }

    fn prepare(conn: Connection) -> Result<Connection> {
        conn.execute_batch("PRAGMA foreign_keys=ON")
            .context("Failed to enable foreign keys")?;
        MigrationManager::initialize(&conn)
            .context("Failed to initialize database schema")?;
        Ok(conn)
    }
}
