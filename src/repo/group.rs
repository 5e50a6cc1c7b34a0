use rusqlite::{Connection, OptionalExtension};
use crate::models::BankGroup;
use anyhow::{Context, Result};

/// Bank group repository for database operations
pub struct GroupRepo;

impl GroupRepo {
    /// Create a new bank group bound to a workflow variant
    pub fn create(conn: &Connection, name: &str, variant: &str) -> Result<BankGroup> {
        let group = BankGroup::new(name.to_string(), variant.to_string());

        conn.execute(
            "INSERT INTO bank_groups (name, variant, created_ts) VALUES (?1, ?2, ?3)",
            rusqlite::params![group.name, group.variant, group.created_ts],
        )
        .with_context(|| format!("Failed to create bank group: {}", name))?;

        let id = conn.last_insert_rowid();
        Ok(BankGroup {
            id: Some(id),
            ..group
        })
    }

    /// Get bank group by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<BankGroup>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, variant, created_ts FROM bank_groups WHERE id = ?1"
        )?;
        let group = stmt.query_row([id], Self::map_row).optional()?;
        Ok(group)
    }

    /// Get bank group by name
    pub fn get_by_name(conn: &Connection, name: &str) -> Result<Option<BankGroup>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, variant, created_ts FROM bank_groups WHERE name = ?1"
        )?;
        let group = stmt.query_row([name], Self::map_row).optional()?;
        Ok(group)
    }

    /// List all bank groups ordered by name
    pub fn list_all(conn: &Connection) -> Result<Vec<BankGroup>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, variant, created_ts FROM bank_groups ORDER BY name"
        )?;
        let rows = stmt.query_map([], Self::map_row)?;

        let mut groups = Vec::new();
        for row in rows {
            groups.push(row?);
        }
        Ok(groups)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BankGroup> {
        Ok(BankGroup {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            variant: row.get(2)?,
            created_ts: row.get(3)?,
        })
    }
}
