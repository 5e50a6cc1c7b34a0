use rusqlite::{Connection, OptionalExtension};
use crate::models::CatalogRow;
use crate::workflow::StageCatalog;
use anyhow::{Context, Result};
use std::collections::HashSet;

/// Stage catalog repository
///
/// The catalog of a group is stored normalized (`bank_groups_stages`,
/// `stages`, `stages_lang`) and read back as the flat one-row-per-role
/// sequence the engine merges.
pub struct StageRepo;

impl StageRepo {
    /// Catalog rows for a group, ordered by stage id
    pub fn load_rows(conn: &Connection, group_id: i64) -> Result<Vec<CatalogRow>> {
        let mut stmt = conn.prepare(
            "SELECT bgs.stage_id, bgs.name, bgs.side, bgs.priority, bgs.is_hidden_substage,
                    s.role, sl.text
             FROM bank_groups_stages AS bgs
             JOIN stages AS s ON s.stage_id = bgs.stage_id AND s.group_id = bgs.group_id
             LEFT JOIN stages_lang AS sl ON sl.id = s.lang
             WHERE bgs.group_id = ?1
             ORDER BY bgs.stage_id, s.role"
        )?;

        let rows = stmt.query_map([group_id], |row| {
            Ok(CatalogRow {
                id: row.get(0)?,
                name: row.get(1)?,
                side: row.get(2)?,
                priority: row.get(3)?,
                is_hidden_substage: row.get::<_, i64>(4)? != 0,
                role: row.get(5)?,
                text: row.get(6)?,
            })
        })?;

        let mut catalog_rows = Vec::new();
        for row in rows {
            catalog_rows.push(row?);
        }
        Ok(catalog_rows)
    }

    /// Build the stage catalog of a group
    pub fn load_catalog(conn: &Connection, group_id: i64) -> Result<StageCatalog> {
        let rows = Self::load_rows(conn, group_id)?;
        StageCatalog::from_rows(rows)
            .with_context(|| format!("Invalid stage catalog for group id={}", group_id))
    }

    /// Store catalog rows for a group and return the number of distinct stages.
    ///
    /// Stage columns come from the first row of each id and overwrite what the
    /// group already has; role labels are replaced and the old label text is
    /// deleted.
    pub fn import(conn: &Connection, group_id: i64, rows: &[CatalogRow]) -> Result<usize> {
        let tx = conn.unchecked_transaction()?;
        let mut seen = HashSet::new();

        for row in rows {
            if seen.insert(row.id) {
                tx.execute(
                    "INSERT INTO bank_groups_stages
                        (group_id, stage_id, name, side, priority, is_hidden_substage)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(group_id, stage_id) DO UPDATE SET
                        name = excluded.name,
                        side = excluded.side,
                        priority = excluded.priority,
                        is_hidden_substage = excluded.is_hidden_substage",
                    rusqlite::params![
                        group_id,
                        row.id,
                        row.name,
                        row.side,
                        row.priority,
                        row.is_hidden_substage as i64,
                    ],
                )
                .with_context(|| format!("Failed to import stage {} ('{}')", row.id, row.name))?;
            }

            let old_lang: Option<i64> = tx
                .query_row(
                    "SELECT lang FROM stages WHERE group_id = ?1 AND stage_id = ?2 AND role = ?3",
                    rusqlite::params![group_id, row.id, row.role],
                    |r| r.get(0),
                )
                .optional()?
                .flatten();

            let lang: Option<i64> = match &row.text {
                Some(text) => {
                    tx.execute("INSERT INTO stages_lang (text) VALUES (?1)", [text])?;
                    Some(tx.last_insert_rowid())
                }
                None => None,
            };

            tx.execute(
                "INSERT INTO stages (group_id, stage_id, role, lang)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(group_id, stage_id, role) DO UPDATE SET lang = excluded.lang",
                rusqlite::params![group_id, row.id, row.role, lang],
            )
            .with_context(|| {
                format!("Failed to import label of stage {} for role '{}'", row.id, row.role)
            })?;

            if let Some(old_lang) = old_lang {
                tx.execute("DELETE FROM stages_lang WHERE id = ?1", [old_lang])?;
            }
        }

        tx.commit()?;
        Ok(seen.len())
    }

    /// Number of stages defined for a group
    pub fn count(conn: &Connection, group_id: i64) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM bank_groups_stages WHERE group_id = ?1",
            [group_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
