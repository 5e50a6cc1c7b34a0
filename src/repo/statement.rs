use rusqlite::{Connection, OptionalExtension};
use crate::models::{PendingTransition, StageId, StageState, Statement};
use crate::workflow::Subject;
use anyhow::{Context, Result};
use thiserror::Error;

const STATEMENT_COLUMNS: &str = "id, uuid, group_id, stage_id, substage_id, scoring_wait, \
     scoring_next_stages, created_ts, modified_ts, version";

/// A save was refused because the row changed after it was loaded
#[derive(Debug, Error)]
#[error("Statement {id} was changed by another session; reload it and try again")]
pub struct StaleStatement {
    pub id: i64,
}

/// Statement repository for database operations
pub struct StatementRepo;

impl StatementRepo {
    /// Create a new statement in `stage_id`
    pub fn create(
        conn: &Connection,
        group_id: i64,
        stage_id: StageId,
        scoring_wait: bool,
    ) -> Result<Statement> {
        let mut statement = Statement::new(group_id, stage_id);
        statement.state.scoring_wait = scoring_wait;

        conn.execute(
            "INSERT INTO statements (uuid, group_id, stage_id, substage_id, scoring_wait,
                    scoring_next_stages, created_ts, modified_ts)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?7)",
            rusqlite::params![
                statement.uuid,
                statement.group_id,
                statement.state.stage_id.get(),
                statement.state.substage_id.get(),
                statement.state.scoring_wait as i64,
                statement.created_ts,
                statement.modified_ts,
            ],
        )
        .with_context(|| format!("Failed to create statement in group id={}", group_id))?;

        let id = conn.last_insert_rowid();
        Ok(Statement {
            id: Some(id),
            ..statement
        })
    }

    /// Get statement by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Statement>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM statements WHERE id = ?1",
            STATEMENT_COLUMNS
        ))?;
        let statement = stmt.query_row([id], Self::map_row).optional()?;
        Ok(statement)
    }

    /// List statements of a group ordered by id
    pub fn list_by_group(conn: &Connection, group_id: i64) -> Result<Vec<Statement>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM statements WHERE group_id = ?1 ORDER BY id",
            STATEMENT_COLUMNS
        ))?;
        let rows = stmt.query_map([group_id], Self::map_row)?;

        let mut statements = Vec::new();
        for row in rows {
            statements.push(row?);
        }
        Ok(statements)
    }

    /// Write the stage columns of an existing statement.
    ///
    /// Only succeeds if the stored version still matches `statement.version`;
    /// the version is bumped on success.
    pub fn save(conn: &Connection, statement: &mut Statement) -> Result<()> {
        let id = statement.id.context("Cannot save a statement that was never created")?;
        let pending = match &statement.state.pending_transition {
            Some(pending) => Some(serde_json::to_string(pending)?),
            None => None,
        };

        let updated = conn.execute(
            "UPDATE statements
             SET stage_id = ?1, substage_id = ?2, scoring_wait = ?3,
                 scoring_next_stages = ?4, modified_ts = ?5, version = version + 1
             WHERE id = ?6 AND version = ?7",
            rusqlite::params![
                statement.state.stage_id.get(),
                statement.state.substage_id.get(),
                statement.state.scoring_wait as i64,
                pending,
                statement.modified_ts,
                id,
                statement.version,
            ],
        )
        .with_context(|| format!("Failed to save statement id={}", id))?;

        if updated == 0 {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM statements WHERE id = ?1)",
                [id],
                |row| row.get(0),
            )?;
            if exists {
                return Err(StaleStatement { id }.into());
            }
            anyhow::bail!("No statement found with id={}", id);
        }
        statement.version += 1;
        Ok(())
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Statement> {
        let id: i64 = row.get(0)?;
        let pending_json: Option<String> = row.get(6)?;
        let pending_transition = pending_json.and_then(|json| {
            match serde_json::from_str::<PendingTransition>(&json) {
                Ok(pending) => Some(pending),
                Err(e) => {
                    log::warn!("Ignoring unreadable pending transition on statement {}: {}", id, e);
                    None
                }
            }
        });

        Ok(Statement {
            id: Some(id),
            uuid: row.get(1)?,
            group_id: row.get(2)?,
            state: StageState {
                stage_id: StageId::new(row.get(3)?),
                substage_id: StageId::new(row.get(4)?),
                scoring_wait: row.get::<_, i64>(5)? != 0,
                pending_transition,
            },
            created_ts: row.get(7)?,
            modified_ts: row.get(8)?,
            version: row.get(9)?,
        })
    }
}

/// A statement bound to the connection it is saved through
pub struct StatementRecord<'c> {
    conn: &'c Connection,
    statement: Statement,
}

impl<'c> StatementRecord<'c> {
    pub fn new(conn: &'c Connection, statement: Statement) -> Self {
        Self { conn, statement }
    }

    /// Load statement `id`, if it exists
    pub fn load(conn: &'c Connection, id: i64) -> Result<Option<Self>> {
        Ok(StatementRepo::get_by_id(conn, id)?.map(|statement| Self::new(conn, statement)))
    }

    pub fn statement(&self) -> &Statement {
        &self.statement
    }
}

impl Subject for StatementRecord<'_> {
    fn stage_state(&self) -> &StageState {
        &self.statement.state
    }

    fn stage_state_mut(&mut self) -> &mut StageState {
        &mut self.statement.state
    }

    fn save(&mut self) -> Result<()> {
        self.statement.modified_ts = chrono::Utc::now().timestamp();
        StatementRepo::save(self.conn, &mut self.statement)
    }
}
