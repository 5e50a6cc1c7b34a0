use serde::{Deserialize, Serialize};

use crate::models::StageId;

/// Destination remembered while a statement waits in the auto check stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransition {
    pub stage_id: StageId,
    /// `StageId::NONE` when no sub-stage was requested
    pub substage_id: StageId,
}

/// Stage related columns of a statement
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StageState {
    pub stage_id: StageId,
    pub substage_id: StageId,
    /// An automated scoring check must run before the next transition lands
    pub scoring_wait: bool,
    pub pending_transition: Option<PendingTransition>,
}

impl StageState {
    pub fn new(stage_id: StageId) -> Self {
        Self {
            stage_id,
            ..Self::default()
        }
    }
}

/// Statement model (an application sent to a bank group)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub id: Option<i64>,
    pub uuid: String,
    pub group_id: i64,
    pub state: StageState,
    pub created_ts: i64,
    pub modified_ts: i64,
    /// Bumped on every save; a save against an older version is refused
    pub version: i64,
}

impl Statement {
    /// Create a new statement positioned at `stage_id`
    pub fn new(group_id: i64, stage_id: StageId) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: None,
            uuid: uuid::Uuid::new_v4().to_string(),
            group_id,
            state: StageState::new(stage_id),
            created_ts: now,
            modified_ts: now,
            version: 0,
        }
    }
}
