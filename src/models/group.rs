use serde::{Deserialize, Serialize};

/// Bank group model
///
/// A group binds a stage catalog to the workflow variant whose transition
/// rules apply to statements sent to that bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankGroup {
    pub id: Option<i64>,
    pub name: String,
    pub variant: String,
    pub created_ts: i64,
}

impl BankGroup {
    pub fn new(name: String, variant: String) -> Self {
        Self {
            id: None,
            name,
            variant,
            created_ts: chrono::Utc::now().timestamp(),
        }
    }
}
