use log::warn;
use std::collections::{BTreeMap, HashMap};

use crate::error::{Result, WorkflowError};
use crate::models::{CatalogRow, StageDefinition, StageId, StageRef};

/// Immutable index of the stage definitions of one workflow variant.
///
/// Built once from the flat catalog rows and shared read-only between engines.
#[derive(Debug, Clone)]
pub struct StageCatalog {
    by_id: BTreeMap<StageId, StageDefinition>,
    by_name: HashMap<String, StageId>,
}

impl StageCatalog {
    /// Merge catalog rows into definitions.
    ///
    /// The first row for an id fixes name/side/priority/hidden flag; later rows
    /// for the same id only contribute role labels.
    pub fn from_rows<I>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = CatalogRow>,
    {
        let mut by_id: BTreeMap<StageId, StageDefinition> = BTreeMap::new();
        let mut by_name: HashMap<String, StageId> = HashMap::new();

        for row in rows {
            if row.id == 0 {
                return Err(WorkflowError::InvalidStageId(row.id, row.name));
            }
            let id = StageId::new(row.id);

            if let Some(existing) = by_id.get_mut(&id) {
                if existing.name != row.name
                    || existing.side != row.side
                    || existing.priority != row.priority
                    || existing.is_hidden_substage != row.is_hidden_substage
                {
                    warn!(
                        "Catalog row for stage {} ('{}') disagrees with the first row ('{}'); keeping the first",
                        id, row.name, existing.name
                    );
                }
                if let Some(text) = row.text {
                    existing.text_by_role.insert(row.role, text);
                }
                continue;
            }

            if let Some(&first) = by_name.get(&row.name) {
                return Err(WorkflowError::DuplicateStageName {
                    name: row.name,
                    first,
                    second: id,
                });
            }

            let mut text_by_role = BTreeMap::new();
            if let Some(text) = row.text {
                text_by_role.insert(row.role, text);
            }

            by_name.insert(row.name.clone(), id);
            by_id.insert(id, StageDefinition {
                id,
                name: row.name,
                side: row.side,
                priority: row.priority,
                is_hidden_substage: row.is_hidden_substage,
                text_by_role,
            });
        }

        if by_id.is_empty() {
            return Err(WorkflowError::CatalogEmpty);
        }

        Ok(Self { by_id, by_name })
    }

    pub fn by_id(&self, id: StageId) -> Option<&StageDefinition> {
        self.by_id.get(&id)
    }

    pub fn by_name(&self, name: &str) -> Option<&StageDefinition> {
        self.by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    /// Look up a definition by name or id
    pub fn resolve(&self, stage: &StageRef) -> Option<&StageDefinition> {
        match stage {
            StageRef::Id(id) => self.by_id(*id),
            StageRef::Name(name) => self.by_name(name),
        }
    }

    /// All definitions ordered by id
    pub fn iter(&self) -> impl Iterator<Item = &StageDefinition> {
        self.by_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
