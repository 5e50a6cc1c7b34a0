use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, WorkflowError};
use crate::models::{
    PendingTransition, RoleContext, StageDefinition, StageId, StageRef, StageSet, StageState,
    ROLE_MODER, SIDE_BROKER,
};
use crate::workflow::{StageCatalog, Subject, TransitionContext, TransitionRuleProvider};

/// Interim stage a statement waits in while automated scoring runs
pub const AUTO_CHECK_STAGE: &str = "autoCheck";

/// Unsuccessful terminal stages. Moving into one never waits for scoring.
pub const DEFERRAL_BYPASS_STAGES: &[&str] = &["denied", "deniedByBank", "canceled"];

/// Catalog plus transition rules of one workflow variant.
///
/// Cheap to clone; both halves are shared read-only.
#[derive(Clone)]
pub struct Workflow {
    catalog: Arc<StageCatalog>,
    rules: Arc<dyn TransitionRuleProvider>,
}

impl Workflow {
    pub fn new(catalog: Arc<StageCatalog>, rules: Arc<dyn TransitionRuleProvider>) -> Self {
        Self { catalog, rules }
    }

    pub fn catalog(&self) -> &StageCatalog {
        &self.catalog
    }

    pub fn rules(&self) -> &dyn TransitionRuleProvider {
        self.rules.as_ref()
    }

    /// Bind an engine to `subject` acting as `role`
    pub fn engine<S: Subject>(&self, subject: S, role: RoleContext) -> StageEngine<S> {
        StageEngine::new(self.clone(), role, subject)
    }
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("variant", &self.rules.variant())
            .field("stages", &self.catalog.len())
            .finish()
    }
}

/// Stage state machine for one subject.
///
/// Queries never fail: unknown stages come back as `None`/`false`. Mutations
/// return `Ok(true)` when applied and saved, `Ok(false)` when rejected (the
/// subject is left untouched) and `Err` only for configuration or save
/// failures.
///
/// Not safe for concurrent mutation of one subject; callers serialize
/// transitions per statement.
pub struct StageEngine<S> {
    workflow: Workflow,
    role: RoleContext,
    subject: S,
}

impl<S: Subject> StageEngine<S> {
    pub fn new(workflow: Workflow, role: RoleContext, subject: S) -> Self {
        Self {
            workflow,
            role,
            subject,
        }
    }

    pub fn role(&self) -> &RoleContext {
        &self.role
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn catalog(&self) -> &StageCatalog {
        self.workflow.catalog()
    }

    pub fn subject(&self) -> &S {
        &self.subject
    }

    pub fn state(&self) -> &StageState {
        self.subject.stage_state()
    }

    /// Every stage and sub-stage of the variant, ordered by id
    pub fn all_stages(&self) -> impl Iterator<Item = &StageDefinition> {
        self.catalog().iter()
    }

    /// Definition of the current stage; `None` if the stored id is unknown
    pub fn current_stage(&self) -> Option<&StageDefinition> {
        self.catalog().by_id(self.state().stage_id)
    }

    /// Definition of the current sub-stage; `None` if unset or unknown
    pub fn current_sub_stage(&self) -> Option<&StageDefinition> {
        let id = self.state().substage_id;
        if id.is_none() {
            return None;
        }
        self.catalog().by_id(id).filter(|def| def.is_substage())
    }

    /// Resolve a name (or an id already known to the catalog) to its id
    pub fn name_to_id(&self, stage: impl Into<StageRef>) -> Option<StageId> {
        self.catalog().resolve(&stage.into()).map(|def| def.id)
    }

    /// Resolve an id (or a name already known to the catalog) to its name
    pub fn id_to_name(&self, stage: impl Into<StageRef>) -> Option<&str> {
        self.catalog().resolve(&stage.into()).map(|def| def.name.as_str())
    }

    /// True if any of `stages` is the current stage or sub-stage
    pub fn is<T: StageSet>(&self, stages: T) -> bool {
        stages.into_refs().iter().any(|stage| self.matches_current(stage))
    }

    /// True if none of `stages` is the current stage or sub-stage
    pub fn is_not<T: StageSet>(&self, stages: T) -> bool {
        !self.is(stages)
    }

    /// Whether the current position comes before `stage` by priority.
    ///
    /// A sub-stage target is compared against the current sub-stage. `None`
    /// means the comparison cannot be made (unknown target or no current
    /// position to compare).
    pub fn before(&self, stage: impl Into<StageRef>, inclusive: bool) -> Option<bool> {
        let (current, target) = self.priorities(&stage.into())?;
        Some(if inclusive { current <= target } else { current < target })
    }

    /// Whether the current position comes after `stage` by priority. See [`Self::before`].
    pub fn after(&self, stage: impl Into<StageRef>, inclusive: bool) -> Option<bool> {
        let (current, target) = self.priorities(&stage.into())?;
        Some(if inclusive { current >= target } else { current > target })
    }

    /// Stages reachable from the current stage for the acting role
    pub fn next_stages(&self) -> BTreeMap<StageId, &StageDefinition> {
        let mut next = BTreeMap::new();
        let Some(current) = self.current_stage() else {
            debug!("Current stage {} is not in the catalog; no next stages", self.state().stage_id);
            return next;
        };

        let catalog = self.catalog();
        let rules = self.workflow.rules();
        let raw = rules.candidates(&current.name, catalog);
        let ctx = TransitionContext {
            catalog,
            state: self.state(),
            role: &self.role,
            current_stage: &current.name,
        };

        for (id, condition) in rules.overwrite(&ctx, raw) {
            if let Some(required) = &condition.required_substage {
                if !self.matches_current(&StageRef::parse(required)) {
                    debug!("Edge {} -> {} needs '{}'", current.name, id, required);
                    continue;
                }
            }
            if !condition.allows(&self.role) {
                debug!("Edge {} -> {} not open to role {}", current.name, id, self.role);
                continue;
            }
            match catalog.by_id(id) {
                Some(def) => {
                    next.insert(id, def);
                }
                None => warn!("Edge {} -> {} points outside the catalog", current.name, id),
            }
        }
        next
    }

    /// Id of `stage` if the subject may move there now
    pub fn can_go_to(&self, stage: impl Into<StageRef>) -> Option<StageId> {
        let target = self.name_to_id(stage)?;
        if target == self.state().stage_id {
            return None;
        }
        self.next_stages().contains_key(&target).then_some(target)
    }

    /// Label of the current stage (or visible sub-stage) for the acting role
    pub fn stage_name(&self, use_substage: bool) -> &str {
        let def = if use_substage {
            match self.current_sub_stage() {
                Some(sub) if !sub.is_hidden_substage => Some(sub),
                _ => None,
            }
        } else {
            self.current_stage()
        };
        def.and_then(|def| def.text_for(&self.role)).unwrap_or("")
    }

    /// Whether the statement currently sits with `side` (default: the acting role's side)
    pub fn on(&self, side: Option<&str>) -> bool {
        let side = match side {
            Some(ROLE_MODER) => SIDE_BROKER,
            Some(side) => side,
            None => self.role.side(),
        };
        self.current_stage().map_or(false, |current| current.side == side)
    }

    pub fn finish_stage(&self) -> &str {
        self.workflow.rules().finish_stage()
    }

    pub fn is_successful_finish_stage(&self) -> bool {
        self.is(self.finish_stage())
    }

    /// In the finish stage or any unsuccessful terminal stage
    pub fn is_any_finish_stage(&self) -> bool {
        let mut stages = vec![self.finish_stage()];
        stages.extend_from_slice(DEFERRAL_BYPASS_STAGES);
        self.is(stages)
    }

    pub fn client_can_edit(&self) -> bool {
        self.is(self.workflow.rules().client_edit_stages())
    }

    pub fn moder_can_edit(&self) -> bool {
        self.is(self.workflow.rules().moder_edit_stages())
    }

    /// Move to `stage` if it is reachable, optionally landing in `substage`.
    ///
    /// Without a sub-stage the current sub-stage is cleared.
    pub fn set_stage(
        &mut self,
        stage: impl Into<StageRef>,
        substage: Option<&str>,
    ) -> Result<bool> {
        let stage = stage.into();
        let Some(target) = self.can_go_to(&stage) else {
            debug!(
                "Transition {} -> {} rejected for role {}",
                self.state().stage_id, stage, self.role
            );
            return Ok(false);
        };
        let Some(requested_sub) = self.requested_substage(substage) else {
            return Ok(false);
        };

        let snapshot = self.state().clone();
        let (stage_id, substage_id) = self.defer_for_scoring(target, requested_sub)?;
        let state = self.subject.stage_state_mut();
        state.stage_id = stage_id;
        state.substage_id = substage_id.unwrap_or(StageId::NONE);
        info!("Stage {} -> {} (sub-stage {})", snapshot.stage_id, stage_id, state.substage_id);

        self.persist(snapshot)
    }

    /// Set the sub-stage. Ids of top-level stages are refused; `0` clears.
    pub fn set_sub_stage(&mut self, substage: impl Into<StageRef>) -> Result<bool> {
        let substage = substage.into();
        let id = match substage {
            StageRef::Id(id) if id.is_none() => id,
            ref other => match self.name_to_id(other) {
                Some(id) => id,
                None => {
                    debug!("Unknown sub-stage {}", other);
                    return Ok(false);
                }
            },
        };
        if !id.is_none() && !id.is_substage() {
            debug!("Refusing stage id {} as a sub-stage", id);
            return Ok(false);
        }

        let snapshot = self.state().clone();
        self.subject.stage_state_mut().substage_id = id;
        info!("Sub-stage {} -> {}", snapshot.substage_id, id);

        self.persist(snapshot)
    }

    /// Move to `stage` without checking the transition rules.
    ///
    /// Scoring deferral still applies. Without a sub-stage the current
    /// sub-stage is kept, unlike [`Self::set_stage`].
    pub fn force_set_stage(
        &mut self,
        stage: impl Into<StageRef>,
        substage: Option<&str>,
    ) -> Result<bool> {
        let stage = stage.into();
        let Some(target) = self.name_to_id(&stage).filter(|id| id.is_stage()) else {
            debug!("Forced transition to unknown stage {}", stage);
            return Ok(false);
        };
        let Some(requested_sub) = self.requested_substage(substage) else {
            return Ok(false);
        };

        let snapshot = self.state().clone();
        let (stage_id, substage_id) = self.defer_for_scoring(target, requested_sub)?;
        let state = self.subject.stage_state_mut();
        state.stage_id = stage_id;
        if let Some(substage_id) = substage_id {
            state.substage_id = substage_id;
        }
        info!(
            "Stage {} -> {} forced by role {} (sub-stage {})",
            snapshot.stage_id, stage_id, self.role, state.substage_id
        );

        self.persist(snapshot)
    }

    fn matches_current(&self, stage: &StageRef) -> bool {
        match self.name_to_id(stage) {
            Some(id) if id.is_substage() => self.state().substage_id == id,
            Some(id) => self.state().stage_id == id,
            None => false,
        }
    }

    fn priorities(&self, stage: &StageRef) -> Option<(i64, i64)> {
        let target = self.catalog().resolve(stage)?;
        let current = if target.is_substage() {
            self.current_sub_stage()
        } else {
            self.current_stage()
        }?;
        Some((current.priority, target.priority))
    }

    /// `Some(None)` when no sub-stage was asked for, `None` when the request is invalid
    fn requested_substage(&self, substage: Option<&str>) -> Option<Option<StageId>> {
        let Some(name) = substage else {
            return Some(None);
        };
        match StageRef::parse(name) {
            StageRef::Id(id) if id.is_none() => Some(Some(id)),
            stage => match self.name_to_id(&stage) {
                Some(id) if id.is_substage() => Some(Some(id)),
                Some(id) => {
                    debug!("Refusing stage id {} as a sub-stage", id);
                    None
                }
                None => {
                    debug!("Unknown sub-stage {}", stage);
                    None
                }
            },
        }
    }

    /// Redirect to the auto check stage while scoring is pending, remembering the destination
    fn defer_for_scoring(
        &mut self,
        stage: StageId,
        substage: Option<StageId>,
    ) -> Result<(StageId, Option<StageId>)> {
        if !self.state().scoring_wait {
            return Ok((stage, substage));
        }
        let bypass = self
            .id_to_name(stage)
            .map_or(false, |name| DEFERRAL_BYPASS_STAGES.iter().any(|s| *s == name));
        if bypass {
            return Ok((stage, substage));
        }

        let auto_check = self
            .name_to_id(AUTO_CHECK_STAGE)
            .ok_or_else(|| WorkflowError::MissingStage(AUTO_CHECK_STAGE.to_string()))?;
        let pending = PendingTransition {
            stage_id: stage,
            substage_id: substage.unwrap_or(StageId::NONE),
        };
        self.subject.stage_state_mut().pending_transition = Some(pending);
        info!(
            "Scoring pending: {} deferred via {} (sub-stage {})",
            stage, AUTO_CHECK_STAGE, pending.substage_id
        );
        Ok((auto_check, None))
    }

    fn persist(&mut self, snapshot: StageState) -> Result<bool> {
        match self.subject.save() {
            Ok(()) => Ok(true),
            Err(err) => {
                warn!("Save failed, restoring stage {}: {:#}", snapshot.stage_id, err);
                *self.subject.stage_state_mut() = snapshot;
                Err(WorkflowError::Save(err))
            }
        }
    }
}
