use log::warn;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::models::{RoleContext, StageId, StageState};
use crate::workflow::StageCatalog;

/// Stages in which the client may edit the application
pub const CLIENT_EDIT_STAGES: &[&str] = &["new", "onClientRevision", "onClientRevisionAfterBank"];

/// Stages in which a moderator may edit the application
pub const MODER_EDIT_STAGES: &[&str] = &[
    "newOnModer",
    "fromClientRevision",
    "beforeClientRevisionAfterBank",
    "onModerAfterBank",
];

/// Conditions attached to one outgoing edge. Empty means unconditional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeCondition {
    /// Sub-stage (or stage) name that must currently be active
    pub required_substage: Option<String>,
    /// Roles allowed to take the edge; `None` allows everyone
    pub allowed_roles: Option<BTreeSet<String>>,
}

impl EdgeCondition {
    pub fn unconditional() -> Self {
        Self::default()
    }

    pub fn requires_substage(mut self, name: &str) -> Self {
        self.required_substage = Some(name.to_string());
        self
    }

    /// Restrict the edge to `roles`; role names go through the agent alias.
    pub fn for_roles<'a>(mut self, roles: impl IntoIterator<Item = &'a str>) -> Self {
        let allowed = self.allowed_roles.get_or_insert_with(BTreeSet::new);
        for role in roles {
            allowed.insert(RoleContext::normalize(role).to_string());
        }
        self
    }

    pub fn is_unconditional(&self) -> bool {
        self.required_substage.is_none() && self.allowed_roles.is_none()
    }

    /// Whether `role` passes the role restriction
    pub fn allows(&self, role: &RoleContext) -> bool {
        match &self.allowed_roles {
            Some(roles) => roles.iter().any(|r| role.matches(r)),
            None => true,
        }
    }
}

/// Candidate next stages keyed by id
pub type CandidateEdges = BTreeMap<StageId, EdgeCondition>;

/// What the overwrite hook may look at besides the raw candidates
pub struct TransitionContext<'a> {
    pub catalog: &'a StageCatalog,
    pub state: &'a StageState,
    pub role: &'a RoleContext,
    pub current_stage: &'a str,
}

/// Per-variant edge tables.
///
/// Implementations must be immutable after construction; one provider is
/// shared by every engine working on statements of that variant.
pub trait TransitionRuleProvider: Send + Sync {
    /// Variant name this provider is registered under
    fn variant(&self) -> &str;

    /// Raw outgoing edges of `stage_name`. Unknown stages have no edges.
    fn candidates(&self, stage_name: &str, catalog: &StageCatalog) -> CandidateEdges;

    /// Post-process the raw candidates before they are filtered.
    fn overwrite(&self, _ctx: &TransitionContext<'_>, edges: CandidateEdges) -> CandidateEdges {
        edges
    }

    /// Name of the successful finish stage
    fn finish_stage(&self) -> &str;

    fn client_edit_stages(&self) -> &[&str] {
        CLIENT_EDIT_STAGES
    }

    fn moder_edit_stages(&self) -> &[&str] {
        MODER_EDIT_STAGES
    }
}

/// One registered edge: target stage name plus its condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub target: String,
    pub condition: EdgeCondition,
}

impl Edge {
    pub fn to(target: &str) -> Self {
        Self {
            target: target.to_string(),
            condition: EdgeCondition::unconditional(),
        }
    }

    pub fn requires_substage(mut self, name: &str) -> Self {
        self.condition = self.condition.requires_substage(name);
        self
    }

    pub fn for_roles<'a>(mut self, roles: impl IntoIterator<Item = &'a str>) -> Self {
        self.condition = self.condition.for_roles(roles);
        self
    }
}

/// Edge table keyed by source stage name, built once per variant.
#[derive(Debug, Clone)]
pub struct RuleTable {
    variant: String,
    finish_stage: String,
    handlers: HashMap<String, Vec<Edge>>,
}

impl RuleTable {
    pub fn builder(variant: &str) -> RuleTableBuilder {
        RuleTableBuilder {
            table: RuleTable {
                variant: variant.to_string(),
                finish_stage: "finishStage".to_string(),
                handlers: HashMap::new(),
            },
        }
    }

    /// Registered edges out of `stage_name`, by name
    pub fn edges(&self, stage_name: &str) -> &[Edge] {
        self.handlers.get(stage_name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Source stage names that have a handler
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

impl TransitionRuleProvider for RuleTable {
    fn variant(&self) -> &str {
        &self.variant
    }

    fn candidates(&self, stage_name: &str, catalog: &StageCatalog) -> CandidateEdges {
        let mut edges = CandidateEdges::new();
        for edge in self.edges(stage_name) {
            match catalog.by_name(&edge.target) {
                Some(target) if target.id.is_stage() => {
                    edges.insert(target.id, edge.condition.clone());
                }
                Some(target) => {
                    warn!(
                        "[{}] edge {} -> {} targets sub-stage id {}; skipped",
                        self.variant, stage_name, edge.target, target.id
                    );
                }
                None => {
                    warn!(
                        "[{}] edge {} -> {} targets a stage missing from the catalog; skipped",
                        self.variant, stage_name, edge.target
                    );
                }
            }
        }
        edges
    }

    fn finish_stage(&self) -> &str {
        &self.finish_stage
    }
}

pub struct RuleTableBuilder {
    table: RuleTable,
}

impl RuleTableBuilder {
    pub fn finish_stage(mut self, name: &str) -> Self {
        self.table.finish_stage = name.to_string();
        self
    }

    /// Register the edges leaving `stage`. Repeated calls for one stage append.
    pub fn after(mut self, stage: &str, edges: impl IntoIterator<Item = Edge>) -> Self {
        self.table
            .handlers
            .entry(stage.to_string())
            .or_default()
            .extend(edges);
        self
    }

    pub fn build(self) -> RuleTable {
        self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CatalogRow;

    fn catalog() -> StageCatalog {
        let rows = [(1, "new"), (2, "review"), (3, "approved"), (201, "docsChecked")]
            .into_iter()
            .map(|(id, name)| CatalogRow {
                id,
                name: name.to_string(),
                side: "client".to_string(),
                priority: id as i64,
                is_hidden_substage: false,
                role: "client".to_string(),
                text: None,
            });
        StageCatalog::from_rows(rows).unwrap()
    }

    #[test]
    fn test_candidates_resolve_names() {
        let table = RuleTable::builder("test")
            .after("new", [Edge::to("review")])
            .after("review", [Edge::to("approved").requires_substage("docsChecked")])
            .build();
        let catalog = catalog();

        let edges = table.candidates("new", &catalog);
        assert_eq!(edges.len(), 1);
        assert!(edges[&StageId::new(2)].is_unconditional());

        let edges = table.candidates("review", &catalog);
        assert_eq!(
            edges[&StageId::new(3)].required_substage.as_deref(),
            Some("docsChecked")
        );
    }

    #[test]
    fn test_missing_handler_is_terminal() {
        let table = RuleTable::builder("test").after("new", [Edge::to("review")]).build();
        assert!(table.candidates("approved", &catalog()).is_empty());
        assert!(table.candidates("unknown", &catalog()).is_empty());
    }

    #[test]
    fn test_unresolvable_targets_skipped() {
        let table = RuleTable::builder("test")
            .after("new", [Edge::to("nowhere"), Edge::to("docsChecked"), Edge::to("review")])
            .build();
        let edges = table.candidates("new", &catalog());
        assert_eq!(edges.keys().copied().collect::<Vec<_>>(), vec![StageId::new(2)]);
    }

    #[test]
    fn test_after_appends() {
        let table = RuleTable::builder("test")
            .after("new", [Edge::to("review")])
            .after("new", [Edge::to("approved")])
            .finish_stage("approved")
            .build();
        assert_eq!(table.edges("new").len(), 2);
        assert_eq!(table.finish_stage(), "approved");
        assert_eq!(table.variant(), "test");
    }

    #[test]
    fn test_role_restriction_uses_alias() {
        let condition = EdgeCondition::unconditional().for_roles(["agent", "moder"]);
        assert!(condition.allows(&RoleContext::new("client")));
        assert!(condition.allows(&RoleContext::new("agent")));
        assert!(condition.allows(&RoleContext::new("moder")));
        assert!(!condition.allows(&RoleContext::new("bank")));
        assert!(EdgeCondition::unconditional().allows(&RoleContext::new("bank")));
    }
}
