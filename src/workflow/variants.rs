// Built-in workflow variants and the registry that hands them out by name

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, WorkflowError};
use crate::models::{CatalogRow, ROLE_AUTO, ROLE_CLIENT, ROLE_MODER};
use crate::workflow::{
    CandidateEdges, Edge, EdgeCondition, RuleTable, StageCatalog, TransitionContext,
    TransitionRuleProvider,
};

pub const STANDARD_VARIANT: &str = "standard";
pub const EXPRESS_VARIANT: &str = "express";

const ROLE_BANK: &str = "bank";

/// (id, name, side, priority, hidden, client label, moderator label)
type StageSeed = (u32, &'static str, &'static str, i64, bool, &'static str, &'static str);

const STANDARD_STAGES: &[StageSeed] = &[
    (1, "new", "client", 1, false, "Draft", "New (client)"),
    (2, "newOnModer", "broker", 2, false, "Under review", "New"),
    (3, "onClientRevision", "client", 3, false, "Needs your changes", "Returned to client"),
    (4, "fromClientRevision", "broker", 4, false, "Under review", "Revised by client"),
    (5, "autoCheck", "broker", 5, false, "Under review", "Automatic check"),
    (6, "sentToBank", "bank", 6, false, "Sent to bank", "Sent to bank"),
    (7, "beforeClientRevisionAfterBank", "broker", 7, false, "Under review", "Bank asked for changes"),
    (8, "onClientRevisionAfterBank", "client", 8, false, "Bank asked for changes", "Returned to client (bank)"),
    (9, "onModerAfterBank", "broker", 9, false, "Under review", "Revised after bank"),
    (10, "approved", "bank", 10, false, "Approved", "Approved by bank"),
    (11, "issued", "client", 11, false, "Issued", "Issued"),
    (12, "denied", "broker", 20, false, "Declined", "Denied"),
    (13, "deniedByBank", "bank", 20, false, "Declined by bank", "Denied by bank"),
    (14, "canceled", "client", 20, false, "Canceled", "Canceled by client"),
    (101, "docsRequested", "client", 2, false, "Documents requested", "Waiting for documents"),
    (102, "docsChecked", "broker", 3, false, "Documents checked", "Documents checked"),
    (103, "scoringPassed", "broker", 5, true, "Scoring passed", "Scoring passed"),
    (104, "signed", "client", 10, false, "Contract signed", "Contract signed"),
];

/// Catalog rows of the standard variant, one row per stage and labelled role
pub fn standard_catalog_rows() -> Vec<CatalogRow> {
    let mut rows = Vec::with_capacity(STANDARD_STAGES.len() * 2);
    for &(id, name, side, priority, hidden, client_text, moder_text) in STANDARD_STAGES {
        for (role, text) in [(ROLE_CLIENT, client_text), (ROLE_MODER, moder_text)] {
            rows.push(CatalogRow {
                id,
                name: name.to_string(),
                side: side.to_string(),
                priority,
                is_hidden_substage: hidden,
                role: role.to_string(),
                text: Some(text.to_string()),
            });
        }
    }
    rows
}

/// Catalog of the standard variant
pub fn standard_catalog() -> Result<StageCatalog> {
    StageCatalog::from_rows(standard_catalog_rows())
}

/// Reference bank workflow: client submission, moderator review with
/// revision loops, bank decision, issue.
pub fn standard_rules() -> RuleTable {
    let client = [ROLE_CLIENT];
    let moder = [ROLE_MODER];
    let bank_side = [ROLE_BANK, ROLE_MODER];

    RuleTable::builder(STANDARD_VARIANT)
        .finish_stage("issued")
        .after("new", [
            Edge::to("newOnModer").for_roles(client),
            Edge::to("canceled").for_roles(client),
        ])
        .after("newOnModer", [
            Edge::to("onClientRevision").for_roles(moder),
            Edge::to("sentToBank").for_roles(moder).requires_substage("docsChecked"),
            Edge::to("denied").for_roles(moder),
        ])
        .after("onClientRevision", [
            Edge::to("fromClientRevision").for_roles(client),
            Edge::to("canceled").for_roles(client),
        ])
        .after("fromClientRevision", [
            Edge::to("onClientRevision").for_roles(moder),
            Edge::to("sentToBank").for_roles(moder).requires_substage("docsChecked"),
            Edge::to("denied").for_roles(moder),
        ])
        .after("autoCheck", [
            Edge::to("newOnModer").for_roles([ROLE_AUTO]),
            Edge::to("sentToBank").for_roles([ROLE_AUTO]),
            Edge::to("approved").for_roles([ROLE_AUTO]),
            Edge::to("denied").for_roles([ROLE_AUTO]),
        ])
        .after("sentToBank", [
            Edge::to("approved").for_roles(bank_side),
            Edge::to("deniedByBank").for_roles(bank_side),
            Edge::to("beforeClientRevisionAfterBank").for_roles(bank_side),
        ])
        .after("beforeClientRevisionAfterBank", [
            Edge::to("onClientRevisionAfterBank").for_roles(moder),
        ])
        .after("onClientRevisionAfterBank", [
            Edge::to("onModerAfterBank").for_roles(client),
            Edge::to("canceled").for_roles(client),
        ])
        .after("onModerAfterBank", [
            Edge::to("sentToBank").for_roles(moder),
            Edge::to("denied").for_roles(moder),
        ])
        .after("approved", [
            Edge::to("issued").for_roles([ROLE_CLIENT, ROLE_MODER]).requires_substage("signed"),
            Edge::to("canceled").for_roles(client),
        ])
        .build()
}

/// Standard rules without the moderator revision loops; a client whose
/// documents are checked may send straight to the bank.
pub struct ExpressRules {
    base: RuleTable,
}

impl ExpressRules {
    const DROPPED: &'static [&'static str] = &["onClientRevision", "beforeClientRevisionAfterBank"];

    pub fn new() -> Self {
        Self {
            base: standard_rules(),
        }
    }
}

impl Default for ExpressRules {
    fn default() -> Self {
        Self::new()
    }
}

impl TransitionRuleProvider for ExpressRules {
    fn variant(&self) -> &str {
        EXPRESS_VARIANT
    }

    fn candidates(&self, stage_name: &str, catalog: &StageCatalog) -> CandidateEdges {
        self.base.candidates(stage_name, catalog)
    }

    fn overwrite(&self, ctx: &TransitionContext<'_>, mut edges: CandidateEdges) -> CandidateEdges {
        edges.retain(|id, _| {
            ctx.catalog
                .by_id(*id)
                .map_or(true, |def| !Self::DROPPED.iter().any(|name| *name == def.name))
        });

        if ctx.current_stage == "new" {
            if let Some(bank) = ctx.catalog.by_name("sentToBank") {
                edges.insert(
                    bank.id,
                    EdgeCondition::unconditional()
                        .for_roles([ROLE_CLIENT])
                        .requires_substage("docsChecked"),
                );
            }
        }
        edges
    }

    fn finish_stage(&self) -> &str {
        self.base.finish_stage()
    }
}

/// Transition rule providers by variant name
#[derive(Default)]
pub struct VariantRegistry {
    providers: HashMap<String, Arc<dyn TransitionRuleProvider>>,
}

impl VariantRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `standard` and `express` variants
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(standard_rules()));
        registry.register(Arc::new(ExpressRules::new()));
        registry
    }

    /// Register a provider under its own variant name, replacing any previous one
    pub fn register(&mut self, provider: Arc<dyn TransitionRuleProvider>) {
        self.providers.insert(provider.variant().to_string(), provider);
    }

    pub fn get(&self, variant: &str) -> Result<Arc<dyn TransitionRuleProvider>> {
        self.providers
            .get(variant)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownVariant(variant.to_string()))
    }

    pub fn contains(&self, variant: &str) -> bool {
        self.providers.contains_key(variant)
    }

    /// Registered variant names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RoleContext, StageState};

    #[test]
    fn test_standard_catalog_is_consistent() {
        let catalog = standard_catalog().unwrap();
        assert_eq!(catalog.len(), STANDARD_STAGES.len());
        for def in catalog.iter() {
            assert_eq!(def.is_substage(), def.id.get() > 100, "{}", def.name);
            assert_eq!(def.text_by_role.len(), 2);
        }
        assert!(catalog.by_name("scoringPassed").unwrap().is_hidden_substage);
    }

    #[test]
    fn test_standard_edges_resolve() {
        let catalog = standard_catalog().unwrap();
        let rules = standard_rules();
        for source in rules.sources() {
            assert!(catalog.by_name(source).is_some(), "unknown source {}", source);
            assert_eq!(
                rules.candidates(source, &catalog).len(),
                rules.edges(source).len(),
                "unresolved target from {}",
                source
            );
        }
    }

    #[test]
    fn test_terminal_stages_have_no_edges() {
        let catalog = standard_catalog().unwrap();
        let rules = standard_rules();
        for stage in ["issued", "denied", "deniedByBank", "canceled"] {
            assert!(rules.candidates(stage, &catalog).is_empty(), "{}", stage);
        }
    }

    #[test]
    fn test_express_drops_revision_loops() {
        let catalog = standard_catalog().unwrap();
        let express = ExpressRules::new();
        let state = StageState::default();
        let role = RoleContext::new("moder");
        let ctx = TransitionContext {
            catalog: &catalog,
            state: &state,
            role: &role,
            current_stage: "newOnModer",
        };
        let edges = express.overwrite(&ctx, express.candidates("newOnModer", &catalog));
        let names: Vec<&str> = edges
            .keys()
            .map(|id| catalog.by_id(*id).unwrap().name.as_str())
            .collect();
        assert_eq!(names, vec!["sentToBank", "denied"]);
    }

    #[test]
    fn test_registry() {
        let registry = VariantRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["express", "standard"]);
        assert_eq!(registry.get("express").unwrap().finish_stage(), "issued");
        assert!(matches!(
            registry.get("missing"),
            Err(WorkflowError::UnknownVariant(_))
        ));
        assert!(VariantRegistry::new().names().is_empty());
        assert!(VariantRegistry::default().get("standard").is_err());
    }
}
