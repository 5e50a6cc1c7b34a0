use std::sync::Arc;

use stagehand::error::WorkflowError;
use stagehand::models::{CatalogRow, PendingTransition, RoleContext, StageId, StageState};
use stagehand::workflow::{
    standard_catalog, standard_rules, Edge, RuleTable, StageCatalog, StageEngine, Subject,
    VariantRegistry, Workflow,
};

/// In-memory subject that counts saves and can be told to fail them
struct Memo {
    state: StageState,
    saves: usize,
    fail_save: bool,
}

impl Memo {
    fn at(stage: u32) -> Self {
        Self {
            state: StageState::new(StageId::new(stage)),
            saves: 0,
            fail_save: false,
        }
    }

    fn with_substage(mut self, substage: u32) -> Self {
        self.state.substage_id = StageId::new(substage);
        self
    }

    fn waiting_for_scoring(mut self) -> Self {
        self.state.scoring_wait = true;
        self
    }
}

impl Subject for Memo {
    fn stage_state(&self) -> &StageState {
        &self.state
    }

    fn stage_state_mut(&mut self) -> &mut StageState {
        &mut self.state
    }

    fn save(&mut self) -> anyhow::Result<()> {
        if self.fail_save {
            anyhow::bail!("database is locked");
        }
        self.saves += 1;
        Ok(())
    }
}

fn row(id: u32, name: &str, priority: i64, hidden: bool) -> CatalogRow {
    CatalogRow {
        id,
        name: name.to_string(),
        side: "client".to_string(),
        priority,
        is_hidden_substage: hidden,
        role: "client".to_string(),
        text: Some(format!("{} label", name)),
    }
}

/// new -> review -> approved (needs docsChecked), with a self edge on new
fn small_workflow() -> Workflow {
    let catalog = StageCatalog::from_rows(vec![
        row(1, "new", 1, false),
        row(2, "review", 2, false),
        row(3, "approved", 3, false),
        row(201, "docsChecked", 2, false),
    ])
    .unwrap();
    let rules = RuleTable::builder("small")
        .after("new", [Edge::to("review"), Edge::to("new")])
        .after("review", [Edge::to("approved").requires_substage("docsChecked")])
        .finish_stage("approved")
        .build();
    Workflow::new(Arc::new(catalog), Arc::new(rules))
}

fn standard_workflow() -> Workflow {
    Workflow::new(Arc::new(standard_catalog().unwrap()), Arc::new(standard_rules()))
}

fn standard_engine(memo: Memo, role: &str) -> StageEngine<Memo> {
    standard_workflow().engine(memo, RoleContext::new(role))
}

fn express_engine(memo: Memo, role: &str) -> StageEngine<Memo> {
    let rules = VariantRegistry::with_defaults().get("express").unwrap();
    let workflow = Workflow::new(Arc::new(standard_catalog().unwrap()), rules);
    workflow.engine(memo, RoleContext::new(role))
}

#[test]
fn test_end_to_end_review_flow() {
    let mut engine = small_workflow().engine(Memo::at(1), RoleContext::new("client"));

    assert_eq!(engine.can_go_to("approved"), None);
    assert!(engine.set_stage("review", None).unwrap());
    assert_eq!(engine.state().stage_id, StageId::new(2));

    assert!(engine.set_sub_stage("docsChecked").unwrap());
    assert_eq!(engine.state().substage_id, StageId::new(201));

    assert_eq!(engine.can_go_to("approved"), Some(StageId::new(3)));
    assert!(engine.set_stage("approved", None).unwrap());
    assert_eq!(engine.state().stage_id, StageId::new(3));
    assert!(engine.is_successful_finish_stage());
    assert!(engine.next_stages().is_empty());
    assert_eq!(engine.subject().saves, 3);
}

#[test]
fn test_self_transition_is_never_permitted() {
    let engine = small_workflow().engine(Memo::at(1), RoleContext::new("client"));

    // The edge table lists new -> new, but target equals current
    assert!(engine.next_stages().contains_key(&StageId::new(1)));
    assert_eq!(engine.can_go_to("new"), None);
    assert_eq!(engine.can_go_to(1u32), None);
}

#[test]
fn test_rejected_transitions_leave_state_untouched() {
    let memo = Memo::at(2).with_substage(101).waiting_for_scoring();
    let mut engine = standard_engine(memo, "client");
    let before = engine.state().clone();

    // Moderator-only edge, unknown stage, self transition, stage id as sub-stage
    assert!(!engine.set_stage("sentToBank", None).unwrap());
    assert!(!engine.set_stage("nowhere", None).unwrap());
    assert!(!engine.set_stage("newOnModer", None).unwrap());
    assert!(!engine.set_sub_stage("approved").unwrap());
    assert!(!engine.set_sub_stage(StageId::new(100)).unwrap());
    assert!(!engine.set_sub_stage("noSuchSubstage").unwrap());
    assert!(!engine.force_set_stage("docsChecked", None).unwrap());

    assert_eq!(engine.state(), &before);
    assert_eq!(engine.subject().saves, 0);
}

#[test]
fn test_substage_guard_accepts_only_substages_or_zero() {
    let mut engine = standard_engine(Memo::at(2), "moder");

    for id in [1u32, 50, 100] {
        assert!(!engine.set_sub_stage(id).unwrap(), "id {} accepted as sub-stage", id);
    }
    assert!(engine.set_sub_stage(102u32).unwrap());
    assert_eq!(engine.state().substage_id, StageId::new(102));

    assert!(engine.set_sub_stage("0").unwrap());
    assert!(engine.state().substage_id.is_none());
}

#[test]
fn test_id_ranges_of_standard_catalog() {
    let catalog = standard_catalog().unwrap();
    for def in catalog.iter() {
        assert_eq!(def.id.get() > 100, def.is_substage(), "{}", def.name);
        assert_eq!(def.id.is_substage(), def.is_substage(), "{}", def.name);
    }

    let engine = standard_engine(Memo::at(1), "client");
    let ids: Vec<u32> = engine.all_stages().map(|def| def.id.get()).collect();
    assert_eq!(ids.len(), 18);
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn test_agent_is_client() {
    let agent = standard_engine(Memo::at(1), "agent");
    let client = standard_engine(Memo::at(1), "client");

    assert_eq!(agent.role(), client.role());
    let agent_next: Vec<StageId> = agent.next_stages().keys().copied().collect();
    let client_next: Vec<StageId> = client.next_stages().keys().copied().collect();
    assert_eq!(agent_next, client_next);
    assert!(!agent_next.is_empty());
    assert_eq!(agent.is("new"), client.is("new"));
    assert_eq!(agent.stage_name(false), client.stage_name(false));
}

#[test]
fn test_role_filters_next_stages() {
    let client = standard_engine(Memo::at(2).with_substage(102), "client");
    let moder = standard_engine(Memo::at(2).with_substage(102), "moder");

    assert!(client.next_stages().is_empty());
    let names: Vec<&str> = moder.next_stages().values().map(|def| def.name.as_str()).collect();
    assert_eq!(names, vec!["onClientRevision", "sentToBank", "denied"]);
}

#[test]
fn test_required_substage_filters_next_stages() {
    let without = standard_engine(Memo::at(2), "moder");
    assert_eq!(without.can_go_to("sentToBank"), None);

    let with = standard_engine(Memo::at(2).with_substage(102), "moder");
    assert_eq!(with.can_go_to("sentToBank"), Some(StageId::new(6)));
}

#[test]
fn test_express_client_sends_checked_documents_to_bank() {
    let mut engine = express_engine(Memo::at(1), "client");
    assert_eq!(engine.can_go_to("sentToBank"), None);
    assert!(!engine.set_stage("sentToBank", None).unwrap());
    assert_eq!(engine.subject().saves, 0);

    assert!(engine.set_sub_stage("docsChecked").unwrap());
    assert_eq!(engine.can_go_to("sentToBank"), Some(StageId::new(6)));
    assert!(engine.set_stage("sentToBank", None).unwrap());
    assert_eq!(engine.state().stage_id, StageId::new(6));
    assert_eq!(engine.subject().saves, 2);
}

#[test]
fn test_express_shortcut_is_client_only() {
    let moder = express_engine(Memo::at(1).with_substage(102), "moder");
    assert_eq!(moder.can_go_to("sentToBank"), None);

    let standard = standard_engine(Memo::at(1).with_substage(102), "client");
    assert_eq!(standard.can_go_to("sentToBank"), None);

    let agent = express_engine(Memo::at(1).with_substage(102), "agent");
    assert_eq!(agent.can_go_to("sentToBank"), Some(StageId::new(6)));
}

#[test]
fn test_scoring_defers_to_auto_check() {
    let mut engine = standard_engine(Memo::at(6).with_substage(102).waiting_for_scoring(), "moder");

    assert!(engine.set_stage("approved", Some("signed")).unwrap());

    assert!(engine.is("autoCheck"));
    assert!(engine.state().substage_id.is_none());
    assert_eq!(
        engine.state().pending_transition,
        Some(PendingTransition {
            stage_id: StageId::new(10),
            substage_id: StageId::new(104),
        })
    );
    assert_eq!(engine.subject().saves, 1);
}

#[test]
fn test_scoring_deferral_without_requested_substage() {
    let mut engine = standard_engine(Memo::at(6).waiting_for_scoring(), "moder");

    assert!(engine.set_stage("approved", None).unwrap());
    let pending = engine.state().pending_transition.unwrap();
    assert_eq!(pending.stage_id, StageId::new(10));
    assert!(pending.substage_id.is_none());
}

#[test]
fn test_terminal_stages_bypass_scoring() {
    let mut engine = standard_engine(Memo::at(6).waiting_for_scoring(), "moder");

    assert!(engine.set_stage("deniedByBank", None).unwrap());
    assert!(engine.is("deniedByBank"));
    assert!(engine.state().pending_transition.is_none());
    assert!(engine.is_any_finish_stage());
    assert!(!engine.is_successful_finish_stage());
}

#[test]
fn test_set_stage_clears_substage_but_force_keeps_it() {
    let mut engine = standard_engine(Memo::at(2).with_substage(102), "moder");
    assert!(engine.set_stage("sentToBank", None).unwrap());
    assert!(engine.state().substage_id.is_none());

    let mut engine = standard_engine(Memo::at(2).with_substage(102), "moder");
    assert!(engine.force_set_stage("approved", None).unwrap());
    assert_eq!(engine.state().stage_id, StageId::new(10));
    assert_eq!(engine.state().substage_id, StageId::new(102));
}

#[test]
fn test_force_set_stage_ignores_rules_but_not_scoring() {
    // No edge leads from new to issued
    let mut engine = standard_engine(Memo::at(1).with_substage(101), "client");
    assert_eq!(engine.can_go_to("issued"), None);
    assert!(engine.force_set_stage("issued", Some("signed")).unwrap());
    assert!(engine.is(["issued", "signed"]));

    let memo = Memo::at(1).with_substage(101).waiting_for_scoring();
    let mut engine = standard_engine(memo, "client");
    assert!(engine.force_set_stage("issued", None).unwrap());
    assert!(engine.is("autoCheck"));
    assert_eq!(engine.state().substage_id, StageId::new(101));
    assert_eq!(engine.state().pending_transition.unwrap().stage_id, StageId::new(11));
}

#[test]
fn test_force_set_stage_refuses_substage_targets() {
    let mut engine = standard_engine(Memo::at(1), "moder");
    assert!(!engine.force_set_stage("signed", None).unwrap());
    assert!(!engine.force_set_stage("approved", Some("sentToBank")).unwrap());
    assert_eq!(engine.state(), &StageState::new(StageId::new(1)));
}

#[test]
fn test_save_failure_rolls_back() {
    let mut memo = Memo::at(6).waiting_for_scoring();
    memo.fail_save = true;
    let mut engine = standard_engine(memo, "moder");
    let before = engine.state().clone();

    let result = engine.set_stage("approved", None);
    match result {
        Err(WorkflowError::Save(err)) => assert!(err.to_string().contains("locked")),
        other => panic!("expected save error, got {:?}", other.map(|_| ())),
    }
    assert_eq!(engine.state(), &before);
}

#[test]
fn test_priority_ordering() {
    let catalog = StageCatalog::from_rows(vec![
        row(1, "A", 1, false),
        row(2, "B", 5, false),
        row(3, "C", 5, false),
    ])
    .unwrap();
    let rules = RuleTable::builder("letters").build();
    let workflow = Workflow::new(Arc::new(catalog), Arc::new(rules));
    let engine = workflow.engine(Memo::at(1), RoleContext::new("client"));

    assert_eq!(engine.before("B", false), Some(true));
    assert_eq!(engine.after("B", false), Some(false));
    assert_eq!(engine.before("B", true), Some(true));
    assert_eq!(engine.before("C", false), engine.before("B", false));
    assert_eq!(engine.before("Z", false), None);

    let engine = workflow.engine(Memo::at(2), RoleContext::new("client"));
    assert_eq!(engine.before("C", false), Some(false));
    assert_eq!(engine.before("C", true), Some(true));
    assert_eq!(engine.after("C", true), Some(true));
}

#[test]
fn test_substage_priority_compares_current_substage() {
    let engine = standard_engine(Memo::at(2).with_substage(102), "client");
    // docsChecked (3) vs signed (10)
    assert_eq!(engine.before("signed", false), Some(true));

    let engine = standard_engine(Memo::at(2), "client");
    assert_eq!(engine.before("signed", false), None);
}

#[test]
fn test_hidden_substage_label_is_suppressed() {
    let engine = standard_engine(Memo::at(5).with_substage(103), "client");
    assert_eq!(engine.stage_name(true), "");
    assert_eq!(engine.stage_name(false), "Under review");
    assert!(engine.current_sub_stage().unwrap().text_by_role.contains_key("client"));

    let engine = standard_engine(Memo::at(2).with_substage(102), "moder");
    assert_eq!(engine.stage_name(true), "Documents checked");
}

#[test]
fn test_stale_ids_are_not_found() {
    let engine = standard_engine(Memo::at(77).with_substage(177), "client");
    assert!(engine.current_stage().is_none());
    assert!(engine.current_sub_stage().is_none());
    assert!(engine.next_stages().is_empty());
    assert_eq!(engine.stage_name(false), "");
    assert!(engine.is_not("new"));
}

#[test]
fn test_top_level_id_is_not_a_sub_stage() {
    let engine = standard_engine(Memo::at(2).with_substage(1), "client");
    assert!(engine.current_sub_stage().is_none());
    assert_eq!(engine.stage_name(true), "");
    assert!(!engine.stage_name(false).is_empty());
}

#[test]
fn test_name_id_resolution_is_idempotent() {
    let engine = standard_engine(Memo::at(1), "client");
    assert_eq!(engine.name_to_id("approved"), Some(StageId::new(10)));
    assert_eq!(engine.name_to_id(StageId::new(10)), Some(StageId::new(10)));
    assert_eq!(engine.id_to_name(10u32), Some("approved"));
    assert_eq!(engine.id_to_name("approved"), Some("approved"));
    assert_eq!(engine.name_to_id("missing"), None);
    assert_eq!(engine.id_to_name(99u32), None);
}

#[test]
fn test_is_accepts_sets_and_dispatches_on_range() {
    let engine = standard_engine(Memo::at(2).with_substage(102), "moder");
    assert!(engine.is("newOnModer"));
    assert!(engine.is("docsChecked"));
    assert!(engine.is(["denied", "docsChecked"]));
    assert!(engine.is(vec!["new".to_string(), "newOnModer".to_string()]));
    assert!(engine.is_not(["new", "docsRequested"]));
    assert!(!engine.is_not("newOnModer"));
}

#[test]
fn test_sides_and_edit_windows() {
    let engine = standard_engine(Memo::at(2), "moder");
    assert!(engine.on(None));
    assert!(engine.on(Some("moder")));
    assert!(!engine.on(Some("client")));
    assert!(engine.moder_can_edit());
    assert!(!engine.client_can_edit());

    let engine = standard_engine(Memo::at(1), "agent");
    assert!(engine.on(None));
    assert!(engine.client_can_edit());
}

#[test]
fn test_workflow_is_shared_across_threads() {
    let workflow = standard_workflow();
    std::thread::scope(|scope| {
        for stage in [1u32, 2, 6] {
            let workflow = workflow.clone();
            scope.spawn(move || {
                let engine = workflow.engine(Memo::at(stage), RoleContext::new("moder"));
                assert!(engine.current_stage().is_some());
            });
        }
    });
}
