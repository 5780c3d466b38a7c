use super::*;

#[test]
fn reconcile_unseen_name_creates() {
    let def = AgentDef::with_computed_id("builder", "def-text");
    let (obj, outcome) = reconcile(None, &def, 1000);
    assert_eq!(outcome, ReconcileOutcome::Created);
    assert_eq!(obj.revisions.len(), 1);
    assert_eq!(obj.current_id, obj.revisions.last().unwrap().id);
    assert_eq!(obj.state, RunState::Pending);
}

#[test]
fn reconcile_same_hash_is_unchanged() {
    let def = AgentDef::with_computed_id("builder", "def-text");
    let (obj, _) = reconcile(None, &def, 1000);
    let (obj2, outcome) = reconcile(Some(&obj), &def, 2000);
    assert_eq!(outcome, ReconcileOutcome::Unchanged);
    assert_eq!(obj2.revisions.len(), 1);
    assert_eq!(obj2, obj);
}

#[test]
fn reconcile_different_hash_appends_revision() {
    let def1 = AgentDef::with_computed_id("builder", "def-text");
    let (obj, _) = reconcile(None, &def1, 1000);
    let def2 = AgentDef::with_computed_id("builder", "def-text-v2");
    let (obj2, outcome) = reconcile(Some(&obj), &def2, 2000);
    assert_eq!(outcome, ReconcileOutcome::Updated);
    assert_eq!(obj2.revisions.len(), 2);
    assert_eq!(obj2.current_id, def2.id);
    assert_eq!(obj2.current_revision().unwrap().id, def2.id);
}

#[test]
fn revision_created_at_reflects_the_clock_reading() {
    let def = AgentDef::with_computed_id("builder", "def-text");
    let (obj, _) = reconcile(None, &def, 1_700_000_000_000);
    assert_eq!(obj.revisions[0].created_at.timestamp_millis(), 1_700_000_000_000);
}

#[test]
fn current_revision_matches_invariant() {
    let def = AgentDef::with_computed_id("builder", "def-text");
    let (obj, _) = reconcile(None, &def, 1000);
    let rev = obj.current_revision().expect("current revision must exist");
    assert_eq!(rev.id, obj.current_id);
    assert_eq!(rev.definition, obj.definition);
}

#[test]
fn step_method_normalizes_by_kind() {
    let s = Step::simple("spec", "work");
    assert_eq!(s.method(), "work");
    let s = Step::r#loop("build", "loopwork");
    assert_eq!(s.method(), "loopwork");
    let s = Step::map("split", "mapwork");
    assert_eq!(s.method(), "mapwork");
}

#[test]
fn pipeline_has_loop_only_when_last_step_is_loop() {
    let pipeline = PipelineDef {
        initial_input: None,
        steps: vec![Step::simple("spec", "a"), Step::r#loop("build", "b")],
    };
    assert!(pipeline.has_loop());

    let pipeline = PipelineDef { initial_input: None, steps: vec![Step::simple("spec", "a")] };
    assert!(!pipeline.has_loop());
}
