//! Behavioural coverage for trimming change documents to a region.

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;

use osctrim_core::test_support::MemoryReferenceStore;
use osctrim_core::{
    Action, Boundary, ChangeDocument, Element, ElementKind, Node, Operation, PruneSummary,
    Relation, TrimError, Way, trim,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

/// Scenario state shared by every step.
#[derive(Debug, Default)]
struct TrimWorld {
    region: RefCell<Option<Boundary>>,
    document: RefCell<ChangeDocument>,
    original: RefCell<Option<ChangeDocument>>,
    store: RefCell<MemoryReferenceStore>,
    outcome: RefCell<Option<Result<PruneSummary, TrimError>>>,
}

impl TrimWorld {
    fn push(&self, action: Action, elements: Vec<Element>) {
        let mut operation = Operation::new(action);
        for element in elements {
            operation.push(element);
        }
        self.document.borrow_mut().push_operation(operation);
    }

    fn update_store(&self, update: impl FnOnce(MemoryReferenceStore) -> MemoryReferenceStore) {
        let store = self.store.take();
        *self.store.borrow_mut() = update(store);
    }

    fn contains(&self, kind: ElementKind, id: i64) -> bool {
        self.document
            .borrow()
            .elements()
            .any(|element| element.kind() == kind && element.id() == id)
    }

    fn expect_success(&self) {
        let outcome = self.outcome.borrow();
        match outcome.as_ref() {
            Some(Ok(_)) => {}
            Some(Err(err)) => panic!("trim should succeed, got {err}"),
            None => panic!("trim was not attempted"),
        }
    }
}

#[fixture]
fn world() -> TrimWorld {
    TrimWorld::default()
}

#[given("the region is the unit square")]
fn unit_square_region(#[from(world)] world: &TrimWorld) {
    let square = Boundary::from_bbox(0.0, 0.0, 1.0, 1.0)
        .unwrap_or_else(|err| panic!("unit square should be valid: {err}"));
    *world.region.borrow_mut() = Some(square);
}

#[given("a created node 1 at 2,2")]
fn created_node_outside(#[from(world)] world: &TrimWorld) {
    world.push(
        Action::Create,
        vec![Node::new(1).with_location(2.0, 2.0).into()],
    );
}

#[given("a created way 10 over node 1 at 0.5,0.5 and node 2 at 5,5")]
fn created_way_crossing_boundary(#[from(world)] world: &TrimWorld) {
    world.push(
        Action::Create,
        vec![
            Node::new(1).with_location(0.5, 0.5).into(),
            Node::new(2).with_location(5.0, 5.0).into(),
            Way::new(10, [1, 2]).into(),
        ],
    );
}

#[given("a created way 11 over node 2 and node 3 at 6,6")]
fn created_way_chained(#[from(world)] world: &TrimWorld) {
    world.push(
        Action::Create,
        vec![
            Node::new(3).with_location(6.0, 6.0).into(),
            Way::new(11, [2, 3]).into(),
        ],
    );
}

#[given("a modified node 5 at 5,5")]
fn modified_node_outside(#[from(world)] world: &TrimWorld) {
    world.push(
        Action::Modify,
        vec![Node::new(5).with_location(5.0, 5.0).into()],
    );
}

#[given("the reference store knows node 5")]
fn store_knows_node(#[from(world)] world: &TrimWorld) {
    world.update_store(|store| store.with_nodes([5]));
}

#[given("the reference store is unreachable")]
fn store_unreachable(#[from(world)] world: &TrimWorld) {
    world.update_store(|store| store.failing_on(ElementKind::Node));
}

#[given("a modified way 20 over untouched nodes 100 and 101")]
fn modified_untouched_way(#[from(world)] world: &TrimWorld) {
    world.push(Action::Modify, vec![Way::new(20, [100, 101]).into()]);
}

#[given("a modified relation 42")]
fn modified_relation(#[from(world)] world: &TrimWorld) {
    world.push(Action::Modify, vec![Relation::new(42).into()]);
}

#[given("a created relation 43")]
fn created_relation(#[from(world)] world: &TrimWorld) {
    world.push(Action::Create, vec![Relation::new(43).into()]);
}

#[when("the change document is trimmed")]
fn trim_document(#[from(world)] world: &TrimWorld) {
    let region = world
        .region
        .borrow()
        .clone()
        .unwrap_or_else(|| panic!("region must be configured"));
    *world.original.borrow_mut() = Some(world.document.borrow().clone());
    let store = world.store.borrow();
    let outcome = trim(&mut world.document.borrow_mut(), &region, &*store);
    *world.outcome.borrow_mut() = Some(outcome);
}

#[then("node 1 is removed")]
fn node_one_removed(#[from(world)] world: &TrimWorld) {
    world.expect_success();
    assert!(!world.contains(ElementKind::Node, 1));
}

#[then("no operation groups remain")]
fn no_groups_remain(#[from(world)] world: &TrimWorld) {
    assert!(world.document.borrow().operations().is_empty());
}

#[then("way 10 and nodes 1 and 2 are kept")]
fn closure_kept(#[from(world)] world: &TrimWorld) {
    world.expect_success();
    assert!(world.contains(ElementKind::Way, 10));
    assert!(world.contains(ElementKind::Node, 1));
    assert!(
        world.contains(ElementKind::Node, 2),
        "the outside node is dragged in by the way"
    );
}

#[then("ways 10 and 11 and nodes 1, 2 and 3 are kept")]
fn chain_kept(#[from(world)] world: &TrimWorld) {
    world.expect_success();
    for way in [10, 11] {
        assert!(world.contains(ElementKind::Way, way), "way {way} dropped");
    }
    for node in [1, 2, 3] {
        assert!(world.contains(ElementKind::Node, node), "node {node} dropped");
    }
}

#[then("the summary keeps 3 nodes and 2 ways")]
fn chain_summary(#[from(world)] world: &TrimWorld) {
    let outcome = world.outcome.borrow();
    match outcome.as_ref() {
        Some(Ok(summary)) => assert_eq!(summary.to_string(), "3+2+0 -> 3+2+0"),
        other => panic!("expected a successful trim, found {other:?}"),
    }
}

#[then("node 5 is kept")]
fn node_five_kept(#[from(world)] world: &TrimWorld) {
    world.expect_success();
    assert!(world.contains(ElementKind::Node, 5));
}

#[then("way 20 is kept")]
fn way_twenty_kept(#[from(world)] world: &TrimWorld) {
    world.expect_success();
    assert!(world.contains(ElementKind::Way, 20));
}

#[then("the reference store was not asked about ways")]
fn no_way_lookup(#[from(world)] world: &TrimWorld) {
    assert_eq!(world.store.borrow().query_count(ElementKind::Way), 0);
}

#[then("relation 42 is removed")]
fn relation_removed(#[from(world)] world: &TrimWorld) {
    world.expect_success();
    assert!(!world.contains(ElementKind::Relation, 42));
}

#[then("relation 43 is kept")]
fn relation_kept(#[from(world)] world: &TrimWorld) {
    world.expect_success();
    assert!(world.contains(ElementKind::Relation, 43));
}

#[then("the reference store was not asked about relations")]
fn no_relation_lookup(#[from(world)] world: &TrimWorld) {
    assert_eq!(world.store.borrow().query_count(ElementKind::Relation), 0);
}

#[then("the trim fails with a store error")]
fn trim_fails(#[from(world)] world: &TrimWorld) {
    let outcome = world.outcome.borrow();
    match outcome.as_ref() {
        Some(Err(TrimError::Store { kind, .. })) => assert_eq!(*kind, ElementKind::Node),
        Some(Ok(summary)) => panic!("expected a store failure, trimmed to {summary}"),
        None => panic!("trim was not attempted"),
    }
}

#[then("the document is unchanged")]
fn document_unchanged(#[from(world)] world: &TrimWorld) {
    let original = world.original.borrow();
    assert_eq!(Some(&*world.document.borrow()), original.as_ref());
}

#[test]
fn scenario_indices_follow_feature_order() {
    let feature =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/features/trim_changeset.feature");
    let contents = fs::read_to_string(&feature).unwrap_or_else(|err| {
        panic!("failed to read feature file {feature:?}: {err}");
    });
    let titles: Vec<&str> = contents
        .lines()
        .filter_map(|line| line.trim().strip_prefix("Scenario: "))
        .collect();
    assert_eq!(
        titles,
        [
            "dropping a created node outside the region",
            "keeping the outside node of a created way that enters the region",
            "rescuing a modified node the reference store knows",
            "keeping a modified way over untouched nodes",
            "dropping a modified relation unknown to the reference store",
            "keeping a created relation without consulting the reference store",
            "aborting when the reference store is unreachable",
            "keeping a created way chained through a dragged in node",
        ]
    );
}

#[scenario(path = "tests/features/trim_changeset.feature", index = 0)]
fn dropping_created_outside_node(world: TrimWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/trim_changeset.feature", index = 1)]
fn closure_over_created_way(world: TrimWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/trim_changeset.feature", index = 2)]
fn rescuing_known_modified_node(world: TrimWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/trim_changeset.feature", index = 3)]
fn keeping_untouched_modified_way(world: TrimWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/trim_changeset.feature", index = 4)]
fn dropping_unknown_modified_relation(world: TrimWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/trim_changeset.feature", index = 5)]
fn keeping_created_relation(world: TrimWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/trim_changeset.feature", index = 6)]
fn aborting_on_store_failure(world: TrimWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/trim_changeset.feature", index = 7)]
fn closure_through_chained_ways(world: TrimWorld) {
    let _ = world;
}
