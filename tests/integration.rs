use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use topo_engine::{
    Action, ActionError, ActionState, ActionType, CancelFlag, CurveHandle, MemoryStore, Point3,
    Polyline, Status, TopologyChecker, TopologyConfig, TopologyIssue, ValidationError, Vertex,
};

fn unit_square(x: f64, y: f64) -> Polyline {
    Polyline::closed([[x, y], [x + 1.0, y], [x + 1.0, y + 1.0], [x, y + 1.0]])
}

fn crossing_pair(store: &mut MemoryStore) -> (CurveHandle, CurveHandle) {
    let a = store.insert(Polyline::open([[0.0, 0.0], [10.0, 0.0]]));
    let b = store.insert(Polyline::open([[5.0, -5.0], [5.0, 5.0]]));
    (a, b)
}

fn close(p: Point3, x: f64, y: f64) -> bool {
    p.distance_xy(Point3::xy(x, y)) < 1e-9
}

#[test]
fn bow_tie_reports_one_self_intersection() {
    let mut store = MemoryStore::new();
    let h = store.insert(Polyline::open([
        [0.0, 0.0],
        [10.0, 10.0],
        [10.0, 0.0],
        [0.0, 10.0],
        [0.0, 0.0],
    ]));

    let mut action = Action::new(ActionType::SelfIntersection);
    let results = action
        .check(&store, &[h], &TopologyConfig::default())
        .expect("check")
        .to_vec();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].source_curves, vec![h]);
    assert!(!results[0].fixable);
    assert_eq!(results[0].mark_points.len(), 1);
    assert!(close(results[0].mark_points[0], 5.0, 5.0));
}

#[test]
fn unsupported_fix_returns_no_fix_method() {
    let mut store = MemoryStore::new();
    let h = store.insert(Polyline::open([
        [0.0, 0.0],
        [10.0, 10.0],
        [10.0, 0.0],
        [0.0, 10.0],
    ]));
    let before = store.get(h).cloned();

    let mut action = Action::new(ActionType::SelfIntersection);
    action
        .check(&store, &[h], &TopologyConfig::default())
        .expect("check");
    let outcome = action.fix(&mut store, 0).expect("fix");

    assert_eq!(outcome.status, Status::NoFixMethod);
    assert!(outcome.modified.is_empty());
    assert_eq!(store.get(h).cloned(), before);
    assert_eq!(action.results().len(), 1);
}

#[test]
fn protrusion_dangles_only_at_its_far_end() {
    let mut store = MemoryStore::new();
    let square = store.insert(unit_square(0.0, 0.0));
    let spur = store.insert(Polyline::open([[1.0, 0.5], [2.0, 0.5]]));

    let mut action = Action::new(ActionType::Dangling);
    let results = action
        .check(&store, &[square, spur], &TopologyConfig::default())
        .expect("check")
        .to_vec();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].source_curves, vec![spur]);
    assert_eq!(results[0].mark_points.len(), 1);
    assert!(close(results[0].mark_points[0], 2.0, 0.5));
    let preview = results[0].preview.as_ref().expect("dangling chain preview");
    assert_eq!(preview.len(), 1);
    assert!(close(preview[0][0], 2.0, 0.5));
    assert!(close(preview[0][1], 1.0, 0.5));
}

#[test]
fn closed_network_has_no_dangles() {
    let mut store = MemoryStore::new();
    let square = store.insert(unit_square(0.0, 0.0));
    let divider = store.insert(Polyline::open([[0.5, 0.0], [0.5, 1.0]]));

    let mut action = Action::new(ActionType::Dangling);
    let results = action
        .check(&store, &[square, divider], &TopologyConfig::default())
        .expect("check");
    assert!(results.is_empty());
}

#[test]
fn offset_squares_overlap_by_half() {
    let mut store = MemoryStore::new();
    let a = store.insert(unit_square(0.0, 0.0));
    let b = store.insert(unit_square(0.5, 0.0));

    let mut action = Action::new(ActionType::Overlap);
    let results = action
        .check(&store, &[b, a], &TopologyConfig::default())
        .expect("check")
        .to_vec();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].source_curves, vec![a, b]);
    let TopologyIssue::Overlap {
        curve_a,
        curve_b,
        region,
    } = &results[0].issue
    else {
        panic!("expected an overlap issue");
    };
    assert_eq!((*curve_a, *curve_b), (a, b));
    assert!((region.area - 0.5).abs() < 1e-9);
    assert!(results[0].preview.is_some());
}

#[test]
fn missing_vertex_fix_is_idempotent() {
    let mut store = MemoryStore::new();
    let (a, b) = crossing_pair(&mut store);
    let config = TopologyConfig::default();

    let mut action = Action::new(ActionType::MissingVertex);
    let results = action.check(&store, &[a, b], &config).expect("check").to_vec();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].source_curves, vec![a, b]);
    assert!(results[0].fixable);

    let outcome = action.fix(&mut store, 0).expect("fix");
    assert_eq!(outcome.status, Status::Fixed);
    assert_eq!(outcome.modified, vec![a, b]);
    assert!(action.results().is_empty());

    let fixed_a = store.get(a).expect("curve a").points();
    assert_eq!(fixed_a.len(), 3);
    assert!(close(fixed_a[0], 0.0, 0.0));
    assert!(close(fixed_a[1], 5.0, 0.0));
    assert!(close(fixed_a[2], 10.0, 0.0));
    let fixed_b = store.get(b).expect("curve b").points();
    assert_eq!(fixed_b.len(), 3);
    assert!(close(fixed_b[1], 5.0, 0.0));

    action.reset();
    assert_eq!(action.state(), &ActionState::Idle);
    let again = action.check(&store, &[a, b], &config).expect("recheck");
    assert!(again.is_empty());
}

#[test]
fn arc_repair_splits_the_bulge() {
    let mut store = MemoryStore::new();
    let arc = store.insert(Polyline::new(
        vec![
            Vertex::new(Point3::xy(0.0, 0.0)).with_bulge(1.0),
            Vertex::new(Point3::xy(2.0, 0.0)),
        ],
        false,
    ));
    let line = store.insert(Polyline::open([[1.0, -3.0], [1.0, 3.0]]));
    let config = TopologyConfig::default();

    let mut action = Action::new(ActionType::MissingVertex);
    action.check(&store, &[arc, line], &config).expect("check");
    let outcomes = action.fix_all(&mut store).expect("fix all");
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, Status::Fixed);

    let vertices = store.get(arc).expect("arc").vertices().to_vec();
    assert_eq!(vertices.len(), 3);
    assert!(close(vertices[1].point, 1.0, -1.0));
    let half = (std::f64::consts::PI / 8.0).tan();
    assert!((vertices[0].bulge - half).abs() < 1e-9);
    assert!((vertices[1].bulge - half).abs() < 1e-9);

    assert!(action.check(&store, &[arc, line], &config).expect("recheck").is_empty());
}

#[test]
fn fix_all_resolves_every_junction() {
    let mut store = MemoryStore::new();
    let (a, b) = crossing_pair(&mut store);
    let c = store.insert(Polyline::open([[0.0, -2.0], [10.0, 8.0]]));
    let selection = [a, b, c];
    let config = TopologyConfig::default();

    let mut action = Action::new(ActionType::MissingVertex);
    assert_eq!(action.check(&store, &selection, &config).expect("check").len(), 3);

    let outcomes = action.fix_all(&mut store).expect("fix all");
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| o.status == Status::Fixed));
    assert!(action.results().is_empty());
    assert_eq!(store.get(a).expect("a").vertex_count(), 4);

    assert!(action.check(&store, &selection, &config).expect("recheck").is_empty());
}

#[test]
fn selection_order_does_not_change_results() {
    let mut store = MemoryStore::new();
    let (a, b) = crossing_pair(&mut store);
    let c = store.insert(unit_square(4.0, -1.0));
    let config = TopologyConfig::default();
    let checker = TopologyChecker::new(config);

    let forward = checker.check(&store, &[a, b, c]).expect("forward");
    let backward = checker.check(&store, &[c, b, a]).expect("backward");
    assert_eq!(forward.results, backward.results);
}

#[test]
fn shrinking_the_buffer_never_adds_junctions() {
    let mut rng = StdRng::seed_from_u64(0x70_70);
    let mut store = MemoryStore::new();
    let mut selection = Vec::new();
    for _ in 0..24 {
        let x0 = rng.random_range(0.0..20.0);
        let y0 = rng.random_range(0.0..20.0);
        let x1 = x0 + rng.random_range(-4.0..4.0);
        let y1 = y0 + rng.random_range(-4.0..4.0);
        selection.push(store.insert(Polyline::open([[x0, y0], [x1, y1]])));
    }

    let mut previous = usize::MAX;
    for buffer in [1.0, 1e-1, 1e-3, 1e-6] {
        let config = TopologyConfig::new().with_buffer_distance(buffer);
        let mut action = Action::new(ActionType::MissingVertex);
        let count = action.check(&store, &selection, &config).expect("check").len();
        assert!(count <= previous, "buffer {buffer}: {count} > {previous}");
        previous = count;
    }
}

#[test]
fn store_failure_rolls_back_every_write() {
    let mut store = MemoryStore::new();
    let (a, b) = crossing_pair(&mut store);
    let before_a = store.get(a).cloned();
    let before_b = store.get(b).cloned();

    let mut action = Action::new(ActionType::MissingVertex);
    action
        .check(&store, &[a, b], &TopologyConfig::default())
        .expect("check");
    store.lock(b);

    let outcome = action.fix(&mut store, 0).expect("fix");
    assert_eq!(outcome.status, Status::Rejected);
    assert!(outcome.modified.is_empty());
    assert_eq!(store.get(a).cloned(), before_a);
    assert_eq!(store.get(b).cloned(), before_b);
    assert_eq!(action.results().len(), 1);
    assert!(matches!(
        action.state(),
        ActionState::Finished {
            status: Status::Rejected,
            ..
        }
    ));
}

#[test]
fn stale_results_are_rejected() {
    let mut store = MemoryStore::new();
    let (a, b) = crossing_pair(&mut store);
    let mut action = Action::new(ActionType::MissingVertex);
    action
        .check(&store, &[a, b], &TopologyConfig::default())
        .expect("check");

    store.insert_with_handle(b, Polyline::open([[7.0, -5.0], [7.0, 5.0]]));
    let outcome = action.fix(&mut store, 0).expect("moved curve");
    assert_eq!(outcome.status, Status::Rejected);
    assert_eq!(store.get(a).expect("a").vertex_count(), 2);

    store.remove(b);
    let outcome = action.fix(&mut store, 0).expect("deleted curve");
    assert_eq!(outcome.status, Status::Rejected);
    assert_eq!(store.get(a).expect("a").vertex_count(), 2);
}

#[test]
fn invalid_requests_fail_before_any_work() {
    let mut store = MemoryStore::new();
    let (a, _) = crossing_pair(&mut store);
    let mut action = Action::new(ActionType::MissingVertex);
    let config = TopologyConfig::default();

    assert!(matches!(
        action.check(&store, &[], &config),
        Err(ActionError::Validation(ValidationError::EmptySelection))
    ));
    assert!(matches!(
        action.check(&store, &[a, a], &config),
        Err(ActionError::Validation(ValidationError::DuplicateHandle(h))) if h == a
    ));
    assert!(matches!(
        action.check(&store, &[a], &config.clone().with_buffer_distance(0.0)),
        Err(ActionError::Validation(ValidationError::Config(_)))
    ));
    assert_eq!(action.state(), &ActionState::Idle);
}

#[test]
fn fix_requires_a_pending_result() {
    let mut store = MemoryStore::new();
    let (a, b) = crossing_pair(&mut store);
    let mut action = Action::new(ActionType::MissingVertex);

    assert!(matches!(
        action.fix(&mut store, 0),
        Err(ActionError::InvalidState { operation: "fix", .. })
    ));

    action
        .check(&store, &[a, b], &TopologyConfig::default())
        .expect("check");
    assert!(matches!(
        action.fix(&mut store, 5),
        Err(ActionError::UnknownResult(5))
    ));
}

#[test]
fn check_after_fix_starts_a_new_cycle() {
    let mut store = MemoryStore::new();
    let (a, b) = crossing_pair(&mut store);
    let config = TopologyConfig::default();

    let mut action = Action::new(ActionType::MissingVertex);
    assert_eq!(action.check(&store, &[a, b], &config).expect("check").len(), 1);
    assert_eq!(action.fix(&mut store, 0).expect("fix").status, Status::Fixed);
    assert!(matches!(action.state(), ActionState::Finished { .. }));

    assert!(action.check(&store, &[a, b], &config).expect("recheck").is_empty());
    assert!(matches!(action.state(), ActionState::Checked { results } if results.is_empty()));
}

#[test]
fn check_while_checked_replaces_pending_results() {
    let mut store = MemoryStore::new();
    let (a, b) = crossing_pair(&mut store);
    let c = store.insert(Polyline::open([[0.0, -2.0], [10.0, 8.0]]));
    let config = TopologyConfig::default();

    let mut action = Action::new(ActionType::MissingVertex);
    assert_eq!(action.check(&store, &[a, b, c], &config).expect("first").len(), 3);
    assert_eq!(action.check(&store, &[a, b], &config).expect("second").len(), 1);
    assert_eq!(action.results().len(), 1);
}

#[test]
fn cancelled_checker_discards_results() {
    let mut store = MemoryStore::new();
    let (a, b) = crossing_pair(&mut store);
    let cancel = CancelFlag::new();
    let checker = TopologyChecker::new(TopologyConfig::default()).with_cancel_flag(cancel.clone());

    cancel.cancel();
    assert!(matches!(
        checker.check(&store, &[a, b]),
        Err(ActionError::Cancelled)
    ));
}

#[test]
fn checker_groups_results_by_action() {
    let mut store = MemoryStore::new();
    let (a, b) = crossing_pair(&mut store);
    let bow = store.insert(Polyline::open([
        [20.0, 0.0],
        [30.0, 10.0],
        [30.0, 0.0],
        [20.0, 10.0],
    ]));
    let s1 = store.insert(unit_square(40.0, 0.0));
    let s2 = store.insert(unit_square(40.5, 0.0));

    let report = TopologyChecker::new(TopologyConfig::default())
        .check(&store, &[a, b, bow, s1, s2])
        .expect("check");

    assert!(!report.is_clean());
    assert!(
        report
            .results
            .windows(2)
            .all(|pair| pair[0].action <= pair[1].action)
    );
    assert_eq!(report.by_action(ActionType::SelfIntersection).count(), 1);
    assert_eq!(report.by_action(ActionType::Overlap).count(), 1);
    assert!(
        report
            .by_action(ActionType::MissingVertex)
            .any(|r| r.source_curves == vec![a, b])
    );
    assert!(report.diagnostics.is_clean());

    let json = serde_json::to_value(&report).expect("serialize");
    assert_eq!(json["results"][0]["action"], "self_intersection");
}

#[test]
fn checker_runs_only_requested_actions() {
    let mut store = MemoryStore::new();
    let (a, b) = crossing_pair(&mut store);
    let checker = TopologyChecker::new(TopologyConfig::default())
        .with_actions(&[ActionType::Overlap, ActionType::SelfIntersection]);

    assert_eq!(
        checker.actions(),
        &[ActionType::SelfIntersection, ActionType::Overlap]
    );
    assert!(checker.check(&store, &[a, b]).expect("check").is_clean());
}
