use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::snapshot;
use crate::geom::{Point3, Polyline, Tolerance, Vertex};
use crate::store::CurveHandle;
use crate::topology::nodes::{is_pass_through, pair_junctions};
use crate::topology::{CancelFlag, CurvePair, NodeMode, ProximityIndex, diagnose_nodes, resolve_nodes};

fn all_pairs(handles: &[CurveHandle]) -> Vec<CurvePair> {
    let mut pairs = Vec::new();
    for (i, a) in handles.iter().enumerate() {
        for b in &handles[i + 1..] {
            pairs.extend(CurvePair::new(*a, *b));
        }
    }
    pairs
}

#[test]
fn crossing_lines_miss_a_vertex_each() {
    let tol = Tolerance::DEFAULT;
    let (curves, handles) = snapshot(vec![
        Polyline::open([[0.0, 0.0], [10.0, 0.0]]),
        Polyline::open([[5.0, -5.0], [5.0, 5.0]]),
    ]);
    let (resolution, diagnostics) =
        diagnose_nodes(&curves, &all_pairs(&handles), tol, &CancelFlag::new()).expect("run");

    assert!(diagnostics.is_clean());
    assert_eq!(resolution.nodes.len(), 1);
    assert!(resolution.nodes[0].distance_xy(Point3::xy(5.0, 0.0)) < 1e-9);
    assert_eq!(resolution.missing.len(), 2);
    assert_eq!(resolution.inserted, 0);

    let junctions = resolution.junctions(tol);
    assert_eq!(junctions.len(), 1);
    assert_eq!(junctions[0].1, handles);
}

#[test]
fn t_junction_misses_a_vertex_on_the_through_curve_only() {
    let (curves, handles) = snapshot(vec![
        Polyline::open([[0.0, 0.0], [10.0, 0.0]]),
        Polyline::open([[5.0, 0.0], [5.0, 5.0]]),
    ]);
    let (resolution, _) = diagnose_nodes(
        &curves,
        &all_pairs(&handles),
        Tolerance::DEFAULT,
        &CancelFlag::new(),
    )
    .expect("run");

    assert_eq!(resolution.missing.keys().copied().collect::<Vec<_>>(), vec![handles[0]]);
    assert_eq!(resolution.missing[&handles[0]], vec![Point3::xy(5.0, 0.0)]);
}

#[test]
fn chained_curves_share_their_vertex() {
    let (curves, handles) = snapshot(vec![
        Polyline::open([[0.0, 0.0], [5.0, 0.0]]),
        Polyline::open([[5.0, 0.0], [5.0, 5.0]]),
    ]);
    let (resolution, _) = diagnose_nodes(
        &curves,
        &all_pairs(&handles),
        Tolerance::DEFAULT,
        &CancelFlag::new(),
    )
    .expect("run");
    assert_eq!(resolution.nodes, vec![Point3::xy(5.0, 0.0)]);
    assert!(resolution.missing.is_empty());
}

#[test]
fn running_along_the_other_curve_is_pass_through() {
    let tol = Tolerance::DEFAULT;
    let inner = Polyline::open([[2.0, 0.0], [6.0, 0.0]]);
    let outer = Polyline::open([[0.0, 0.0], [10.0, 0.0]]);

    assert!(is_pass_through(&inner, &outer, Point3::xy(2.0, 0.0), tol));
    assert!(pair_junctions(&inner, &outer, tol).is_empty());

    // Seen from the outer curve, the inner one ends on it twice.
    let seen_from_outer = pair_junctions(&outer, &inner, tol);
    assert_eq!(seen_from_outer.len(), 2);
}

#[test]
fn three_curves_through_one_point_form_one_junction() {
    let tol = Tolerance::DEFAULT;
    let (curves, handles) = snapshot(vec![
        Polyline::open([[0.0, 0.0], [10.0, 0.0]]),
        Polyline::open([[5.0, -5.0], [5.0, 5.0]]),
        Polyline::open([[0.0, -5.0], [10.0, 5.0]]),
    ]);
    let (resolution, _) =
        diagnose_nodes(&curves, &all_pairs(&handles), tol, &CancelFlag::new()).expect("run");

    assert_eq!(resolution.nodes.len(), 1);
    let junctions = resolution.junctions(tol);
    assert_eq!(junctions.len(), 1);
    assert_eq!(junctions[0].1, handles);
}

#[test]
fn repair_inserts_vertices_in_order_and_is_idempotent() {
    let tol = Tolerance::DEFAULT;
    let (mut curves, handles) = snapshot(vec![
        Polyline::open([[0.0, 0.0], [4.0, 0.0], [10.0, 0.0]]),
        Polyline::open([[7.0, -1.0], [7.0, 1.0]]),
    ]);
    let pairs = all_pairs(&handles);

    let (first, diagnostics) =
        resolve_nodes(&mut curves, &pairs, tol, NodeMode::Repair, &CancelFlag::new())
            .expect("run");
    assert_eq!(first.inserted, 2);
    assert_eq!(diagnostics.inserted_vertex_count, 2);

    let a = curves[&handles[0]].points();
    assert_eq!(a.len(), 4);
    assert_eq!(a[0], Point3::xy(0.0, 0.0));
    assert_eq!(a[1], Point3::xy(4.0, 0.0));
    assert!(a[2].distance_xy(Point3::xy(7.0, 0.0)) < 1e-9);
    assert_eq!(a[3], Point3::xy(10.0, 0.0));

    let (second, _) =
        resolve_nodes(&mut curves, &pairs, tol, NodeMode::Diagnose, &CancelFlag::new())
            .expect("run");
    assert!(second.missing.is_empty());
    assert_eq!(second.nodes.len(), 1);
}

#[test]
fn repair_on_arc_keeps_the_junction_exact() {
    let tol = Tolerance::DEFAULT;
    let arc = Polyline::new(
        vec![
            Vertex::new(Point3::xy(0.0, 0.0)).with_bulge(1.0),
            Vertex::new(Point3::xy(2.0, 0.0)),
        ],
        false,
    );
    let (mut curves, handles) = snapshot(vec![arc, Polyline::open([[1.0, -3.0], [1.0, 3.0]])]);
    let pairs = all_pairs(&handles);

    let (first, _) =
        resolve_nodes(&mut curves, &pairs, tol, NodeMode::Repair, &CancelFlag::new())
            .expect("run");
    assert_eq!(first.inserted, 2);
    assert!((curves[&handles[0]].length() - std::f64::consts::PI).abs() < 1e-9);

    let (second, _) = diagnose_nodes(&curves, &pairs, tol, &CancelFlag::new()).expect("run");
    assert!(second.missing.is_empty());
}

#[test]
fn shrinking_the_buffer_never_adds_junctions() {
    let tol = Tolerance::DEFAULT;
    let mut rng = StdRng::seed_from_u64(1234);
    let lines: Vec<Polyline> = (0..40)
        .map(|_| {
            let x = rng.random_range(0.0..50.0);
            let y = rng.random_range(0.0..50.0);
            let dx = rng.random_range(-6.0..6.0);
            let dy = rng.random_range(-6.0..6.0);
            Polyline::open([[x, y], [x + dx, y + dy]])
        })
        .collect();
    let (curves, _) = snapshot(lines);
    let envelopes: Vec<_> = curves
        .iter()
        .filter_map(|(h, c)| c.bbox().map(|b| (*h, b)))
        .collect();

    let mut previous = usize::MAX;
    for buffer in [2.0, 0.5, 0.1, 0.0] {
        let pairs = ProximityIndex::build(&envelopes, buffer)
            .expect("valid buffer")
            .candidate_pairs();
        let (resolution, _) = diagnose_nodes(&curves, &pairs, tol, &CancelFlag::new()).expect("run");
        assert!(resolution.nodes.len() <= previous, "buffer {buffer}");
        previous = resolution.nodes.len();
    }
}

#[test]
fn cancelled_repair_stops() {
    let (mut curves, handles) = snapshot(vec![
        Polyline::open([[0.0, 0.0], [10.0, 0.0]]),
        Polyline::open([[5.0, -5.0], [5.0, 5.0]]),
    ]);
    let cancel = CancelFlag::new();
    cancel.cancel();
    let result = resolve_nodes(
        &mut curves,
        &all_pairs(&handles),
        Tolerance::DEFAULT,
        NodeMode::Repair,
        &cancel,
    );
    assert!(result.is_err());
    assert_eq!(curves[&handles[0]].vertex_count(), 2);
}

#[test]
fn collinear_overlap_keeps_only_the_end_that_leaves_the_first_curve() {
    let tol = Tolerance::DEFAULT;
    let a = Polyline::open([[0.0, 0.0], [10.0, 0.0]]);
    let b = Polyline::open([[5.0, 0.0], [20.0, 0.0]]);

    // Probes are taken on the first curve and clamp at its open end, so the
    // point where it stops inside the second one reads as a pass-through.
    assert!(!is_pass_through(&a, &b, Point3::xy(5.0, 0.0), tol));
    assert!(is_pass_through(&a, &b, Point3::xy(10.0, 0.0), tol));

    let junctions = pair_junctions(&a, &b, tol);
    assert_eq!(junctions.len(), 1);
    assert!(junctions[0].distance_xy(Point3::xy(5.0, 0.0)) < 1e-9);

    let (curves, handles) = snapshot(vec![a, b]);
    let (resolution, _) =
        diagnose_nodes(&curves, &all_pairs(&handles), tol, &CancelFlag::new()).expect("run");
    assert_eq!(resolution.missing.len(), 1);
    assert_eq!(resolution.missing[&handles[0]].len(), 1);
    assert!(!resolution.missing.contains_key(&handles[1]));
}
