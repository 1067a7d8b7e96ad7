use super::snapshot;
use crate::geom::{Point3, Polyline, Tolerance, Vertex};
use crate::topology::{CancelFlag, find_self_intersections, self_intersections};

#[test]
fn bow_tie_crosses_once_at_centre() {
    let bow_tie = Polyline::open([
        [0.0, 0.0],
        [10.0, 10.0],
        [10.0, 0.0],
        [0.0, 10.0],
        [0.0, 0.0],
    ]);
    let points = self_intersections(&bow_tie, Tolerance::DEFAULT);
    assert_eq!(points.len(), 1);
    assert!(points[0].distance_xy(Point3::xy(5.0, 5.0)) < 1e-9);
}

#[test]
fn closed_bow_tie_with_repeated_start_is_the_same() {
    let bow_tie = Polyline::closed([
        [0.0, 0.0],
        [10.0, 10.0],
        [10.0, 0.0],
        [0.0, 10.0],
        [0.0, 0.0],
    ]);
    let points = self_intersections(&bow_tie, Tolerance::DEFAULT);
    assert_eq!(points.len(), 1);
}

#[test]
fn simple_shapes_are_valid() {
    let tol = Tolerance::DEFAULT;
    let square = Polyline::closed([[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);
    let zigzag = Polyline::open([[0.0, 0.0], [1.0, 1.0], [2.0, 0.0], [3.0, 1.0]]);
    assert!(self_intersections(&square, tol).is_empty());
    assert!(self_intersections(&zigzag, tol).is_empty());
}

#[test]
fn fold_back_spike_is_reported() {
    let spike = Polyline::open([[0.0, 0.0], [4.0, 0.0], [2.0, 0.0]]);
    let points = self_intersections(&spike, Tolerance::DEFAULT);
    assert_eq!(points, vec![Point3::xy(2.0, 0.0)]);
}

#[test]
fn arc_crossing_its_own_chord() {
    // Straight run from (0,0) to (2,0), a clockwise semicircle arching over
    // (3,1), then a leg back under the start that cuts up through the run.
    let curve = Polyline::new(
        vec![
            Vertex::new(Point3::xy(0.0, 0.0)),
            Vertex::new(Point3::xy(2.0, 0.0)).with_bulge(-1.0),
            Vertex::new(Point3::xy(4.0, 0.0)),
            Vertex::new(Point3::xy(1.0, -1.0)),
            Vertex::new(Point3::xy(1.0, 1.0)),
        ],
        false,
    );
    let points = self_intersections(&curve, Tolerance::DEFAULT);
    assert_eq!(points.len(), 1);
    assert!(points[0].distance_xy(Point3::xy(1.0, 0.0)) < 1e-9);
}

#[test]
fn batch_reports_only_offending_curves() {
    let (curves, handles) = snapshot(vec![
        Polyline::closed([[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]),
        Polyline::open([[0.0, 0.0], [10.0, 10.0], [10.0, 0.0], [0.0, 10.0]]),
    ]);
    let (found, diagnostics) =
        find_self_intersections(&curves, &handles, Tolerance::DEFAULT, &CancelFlag::new())
            .expect("not cancelled");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0, handles[1]);
    assert!(diagnostics.is_clean());
}

#[test]
fn cancelled_batch_returns_error() {
    let (curves, handles) = snapshot(vec![Polyline::open([[0.0, 0.0], [1.0, 1.0]])]);
    let cancel = CancelFlag::new();
    cancel.cancel();
    assert!(find_self_intersections(&curves, &handles, Tolerance::DEFAULT, &cancel).is_err());
}
