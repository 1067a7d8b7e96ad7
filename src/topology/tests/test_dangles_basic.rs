use super::snapshot;
use crate::geom::{Point3, Polyline, Tolerance};
use crate::topology::{CancelFlag, DanglingOptions, find_dangles};

fn unit_square() -> Polyline {
    Polyline::closed([[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]])
}

#[test]
fn protrusion_from_square_dangles_at_its_far_end_only() {
    let (curves, handles) = snapshot(vec![
        unit_square(),
        Polyline::open([[1.0, 0.5], [2.0, 0.5]]),
    ]);
    let (report, diagnostics) =
        find_dangles(&curves, &handles, &DanglingOptions::default(), &CancelFlag::new())
            .expect("run");

    assert!(diagnostics.is_clean());
    assert_eq!(report.rings.len(), 1);
    assert_eq!(report.dangling.len(), 1);
    assert_eq!(report.dangling[&handles[1]], vec![Point3::xy(2.0, 0.5)]);
    assert_eq!(
        report.dangling_edges[&handles[1]],
        vec![[Point3::xy(2.0, 0.5), Point3::xy(1.0, 0.5)]]
    );
}

#[test]
fn closed_network_has_no_dangles() {
    // Square split in two by a middle line, drawn as separate curves.
    let (curves, handles) = snapshot(vec![
        unit_square(),
        Polyline::open([[0.5, 0.0], [0.5, 1.0]]),
    ]);
    let (report, _) =
        find_dangles(&curves, &handles, &DanglingOptions::default(), &CancelFlag::new())
            .expect("run");
    assert!(report.is_empty());
    assert_eq!(report.rings.len(), 2);
}

#[test]
fn ring_made_of_open_curves_has_no_dangles() {
    let (curves, handles) = snapshot(vec![
        Polyline::open([[0.0, 0.0], [2.0, 0.0], [2.0, 2.0]]),
        Polyline::open([[2.0, 2.0], [0.0, 2.0], [0.0, 0.0]]),
    ]);
    let (report, _) =
        find_dangles(&curves, &handles, &DanglingOptions::default(), &CancelFlag::new())
            .expect("run");
    assert!(report.is_empty());
    assert_eq!(report.rings.len(), 1);
}

#[test]
fn isolated_open_curve_dangles_at_both_ends() {
    let (curves, handles) = snapshot(vec![Polyline::open([[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]])]);
    let (report, _) =
        find_dangles(&curves, &handles, &DanglingOptions::default(), &CancelFlag::new())
            .expect("run");
    assert!(report.rings.is_empty());
    assert_eq!(
        report.dangling[&handles[0]],
        vec![Point3::xy(0.0, 0.0), Point3::xy(1.0, 1.0)]
    );
    assert_eq!(report.dangling_edges[&handles[0]].len(), 2);
}

#[test]
fn bridge_between_rings_does_not_dangle() {
    let right = Polyline::closed([[3.0, 0.0], [4.0, 0.0], [4.0, 1.0], [3.0, 1.0]]);
    let (curves, handles) = snapshot(vec![
        unit_square(),
        right,
        Polyline::open([[1.0, 0.5], [3.0, 0.5]]),
    ]);
    let (report, _) =
        find_dangles(&curves, &handles, &DanglingOptions::default(), &CancelFlag::new())
            .expect("run");
    assert!(report.is_empty());
    assert_eq!(report.rings.len(), 2);
}

#[test]
fn crossing_curves_dangle_at_all_four_ends() {
    let (curves, handles) = snapshot(vec![
        Polyline::open([[0.0, 0.0], [2.0, 0.0]]),
        Polyline::open([[1.0, -1.0], [1.0, 1.0]]),
    ]);
    let (report, _) =
        find_dangles(&curves, &handles, &DanglingOptions::default(), &CancelFlag::new())
            .expect("run");
    assert_eq!(report.dangling_points(Tolerance::DEFAULT).len(), 4);
    assert_eq!(report.dangling[&handles[0]].len(), 2);
    assert_eq!(report.dangling[&handles[1]].len(), 2);
}

#[test]
fn snap_distance_closes_small_gaps() {
    let gap = 1e-4;
    let (curves, handles) = snapshot(vec![
        unit_square(),
        Polyline::open([[1.0 + gap, 0.5], [2.0, 0.5]]),
    ]);

    let strict = DanglingOptions::default();
    let (report, _) = find_dangles(&curves, &handles, &strict, &CancelFlag::new()).expect("run");
    assert_eq!(report.dangling[&handles[1]].len(), 2);

    let lenient = strict.with_snap_distance(1e-3);
    let (report, _) = find_dangles(&curves, &handles, &lenient, &CancelFlag::new()).expect("run");
    assert_eq!(report.dangling[&handles[1]], vec![Point3::xy(2.0, 0.5)]);
}

#[test]
fn missing_curve_is_a_diagnostic() {
    let (curves, mut handles) = snapshot(vec![unit_square()]);
    let ghost = crate::store::CurveHandle::new(77);
    handles.push(ghost);
    let (report, diagnostics) =
        find_dangles(&curves, &handles, &DanglingOptions::default(), &CancelFlag::new())
            .expect("run");
    assert!(report.is_empty());
    assert_eq!(diagnostics.entries.len(), 1);
    assert_eq!(
        diagnostics.entries[0].message,
        crate::topology::GeometryError::MissingCurve(ghost).to_string()
    );
}

#[test]
fn far_off_coordinates_beyond_the_snap_grid() {
    let (curves, handles) = snapshot(vec![Polyline::open([[1e17, 0.0], [1e17 + 1e3, 0.0]])]);
    let options = DanglingOptions::default().with_snap_distance(1e-3);
    let (report, diagnostics) =
        find_dangles(&curves, &handles, &options, &CancelFlag::new()).expect("run");
    assert!(diagnostics.is_clean());
    assert!(report.rings.is_empty());
    assert_eq!(report.dangling[&handles[0]].len(), 2);
}
