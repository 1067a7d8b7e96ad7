use std::collections::BTreeMap;

use crate::geom::{Bvh, Point3, Polyline, Segment, Tolerance, intersect_segments, push_unique_point, sort_points_xy};
use crate::store::CurveHandle;

use super::{CancelFlag, Cancelled, GeometryError, TopologyDiagnostics};

/// Points where a curve crosses or touches itself, sorted by `x` then `y`.
///
/// Segments shorter than the tolerance are skipped. Consecutive segments
/// (and the closing pair of a closed or end-to-end touching curve) share a
/// vertex; contacts at that vertex are ignored, any other contact between
/// them (a fold-back) counts.
#[must_use]
pub fn self_intersections(curve: &Polyline, tol: Tolerance) -> Vec<Point3> {
    let segments: Vec<Segment> = curve
        .segments()
        .filter(|s| s.chord_length() > tol.eps)
        .collect();
    let count = segments.len();
    if count < 2 {
        return Vec::new();
    }
    let loops = curve.is_geometrically_closed(tol);

    let boxes: Vec<_> = segments
        .iter()
        .map(|s| s.bbox().expand_xy(tol.eps))
        .collect();
    let Some(bvh) = Bvh::build(&boxes) else {
        return Vec::new();
    };

    let mut points = Vec::new();
    for (i, j) in bvh.overlapping_pairs() {
        let mut shared = Vec::with_capacity(2);
        if j == i + 1 {
            shared.push(segments[i].end);
            shared.push(segments[j].start);
        }
        if loops && i == 0 && j == count - 1 {
            shared.push(segments[i].start);
            shared.push(segments[j].end);
        }

        for contact in intersect_segments(&segments[i], &segments[j], tol) {
            for p in contact.points() {
                if shared.iter().any(|s| tol.approx_eq_point3(*s, p)) {
                    continue;
                }
                push_unique_point(&mut points, p, tol);
            }
        }
    }

    sort_points_xy(&mut points);
    points
}

cfg_if::cfg_if! {
    if #[cfg(feature = "parallel")] {
        fn collect_self_intersections(
            curves: &[(CurveHandle, &Polyline)],
            tol: Tolerance,
            cancel: &CancelFlag,
        ) -> Vec<Option<Vec<Point3>>> {
            use rayon::prelude::*;

            curves
                .par_iter()
                .map(|(_, curve)| (!cancel.is_cancelled()).then(|| self_intersections(curve, tol)))
                .collect()
        }
    } else {
        fn collect_self_intersections(
            curves: &[(CurveHandle, &Polyline)],
            tol: Tolerance,
            cancel: &CancelFlag,
        ) -> Vec<Option<Vec<Point3>>> {
            curves
                .iter()
                .map(|(_, curve)| (!cancel.is_cancelled()).then(|| self_intersections(curve, tol)))
                .collect()
        }
    }
}

/// Self-intersection points of every listed curve that has any, in handle
/// order.
pub fn find_self_intersections(
    curves: &BTreeMap<CurveHandle, Polyline>,
    handles: &[CurveHandle],
    tol: Tolerance,
    cancel: &CancelFlag,
) -> Result<(Vec<(CurveHandle, Vec<Point3>)>, TopologyDiagnostics), Cancelled> {
    let mut diagnostics = TopologyDiagnostics {
        curve_count: handles.len(),
        ..Default::default()
    };

    let mut present = Vec::with_capacity(handles.len());
    for &handle in handles {
        match curves.get(&handle) {
            Some(curve) => present.push((handle, curve)),
            None => diagnostics.add_curve(handle, GeometryError::MissingCurve(handle).to_string()),
        }
    }

    let per_curve = collect_self_intersections(&present, tol, cancel);
    cancel.check()?;

    let found: Vec<(CurveHandle, Vec<Point3>)> = present
        .iter()
        .zip(per_curve)
        .filter_map(|((handle, _), points)| {
            points
                .filter(|p| !p.is_empty())
                .map(|points| (*handle, points))
        })
        .collect();

    log::debug!(
        "self-intersection: {} curves checked, {} self-intersecting",
        present.len(),
        found.len()
    );
    Ok((found, diagnostics))
}
