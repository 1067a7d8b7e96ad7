//! Junction detection between near curve pairs.
//!
//! For a pair `(A, B)` every contact point `P` is probed on `A` a small step
//! before and after `P`. If both probes still lie on `B`, the curves merely
//! run along each other there and `P` is discarded. Otherwise `P` is a true
//! junction, and each curve of the pair that has no vertex at `P` is missing
//! one.

use std::collections::BTreeMap;

use crate::geom::{Bvh, Point3, Polyline, Tolerance, VertexInsertion, intersect_segments, push_unique_point};
use crate::store::CurveHandle;

use super::{CancelFlag, Cancelled, CurvePair, TopologyDiagnostics};

/// Probe step as a fraction of the local segment's parameter span.
pub const PROBE_FRACTION: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeMode {
    /// Record missing vertices without touching the curves.
    Diagnose,
    /// Insert missing vertices into the working curves as they are found.
    Repair,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeResolution {
    /// Junction points over all pairs, merged within tolerance.
    pub nodes: Vec<Point3>,
    /// Junction points each curve has no vertex at.
    pub missing: BTreeMap<CurveHandle, Vec<Point3>>,
    /// Vertices inserted in [`NodeMode::Repair`].
    pub inserted: usize,
}

impl NodeResolution {
    /// Missing vertices grouped by junction point: every curve lacking a
    /// vertex at that point, in ascending handle order.
    #[must_use]
    pub fn junctions(&self, tol: Tolerance) -> Vec<(Point3, Vec<CurveHandle>)> {
        let mut groups: Vec<(Point3, Vec<CurveHandle>)> = Vec::new();
        for (handle, points) in &self.missing {
            for &p in points {
                match groups.iter_mut().find(|(q, _)| tol.approx_eq_point3(*q, p)) {
                    Some((_, curves)) => {
                        if !curves.contains(handle) {
                            curves.push(*handle);
                        }
                    }
                    None => groups.push((p, vec![*handle])),
                }
            }
        }
        for (_, curves) in &mut groups {
            curves.sort_unstable();
        }
        groups
    }

    fn record_missing(&mut self, handle: CurveHandle, point: Point3, tol: Tolerance) {
        push_unique_point(self.missing.entry(handle).or_default(), point, tol);
    }
}

/// Contact points between two curves, merged within tolerance, in segment
/// order of `a`.
#[must_use]
pub fn pair_contacts(a: &Polyline, b: &Polyline, tol: Tolerance) -> Vec<Point3> {
    let b_segments: Vec<_> = b.segments().collect();
    let boxes: Vec<_> = b_segments
        .iter()
        .map(|s| s.bbox().expand_xy(tol.eps))
        .collect();
    let Some(bvh) = Bvh::build(&boxes) else {
        return Vec::new();
    };

    let mut points = Vec::new();
    for sa in a.segments() {
        let mut hits = Vec::new();
        bvh.query_bbox(sa.bbox().expand_xy(tol.eps), |j| {
            hits.push(j);
            true
        });
        hits.sort_unstable();
        for j in hits {
            for contact in intersect_segments(&sa, &b_segments[j], tol) {
                for p in contact.points() {
                    push_unique_point(&mut points, p, tol);
                }
            }
        }
    }
    points
}

/// Probe step in parameter units for a segment of length `len`: at least
/// [`PROBE_FRACTION`], at least twice the tolerance in length, at most half
/// the segment.
fn probe_step(len: f64, tol: Tolerance) -> f64 {
    if len <= tol.eps {
        return 0.5;
    }
    PROBE_FRACTION.max(2.0 * tol.eps / len).min(0.5)
}

/// Returns `true` when `a` runs along `b` on both sides of `p`.
#[must_use]
pub fn is_pass_through(a: &Polyline, b: &Polyline, p: Point3, tol: Tolerance) -> bool {
    let Some((t, _)) = a.parameter_at_point(p) else {
        return false;
    };
    let step = probe_step(a.local_segment_length(t), tol);
    let on_b = |s: f64| {
        a.point_at_parameter(s)
            .and_then(|q| b.distance_to_point(q))
            .is_some_and(|d| d <= tol.eps)
    };
    on_b(t - step) && on_b(t + step)
}

/// Junction points of one pair.
#[must_use]
pub fn pair_junctions(a: &Polyline, b: &Polyline, tol: Tolerance) -> Vec<Point3> {
    pair_contacts(a, b, tol)
        .into_iter()
        .filter(|p| !is_pass_through(a, b, *p, tol))
        .collect()
}

fn lookup<'a>(
    curves: &'a BTreeMap<CurveHandle, Polyline>,
    pair: CurvePair,
    diagnostics: &mut TopologyDiagnostics,
) -> Option<(&'a Polyline, &'a Polyline)> {
    match (curves.get(&pair.a), curves.get(&pair.b)) {
        (Some(a), Some(b)) => Some((a, b)),
        _ => {
            diagnostics.add_pair(pair.a, pair.b, "pair references a curve outside the snapshot");
            None
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "parallel")] {
        fn collect_pair_nodes(
            curves: &BTreeMap<CurveHandle, Polyline>,
            pairs: &[CurvePair],
            tol: Tolerance,
            cancel: &CancelFlag,
        ) -> Vec<Option<Vec<Point3>>> {
            use rayon::prelude::*;

            pairs
                .par_iter()
                .map(|pair| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    let (a, b) = (curves.get(&pair.a)?, curves.get(&pair.b)?);
                    Some(pair_junctions(a, b, tol))
                })
                .collect()
        }
    } else {
        fn collect_pair_nodes(
            curves: &BTreeMap<CurveHandle, Polyline>,
            pairs: &[CurvePair],
            tol: Tolerance,
            cancel: &CancelFlag,
        ) -> Vec<Option<Vec<Point3>>> {
            pairs
                .iter()
                .map(|pair| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    let (a, b) = (curves.get(&pair.a)?, curves.get(&pair.b)?);
                    Some(pair_junctions(a, b, tol))
                })
                .collect()
        }
    }
}

/// Find junctions and missing vertices without modifying any curve.
pub fn diagnose_nodes(
    curves: &BTreeMap<CurveHandle, Polyline>,
    pairs: &[CurvePair],
    tol: Tolerance,
    cancel: &CancelFlag,
) -> Result<(NodeResolution, TopologyDiagnostics), Cancelled> {
    let mut diagnostics = TopologyDiagnostics {
        curve_count: curves.len(),
        pair_count: pairs.len(),
        ..Default::default()
    };
    let mut resolution = NodeResolution::default();

    let per_pair = collect_pair_nodes(curves, pairs, tol, cancel);
    cancel.check()?;

    for (pair, found) in pairs.iter().zip(per_pair) {
        let Some((a, b)) = lookup(curves, *pair, &mut diagnostics) else {
            continue;
        };
        for p in found.unwrap_or_default() {
            push_unique_point(&mut resolution.nodes, p, tol);
            for (handle, curve) in [(pair.a, a), (pair.b, b)] {
                if curve.vertex_near(p, tol).is_none() {
                    resolution.record_missing(handle, p, tol);
                }
            }
        }
    }

    log::debug!(
        "node resolution: {} pairs, {} junctions, {} curves missing vertices",
        pairs.len(),
        resolution.nodes.len(),
        resolution.missing.len()
    );
    Ok((resolution, diagnostics))
}

/// Find junctions and insert every missing vertex into `curves`.
///
/// Pairs are processed in order and later pairs see the curves as updated by
/// earlier ones. `missing` lists what was absent before insertion.
pub fn repair_nodes(
    curves: &mut BTreeMap<CurveHandle, Polyline>,
    pairs: &[CurvePair],
    tol: Tolerance,
    cancel: &CancelFlag,
) -> Result<(NodeResolution, TopologyDiagnostics), Cancelled> {
    let mut diagnostics = TopologyDiagnostics {
        curve_count: curves.len(),
        pair_count: pairs.len(),
        ..Default::default()
    };
    let mut resolution = NodeResolution::default();

    for pair in pairs {
        cancel.check()?;
        let Some((a, b)) = lookup(curves, *pair, &mut diagnostics) else {
            continue;
        };
        let junctions = pair_junctions(a, b, tol);

        for p in junctions {
            push_unique_point(&mut resolution.nodes, p, tol);
            for handle in [pair.a, pair.b] {
                let Some(curve) = curves.get_mut(&handle) else {
                    continue;
                };
                match curve.insert_vertex(p, tol) {
                    Some(VertexInsertion::Existing(_)) => {}
                    Some(VertexInsertion::Inserted(_)) => {
                        resolution.record_missing(handle, p, tol);
                        resolution.inserted += 1;
                    }
                    None => diagnostics.add_curve(
                        handle,
                        format!("junction ({}, {}) is off the curve", p.x, p.y),
                    ),
                }
            }
        }
    }

    diagnostics.inserted_vertex_count = resolution.inserted;
    log::debug!(
        "node repair: {} pairs, {} junctions, {} vertices inserted",
        pairs.len(),
        resolution.nodes.len(),
        resolution.inserted
    );
    Ok((resolution, diagnostics))
}

/// Run [`diagnose_nodes`] or [`repair_nodes`] depending on `mode`.
pub fn resolve_nodes(
    curves: &mut BTreeMap<CurveHandle, Polyline>,
    pairs: &[CurvePair],
    tol: Tolerance,
    mode: NodeMode,
    cancel: &CancelFlag,
) -> Result<(NodeResolution, TopologyDiagnostics), Cancelled> {
    match mode {
        NodeMode::Diagnose => diagnose_nodes(curves, pairs, tol, cancel),
        NodeMode::Repair => repair_nodes(curves, pairs, tol, cancel),
    }
}
