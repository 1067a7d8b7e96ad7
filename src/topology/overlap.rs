//! Overlap detection between closed regions.
//!
//! Each closed (or nearly closed) curve becomes a `geo::Polygon`. Near pairs
//! are intersected with `geo::BooleanOps`; an intersection whose area beats
//! the sliver threshold is an overlap.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use geo::{Area, BooleanOps, BoundingRect, Coord, LineString, MultiPolygon, Polygon};

use crate::geom::{Point3, Polyline, Tolerance, push_unique_point, signed_area_xy};
use crate::store::CurveHandle;

use super::{CancelFlag, Cancelled, CurvePair, GeometryError, Region, RegionPolygon, TopologyDiagnostics};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapOptions {
    pub tolerance: Tolerance,
    /// Open curves whose ends are at most this far apart still bound a region.
    pub gap_tolerance: f64,
    pub max_arc_segments: usize,
}

impl OverlapOptions {
    #[must_use]
    pub const fn new(tolerance: Tolerance) -> Self {
        Self {
            tolerance,
            gap_tolerance: tolerance.eps,
            max_arc_segments: 64,
        }
    }

    #[must_use]
    pub const fn with_gap_tolerance(mut self, gap: f64) -> Self {
        self.gap_tolerance = gap;
        self
    }

    #[must_use]
    pub const fn with_max_arc_segments(mut self, pieces: usize) -> Self {
        self.max_arc_segments = pieces;
        self
    }
}

impl Default for OverlapOptions {
    fn default() -> Self {
        Self::new(Tolerance::DEFAULT)
    }
}

/// One overlapping pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PairOverlap {
    pub pair: CurvePair,
    pub region: Region,
}

/// Region bounded by `curve`.
///
/// `Ok(None)` for open curves whose ends are farther apart than the gap
/// tolerance. Rings with non-finite points, fewer than three distinct points
/// or zero area are errors.
pub fn curve_region(
    handle: CurveHandle,
    curve: &Polyline,
    options: &OverlapOptions,
) -> Result<Option<Polygon<f64>>, GeometryError> {
    let tol = options.tolerance;
    let closes = curve.is_closed()
        || curve
            .end_gap()
            .is_some_and(|gap| gap <= options.gap_tolerance.max(tol.eps));
    if !closes {
        return Ok(None);
    }

    let mut ring = curve.flatten(tol, options.max_arc_segments);
    if !curve.is_closed() && ring.len() > 1 {
        let first = ring[0];
        if ring.last().is_some_and(|last| tol.approx_eq_point3(*last, first)) {
            ring.pop();
        }
    }

    let degenerate = |reason: &str| GeometryError::DegenerateRegion {
        handle,
        reason: reason.to_string(),
    };
    if ring.iter().any(|p| !p.is_finite()) {
        return Err(degenerate("non-finite coordinate"));
    }
    let mut distinct = Vec::new();
    for &p in &ring {
        push_unique_point(&mut distinct, p, tol);
        if distinct.len() >= 3 {
            break;
        }
    }
    if distinct.len() < 3 {
        return Err(degenerate("fewer than three distinct points"));
    }
    if signed_area_xy(&ring).abs() <= tol.eps_squared() {
        return Err(degenerate("zero area"));
    }

    let exterior: LineString<f64> = ring.iter().map(|p| Coord { x: p.x, y: p.y }).collect();
    Ok(Some(Polygon::new(exterior, Vec::new())))
}

fn ring_points(ring: &LineString<f64>) -> Vec<Point3> {
    let mut points: Vec<Point3> = ring.coords().map(|c| Point3::xy(c.x, c.y)).collect();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

fn region_of(shape: &MultiPolygon<f64>, area: f64) -> Region {
    Region {
        polygons: shape
            .iter()
            .map(|polygon| RegionPolygon {
                exterior: ring_points(polygon.exterior()),
                holes: polygon.interiors().iter().map(ring_points).collect(),
            })
            .collect(),
        area,
    }
}

/// Intersection of two regions, if it is more than a sliver.
///
/// The sliver threshold is `tolerance * diagonal` of the intersection's
/// bounding box. A panic inside the boolean operation is caught and returned
/// as [`GeometryError::BooleanFailed`].
pub fn overlap_region(
    a: &Polygon<f64>,
    b: &Polygon<f64>,
    tol: Tolerance,
) -> Result<Option<Region>, GeometryError> {
    let shape = catch_unwind(AssertUnwindSafe(|| a.intersection(b)))
        .map_err(|_| GeometryError::BooleanFailed("boolean operation panicked".to_string()))?;
    let area = shape.unsigned_area();
    if !area.is_finite() {
        return Err(GeometryError::BooleanFailed(format!("non-finite area {area}")));
    }
    let Some(bounds) = shape.bounding_rect() else {
        return Ok(None);
    };
    let diagonal = bounds.width().hypot(bounds.height());
    if area <= tol.eps * diagonal {
        return Ok(None);
    }
    Ok(Some(region_of(&shape, area)))
}

cfg_if::cfg_if! {
    if #[cfg(feature = "parallel")] {
        fn collect_overlaps(
            jobs: &[(CurvePair, &Polygon<f64>, &Polygon<f64>)],
            tol: Tolerance,
            cancel: &CancelFlag,
        ) -> Vec<Option<Result<Option<Region>, GeometryError>>> {
            use rayon::prelude::*;

            jobs.par_iter()
                .map(|(_, a, b)| (!cancel.is_cancelled()).then(|| overlap_region(a, b, tol)))
                .collect()
        }
    } else {
        fn collect_overlaps(
            jobs: &[(CurvePair, &Polygon<f64>, &Polygon<f64>)],
            tol: Tolerance,
            cancel: &CancelFlag,
        ) -> Vec<Option<Result<Option<Region>, GeometryError>>> {
            jobs.iter()
                .map(|(_, a, b)| (!cancel.is_cancelled()).then(|| overlap_region(a, b, tol)))
                .collect()
        }
    }
}

/// Overlapping pairs among `pairs`, in pair order.
pub fn find_overlaps(
    curves: &BTreeMap<CurveHandle, Polyline>,
    pairs: &[CurvePair],
    options: &OverlapOptions,
    cancel: &CancelFlag,
) -> Result<(Vec<PairOverlap>, TopologyDiagnostics), Cancelled> {
    let mut diagnostics = TopologyDiagnostics {
        curve_count: curves.len(),
        pair_count: pairs.len(),
        ..Default::default()
    };

    let mut regions: BTreeMap<CurveHandle, Option<Polygon<f64>>> = BTreeMap::new();
    for pair in pairs {
        for handle in [pair.a, pair.b] {
            if regions.contains_key(&handle) {
                continue;
            }
            cancel.check()?;
            let region = match curves.get(&handle) {
                Some(curve) => curve_region(handle, curve, options).unwrap_or_else(|err| {
                    diagnostics.add_curve(handle, err.to_string());
                    None
                }),
                None => {
                    diagnostics.add_curve(handle, GeometryError::MissingCurve(handle).to_string());
                    None
                }
            };
            regions.insert(handle, region);
        }
    }

    let jobs: Vec<(CurvePair, &Polygon<f64>, &Polygon<f64>)> = pairs
        .iter()
        .filter_map(|pair| {
            let a = regions.get(&pair.a)?.as_ref()?;
            let b = regions.get(&pair.b)?.as_ref()?;
            Some((*pair, a, b))
        })
        .collect();

    let per_pair = collect_overlaps(&jobs, options.tolerance, cancel);
    cancel.check()?;

    let mut overlaps = Vec::new();
    for ((pair, _, _), outcome) in jobs.iter().zip(per_pair) {
        match outcome {
            Some(Ok(Some(region))) => overlaps.push(PairOverlap {
                pair: *pair,
                region,
            }),
            Some(Ok(None)) | None => {}
            Some(Err(err)) => diagnostics.add_pair(pair.a, pair.b, err.to_string()),
        }
    }

    log::debug!(
        "overlap: {} region pairs, {} overlapping",
        jobs.len(),
        overlaps.len()
    );
    Ok((overlaps, diagnostics))
}
