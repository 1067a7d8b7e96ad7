//! Tolerant intersection of curve segments (lines and circular arcs).
//!
//! End points that lie within tolerance of the other segment always produce a
//! contact at the end point itself. Transversal crossings are then computed
//! analytically so that the reported point lies on both carriers.

use std::f64::consts::TAU;

use super::polyline::{Arc, Segment};
use super::{Point3, Tolerance, Vec3, orient2d, push_unique_point};

/// How two segments touch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Contact {
    /// Single shared point (crossing or touch).
    Point(Point3),
    /// Shared stretch along a common carrier, given by its two extreme points
    /// ordered along the first segment.
    Overlap(Point3, Point3),
}

impl Contact {
    /// Points that bound the contact.
    #[must_use]
    pub fn points(&self) -> Vec<Point3> {
        match *self {
            Self::Point(p) => vec![p],
            Self::Overlap(p, q) => vec![p, q],
        }
    }
}

/// Returns `true` when `p` lies within `tol` of `segment`.
#[must_use]
pub fn point_on_segment(p: Point3, segment: &Segment, tol: Tolerance) -> bool {
    segment.closest(p).2 <= tol.eps
}

/// All contacts between `a` and `b`.
#[must_use]
pub fn intersect_segments(a: &Segment, b: &Segment, tol: Tolerance) -> Vec<Contact> {
    let mut points = Vec::new();
    for p in [a.start, a.end] {
        if point_on_segment(p, b, tol) {
            push_unique_point(&mut points, p, tol);
        }
    }
    for p in [b.start, b.end] {
        if point_on_segment(p, a, tol) {
            push_unique_point(&mut points, p, tol);
        }
    }

    if share_carrier(a, b, tol) {
        return collapse_overlap(a, points, tol);
    }

    let crossings = match (a.arc(), b.arc()) {
        (None, None) => line_line(a, b, tol).into_iter().collect(),
        (None, Some(arc)) => line_arc(a, &arc, b, tol),
        (Some(arc), None) => line_arc(b, &arc, a, tol),
        (Some(arc_a), Some(arc_b)) => arc_arc(&arc_a, &arc_b, tol),
    };
    for q in crossings {
        push_unique_point(&mut points, lift(a, q), tol);
    }

    points.into_iter().map(Contact::Point).collect()
}

/// Both segments on the same line, or on the same circle.
fn share_carrier(a: &Segment, b: &Segment, tol: Tolerance) -> bool {
    match (a.arc(), b.arc()) {
        (None, None) => {
            let len = a.chord_length();
            if tol.is_zero_length(len) || tol.is_zero_length(b.chord_length()) {
                return false;
            }
            let d0 = orient2d(a.start, a.end, b.start) / len;
            let d1 = orient2d(a.start, a.end, b.end) / len;
            d0.abs() <= tol.eps && d1.abs() <= tol.eps
        }
        (Some(arc_a), Some(arc_b)) => {
            tol.approx_eq_point3(arc_a.center, arc_b.center)
                && tol.approx_eq_f64(arc_a.radius, arc_b.radius)
        }
        _ => false,
    }
}

fn collapse_overlap(a: &Segment, mut points: Vec<Point3>, tol: Tolerance) -> Vec<Contact> {
    match points.len() {
        0 => Vec::new(),
        1 => vec![Contact::Point(points[0])],
        _ => {
            points.sort_by(|p, q| a.closest(*p).0.total_cmp(&a.closest(*q).0));
            let first = points[0];
            let last = points[points.len() - 1];
            if tol.approx_eq_point3(first, last) {
                vec![Contact::Point(first)]
            } else {
                vec![Contact::Overlap(first, last)]
            }
        }
    }
}

fn strictly_opposite(x: f64, y: f64, tol: Tolerance) -> bool {
    (x > tol.eps && y < -tol.eps) || (x < -tol.eps && y > tol.eps)
}

fn line_line(a: &Segment, b: &Segment, tol: Tolerance) -> Option<Point3> {
    let la = a.chord_length();
    let lb = b.chord_length();
    if tol.is_zero_length(la) || tol.is_zero_length(lb) {
        return None;
    }

    let da0 = orient2d(b.start, b.end, a.start) / lb;
    let da1 = orient2d(b.start, b.end, a.end) / lb;
    let db0 = orient2d(a.start, a.end, b.start) / la;
    let db1 = orient2d(a.start, a.end, b.end) / la;
    if !strictly_opposite(da0, da1, tol) || !strictly_opposite(db0, db1, tol) {
        return None;
    }

    let s = da0 / (da0 - da1);
    Some(a.start.lerp(a.end, s))
}

fn arc_contains(arc: &Arc, q: Point3, tol: Tolerance) -> bool {
    let sweep = arc.sweep.abs();
    if sweep <= 0.0 || arc.radius <= 0.0 {
        return false;
    }
    let angle = (q.y - arc.center.y).atan2(q.x - arc.center.x);
    let f = arc.fraction_of_angle(angle);
    let slack = tol.eps / (arc.radius * sweep);
    f <= 1.0 + slack || f >= TAU / sweep - slack
}

fn line_arc(line: &Segment, arc: &Arc, arc_segment: &Segment, tol: Tolerance) -> Vec<Point3> {
    let len = line.chord_length();
    if tol.is_zero_length(len) {
        return Vec::new();
    }
    let dir = line.end.sub_point(line.start).mul_scalar(1.0 / len);
    let dir = Vec3::new(dir.x, dir.y, 0.0);
    let along = arc.center.sub_point(line.start).dot_xy(dir);
    let foot = line.start.add_vec(dir.mul_scalar(along));
    let h = foot.distance_xy(arc.center);
    if h > arc.radius + tol.eps {
        return Vec::new();
    }

    let half = (arc.radius * arc.radius - h * h).max(0.0).sqrt();
    let candidates: Vec<(f64, Point3)> = if half <= tol.eps {
        vec![(along, foot)]
    } else {
        vec![
            (along - half, foot.add_vec(dir.mul_scalar(-half))),
            (along + half, foot.add_vec(dir.mul_scalar(half))),
        ]
    };

    candidates
        .into_iter()
        .filter(|(s, _)| *s >= -tol.eps && *s <= len + tol.eps)
        .map(|(_, q)| q)
        .filter(|q| arc_contains(arc, *q, tol) && point_on_segment(*q, arc_segment, tol))
        .collect()
}

fn arc_arc(a: &Arc, b: &Arc, tol: Tolerance) -> Vec<Point3> {
    let d = a.center.distance_xy(b.center);
    if tol.is_zero_length(d)
        || d > a.radius + b.radius + tol.eps
        || d < (a.radius - b.radius).abs() - tol.eps
    {
        return Vec::new();
    }

    let along = (a.radius * a.radius - b.radius * b.radius + d * d) / (2.0 * d);
    let h = (a.radius * a.radius - along * along).max(0.0).sqrt();
    let axis = b.center.sub_point(a.center).mul_scalar(1.0 / d);
    let axis = Vec3::new(axis.x, axis.y, 0.0);
    let base = a.center.add_vec(axis.mul_scalar(along));

    let candidates = if h <= tol.eps {
        vec![base]
    } else {
        let offset = axis.perp_xy().mul_scalar(h);
        vec![base.add_vec(offset), base.add_vec(-offset)]
    };

    candidates
        .into_iter()
        .filter(|q| arc_contains(a, *q, tol) && arc_contains(b, *q, tol))
        .collect()
}

/// Give a planar crossing point the elevation of `segment` at that spot.
fn lift(segment: &Segment, q: Point3) -> Point3 {
    let (_, on, _) = segment.closest(q);
    Point3::new(q.x, q.y, on.z)
}
