//! Planar polyline curves with bulge (arc) segments and per-segment widths.
//!
//! A curve is an ordered list of [`Vertex`] values. Segment `i` starts at
//! vertex `i` and ends at vertex `i + 1`, wrapping back to vertex `0` when the
//! curve is closed. The segment's shape and width ramp are stored on its start
//! vertex:
//!
//! - `bulge` is `tan(theta / 4)` where `theta` is the signed included angle of
//!   the arc (positive = counter-clockwise, `0` = straight line).
//! - `start_width` / `end_width` describe a linear width ramp along the segment.
//!
//! Curve parameters run from `0` to [`Polyline::segment_count`]. Integer values
//! land on vertices; the fractional part is the fraction of the segment's arc
//! length.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use super::{BBox, Point3, Tolerance};

/// Bulges below this magnitude are treated as straight segments.
const BULGE_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub point: Point3,
    #[serde(default)]
    pub bulge: f64,
    #[serde(default)]
    pub start_width: f64,
    #[serde(default)]
    pub end_width: f64,
}

impl Vertex {
    #[must_use]
    pub const fn new(point: Point3) -> Self {
        Self {
            point,
            bulge: 0.0,
            start_width: 0.0,
            end_width: 0.0,
        }
    }

    #[must_use]
    pub const fn with_bulge(mut self, bulge: f64) -> Self {
        self.bulge = bulge;
        self
    }

    #[must_use]
    pub const fn with_widths(mut self, start_width: f64, end_width: f64) -> Self {
        self.start_width = start_width;
        self.end_width = end_width;
        self
    }
}

impl From<Point3> for Vertex {
    fn from(point: Point3) -> Self {
        Self::new(point)
    }
}

/// Circular arc carried by a bulged segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arc {
    pub center: Point3,
    pub radius: f64,
    pub start_angle: f64,
    /// Signed sweep in radians; negative sweeps run clockwise.
    pub sweep: f64,
}

impl Arc {
    #[must_use]
    pub fn point_at_angle(&self, angle: f64) -> Point3 {
        Point3::xy(
            self.center.x + self.radius * angle.cos(),
            self.center.y + self.radius * angle.sin(),
        )
    }

    /// Fraction of the sweep at which `angle` is reached, in `[0, TAU / |sweep|)`.
    #[must_use]
    pub fn fraction_of_angle(&self, angle: f64) -> f64 {
        let delta = if self.sweep >= 0.0 {
            (angle - self.start_angle).rem_euclid(TAU)
        } else {
            (self.start_angle - angle).rem_euclid(TAU)
        };
        delta / self.sweep.abs()
    }
}

/// One segment of a curve: straight when `bulge == 0`, a circular arc otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: Point3,
    pub end: Point3,
    pub bulge: f64,
}

impl Segment {
    #[must_use]
    pub const fn line(start: Point3, end: Point3) -> Self {
        Self {
            start,
            end,
            bulge: 0.0,
        }
    }

    #[must_use]
    pub fn chord_length(&self) -> f64 {
        self.start.distance_xy(self.end)
    }

    #[must_use]
    pub fn is_arc(&self) -> bool {
        self.bulge.abs() > BULGE_EPS && self.chord_length() > 0.0
    }

    /// Included angle of the arc (`0` for straight segments).
    #[must_use]
    pub fn sweep(&self) -> f64 {
        if self.is_arc() {
            4.0 * self.bulge.atan()
        } else {
            0.0
        }
    }

    #[must_use]
    pub fn arc(&self) -> Option<Arc> {
        if !self.is_arc() {
            return None;
        }
        let chord = self.end.sub_point(self.start);
        let mid = self.start.lerp(self.end, 0.5);
        let b = self.bulge;
        let offset = (1.0 - b * b) / (4.0 * b);
        let center = Point3::xy(mid.x - chord.y * offset, mid.y + chord.x * offset);
        let radius = self.chord_length() * (1.0 + b * b) / (4.0 * b.abs());
        let start_angle = (self.start.y - center.y).atan2(self.start.x - center.x);
        Some(Arc {
            center,
            radius,
            start_angle,
            sweep: 4.0 * b.atan(),
        })
    }

    #[must_use]
    pub fn length(&self) -> f64 {
        match self.arc() {
            Some(arc) => arc.radius * arc.sweep.abs(),
            None => self.chord_length(),
        }
    }

    /// Point at fraction `f` of the segment's arc length. `z` is interpolated
    /// linearly between the end points.
    #[must_use]
    pub fn point_at(&self, f: f64) -> Point3 {
        let z = self.start.z + (self.end.z - self.start.z) * f;
        match self.arc() {
            Some(arc) => {
                let p = arc.point_at_angle(arc.start_angle + arc.sweep * f);
                Point3::new(p.x, p.y, z)
            }
            None => {
                let p = self.start.lerp(self.end, f);
                Point3::new(p.x, p.y, z)
            }
        }
    }

    /// Closest point on the segment: `(fraction, point, planar distance)`.
    #[must_use]
    pub fn closest(&self, query: Point3) -> (f64, Point3, f64) {
        let f = match self.arc() {
            Some(arc) => {
                let angle = (query.y - arc.center.y).atan2(query.x - arc.center.x);
                let f = arc.fraction_of_angle(angle);
                if f <= 1.0 {
                    f
                } else if query.distance_squared_xy(self.start)
                    <= query.distance_squared_xy(self.end)
                {
                    0.0
                } else {
                    1.0
                }
            }
            None => {
                let d = self.end.sub_point(self.start);
                let len2 = d.dot_xy(d);
                if len2 <= 1e-24 {
                    0.0
                } else {
                    (query.sub_point(self.start).dot_xy(d) / len2).clamp(0.0, 1.0)
                }
            }
        };
        let p = self.point_at(f);
        (f, p, p.distance_xy(query))
    }

    /// Planar bounding box, exact for arcs (axis extremes included).
    #[must_use]
    pub fn bbox(&self) -> BBox {
        let mut bbox = BBox::new(self.start, self.start)
            .expand_point(self.end)
            .flatten();
        if let Some(arc) = self.arc() {
            for k in 0..4 {
                let angle = f64::from(k) * TAU / 4.0;
                if arc.fraction_of_angle(angle) <= 1.0 {
                    bbox = bbox.expand_point(arc.point_at_angle(angle));
                }
            }
        }
        bbox
    }

    /// Split the bulge at fraction `f`, returning the bulges of both halves.
    #[must_use]
    pub fn split_bulge(&self, f: f64) -> (f64, f64) {
        if !self.is_arc() {
            return (0.0, 0.0);
        }
        let quarter = self.bulge.atan();
        ((quarter * f).tan(), (quarter * (1.0 - f)).tan())
    }

    /// Chord approximation with at most `max_pieces` pieces. Returns the points
    /// including both end points.
    #[must_use]
    pub fn flatten(&self, tol: Tolerance, max_pieces: usize) -> Vec<Point3> {
        let Some(arc) = self.arc() else {
            return vec![self.start, self.end];
        };
        let sagitta = tol.eps.max(1e-12);
        let step = if sagitta >= arc.radius {
            arc.sweep.abs()
        } else {
            2.0 * (1.0 - sagitta / arc.radius).acos()
        };
        let pieces = if step > 0.0 {
            ((arc.sweep.abs() / step).ceil() as usize).clamp(2, max_pieces.max(2))
        } else {
            max_pieces.max(2)
        };
        let mut points = Vec::with_capacity(pieces + 1);
        points.push(self.start);
        for i in 1..pieces {
            points.push(self.point_at(i as f64 / pieces as f64));
        }
        points.push(self.end);
        points
    }
}

/// Where a requested vertex ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexInsertion {
    /// A vertex already existed within tolerance at this index.
    Existing(usize),
    /// A new vertex was inserted at this index.
    Inserted(usize),
}

/// An ordered planar curve, open or closed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polyline {
    vertices: Vec<Vertex>,
    #[serde(default)]
    closed: bool,
}

impl Polyline {
    #[must_use]
    pub fn new(vertices: Vec<Vertex>, closed: bool) -> Self {
        Self { vertices, closed }
    }

    #[must_use]
    pub fn from_points<I, P>(points: I, closed: bool) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Point3>,
    {
        Self::new(
            points
                .into_iter()
                .map(|p| Vertex::new(p.into()))
                .collect(),
            closed,
        )
    }

    #[must_use]
    pub fn open<I, P>(points: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Point3>,
    {
        Self::from_points(points, false)
    }

    #[must_use]
    pub fn closed<I, P>(points: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Point3>,
    {
        Self::from_points(points, true)
    }

    #[must_use]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn points(&self) -> Vec<Point3> {
        self.vertices.iter().map(|v| v.point).collect()
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closed by flag, or open with coincident first and last vertex.
    #[must_use]
    pub fn is_geometrically_closed(&self, tol: Tolerance) -> bool {
        if self.closed {
            return self.vertices.len() >= 2;
        }
        self.end_gap().is_some_and(|gap| gap <= tol.eps)
    }

    /// Distance between the first and last vertex of an open curve.
    #[must_use]
    pub fn end_gap(&self) -> Option<f64> {
        if self.closed || self.vertices.len() < 2 {
            return None;
        }
        let first = self.vertices.first()?.point;
        let last = self.vertices.last()?.point;
        Some(first.distance_xy(last))
    }

    #[must_use]
    pub fn segment_count(&self) -> usize {
        match self.vertices.len() {
            0 | 1 => 0,
            n if self.closed => n,
            n => n - 1,
        }
    }

    #[must_use]
    pub fn segment(&self, index: usize) -> Option<Segment> {
        if index >= self.segment_count() {
            return None;
        }
        let start = self.vertices[index];
        let end = self.vertices[(index + 1) % self.vertices.len()];
        Some(Segment {
            start: start.point,
            end: end.point,
            bulge: start.bulge,
        })
    }

    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        (0..self.segment_count()).filter_map(|i| self.segment(i))
    }

    #[must_use]
    pub fn length(&self) -> f64 {
        self.segments().map(|s| s.length()).sum()
    }

    #[must_use]
    pub fn bbox(&self) -> Option<BBox> {
        let mut segments = self.segments();
        match segments.next() {
            Some(first) => Some(segments.fold(first.bbox(), |acc, s| acc.union(s.bbox()))),
            None => self
                .vertices
                .first()
                .map(|v| BBox::new(v.point, v.point).flatten()),
        }
    }

    /// Wrap (closed) or clamp (open) a parameter into the curve's domain.
    #[must_use]
    pub fn normalize_parameter(&self, t: f64) -> f64 {
        let max = self.segment_count() as f64;
        if max == 0.0 {
            return 0.0;
        }
        if self.closed {
            t.rem_euclid(max)
        } else {
            t.clamp(0.0, max)
        }
    }

    fn split_parameter(&self, t: f64) -> Option<(usize, f64)> {
        let count = self.segment_count();
        if count == 0 {
            return None;
        }
        let t = self.normalize_parameter(t);
        let index = (t.floor() as usize).min(count - 1);
        Some((index, t - index as f64))
    }

    #[must_use]
    pub fn point_at_parameter(&self, t: f64) -> Option<Point3> {
        if self.segment_count() == 0 {
            return self.vertices.first().map(|v| v.point);
        }
        let (index, f) = self.split_parameter(t)?;
        Some(self.segment(index)?.point_at(f))
    }

    /// Closest parameter to `point`: `(parameter, planar distance)`. Ties go to
    /// the lowest parameter.
    #[must_use]
    pub fn parameter_at_point(&self, point: Point3) -> Option<(f64, f64)> {
        if self.segment_count() == 0 {
            return self
                .vertices
                .first()
                .map(|v| (0.0, v.point.distance_xy(point)));
        }

        let mut best: Option<(f64, f64)> = None;
        for (index, segment) in self.segments().enumerate() {
            let (f, _, dist) = segment.closest(point);
            if best.is_none_or(|(_, d)| dist < d) {
                best = Some((index as f64 + f, dist));
            }
        }
        best.map(|(t, d)| (self.normalize_parameter(t), d))
    }

    #[must_use]
    pub fn distance_to_point(&self, point: Point3) -> Option<f64> {
        self.parameter_at_point(point).map(|(_, d)| d)
    }

    /// Length of the segment that contains parameter `t`.
    #[must_use]
    pub fn local_segment_length(&self, t: f64) -> f64 {
        self.split_parameter(t)
            .and_then(|(index, _)| self.segment(index))
            .map_or(0.0, |s| s.length())
    }

    /// Index of a vertex lying within `tol` of `point`, if any.
    #[must_use]
    pub fn vertex_near(&self, point: Point3, tol: Tolerance) -> Option<usize> {
        self.vertices
            .iter()
            .position(|v| tol.approx_eq_point3(v.point, point))
    }

    /// Insert a vertex at `point`, splitting the enclosing segment.
    ///
    /// The split keeps the segment's shape (the bulge is divided in proportion
    /// to the sweep) and its width ramp (the width at the split point is
    /// interpolated). Returns `None` when `point` is farther than `tol` from
    /// the curve.
    pub fn insert_vertex(&mut self, point: Point3, tol: Tolerance) -> Option<VertexInsertion> {
        if let Some(index) = self.vertex_near(point, tol) {
            return Some(VertexInsertion::Existing(index));
        }
        let (t, dist) = self.parameter_at_point(point)?;
        if dist > tol.eps {
            return None;
        }
        let (index, f) = self.split_parameter(t)?;
        let segment = self.segment(index)?;
        let (head_bulge, tail_bulge) = segment.split_bulge(f);

        let start = self.vertices[index];
        let mid_width = start.start_width + (start.end_width - start.start_width) * f;
        let z = segment.point_at(f).z;

        self.vertices[index].bulge = head_bulge;
        self.vertices[index].end_width = mid_width;
        let inserted = Vertex {
            point: Point3::new(point.x, point.y, z),
            bulge: tail_bulge,
            start_width: mid_width,
            end_width: start.end_width,
        };
        self.vertices.insert(index + 1, inserted);
        Some(VertexInsertion::Inserted(index + 1))
    }

    /// Chord approximation of the whole curve. Closed curves do not repeat
    /// their first point.
    #[must_use]
    pub fn flatten(&self, tol: Tolerance, max_arc_pieces: usize) -> Vec<Point3> {
        let mut points: Vec<Point3> = Vec::new();
        for segment in self.segments() {
            let piece = segment.flatten(tol, max_arc_pieces);
            let skip = usize::from(!points.is_empty());
            points.extend(piece.into_iter().skip(skip));
        }
        if points.is_empty() {
            points.extend(self.vertices.first().map(|v| v.point));
        }
        if self.closed && points.len() > 1 {
            points.pop();
        }
        points
    }
}
