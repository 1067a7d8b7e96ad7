//! Dangling edge detection on the noded curve network.
//!
//! The selection is flattened into straight edges, split at every mutual
//! contact and snapped, which yields a planar graph. Edges that lie on a cycle
//! (non-bridges) form the ring subgraph, whose bounded faces are the rings.
//! A network vertex is dangling when it has exactly one incident edge and
//! lies on no ring.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::geom::{BBox, Bvh, Point3, Polyline, Segment, Tolerance, intersect_segments, push_unique_point, signed_area_xy};
use crate::store::CurveHandle;

use super::{CancelFlag, Cancelled, GeometryError, TopologyDiagnostics};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DanglingOptions {
    pub tolerance: Tolerance,
    /// Network vertices closer than this are merged, and curve ends this close
    /// to another edge are joined to it.
    pub snap_distance: f64,
    pub max_arc_segments: usize,
}

impl DanglingOptions {
    #[must_use]
    pub const fn new(tolerance: Tolerance) -> Self {
        Self {
            tolerance,
            snap_distance: tolerance.eps,
            max_arc_segments: 64,
        }
    }

    #[must_use]
    pub const fn with_snap_distance(mut self, snap: f64) -> Self {
        self.snap_distance = snap;
        self
    }

    #[must_use]
    pub const fn with_max_arc_segments(mut self, pieces: usize) -> Self {
        self.max_arc_segments = pieces;
        self
    }

    fn snap(&self) -> Tolerance {
        Tolerance::new(self.snap_distance.max(self.tolerance.eps))
    }
}

impl Default for DanglingOptions {
    fn default() -> Self {
        Self::new(Tolerance::DEFAULT)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DanglingReport {
    /// Bounded faces of the ring subgraph, counter-clockwise.
    pub rings: Vec<Vec<Point3>>,
    /// Free ends per originating curve.
    pub dangling: BTreeMap<CurveHandle, Vec<Point3>>,
    /// Edge chains running from each free end to the rest of the network.
    pub dangling_edges: BTreeMap<CurveHandle, Vec<[Point3; 2]>>,
}

impl DanglingReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dangling.is_empty()
    }

    /// All free ends, each once, in network order.
    #[must_use]
    pub fn dangling_points(&self, tol: Tolerance) -> Vec<Point3> {
        let mut points = Vec::new();
        for p in self.dangling.values().flatten() {
            push_unique_point(&mut points, *p, tol);
        }
        points
    }
}

struct RawEdge {
    a: Point3,
    b: Point3,
    curve: CurveHandle,
}

struct NetEdge {
    u: usize,
    v: usize,
    curves: BTreeSet<CurveHandle>,
}

/// Planar graph built from the selection.
struct Network {
    positions: Vec<Point3>,
    edges: Vec<NetEdge>,
    /// Per vertex: `(neighbour, edge index)`.
    adjacency: Vec<Vec<(usize, usize)>>,
}

impl Network {
    fn degree(&self, v: usize) -> usize {
        self.adjacency[v].len()
    }
}

fn raw_edges(
    curves: &BTreeMap<CurveHandle, Polyline>,
    handles: &[CurveHandle],
    options: &DanglingOptions,
    diagnostics: &mut TopologyDiagnostics,
    cancel: &CancelFlag,
) -> Result<Vec<RawEdge>, Cancelled> {
    let mut edges = Vec::new();
    for &handle in handles {
        cancel.check()?;
        let Some(curve) = curves.get(&handle) else {
            diagnostics.add_curve(handle, GeometryError::MissingCurve(handle).to_string());
            continue;
        };
        let points = curve.flatten(options.tolerance, options.max_arc_segments);
        if points.iter().any(|p| !p.is_finite()) {
            diagnostics.add_curve(handle, "non-finite coordinate");
            continue;
        }
        if points.len() < 2 {
            diagnostics.add_curve(handle, GeometryError::EmptyCurve(handle).to_string());
            continue;
        }
        for pair in points.windows(2) {
            edges.push(RawEdge {
                a: pair[0],
                b: pair[1],
                curve: handle,
            });
        }
        if curve.is_closed() && points.len() > 2 {
            edges.push(RawEdge {
                a: points[points.len() - 1],
                b: points[0],
                curve: handle,
            });
        }
    }
    Ok(edges)
}

/// Split every raw edge at its contacts with all other edges.
fn split_edges(
    raw: &[RawEdge],
    snap: Tolerance,
    cancel: &CancelFlag,
) -> Result<Vec<(Point3, Point3, CurveHandle)>, Cancelled> {
    let segments: Vec<Segment> = raw.iter().map(|e| Segment::line(e.a, e.b)).collect();
    let boxes: Vec<BBox> = raw
        .iter()
        .map(|e| BBox::new(e.a, e.a).expand_point(e.b).flatten().expand_xy(snap.eps))
        .collect();

    let mut cuts: Vec<Vec<Point3>> = raw.iter().map(|e| vec![e.a, e.b]).collect();
    if let Some(bvh) = Bvh::build(&boxes) {
        for (i, j) in bvh.overlapping_pairs() {
            cancel.check()?;
            for contact in intersect_segments(&segments[i], &segments[j], snap) {
                for p in contact.points() {
                    cuts[i].push(p);
                    cuts[j].push(p);
                }
            }
        }
    }

    let mut pieces = Vec::with_capacity(raw.len());
    for (edge, mut points) in raw.iter().zip(cuts) {
        let dir = edge.b.sub_point(edge.a);
        points.sort_by(|p, q| {
            let sp = p.sub_point(edge.a).dot_xy(dir);
            let sq = q.sub_point(edge.a).dot_xy(dir);
            sp.total_cmp(&sq)
        });
        let mut ordered: Vec<Point3> = Vec::with_capacity(points.len());
        for p in points {
            if ordered.last().is_some_and(|last| snap.approx_eq_point3(*last, p)) {
                continue;
            }
            ordered.push(p);
        }
        for pair in ordered.windows(2) {
            pieces.push((pair[0], pair[1], edge.curve));
        }
    }
    Ok(pieces)
}

/// Grid hash merging points within `snap`.
struct Snapper {
    cell: f64,
    snap: Tolerance,
    grid: HashMap<(i64, i64), Vec<usize>>,
    positions: Vec<Point3>,
}

impl Snapper {
    fn new(snap: Tolerance) -> Self {
        Self {
            cell: snap.eps.max(f64::MIN_POSITIVE),
            snap,
            grid: HashMap::new(),
            positions: Vec::new(),
        }
    }

    /// Grid cell of `p`. The float to integer cast saturates for far-off
    /// coordinates, so neighbour offsets must saturate too.
    fn cell_of(&self, p: Point3) -> (i64, i64) {
        ((p.x / self.cell).floor() as i64, (p.y / self.cell).floor() as i64)
    }

    fn vertex(&mut self, p: Point3) -> usize {
        let (cx, cy) = self.cell_of(p);
        let mut best: Option<usize> = None;
        for dx in -1..=1 {
            for dy in -1..=1 {
                let Some(ids) = self.grid.get(&(cx.saturating_add(dx), cy.saturating_add(dy))) else {
                    continue;
                };
                for &id in ids {
                    if self.snap.approx_eq_point3(self.positions[id], p)
                        && best.is_none_or(|b| id < b)
                    {
                        best = Some(id);
                    }
                }
            }
        }
        if let Some(id) = best {
            return id;
        }
        let id = self.positions.len();
        self.positions.push(p);
        self.grid.entry((cx, cy)).or_default().push(id);
        id
    }
}

fn build_network(pieces: &[(Point3, Point3, CurveHandle)], snap: Tolerance) -> Network {
    let mut snapper = Snapper::new(snap);
    let mut by_key: BTreeMap<(usize, usize), usize> = BTreeMap::new();
    let mut edges: Vec<NetEdge> = Vec::new();

    for &(a, b, curve) in pieces {
        let u = snapper.vertex(a);
        let v = snapper.vertex(b);
        if u == v {
            continue;
        }
        let key = (u.min(v), u.max(v));
        match by_key.get(&key) {
            Some(&idx) => {
                edges[idx].curves.insert(curve);
            }
            None => {
                by_key.insert(key, edges.len());
                edges.push(NetEdge {
                    u: key.0,
                    v: key.1,
                    curves: BTreeSet::from([curve]),
                });
            }
        }
    }

    let mut adjacency = vec![Vec::new(); snapper.positions.len()];
    for (idx, edge) in edges.iter().enumerate() {
        adjacency[edge.u].push((edge.v, idx));
        adjacency[edge.v].push((edge.u, idx));
    }

    Network {
        positions: snapper.positions,
        edges,
        adjacency,
    }
}

/// Bridge flags per edge (iterative Tarjan low-link).
fn find_bridges(network: &Network) -> Vec<bool> {
    let n = network.positions.len();
    let mut bridge = vec![false; network.edges.len()];
    let mut disc = vec![usize::MAX; n];
    let mut low = vec![0usize; n];
    let mut timer = 0usize;

    for root in 0..n {
        if disc[root] != usize::MAX {
            continue;
        }
        disc[root] = timer;
        low[root] = timer;
        timer += 1;
        // (vertex, edge used to reach it, next adjacency slot)
        let mut stack: Vec<(usize, usize, usize)> = vec![(root, usize::MAX, 0)];

        while let Some(&(v, parent_edge, slot)) = stack.last() {
            if slot < network.adjacency[v].len() {
                if let Some(top) = stack.last_mut() {
                    top.2 += 1;
                }
                let (w, e) = network.adjacency[v][slot];
                if e == parent_edge {
                    continue;
                }
                if disc[w] == usize::MAX {
                    disc[w] = timer;
                    low[w] = timer;
                    timer += 1;
                    stack.push((w, e, 0));
                } else {
                    low[v] = low[v].min(disc[w]);
                }
            } else {
                stack.pop();
                if let Some(&(p, _, _)) = stack.last() {
                    low[p] = low[p].min(low[v]);
                    if low[v] > disc[p] {
                        bridge[parent_edge] = true;
                    }
                }
            }
        }
    }
    bridge
}

/// Bounded faces of the non-bridge subgraph, by planar face walk.
fn extract_rings(network: &Network, bridge: &[bool], tol: Tolerance) -> Vec<Vec<usize>> {
    let mut ring_adj: Vec<Vec<usize>> = vec![Vec::new(); network.positions.len()];
    for (idx, edge) in network.edges.iter().enumerate() {
        if !bridge[idx] {
            ring_adj[edge.u].push(edge.v);
            ring_adj[edge.v].push(edge.u);
        }
    }
    for (v, neighbours) in ring_adj.iter_mut().enumerate() {
        let origin = network.positions[v];
        neighbours.sort_by(|a, b| {
            let pa = network.positions[*a];
            let pb = network.positions[*b];
            let aa = (pa.y - origin.y).atan2(pa.x - origin.x);
            let ab = (pb.y - origin.y).atan2(pb.x - origin.x);
            aa.total_cmp(&ab)
        });
    }

    let half_edges: usize = ring_adj.iter().map(Vec::len).sum();
    let mut visited: HashSet<(usize, usize)> = HashSet::with_capacity(half_edges);
    let mut rings = Vec::new();

    for start_u in 0..ring_adj.len() {
        for &start_v in &ring_adj[start_u] {
            if visited.contains(&(start_u, start_v)) {
                continue;
            }
            let mut face = Vec::new();
            let (mut u, mut v) = (start_u, start_v);
            for _ in 0..=half_edges {
                if !visited.insert((u, v)) {
                    break;
                }
                face.push(u);
                let around = &ring_adj[v];
                let Some(k) = around.iter().position(|&x| x == u) else {
                    break;
                };
                // Turn to the neighbour just clockwise of the way we came in.
                let w = around[(k + around.len() - 1) % around.len()];
                (u, v) = (v, w);
            }

            let points: Vec<Point3> = face.iter().map(|&i| network.positions[i]).collect();
            if signed_area_xy(&points) > tol.eps_squared() {
                rings.push(face);
            }
        }
    }
    rings
}

fn collect_dangles(network: &Network, rings: &[Vec<usize>]) -> DanglingReport {
    let on_ring: BTreeSet<usize> = rings.iter().flatten().copied().collect();
    let mut report = DanglingReport {
        rings: rings
            .iter()
            .map(|r| r.iter().map(|&i| network.positions[i]).collect())
            .collect(),
        ..Default::default()
    };
    let mut walked: BTreeSet<usize> = BTreeSet::new();

    for v in 0..network.positions.len() {
        if network.degree(v) != 1 || on_ring.contains(&v) {
            continue;
        }
        let (_, first_edge) = network.adjacency[v][0];
        for curve in &network.edges[first_edge].curves {
            report
                .dangling
                .entry(*curve)
                .or_default()
                .push(network.positions[v]);
        }

        let (mut prev, mut cur, mut edge) = (v, network.adjacency[v][0].0, first_edge);
        for _ in 0..network.edges.len() {
            if !walked.insert(edge) {
                break;
            }
            for curve in &network.edges[edge].curves {
                report
                    .dangling_edges
                    .entry(*curve)
                    .or_default()
                    .push([network.positions[prev], network.positions[cur]]);
            }
            if network.degree(cur) != 2 || on_ring.contains(&cur) {
                break;
            }
            let Some(&(next, next_edge)) = network.adjacency[cur].iter().find(|(_, e)| *e != edge)
            else {
                break;
            };
            (prev, cur, edge) = (cur, next, next_edge);
        }
    }
    report
}

/// Free ends of the network formed by `handles`.
pub fn find_dangles(
    curves: &BTreeMap<CurveHandle, Polyline>,
    handles: &[CurveHandle],
    options: &DanglingOptions,
    cancel: &CancelFlag,
) -> Result<(DanglingReport, TopologyDiagnostics), Cancelled> {
    let mut diagnostics = TopologyDiagnostics {
        curve_count: handles.len(),
        ..Default::default()
    };
    let snap = options.snap();

    let raw = raw_edges(curves, handles, options, &mut diagnostics, cancel)?;
    let pieces = split_edges(&raw, snap, cancel)?;
    cancel.check()?;
    let network = build_network(&pieces, snap);
    if network.edges.is_empty() && !raw.is_empty() {
        diagnostics.add_network("snapping collapsed every edge");
    }

    let bridge = find_bridges(&network);
    let rings = extract_rings(&network, &bridge, options.tolerance);
    let report = collect_dangles(&network, &rings);

    log::debug!(
        "dangles: {} raw edges, {} network edges, {} rings, {} curves with free ends",
        raw.len(),
        network.edges.len(),
        report.rings.len(),
        report.dangling.len()
    );
    Ok((report, diagnostics))
}
