use super::BBox;

#[derive(Debug, Clone, Copy)]
struct BvhNode {
    bbox: BBox,
    left: u32,
    right: u32,
    start: u32,
    count: u32,
}

impl BvhNode {
    const fn leaf(bbox: BBox, start: u32, count: u32) -> Self {
        Self {
            bbox,
            left: u32::MAX,
            right: u32::MAX,
            start,
            count,
        }
    }

    const fn inner(bbox: BBox, left: u32, right: u32) -> Self {
        Self {
            bbox,
            left,
            right,
            start: 0,
            count: 0,
        }
    }

    const fn is_leaf(self) -> bool {
        self.count != 0
    }
}

/// Median-split bounding volume hierarchy over axis-aligned boxes.
///
/// Primitives are addressed by their index in the slice passed to
/// [`Bvh::build`]. Used for curve envelopes (proximity index) and for segment
/// boxes (self-intersection, network noding).
#[derive(Debug, Clone)]
pub(crate) struct Bvh {
    nodes: Vec<BvhNode>,
    prim_indices: Vec<u32>,
    prim_bboxes: Vec<BBox>,
}

impl Bvh {
    const DEFAULT_LEAF_SIZE: usize = 4;

    #[must_use]
    pub(crate) fn build(bboxes: &[BBox]) -> Option<Self> {
        Self::build_with_leaf_size(bboxes, Self::DEFAULT_LEAF_SIZE)
    }

    #[must_use]
    pub(crate) fn build_with_leaf_size(bboxes: &[BBox], leaf_size: usize) -> Option<Self> {
        if bboxes.is_empty() {
            return None;
        }

        let leaf_size = leaf_size.clamp(1, 256);
        let prim_indices: Vec<u32> = (0..(bboxes.len() as u32)).collect();
        let nodes = Vec::with_capacity(bboxes.len().saturating_mul(2));

        let mut bvh = Self {
            nodes,
            prim_indices,
            prim_bboxes: bboxes.to_vec(),
        };
        bvh.build_node(0, bboxes.len(), leaf_size);
        Some(bvh)
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.prim_bboxes.len()
    }

    fn build_node(&mut self, start: usize, end: usize, leaf_size: usize) -> u32 {
        let node_index = self.nodes.len() as u32;
        let bbox = self.range_bbox(start, end);
        self.nodes.push(BvhNode::leaf(bbox, 0, 0));

        let count = end - start;
        if count <= leaf_size {
            self.nodes[node_index as usize] = BvhNode::leaf(bbox, start as u32, count as u32);
            return node_index;
        }

        let axis = self.choose_split_axis(start, end);
        let mid = start + count / 2;
        let prim_bboxes = &self.prim_bboxes;
        self.prim_indices[start..end].select_nth_unstable_by(mid - start, |a, b| {
            let ca = centroid_component(prim_bboxes[*a as usize], axis);
            let cb = centroid_component(prim_bboxes[*b as usize], axis);
            ca.total_cmp(&cb)
        });

        let left = self.build_node(start, mid, leaf_size);
        let right = self.build_node(mid, end, leaf_size);
        self.nodes[node_index as usize] = BvhNode::inner(bbox, left, right);
        node_index
    }

    fn range_bbox(&self, start: usize, end: usize) -> BBox {
        let mut bbox = self.prim_bboxes[self.prim_indices[start] as usize];
        for &idx in &self.prim_indices[(start + 1)..end] {
            bbox = bbox.union(self.prim_bboxes[idx as usize]);
        }
        bbox
    }

    // Planar data: only X and Y are candidates for the split.
    fn choose_split_axis(&self, start: usize, end: usize) -> u8 {
        let first = self.prim_bboxes[self.prim_indices[start] as usize].center();
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);

        for &idx in &self.prim_indices[(start + 1)..end] {
            let c = self.prim_bboxes[idx as usize].center();
            min_x = min_x.min(c.x);
            max_x = max_x.max(c.x);
            min_y = min_y.min(c.y);
            max_y = max_y.max(c.y);
        }

        if max_x - min_x >= max_y - min_y { 0 } else { 1 }
    }

    /// Visit every primitive whose box intersects `query`. Returning `false`
    /// from `visit` stops the traversal.
    pub(crate) fn query_bbox<F>(&self, query: BBox, mut visit: F)
    where
        F: FnMut(usize) -> bool,
    {
        if self.nodes.is_empty() {
            return;
        }

        let mut stack = Vec::new();
        stack.push(0u32);

        while let Some(node_idx) = stack.pop() {
            let node = self.nodes[node_idx as usize];
            if !node.bbox.intersects(query) {
                continue;
            }

            if node.is_leaf() {
                let start = node.start as usize;
                let end = start + node.count as usize;
                for &prim in &self.prim_indices[start..end] {
                    if !self.prim_bboxes[prim as usize].intersects(query) {
                        continue;
                    }
                    if !visit(prim as usize) {
                        return;
                    }
                }
                continue;
            }

            stack.push(node.left);
            stack.push(node.right);
        }
    }

    /// All primitive pairs `(i, j)` with `i < j` whose boxes intersect,
    /// sorted ascending. Each pair is reported once.
    #[must_use]
    pub(crate) fn overlapping_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for i in 0..self.prim_bboxes.len() {
            self.query_bbox(self.prim_bboxes[i], |j| {
                if j > i {
                    pairs.push((i, j));
                }
                true
            });
        }
        pairs.sort_unstable();
        pairs
    }
}

fn centroid_component(bbox: BBox, axis: u8) -> f64 {
    let c = bbox.center();
    match axis {
        0 => c.x,
        _ => c.y,
    }
}
