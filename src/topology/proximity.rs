//! Spatial proximity index over curve envelopes.
//!
//! Envelopes are grown by the buffer distance and stored in a median-split
//! BVH. Near pairs come out canonical (`a < b`) and sorted, so every pair is
//! visited exactly once by the pairwise passes.

use std::collections::BTreeSet;

use serde::Serialize;

use super::GeometryError;
use crate::geom::{BBox, Bvh};
use crate::store::CurveHandle;

/// Inputs up to this size skip the tree and compare every pair directly.
pub const BRUTE_FORCE_LIMIT: usize = 8;

/// Unordered pair of distinct curves, stored with `a < b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CurvePair {
    pub a: CurveHandle,
    pub b: CurveHandle,
}

impl CurvePair {
    /// Canonical pair, or `None` when both handles are the same curve.
    #[must_use]
    pub fn new(x: CurveHandle, y: CurveHandle) -> Option<Self> {
        match x.cmp(&y) {
            std::cmp::Ordering::Less => Some(Self { a: x, b: y }),
            std::cmp::Ordering::Greater => Some(Self { a: y, b: x }),
            std::cmp::Ordering::Equal => None,
        }
    }

    #[must_use]
    pub fn contains(self, handle: CurveHandle) -> bool {
        self.a == handle || self.b == handle
    }
}

fn validate_buffer(buffer: f64) -> Result<f64, GeometryError> {
    if buffer.is_finite() && buffer >= 0.0 {
        Ok(buffer)
    } else {
        Err(GeometryError::InvalidBuffer(buffer))
    }
}

fn grow(envelopes: &[(CurveHandle, BBox)], buffer: f64) -> Vec<(CurveHandle, BBox)> {
    envelopes
        .iter()
        .map(|(h, bbox)| (*h, bbox.flatten().expand_xy(buffer)))
        .collect()
}

#[derive(Debug, Clone)]
pub struct ProximityIndex {
    entries: Vec<(CurveHandle, BBox)>,
    bvh: Option<Bvh>,
}

impl ProximityIndex {
    pub fn build(envelopes: &[(CurveHandle, BBox)], buffer: f64) -> Result<Self, GeometryError> {
        let buffer = validate_buffer(buffer)?;
        let entries = grow(envelopes, buffer);
        let boxes: Vec<BBox> = entries.iter().map(|(_, bbox)| *bbox).collect();
        let bvh = Bvh::build(&boxes);
        log::debug!(
            "proximity index: {} envelopes, buffer {buffer}",
            entries.len()
        );
        Ok(Self { entries, bvh })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Other curves whose grown envelopes touch the envelope of `handle`,
    /// ascending. Unknown handles have no neighbours.
    #[must_use]
    pub fn neighbours(&self, handle: CurveHandle) -> Vec<CurveHandle> {
        let Some(bvh) = &self.bvh else {
            return Vec::new();
        };
        let mut found = BTreeSet::new();
        for (_, query) in self.entries.iter().filter(|(h, _)| *h == handle) {
            bvh.query_bbox(*query, |idx| {
                let other = self.entries[idx].0;
                if other != handle {
                    found.insert(other);
                }
                true
            });
        }
        found.into_iter().collect()
    }

    /// Every near pair exactly once, sorted.
    #[must_use]
    pub fn candidate_pairs(&self) -> Vec<CurvePair> {
        if self.entries.len() <= BRUTE_FORCE_LIMIT {
            return pairs_of(&self.entries);
        }
        let Some(bvh) = &self.bvh else {
            return Vec::new();
        };
        let pairs: BTreeSet<CurvePair> = bvh
            .overlapping_pairs()
            .into_iter()
            .filter_map(|(i, j)| CurvePair::new(self.entries[i].0, self.entries[j].0))
            .collect();
        log::debug!("proximity index: {} candidate pairs", pairs.len());
        pairs.into_iter().collect()
    }
}

fn pairs_of(entries: &[(CurveHandle, BBox)]) -> Vec<CurvePair> {
    let mut pairs = BTreeSet::new();
    for (i, (ha, ba)) in entries.iter().enumerate() {
        for (hb, bb) in &entries[i + 1..] {
            if ba.intersects(*bb) {
                if let Some(pair) = CurvePair::new(*ha, *hb) {
                    pairs.insert(pair);
                }
            }
        }
    }
    pairs.into_iter().collect()
}

/// O(n^2) reference for [`ProximityIndex::candidate_pairs`].
pub fn brute_force_pairs(
    envelopes: &[(CurveHandle, BBox)],
    buffer: f64,
) -> Result<Vec<CurvePair>, GeometryError> {
    let buffer = validate_buffer(buffer)?;
    Ok(pairs_of(&grow(envelopes, buffer)))
}
