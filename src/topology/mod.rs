//! Topology validation passes over a snapshot of planar curves.
//!
//! Every pass works on owned geometry (`BTreeMap<CurveHandle, Polyline>`)
//! taken from the store, threads an explicit [`Tolerance`](crate::geom::Tolerance)
//! through its predicates and reports soft failures as
//! [`TopologyDiagnostics`] instead of aborting the batch.

pub mod dangles;
pub mod diagnostics;
pub mod issue;
pub mod nodes;
pub mod overlap;
pub mod proximity;
pub mod self_intersection;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::store::CurveHandle;

pub use dangles::{DanglingOptions, DanglingReport, find_dangles};
pub use diagnostics::{Diagnostic, DiagnosticScope, TopologyDiagnostics};
pub use issue::{ActionType, CheckResult, Region, RegionPolygon, TopologyIssue};
pub use nodes::{NodeMode, NodeResolution, PROBE_FRACTION, diagnose_nodes, repair_nodes, resolve_nodes};
pub use overlap::{OverlapOptions, PairOverlap, curve_region, find_overlaps, overlap_region};
pub use proximity::{CurvePair, ProximityIndex, brute_force_pairs};
pub use self_intersection::{find_self_intersections, self_intersections};

/// Failure of one curve, pair or the network build. Recorded as a
/// [`Diagnostic`] by the passes; never aborts a batch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("buffer distance must be finite and non-negative, got {0}")]
    InvalidBuffer(f64),
    #[error("curve {0} is not in the snapshot")]
    MissingCurve(CurveHandle),
    #[error("curve {0} has no segments")]
    EmptyCurve(CurveHandle),
    #[error("region of curve {handle} is degenerate: {reason}")]
    DegenerateRegion { handle: CurveHandle, reason: String },
    #[error("boolean intersection failed: {0}")]
    BooleanFailed(String),
}

/// Raised by a pass that observed its [`CancelFlag`]. Partial results are
/// dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("topology pass cancelled")]
pub struct Cancelled;

/// Shared cancellation request, polled between curve and pair iterations.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests;
