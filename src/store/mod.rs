//! Narrow capability interface onto the host's geometric object store.
//!
//! The engine never owns drawing data. It reads curves by [`CurveHandle`],
//! works on owned snapshots, and writes back through [`CurveStore::put`],
//! normally wrapped in a [`Transaction`] so that a failed repair leaves the
//! store untouched.

mod memory;
mod transaction;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geom::{Point3, Polyline};

pub use memory::MemoryStore;
pub use transaction::Transaction;

/// Opaque reference to a curve held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurveHandle(u64);

impl CurveHandle {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CurveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for CurveHandle {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("unknown curve handle {0}")]
    UnknownHandle(CurveHandle),
    #[error("curve {handle} is degenerate: {reason}")]
    DegenerateCurve { handle: CurveHandle, reason: String },
    #[error("store rejected the update of curve {handle}: {reason}")]
    Rejected { handle: CurveHandle, reason: String },
}

/// What the engine needs from the host store. Object safe.
pub trait CurveStore {
    /// Owned copy of the curve's geometry.
    fn curve(&self, handle: CurveHandle) -> Result<Polyline, StoreError>;

    /// Replace the curve's geometry. The only mutation the engine performs.
    fn put(&mut self, handle: CurveHandle, curve: Polyline) -> Result<(), StoreError>;

    fn contains(&self, handle: CurveHandle) -> bool;

    /// Parameter of the point on the curve closest to `point`.
    fn parameter_at_point(&self, handle: CurveHandle, point: Point3) -> Result<f64, StoreError> {
        let curve = self.curve(handle)?;
        curve
            .parameter_at_point(point)
            .map(|(t, _)| t)
            .ok_or_else(|| StoreError::DegenerateCurve {
                handle,
                reason: "curve has no vertices".to_string(),
            })
    }

    fn point_at_parameter(&self, handle: CurveHandle, t: f64) -> Result<Point3, StoreError> {
        let curve = self.curve(handle)?;
        curve
            .point_at_parameter(t)
            .ok_or_else(|| StoreError::DegenerateCurve {
                handle,
                reason: "curve has no vertices".to_string(),
            })
    }
}
