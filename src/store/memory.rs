use std::collections::{BTreeMap, BTreeSet};

use super::{CurveHandle, CurveStore, StoreError};
use crate::geom::Polyline;

/// `BTreeMap`-backed store used by tests and by hosts that embed the engine
/// without a drawing database of their own.
///
/// Handles can be locked to simulate a host that refuses writes (read-only
/// layers, references owned by another document).
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    curves: BTreeMap<CurveHandle, Polyline>,
    locked: BTreeSet<CurveHandle>,
    next_id: u64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a curve under a freshly allocated handle.
    pub fn insert(&mut self, curve: Polyline) -> CurveHandle {
        self.next_id += 1;
        let handle = CurveHandle::new(self.next_id);
        self.curves.insert(handle, curve);
        handle
    }

    /// Store a curve under a caller-chosen handle, replacing any previous curve.
    pub fn insert_with_handle(&mut self, handle: CurveHandle, curve: Polyline) {
        self.next_id = self.next_id.max(handle.id());
        self.curves.insert(handle, curve);
    }

    pub fn remove(&mut self, handle: CurveHandle) -> Option<Polyline> {
        self.locked.remove(&handle);
        self.curves.remove(&handle)
    }

    #[must_use]
    pub fn get(&self, handle: CurveHandle) -> Option<&Polyline> {
        self.curves.get(&handle)
    }

    /// All handles in ascending order.
    #[must_use]
    pub fn handles(&self) -> Vec<CurveHandle> {
        self.curves.keys().copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.curves.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    pub fn lock(&mut self, handle: CurveHandle) {
        self.locked.insert(handle);
    }

    pub fn unlock(&mut self, handle: CurveHandle) {
        self.locked.remove(&handle);
    }
}

impl CurveStore for MemoryStore {
    fn curve(&self, handle: CurveHandle) -> Result<Polyline, StoreError> {
        self.curves
            .get(&handle)
            .cloned()
            .ok_or(StoreError::UnknownHandle(handle))
    }

    fn put(&mut self, handle: CurveHandle, curve: Polyline) -> Result<(), StoreError> {
        if self.locked.contains(&handle) {
            return Err(StoreError::Rejected {
                handle,
                reason: "curve is locked".to_string(),
            });
        }
        if curve.vertex_count() < 2 {
            return Err(StoreError::DegenerateCurve {
                handle,
                reason: format!("{} vertices", curve.vertex_count()),
            });
        }
        if curve.vertices().iter().any(|v| !v.point.is_finite()) {
            return Err(StoreError::DegenerateCurve {
                handle,
                reason: "non-finite coordinate".to_string(),
            });
        }
        let slot = self
            .curves
            .get_mut(&handle)
            .ok_or(StoreError::UnknownHandle(handle))?;
        *slot = curve;
        Ok(())
    }

    fn contains(&self, handle: CurveHandle) -> bool {
        self.curves.contains_key(&handle)
    }
}
