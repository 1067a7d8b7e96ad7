use super::{CurveHandle, CurveStore, StoreError};
use crate::geom::{Point3, Polyline, Tolerance, VertexInsertion};

/// All-or-nothing batch of curve writes.
///
/// The first write to each curve snapshots its previous geometry. Dropping the
/// transaction without [`Transaction::commit`] restores every snapshot in
/// reverse order.
pub struct Transaction<'a> {
    store: &'a mut dyn CurveStore,
    snapshots: Vec<(CurveHandle, Polyline)>,
    finished: bool,
}

impl<'a> Transaction<'a> {
    pub fn begin(store: &'a mut dyn CurveStore) -> Self {
        Self {
            store,
            snapshots: Vec::new(),
            finished: false,
        }
    }

    pub fn curve(&self, handle: CurveHandle) -> Result<Polyline, StoreError> {
        self.store.curve(handle)
    }

    #[must_use]
    pub fn contains(&self, handle: CurveHandle) -> bool {
        self.store.contains(handle)
    }

    pub fn put(&mut self, handle: CurveHandle, curve: Polyline) -> Result<(), StoreError> {
        let fresh = !self.snapshots.iter().any(|(h, _)| *h == handle);
        if fresh {
            let previous = self.store.curve(handle)?;
            self.snapshots.push((handle, previous));
        }
        let result = self.store.put(handle, curve);
        if result.is_err() && fresh {
            self.snapshots.pop();
        }
        result
    }

    /// Insert a vertex at `point` on the curve, splitting the enclosing
    /// segment. A vertex already within `tol` of `point` is reused and the
    /// store is not written.
    pub fn insert_vertex(
        &mut self,
        handle: CurveHandle,
        point: Point3,
        tol: Tolerance,
    ) -> Result<VertexInsertion, StoreError> {
        let mut curve = self.store.curve(handle)?;
        match curve.insert_vertex(point, tol) {
            Some(VertexInsertion::Existing(index)) => Ok(VertexInsertion::Existing(index)),
            Some(inserted) => {
                self.put(handle, curve)?;
                Ok(inserted)
            }
            None => Err(StoreError::Rejected {
                handle,
                reason: format!("point ({}, {}) is not on the curve", point.x, point.y),
            }),
        }
    }

    /// Handles written so far, ascending.
    #[must_use]
    pub fn modified(&self) -> Vec<CurveHandle> {
        let mut handles: Vec<CurveHandle> = self.snapshots.iter().map(|(h, _)| *h).collect();
        handles.sort_unstable();
        handles
    }

    /// Keep all writes. Returns the modified handles.
    pub fn commit(mut self) -> Vec<CurveHandle> {
        self.finished = true;
        self.modified()
    }

    /// Undo all writes now.
    pub fn rollback(mut self) {
        self.restore();
        self.finished = true;
    }

    fn restore(&mut self) {
        while let Some((handle, curve)) = self.snapshots.pop() {
            if let Err(err) = self.store.put(handle, curve) {
                log::warn!("rollback could not restore curve {handle}: {err}");
            }
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.restore();
        }
    }
}
