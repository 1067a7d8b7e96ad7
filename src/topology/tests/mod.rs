mod test_dangles_basic;
mod test_nodes_basic;
mod test_self_intersection_basic;

use std::collections::BTreeMap;

use crate::geom::Polyline;
use crate::store::CurveHandle;

/// Snapshot with handles `1..=n` in input order.
fn snapshot(curves: Vec<Polyline>) -> (BTreeMap<CurveHandle, Polyline>, Vec<CurveHandle>) {
    let mut map = BTreeMap::new();
    let mut handles = Vec::new();
    for (i, curve) in curves.into_iter().enumerate() {
        let handle = CurveHandle::new(i as u64 + 1);
        map.insert(handle, curve);
        handles.push(handle);
    }
    (map, handles)
}
