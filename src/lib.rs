#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Topology validation and repair for planar line and polygon drawings.
//!
//! Curves live in a host store behind [`store::CurveStore`]. A check takes a
//! read-only snapshot of the selected curves, finds candidate pairs through a
//! buffered proximity index and reports self-intersections, dangling ends,
//! missing junction vertices and overlapping regions as [`CheckResult`]s.
//! Missing vertices can be repaired; every repair runs inside a
//! [`store::Transaction`] and rolls back on failure.
//!
//! The crate logs through the `log` facade and never installs a logger.

pub mod action;
pub mod config;
pub mod geom;
pub mod store;
pub mod topology;

pub use action::{
    Action, ActionError, ActionState, CheckContext, CheckReport, FixOutcome, Status,
    TopologyChecker, ValidationError,
};
pub use config::{ConfigError, TopologyConfig};
pub use geom::{Point3, Polyline, Tolerance, Vertex};
pub use store::{CurveHandle, CurveStore, MemoryStore, StoreError, Transaction};
pub use topology::{
    ActionType, CancelFlag, CheckResult, Region, TopologyDiagnostics, TopologyIssue,
};

/// Size the global rayon pool used by the parallel passes. Defaults to the
/// available parallelism.
#[cfg(feature = "parallel")]
pub fn initialize_parallel(worker_count: Option<usize>) -> Result<(), rayon::ThreadPoolBuildError> {
    let threads = worker_count
        .map(|count| count.max(1))
        .or_else(|| {
            std::thread::available_parallelism()
                .map(|value| value.get())
                .ok()
        })
        .unwrap_or(1);

    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
}
