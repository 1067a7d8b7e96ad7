//! Soft diagnostics for topology passes.
//!
//! A pass never aborts because one curve or one pair misbehaves. Instead the
//! failure is recorded here, logged at `warn` level, and the pass continues
//! with the remaining units. Callers receive the diagnostics next to the
//! valid results.
//!
//! # Example
//!
//! ```ignore
//! use topo_engine::topology::{find_self_intersections, CancelFlag};
//!
//! let (hits, diagnostics) =
//!     find_self_intersections(&curves, &handles, tol, &CancelFlag::new())?;
//!
//! if !diagnostics.is_clean() {
//!     for entry in &diagnostics.entries {
//!         eprintln!("{entry}");
//!     }
//! }
//! ```

use std::fmt;

use serde::Serialize;

use crate::store::CurveHandle;

/// What a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticScope {
    /// A single curve (bad geometry, unreadable handle, degenerate region).
    Curve(CurveHandle),
    /// A candidate pair (failed boolean operation).
    Pair(CurveHandle, CurveHandle),
    /// The whole network built by the dangling detector.
    Network,
}

impl fmt::Display for DiagnosticScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Curve(h) => write!(f, "curve {h}"),
            Self::Pair(a, b) => write!(f, "pair ({a}, {b})"),
            Self::Network => write!(f, "network"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub scope: DiagnosticScope,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.scope, self.message)
    }
}

/// Counters and soft failures collected while checking or fixing.
///
/// # Counters
///
/// - `curve_count`: curves that took part in the pass
/// - `pair_count`: candidate pairs handed over by the proximity index
/// - `inserted_vertex_count`: vertices added by node repair
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct TopologyDiagnostics {
    pub curve_count: usize,
    pub pair_count: usize,
    pub inserted_vertex_count: usize,

    /// Curves and pairs that were skipped, with the reason.
    pub entries: Vec<Diagnostic>,
}

impl TopologyDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if nothing was skipped.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a soft failure and log it.
    pub fn add(&mut self, scope: DiagnosticScope, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{scope}: {message}");
        self.entries.push(Diagnostic { scope, message });
    }

    pub fn add_curve(&mut self, handle: CurveHandle, message: impl Into<String>) {
        self.add(DiagnosticScope::Curve(handle), message);
    }

    pub fn add_pair(&mut self, a: CurveHandle, b: CurveHandle, message: impl Into<String>) {
        self.add(DiagnosticScope::Pair(a, b), message);
    }

    pub fn add_network(&mut self, message: impl Into<String>) {
        self.add(DiagnosticScope::Network, message);
    }

    /// Entries concerning `handle`, either alone or as part of a pair.
    pub fn for_curve(&self, handle: CurveHandle) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| match d.scope {
            DiagnosticScope::Curve(h) => h == handle,
            DiagnosticScope::Pair(a, b) => a == handle || b == handle,
            DiagnosticScope::Network => false,
        })
    }

    /// Passes of one check share a selection, so curve and pair counts keep
    /// the larger value. Insertions are summed and entries appended without
    /// being logged again.
    pub fn merge(&mut self, other: &TopologyDiagnostics) {
        self.curve_count = self.curve_count.max(other.curve_count);
        self.pair_count = self.pair_count.max(other.pair_count);
        self.inserted_vertex_count += other.inserted_vertex_count;
        self.entries.extend(other.entries.iter().cloned());
    }

    /// Short summary for logging.
    ///
    /// Format: `"curves:{n} pairs:{m} [issues...]"`
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = vec![format!(
            "curves:{} pairs:{}",
            self.curve_count, self.pair_count
        )];
        if self.inserted_vertex_count > 0 {
            parts.push(format!("inserted:{}", self.inserted_vertex_count));
        }
        if !self.entries.is_empty() {
            parts.push(format!("skipped:{}", self.entries.len()));
        }
        parts.join(" ")
    }
}

impl fmt::Display for TopologyDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Topology Diagnostics:")?;
        writeln!(f, "  Curves: {}", self.curve_count)?;
        writeln!(f, "  Pairs: {}", self.pair_count)?;
        if self.inserted_vertex_count > 0 {
            writeln!(f, "  Inserted vertices: {}", self.inserted_vertex_count)?;
        }
        if !self.entries.is_empty() {
            writeln!(f, "  Skipped:")?;
            for entry in &self.entries {
                writeln!(f, "    - {entry}")?;
            }
        }
        let status = if self.is_clean() { "CLEAN" } else { "PARTIAL" };
        writeln!(f, "  Status: {status}")
    }
}
