use std::collections::{BTreeMap, BTreeSet};

use crate::config::{ConfigError, TopologyConfig};
use crate::geom::{BBox, Polyline, Tolerance};
use crate::store::{CurveHandle, CurveStore};
use crate::topology::{CancelFlag, CurvePair, GeometryError, ProximityIndex, TopologyDiagnostics};

use super::{ActionError, ValidationError};

/// Read-only snapshot of a selection, shared by every check of one run.
///
/// Holds owned copies of the selected curves and the candidate pairs of the
/// proximity index. Curves the store cannot resolve, or that have no segment,
/// are left out and reported in [`CheckContext::diagnostics`].
#[derive(Debug, Clone)]
pub struct CheckContext {
    config: TopologyConfig,
    curves: BTreeMap<CurveHandle, Polyline>,
    handles: Vec<CurveHandle>,
    pairs: Vec<CurvePair>,
    diagnostics: TopologyDiagnostics,
    cancel: CancelFlag,
}

impl CheckContext {
    pub fn build(
        store: &dyn CurveStore,
        selection: &[CurveHandle],
        config: &TopologyConfig,
    ) -> Result<Self, ActionError> {
        Self::build_with_cancel(store, selection, config, CancelFlag::new())
    }

    pub fn build_with_cancel(
        store: &dyn CurveStore,
        selection: &[CurveHandle],
        config: &TopologyConfig,
        cancel: CancelFlag,
    ) -> Result<Self, ActionError> {
        validate_selection(selection)?;
        config.validate().map_err(ValidationError::Config)?;

        let mut diagnostics = TopologyDiagnostics {
            curve_count: selection.len(),
            ..Default::default()
        };
        let mut curves = BTreeMap::new();
        for &handle in selection {
            cancel.check()?;
            match store.curve(handle) {
                Ok(curve) if curve.segment_count() == 0 => {
                    diagnostics.add_curve(handle, GeometryError::EmptyCurve(handle).to_string());
                }
                Ok(curve) if curve.points().iter().any(|p| !p.is_finite()) => {
                    diagnostics.add_curve(handle, "curve has non-finite coordinates");
                }
                Ok(curve) => {
                    curves.insert(handle, curve);
                }
                Err(err) => diagnostics.add_curve(handle, err.to_string()),
            }
        }

        let envelopes: Vec<(CurveHandle, BBox)> = curves
            .iter()
            .filter_map(|(handle, curve)| curve.bbox().map(|bbox| (*handle, bbox)))
            .collect();
        let index = ProximityIndex::build(&envelopes, config.buffer_distance).map_err(|_| {
            ValidationError::Config(ConfigError::InvalidBuffer(config.buffer_distance))
        })?;
        let pairs = index.candidate_pairs();
        cancel.check()?;

        diagnostics.pair_count = pairs.len();
        log::debug!(
            "check context: {} of {} curves resolved, {} candidate pairs",
            curves.len(),
            selection.len(),
            pairs.len()
        );

        Ok(Self {
            config: config.clone(),
            handles: curves.keys().copied().collect(),
            curves,
            pairs,
            diagnostics,
            cancel,
        })
    }

    #[must_use]
    pub fn config(&self) -> &TopologyConfig {
        &self.config
    }

    #[must_use]
    pub fn tolerance(&self) -> Tolerance {
        self.config.snap()
    }

    #[must_use]
    pub fn curves(&self) -> &BTreeMap<CurveHandle, Polyline> {
        &self.curves
    }

    /// Resolved handles, ascending.
    #[must_use]
    pub fn handles(&self) -> &[CurveHandle] {
        &self.handles
    }

    #[must_use]
    pub fn pairs(&self) -> &[CurvePair] {
        &self.pairs
    }

    /// Problems met while building the snapshot.
    #[must_use]
    pub fn diagnostics(&self) -> &TopologyDiagnostics {
        &self.diagnostics
    }

    #[must_use]
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }
}

fn validate_selection(selection: &[CurveHandle]) -> Result<(), ValidationError> {
    if selection.is_empty() {
        return Err(ValidationError::EmptySelection);
    }
    let mut seen = BTreeSet::new();
    for &handle in selection {
        if !seen.insert(handle) {
            return Err(ValidationError::DuplicateHandle(handle));
        }
    }
    Ok(())
}
