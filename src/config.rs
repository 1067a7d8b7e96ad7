//! Engine configuration shared by every check and fix.

use serde::{Deserialize, Serialize};

use crate::geom::Tolerance;
use crate::topology::{DanglingOptions, OverlapOptions};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("tolerance must be positive and finite, got {0}")]
    InvalidTolerance(f64),
    #[error("buffer distance must be positive and finite, got {0}")]
    InvalidBuffer(f64),
    #[error("gap tolerance must be non-negative and finite, got {0}")]
    InvalidGap(f64),
    #[error("max_arc_segments must be at least 1")]
    InvalidArcSegments,
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tolerances and limits of one check run.
///
/// `tolerance` is the snap distance used by every geometric predicate.
/// `buffer_distance` widens curve envelopes when looking for candidate pairs.
/// `gap_tolerance` bridges small openings when closing regions and noding the
/// dangle network; it falls back to `buffer_distance` when unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    pub tolerance: f64,
    pub buffer_distance: f64,
    pub gap_tolerance: Option<f64>,
    pub max_arc_segments: usize,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TopologyConfig {
    pub const DEFAULT_TOLERANCE: f64 = 1e-6;
    pub const DEFAULT_BUFFER_DISTANCE: f64 = 1e-3;
    pub const DEFAULT_MAX_ARC_SEGMENTS: usize = 64;

    #[must_use]
    pub const fn new() -> Self {
        Self {
            tolerance: Self::DEFAULT_TOLERANCE,
            buffer_distance: Self::DEFAULT_BUFFER_DISTANCE,
            gap_tolerance: None,
            max_arc_segments: Self::DEFAULT_MAX_ARC_SEGMENTS,
        }
    }

    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    #[must_use]
    pub const fn with_buffer_distance(mut self, buffer: f64) -> Self {
        self.buffer_distance = buffer;
        self
    }

    #[must_use]
    pub const fn with_gap_tolerance(mut self, gap: f64) -> Self {
        self.gap_tolerance = Some(gap);
        self
    }

    #[must_use]
    pub const fn with_max_arc_segments(mut self, pieces: usize) -> Self {
        self.max_arc_segments = pieces;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(ConfigError::InvalidTolerance(self.tolerance));
        }
        if !self.buffer_distance.is_finite() || self.buffer_distance <= 0.0 {
            return Err(ConfigError::InvalidBuffer(self.buffer_distance));
        }
        if let Some(gap) = self.gap_tolerance {
            if !gap.is_finite() || gap < 0.0 {
                return Err(ConfigError::InvalidGap(gap));
            }
        }
        if self.max_arc_segments == 0 {
            return Err(ConfigError::InvalidArcSegments);
        }
        Ok(())
    }

    /// Parse and validate. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[must_use]
    pub const fn snap(&self) -> Tolerance {
        Tolerance::new(self.tolerance)
    }

    #[must_use]
    pub fn gap(&self) -> f64 {
        self.gap_tolerance.unwrap_or(self.buffer_distance)
    }

    #[must_use]
    pub fn overlap_options(&self) -> OverlapOptions {
        OverlapOptions::new(self.snap())
            .with_gap_tolerance(self.gap())
            .with_max_arc_segments(self.max_arc_segments)
    }

    #[must_use]
    pub fn dangling_options(&self) -> DanglingOptions {
        DanglingOptions::new(self.snap())
            .with_snap_distance(self.gap())
            .with_max_arc_segments(self.max_arc_segments)
    }
}
