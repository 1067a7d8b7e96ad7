use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geom::Point3;
use crate::store::CurveHandle;

/// The four topology checks. Each maps to a check and an optional fix in the
/// action dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    SelfIntersection,
    Dangling,
    MissingVertex,
    Overlap,
}

impl ActionType {
    pub const ALL: [Self; 4] = [
        Self::SelfIntersection,
        Self::Dangling,
        Self::MissingVertex,
        Self::Overlap,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SelfIntersection => "self_intersection",
            Self::Dangling => "dangling",
            Self::MissingVertex => "missing_vertex",
            Self::Overlap => "overlap",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One polygon of an overlap region. Rings do not repeat their first point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionPolygon {
    pub exterior: Vec<Point3>,
    pub holes: Vec<Vec<Point3>>,
}

/// Shared area of two closed curves, kept for highlighting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Region {
    pub polygons: Vec<RegionPolygon>,
    pub area: f64,
}

impl Region {
    /// Every ring of the region, exteriors first within each polygon.
    #[must_use]
    pub fn outlines(&self) -> Vec<Vec<Point3>> {
        self.polygons
            .iter()
            .flat_map(|p| std::iter::once(p.exterior.clone()).chain(p.holes.iter().cloned()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopologyIssue {
    SelfIntersection {
        points: Vec<Point3>,
    },
    Dangling {
        points: Vec<Point3>,
    },
    MissingVertex {
        points: Vec<Point3>,
    },
    Overlap {
        curve_a: CurveHandle,
        curve_b: CurveHandle,
        region: Region,
    },
}

impl TopologyIssue {
    #[must_use]
    pub const fn action_type(&self) -> ActionType {
        match self {
            Self::SelfIntersection { .. } => ActionType::SelfIntersection,
            Self::Dangling { .. } => ActionType::Dangling,
            Self::MissingVertex { .. } => ActionType::MissingVertex,
            Self::Overlap { .. } => ActionType::Overlap,
        }
    }

    /// Points that locate the issue on the drawing. Overlaps are located by
    /// their region instead and report none.
    #[must_use]
    pub fn points(&self) -> &[Point3] {
        match self {
            Self::SelfIntersection { points }
            | Self::Dangling { points }
            | Self::MissingVertex { points } => points,
            Self::Overlap { .. } => &[],
        }
    }
}

/// A detected issue, ready for presentation and for a later fix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub action: ActionType,
    pub issue: TopologyIssue,
    /// Curves the issue was found on; always a subset of the selection.
    pub source_curves: Vec<CurveHandle>,
    pub mark_points: Vec<Point3>,
    pub fixable: bool,
    pub preview: Option<Vec<Vec<Point3>>>,
}

impl CheckResult {
    #[must_use]
    pub fn new(issue: TopologyIssue, mut source_curves: Vec<CurveHandle>, fixable: bool) -> Self {
        source_curves.sort_unstable();
        source_curves.dedup();
        let preview = match &issue {
            TopologyIssue::Overlap { region, .. } => Some(region.outlines()),
            _ => None,
        };
        Self {
            action: issue.action_type(),
            mark_points: issue.points().to_vec(),
            issue,
            source_curves,
            fixable,
            preview,
        }
    }

    #[must_use]
    pub fn with_preview(mut self, preview: Vec<Vec<Point3>>) -> Self {
        self.preview = Some(preview);
        self
    }
}
