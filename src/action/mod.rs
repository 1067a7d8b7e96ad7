//! Check and fix orchestration.
//!
//! Every [`ActionType`] is registered once in [`HANDLERS`] with its check and,
//! when the issue can be repaired automatically, its fix. [`Action`] drives a
//! single action type through check and fix; [`TopologyChecker`] runs several
//! action types over one shared [`CheckContext`].

mod checks;
mod context;
mod machine;

use serde::Serialize;

use crate::config::ConfigError;
use crate::geom::Tolerance;
use crate::store::{CurveHandle, StoreError, Transaction};
use crate::topology::{ActionType, Cancelled, CheckResult, TopologyDiagnostics};

pub use context::CheckContext;
pub use machine::{Action, ActionState, CheckReport, TopologyChecker};

/// How a fix attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The store was updated.
    Fixed,
    /// The result was stale or the store refused the update. Nothing changed.
    Rejected,
    /// The action type has no automatic repair.
    NoFixMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixOutcome {
    pub status: Status,
    /// Curves written by the fix, ascending. Empty unless `Fixed`.
    pub modified: Vec<CurveHandle>,
}

impl FixOutcome {
    #[must_use]
    pub const fn fixed(modified: Vec<CurveHandle>) -> Self {
        Self {
            status: Status::Fixed,
            modified,
        }
    }

    #[must_use]
    pub const fn rejected() -> Self {
        Self {
            status: Status::Rejected,
            modified: Vec::new(),
        }
    }

    #[must_use]
    pub const fn no_fix_method() -> Self {
        Self {
            status: Status::NoFixMethod,
            modified: Vec::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("selection is empty")]
    EmptySelection,
    #[error("curve {0} is selected more than once")]
    DuplicateHandle(CurveHandle),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),
    #[error("check cancelled")]
    Cancelled,
    #[error("cannot {operation} while the action is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
    #[error("no pending result at index {0}")]
    UnknownResult(usize),
}

impl From<Cancelled> for ActionError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

pub(crate) type CheckFn =
    fn(&CheckContext) -> Result<(Vec<CheckResult>, TopologyDiagnostics), Cancelled>;

/// Applies one result inside an open transaction. Errors abort the fix and
/// the transaction rolls back.
pub(crate) type FixFn =
    fn(&mut Transaction<'_>, &CheckResult, Tolerance) -> Result<(), StoreError>;

/// Check and fix registered for one action type.
pub struct ActionHandler {
    pub action: ActionType,
    pub(crate) check: CheckFn,
    pub(crate) fix: Option<FixFn>,
}

impl ActionHandler {
    #[must_use]
    pub const fn has_fix(&self) -> bool {
        self.fix.is_some()
    }
}

/// Dispatch table, one entry per action type in [`ActionType::ALL`] order.
pub const HANDLERS: &[ActionHandler] = &[
    ActionHandler {
        action: ActionType::SelfIntersection,
        check: checks::check_self_intersection,
        fix: None,
    },
    ActionHandler {
        action: ActionType::Dangling,
        check: checks::check_dangling,
        fix: None,
    },
    ActionHandler {
        action: ActionType::MissingVertex,
        check: checks::check_missing_vertex,
        fix: Some(checks::fix_missing_vertex),
    },
    ActionHandler {
        action: ActionType::Overlap,
        check: checks::check_overlap,
        fix: None,
    },
];

#[must_use]
pub const fn handler(action: ActionType) -> &'static ActionHandler {
    match action {
        ActionType::SelfIntersection => &HANDLERS[0],
        ActionType::Dangling => &HANDLERS[1],
        ActionType::MissingVertex => &HANDLERS[2],
        ActionType::Overlap => &HANDLERS[3],
    }
}

impl ActionType {
    /// Whether results of this type can be repaired by [`Action::fix`].
    #[must_use]
    pub const fn is_fixable(self) -> bool {
        handler(self).has_fix()
    }
}
