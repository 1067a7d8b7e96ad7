use std::time::Instant;

use serde::Serialize;

use crate::config::TopologyConfig;
use crate::geom::Tolerance;
use crate::store::{CurveHandle, CurveStore, Transaction};
use crate::topology::{ActionType, CancelFlag, CheckResult, TopologyDiagnostics};

use super::{ActionError, CheckContext, FixOutcome, Status, handler};

/// Lifecycle of one [`Action`].
///
/// `Idle -> Checking -> Checked -> Fixing -> Finished -> Idle`. `Checking` and
/// `Fixing` only last for the duration of the call. A new check may start from
/// `Checked` or `Finished` and drops the pending results first;
/// [`Action::reset`] returns to `Idle` from anywhere.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ActionState {
    #[default]
    Idle,
    Checking,
    Checked {
        results: Vec<CheckResult>,
    },
    Fixing,
    Finished {
        status: Status,
        remaining: Vec<CheckResult>,
    },
}

impl ActionState {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Checking => "checking",
            Self::Checked { .. } => "checked",
            Self::Fixing => "fixing",
            Self::Finished { .. } => "finished",
        }
    }
}

/// Drives one action type through check and fix.
///
/// Results stay pending until they are fixed or the action is reset. Indices
/// passed to [`Action::fix`] refer to [`Action::results`] at the time of the
/// call; a fixed result is removed, so later indices shift down by one.
#[derive(Debug, Clone)]
pub struct Action {
    action: ActionType,
    state: ActionState,
    tolerance: Tolerance,
    diagnostics: TopologyDiagnostics,
}

impl Action {
    #[must_use]
    pub fn new(action: ActionType) -> Self {
        Self {
            action,
            state: ActionState::Idle,
            tolerance: Tolerance::DEFAULT,
            diagnostics: TopologyDiagnostics::new(),
        }
    }

    #[must_use]
    pub const fn action_type(&self) -> ActionType {
        self.action
    }

    #[must_use]
    pub const fn state(&self) -> &ActionState {
        &self.state
    }

    /// Pending results, empty unless checked.
    #[must_use]
    pub fn results(&self) -> &[CheckResult] {
        match &self.state {
            ActionState::Checked { results } => results,
            ActionState::Finished { remaining, .. } => remaining,
            _ => &[],
        }
    }

    /// Soft failures of the last check.
    #[must_use]
    pub const fn diagnostics(&self) -> &TopologyDiagnostics {
        &self.diagnostics
    }

    /// Validate the request, snapshot the selection and run the check.
    /// The store is only read.
    pub fn check(
        &mut self,
        store: &dyn CurveStore,
        selection: &[CurveHandle],
        config: &TopologyConfig,
    ) -> Result<&[CheckResult], ActionError> {
        self.check_with_cancel(store, selection, config, CancelFlag::new())
    }

    pub fn check_with_cancel(
        &mut self,
        store: &dyn CurveStore,
        selection: &[CurveHandle],
        config: &TopologyConfig,
        cancel: CancelFlag,
    ) -> Result<&[CheckResult], ActionError> {
        self.ensure_checkable()?;
        let ctx = CheckContext::build_with_cancel(store, selection, config, cancel)?;
        self.check_context(&ctx)
    }

    /// Run the check on an existing snapshot. Pending results of an earlier
    /// check are dropped.
    pub fn check_context(&mut self, ctx: &CheckContext) -> Result<&[CheckResult], ActionError> {
        self.ensure_checkable()?;
        self.reset();
        self.state = ActionState::Checking;
        self.tolerance = ctx.tolerance();

        match (handler(self.action).check)(ctx) {
            Ok((results, diagnostics)) => {
                let mut merged = ctx.diagnostics().clone();
                merged.merge(&diagnostics);
                log::debug!("{} check: {} results, {}", self.action, results.len(), merged.summary());
                self.diagnostics = merged;
                self.state = ActionState::Checked { results };
                Ok(self.results())
            }
            Err(cancelled) => {
                self.state = ActionState::Idle;
                Err(cancelled.into())
            }
        }
    }

    /// Resolve the pending result at `index`.
    ///
    /// Action types without a fix report [`Status::NoFixMethod`] before the
    /// store is touched. A result whose curves are gone, or whose marked points
    /// no longer lie on them, is [`Status::Rejected`]. Every write goes through
    /// one [`Transaction`]; a store failure rolls it back and is also reported
    /// as `Rejected`.
    pub fn fix(&mut self, store: &mut dyn CurveStore, index: usize) -> Result<FixOutcome, ActionError> {
        let pending = match &self.state {
            ActionState::Checked { results } => results.len(),
            ActionState::Finished { remaining, .. } => remaining.len(),
            other => {
                return Err(ActionError::InvalidState {
                    operation: "fix",
                    state: other.name(),
                });
            }
        };
        if index >= pending {
            return Err(ActionError::UnknownResult(index));
        }

        let mut results = match std::mem::replace(&mut self.state, ActionState::Fixing) {
            ActionState::Checked { results } | ActionState::Finished { remaining: results, .. } => {
                results
            }
            _ => Vec::new(),
        };
        let outcome = self.apply(store, &results[index]);
        if outcome.status == Status::Fixed {
            results.remove(index);
        }
        self.state = ActionState::Finished {
            status: outcome.status,
            remaining: results,
        };
        Ok(outcome)
    }

    /// Try every pending result once, in order.
    pub fn fix_all(&mut self, store: &mut dyn CurveStore) -> Result<Vec<FixOutcome>, ActionError> {
        let mut outcomes = Vec::new();
        let mut index = 0;
        while index < self.results().len() {
            let outcome = self.fix(&mut *store, index)?;
            if outcome.status != Status::Fixed {
                index += 1;
            }
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Drop all results and return to `Idle`.
    pub fn reset(&mut self) {
        self.state = ActionState::Idle;
        self.diagnostics = TopologyDiagnostics::new();
    }

    fn ensure_checkable(&self) -> Result<(), ActionError> {
        match self.state {
            ActionState::Idle | ActionState::Checked { .. } | ActionState::Finished { .. } => Ok(()),
            ref other => Err(ActionError::InvalidState {
                operation: "check",
                state: other.name(),
            }),
        }
    }

    fn apply(&self, store: &mut dyn CurveStore, result: &CheckResult) -> FixOutcome {
        let Some(fix) = handler(self.action).fix else {
            return FixOutcome::no_fix_method();
        };
        if let Some(reason) = stale_reason(&*store, result, self.tolerance) {
            log::warn!("{} fix rejected: {reason}", self.action);
            return FixOutcome::rejected();
        }

        let mut tx = Transaction::begin(&mut *store);
        match fix(&mut tx, result, self.tolerance) {
            Ok(()) => {
                let modified = tx.commit();
                log::info!("{} fixed, {} curves modified", self.action, modified.len());
                FixOutcome::fixed(modified)
            }
            Err(err) => {
                tx.rollback();
                log::warn!("{} fix rolled back: {err}", self.action);
                FixOutcome::rejected()
            }
        }
    }
}

/// Why a result no longer matches the store, if it does not.
fn stale_reason(store: &dyn CurveStore, result: &CheckResult, tol: Tolerance) -> Option<String> {
    for &handle in &result.source_curves {
        let curve = match store.curve(handle) {
            Ok(curve) => curve,
            Err(err) => return Some(err.to_string()),
        };
        for p in &result.mark_points {
            match curve.distance_to_point(*p) {
                Some(d) if d <= tol.eps => {}
                _ => return Some(format!("point ({}, {}) is no longer on curve {handle}", p.x, p.y)),
            }
        }
    }
    None
}

/// Results of several action types over one selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CheckReport {
    /// Grouped by action type in [`ActionType::ALL`] order.
    pub results: Vec<CheckResult>,
    pub diagnostics: TopologyDiagnostics,
}

impl CheckReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.results.is_empty()
    }

    pub fn by_action(&self, action: ActionType) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(move |r| r.action == action)
    }
}

/// Runs a set of checks over one shared snapshot.
#[derive(Debug, Clone)]
pub struct TopologyChecker {
    actions: Vec<ActionType>,
    config: TopologyConfig,
    cancel: CancelFlag,
}

impl TopologyChecker {
    /// Checker running every action type.
    #[must_use]
    pub fn new(config: TopologyConfig) -> Self {
        Self {
            actions: ActionType::ALL.to_vec(),
            config,
            cancel: CancelFlag::new(),
        }
    }

    #[must_use]
    pub fn with_actions(mut self, actions: &[ActionType]) -> Self {
        let mut actions = actions.to_vec();
        actions.sort_unstable();
        actions.dedup();
        self.actions = actions;
        self
    }

    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Flag observed by every run of this checker.
    #[must_use]
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    #[must_use]
    pub fn actions(&self) -> &[ActionType] {
        &self.actions
    }

    #[must_use]
    pub const fn config(&self) -> &TopologyConfig {
        &self.config
    }

    pub fn check(
        &self,
        store: &dyn CurveStore,
        selection: &[CurveHandle],
    ) -> Result<CheckReport, ActionError> {
        let start = Instant::now();
        let ctx = CheckContext::build_with_cancel(store, selection, &self.config, self.cancel.clone())?;
        log::debug!("snapshot built in {:?}", start.elapsed());

        let mut report = CheckReport {
            results: Vec::new(),
            diagnostics: ctx.diagnostics().clone(),
        };
        for &action in &self.actions {
            let phase = Instant::now();
            let (results, diagnostics) = (handler(action).check)(&ctx)?;
            log::debug!("{action} pass: {} results in {:?}", results.len(), phase.elapsed());
            report.results.extend(results);
            report.diagnostics.merge(&diagnostics);
        }
        Ok(report)
    }
}
