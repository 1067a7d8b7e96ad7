//! Check and fix functions registered in the dispatch table.

use crate::geom::Tolerance;
use crate::store::{StoreError, Transaction};
use crate::topology::{
    Cancelled, CheckResult, TopologyDiagnostics, TopologyIssue, diagnose_nodes, find_dangles,
    find_overlaps, find_self_intersections,
};

use super::CheckContext;

type Checked = Result<(Vec<CheckResult>, TopologyDiagnostics), Cancelled>;

/// One result per curve that crosses itself.
pub(super) fn check_self_intersection(ctx: &CheckContext) -> Checked {
    let (found, diagnostics) = find_self_intersections(
        ctx.curves(),
        ctx.handles(),
        ctx.tolerance(),
        ctx.cancel_flag(),
    )?;
    let results = found
        .into_iter()
        .map(|(handle, points)| {
            CheckResult::new(TopologyIssue::SelfIntersection { points }, vec![handle], false)
        })
        .collect();
    Ok((results, diagnostics))
}

/// One result per curve owning free ends, previewed by the dangling chains.
pub(super) fn check_dangling(ctx: &CheckContext) -> Checked {
    let options = ctx.config().dangling_options();
    let (mut report, diagnostics) =
        find_dangles(ctx.curves(), ctx.handles(), &options, ctx.cancel_flag())?;

    let results = std::mem::take(&mut report.dangling)
        .into_iter()
        .map(|(handle, points)| {
            let preview = report
                .dangling_edges
                .get(&handle)
                .map(|edges| edges.iter().map(|[a, b]| vec![*a, *b]).collect())
                .unwrap_or_default();
            CheckResult::new(TopologyIssue::Dangling { points }, vec![handle], false)
                .with_preview(preview)
        })
        .collect();
    Ok((results, diagnostics))
}

/// One result per junction point, listing every curve without a vertex
/// there.
pub(super) fn check_missing_vertex(ctx: &CheckContext) -> Checked {
    let tol = ctx.tolerance();
    let (resolution, diagnostics) =
        diagnose_nodes(ctx.curves(), ctx.pairs(), tol, ctx.cancel_flag())?;
    let results = resolution
        .junctions(tol)
        .into_iter()
        .map(|(point, curves)| {
            CheckResult::new(
                TopologyIssue::MissingVertex {
                    points: vec![point],
                },
                curves,
                true,
            )
        })
        .collect();
    Ok((results, diagnostics))
}

/// One result per pair of closed curves sharing area.
pub(super) fn check_overlap(ctx: &CheckContext) -> Checked {
    let options = ctx.config().overlap_options();
    let (overlaps, diagnostics) =
        find_overlaps(ctx.curves(), ctx.pairs(), &options, ctx.cancel_flag())?;
    let results = overlaps
        .into_iter()
        .map(|overlap| {
            let (a, b) = (overlap.pair.a, overlap.pair.b);
            CheckResult::new(
                TopologyIssue::Overlap {
                    curve_a: a,
                    curve_b: b,
                    region: overlap.region,
                },
                vec![a, b],
                false,
            )
        })
        .collect();
    Ok((results, diagnostics))
}

/// Insert the junction vertex into every source curve that lacks it.
pub(super) fn fix_missing_vertex(
    tx: &mut Transaction<'_>,
    result: &CheckResult,
    tol: Tolerance,
) -> Result<(), StoreError> {
    for &point in &result.mark_points {
        for &handle in &result.source_curves {
            tx.insert_vertex(handle, point, tol)?;
        }
    }
    Ok(())
}
