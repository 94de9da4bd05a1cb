//! Purging of inactive learned clauses.
use std::cmp::Reverse;

use log::debug;
use ordered_float::OrderedFloat;
use partial_ref::{partial, PartialRef};

use crate::context::{
    AssignmentP, ClauseActivityP, ClauseDbP, Context, ImplGraphP, ProofP, WatchlistsP,
};
use crate::prop::watch::sweep_watchlists;
use crate::prop::Reason;

use super::{db, ClauseId};

/// Delete inactive purgeable clauses.
///
/// The registry is sorted by activity. The more active half is only deleted below the moving
/// threshold `bump / count`; the less active half is deleted outright. Clauses with two or fewer
/// literals and clauses currently acting as a reason always survive. Deletion is lazy, a watch
/// list sweep compacts afterwards.
pub fn purge_learnts(
    mut ctx: partial!(
        Context,
        mut ClauseDbP,
        mut WatchlistsP,
        AssignmentP,
        ClauseActivityP,
        ImplGraphP,
        ProofP,
    ),
) {
    let mut registry = ctx.part_mut(ClauseDbP).take_purgeable();
    if registry.is_empty() {
        ctx.part_mut(ClauseDbP).restore_purgeable(registry);
        return;
    }

    let threshold = ctx.part(ClauseActivityP).bump() / registry.len() as f64;

    {
        let db = ctx.part(ClauseDbP);
        registry.sort_unstable_by_key(|&cid| Reverse(OrderedFloat(db.clause(cid).activity())));
    }

    let total = registry.len();
    let half = total / 2;
    let mut kept = Vec::with_capacity(total);

    for (pos, &cid) in registry.iter().enumerate() {
        let (deleted, len, activity) = {
            let clause = ctx.part(ClauseDbP).clause(cid);
            (
                clause.header().deleted(),
                clause.lits().len(),
                clause.activity(),
            )
        };

        if deleted {
            continue;
        }

        let deletable = len > 2
            && (pos >= half || activity < threshold)
            && !clause_is_propagating(ctx.borrow(), cid);

        if deletable {
            db::delete_clause(ctx.borrow(), cid);
        } else {
            kept.push(cid);
        }
    }

    debug!("purged {} of {} purgeable clauses", total - kept.len(), total);

    ctx.part_mut(ClauseDbP).restore_purgeable(kept);
    sweep_watchlists(ctx.borrow());
}

/// Whether the clause is the reason of its first literal's assignment.
fn clause_is_propagating(
    ctx: partial!(Context, AssignmentP, ClauseDbP, ImplGraphP),
    cid: ClauseId,
) -> bool {
    let lit_0 = ctx.part(ClauseDbP).clause(cid).lits()[0];
    ctx.part(AssignmentP).lit_is_true(lit_0)
        && ctx.part(ImplGraphP).reason(lit_0.var()) == Reason::Clause(cid)
}
