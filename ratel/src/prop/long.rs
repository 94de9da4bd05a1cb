//! The watched literal walk of unit propagation.
use partial_ref::{partial, PartialRef};

use ratel_formula::Lit;

use crate::clause::{db, ClauseId};
use crate::context::{
    AssignmentP, BinaryClausesP, ClauseDbP, Context, ImplGraphP, ProofP, SolverConfigP, TrailP,
    WatchlistsP,
};
use crate::proof;

use super::{enqueue_assignment, Reason};

/// Process all watches of a newly falsified literal.
///
/// `lit` is the literal that was just assigned true; the watch list of `!lit` is visited. See
/// [`prop::watch`](crate::prop::watch) for the invariants that this has to uphold.
///
/// On conflict the conflicting clause is returned, the remaining watch list entries are preserved
/// and the propagation cursor is left where it is.
pub fn propagate_watches(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ProofP,
        mut TrailP,
        mut WatchlistsP,
        SolverConfigP,
    ),
    lit: Lit,
) -> Result<(), ClauseId> {
    let false_lit = !lit;
    let mut list = std::mem::take(ctx.part_mut(WatchlistsP).watched_by_mut(false_lit));

    let mut read = 0;
    let mut write = 0;
    let mut result = Ok(());

    'watchers: while read < list.len() {
        let cid = list[read];
        read += 1;

        // A true blocker means the clause is satisfied without even loading its literals.
        let blocker = ctx.part(ClauseDbP).clause(cid).blocker();
        if ctx.part(AssignmentP).lit_is_true(blocker) {
            list[write] = cid;
            write += 1;
            continue;
        }

        // Normalize the falsified watched literal into position 1. All subsequent logic relies
        // on this order.
        let first = {
            let clause = ctx.part_mut(ClauseDbP).clause_mut(cid);
            let lits = clause.lits_mut();
            if lits[0] == false_lit {
                lits.swap(0, 1);
            }
            lits[0]
        };

        // Satisfied by the other watched literal; cache it as the blocker and keep the watch.
        if ctx.part(AssignmentP).lit_is_true(first) {
            ctx.part_mut(ClauseDbP).clause_mut(cid).set_blocker(first);
            list[write] = cid;
            write += 1;
            continue;
        }

        // Look for a non-false literal to take over this watch.
        let mut new_watch = None;
        {
            let (db, mut ctx) = ctx.split_part_mut(ClauseDbP);
            let assignment = ctx.part(AssignmentP);
            let lits = db.clause_mut(cid).lits_mut();
            for k in 2..lits.len() {
                if !assignment.lit_is_false(lits[k]) {
                    lits[1] = lits[k];
                    lits[k] = false_lit;
                    new_watch = Some(lits[1]);
                    break;
                }
            }
        }
        if let Some(new_watch) = new_watch {
            // The watch moves: add it to the new literal's list and drop it from this one.
            ctx.part_mut(WatchlistsP).add_watch(new_watch, cid);
            continue 'watchers;
        }

        // No replacement: the clause is unit or conflicting and keeps this watch.
        list[write] = cid;
        write += 1;

        if ctx.part(TrailP).current_level() == 0 && ctx.part(ProofP).is_active() {
            // Root level propagations have to produce explicit unit clauses so that later
            // resolution steps can cite a fixed id.
            match prove_root_propagation(ctx.borrow(), cid, first) {
                Ok(()) => continue 'watchers,
                Err(conflict) => {
                    result = Err(conflict);
                    break 'watchers;
                }
            }
        }

        if ctx.part(AssignmentP).lit_is_false(first) {
            result = Err(cid);
            break 'watchers;
        }

        enqueue_assignment(ctx.borrow(), first, Reason::Clause(cid));
    }

    // On conflict the unprocessed watches are preserved.
    if result.is_err() {
        while read < list.len() {
            list[write] = list[read];
            write += 1;
            read += 1;
        }
    }
    list.truncate(write);
    *ctx.part_mut(WatchlistsP).watched_by_mut(false_lit) = list;

    result
}

/// Derive an explicit clause for a propagation or conflict at the root level.
///
/// The propagating clause is resolved with the root level reasons of its falsified literals.
/// When the clause is propagating this yields a unit clause which is asserted in place of the
/// original reason; when it is conflicting this yields the empty clause, which is returned as the
/// conflict.
fn prove_root_propagation(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ProofP,
        mut TrailP,
        mut WatchlistsP,
        SolverConfigP,
    ),
    cid: ClauseId,
    first: Lit,
) -> Result<(), ClauseId> {
    proof::begin_chain(ctx.borrow(), cid);

    let len = ctx.part(ClauseDbP).clause(cid).lits().len();
    for k in 1..len {
        let lit_k = ctx.part(ClauseDbP).clause(cid).lits()[k];
        debug_assert!(ctx.part(AssignmentP).lit_is_false(lit_k));
        let rcid = root_reason(ctx.borrow(), lit_k);
        proof::add_resolution(ctx.borrow(), lit_k, rcid);
    }

    if ctx.part(AssignmentP).lit_is_false(first) {
        let rcid = root_reason(ctx.borrow(), first);
        proof::add_resolution(ctx.borrow(), first, rcid);
        let empty = db::add_clause(ctx.borrow(), &[], false, false, false);
        proof::end_chain(ctx.borrow(), empty);
        return Err(empty);
    }

    let unit = db::add_clause(ctx.borrow(), &[first], false, false, false);
    enqueue_assignment(ctx.borrow(), first, Reason::Clause(unit));
    proof::end_chain(ctx.borrow(), unit);
    Ok(())
}

/// The explicit reason clause of a literal falsified at the root level.
pub(super) fn root_reason(ctx: partial!(Context, ImplGraphP), lit: Lit) -> ClauseId {
    match ctx.part(ImplGraphP).reason(lit.var()) {
        Reason::Clause(rcid) => rcid,
        reason => panic!(
            "root level assignment of {:?} has no explicit reason clause ({:?})",
            lit, reason
        ),
    }
}
