//! Root level simplification.
use partial_ref::{partial, PartialRef};

use ratel_formula::Lit;

use crate::clause::{db, ClauseId};
use crate::context::{
    AssignmentP, BinaryClausesP, ClauseDbP, Context, ImplGraphP, ProofP, SolverConfigP, TrailP,
    WatchlistsP,
};
use crate::prop::watch::sweep_watchlists;
use crate::prop::Reason;

/// Remove clauses satisfied at the root level and splice out root-false literals.
///
/// Satisfied learnt clauses are lazily deleted. Satisfied irredundant clauses are merely
/// unwatched so their ids stay valid for embedders. Clauses that shrink to two literals move to
/// the binary implication index when it is enabled.
///
/// Must only run at the root level with propagation complete and proof recording off; spliced
/// literals would otherwise invalidate recorded chains.
pub fn simplify_root(
    mut ctx: partial!(
        Context,
        mut BinaryClausesP,
        mut ClauseDbP,
        mut WatchlistsP,
        AssignmentP,
        ImplGraphP,
        ProofP,
        SolverConfigP,
        TrailP,
    ),
) {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);
    debug_assert!(ctx.part(TrailP).fully_propagated());
    debug_assert!(!ctx.part(ProofP).is_active());

    let use_binary_index = ctx.part(SolverConfigP).binary_index;
    let highest = ctx.part(ClauseDbP).highest_id_index();

    for index in 1..highest + 1 {
        let cid = ClauseId::from_index(index);

        let learnt = {
            let clause = ctx.part(ClauseDbP).clause(cid);
            let header = clause.header();
            if header.deleted() || !header.watched() {
                continue;
            }
            let lit_0 = clause.lits()[0];
            if ctx.part(AssignmentP).lit_is_true(lit_0)
                && ctx.part(ImplGraphP).reason(lit_0.var()) == Reason::Clause(cid)
            {
                // reason of a root assignment, keep as is
                continue;
            }
            header.learnt()
        };

        let mut satisfied = false;
        let mut transfer: Option<[Lit; 2]> = None;
        {
            let (db, mut ctx) = ctx.split_part_mut(ClauseDbP);
            let assignment = ctx.part(AssignmentP);
            let clause = db.clause_mut(cid);

            if clause.lits().iter().any(|&lit| assignment.lit_is_true(lit)) {
                if learnt {
                    satisfied = true;
                } else {
                    // keep the clause but take it out of the watch lists
                    clause.header_mut().set_watched(false);
                }
            } else {
                // at the root every literal is undefined or false; splice the false ones out.
                // The watched literals are both undefined, so they stay in front.
                let lits = clause.lits_mut();
                let mut write = 0;
                for read in 0..lits.len() {
                    if assignment.lit_is_unknown(lits[read]) {
                        lits[write] = lits[read];
                        write += 1;
                    }
                }
                clause.shrink(write);

                if use_binary_index && write == 2 {
                    clause.header_mut().set_watched(false);
                    transfer = Some([clause.lits()[0], clause.lits()[1]]);
                }
            }
        }

        if satisfied {
            db::delete_clause(ctx.borrow(), cid);
        } else if let Some(lits) = transfer {
            ctx.part_mut(BinaryClausesP).add_binary_clause(cid, lits);
        }
    }

    ctx.part_mut(ClauseDbP).compact_purgeable();
    sweep_watchlists(ctx.borrow());
}
