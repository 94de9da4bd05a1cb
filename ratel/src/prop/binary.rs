//! Propagation over the binary implication index.
use partial_ref::{partial, PartialRef};

use ratel_formula::Lit;

use crate::clause::{db, ClauseId};
use crate::context::{
    AssignmentP, BinaryClausesP, ClauseDbP, Context, ImplGraphP, ProofP, SolverConfigP, TrailP,
    WatchlistsP,
};
use crate::proof;

use super::long::root_reason;
use super::{enqueue_assignment, Reason};

/// Assert all direct consequences of a newly assigned literal.
///
/// On conflict the conflicting binary clause is returned. Indexed clauses do not reorder their
/// literals, so a binary reason clause may have the propagated literal in either position;
/// conflict analysis normalizes this.
pub fn propagate_binary(
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
    let mut index = 0;
    loop {
        let (implied, cid) = {
            let implications = ctx.part(BinaryClausesP).implied(lit);
            match implications.get(index) {
                Some(&entry) => entry,
                None => return Ok(()),
            }
        };
        index += 1;

        if ctx.part(AssignmentP).lit_is_true(implied) {
            continue;
        }

        if ctx.part(TrailP).current_level() == 0 && ctx.part(ProofP).is_active() {
            prove_root_implication(ctx.borrow(), cid, implied)?;
            continue;
        }

        if ctx.part(AssignmentP).lit_is_false(implied) {
            return Err(cid);
        }

        enqueue_assignment(ctx.borrow(), implied, Reason::Clause(cid));
    }
}

/// Derive an explicit clause for a binary implication at the root level.
fn prove_root_implication(
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
    implied: Lit,
) -> Result<(), ClauseId> {
    let [lit_0, lit_1] = {
        let lits = ctx.part(ClauseDbP).clause(cid).lits();
        debug_assert_eq!(lits.len(), 2);
        [lits[0], lits[1]]
    };

    proof::begin_chain(ctx.borrow(), cid);

    if ctx.part(AssignmentP).lit_is_false(implied) {
        // Both literals are false at the root level; the clause resolves to the empty clause.
        for &conflict_lit in [lit_0, lit_1].iter() {
            let rcid = root_reason(ctx.borrow(), conflict_lit);
            proof::add_resolution(ctx.borrow(), conflict_lit, rcid);
        }
        let empty = db::add_clause(ctx.borrow(), &[], false, false, false);
        proof::end_chain(ctx.borrow(), empty);
        return Err(empty);
    }

    let falsified = if lit_0 == implied { lit_1 } else { lit_0 };
    let rcid = root_reason(ctx.borrow(), falsified);
    proof::add_resolution(ctx.borrow(), falsified, rcid);

    let unit = db::add_clause(ctx.borrow(), &[implied], false, false, false);
    enqueue_assignment(ctx.borrow(), implied, Reason::Clause(unit));
    proof::end_chain(ctx.borrow(), unit);
    Ok(())
}
