//! Clause ingestion.
//!
//! Incoming clauses may arrive at any time, including while a model is on the trail. Ingestion
//! normalizes the literals, decides where the two watches go and repairs the trail so that the
//! watch invariants hold without restarting the search from scratch:
//!
//! - With at least two non-false literals the clause cannot have been propagating and is added as
//!   is.
//! - With one true literal at a level no higher than the highest false literal the clause was
//!   blocked and is also added as is.
//! - With a single non-false (or a true but too deeply assigned) literal the clause would have
//!   propagated earlier; the trail is rewound to the highest false level and the literal is
//!   asserted there.
//! - With only false literals whose highest level is shared by two of them the clause is
//!   conflicting at that level; the trail is rewound and conflict analysis runs immediately.
use partial_ref::{partial, PartialRef};

use ratel_formula::Lit;

use crate::analyze_conflict::reason_clause;
use crate::cdcl;
use crate::clause::{db, ClauseId};
use crate::context::{
    AnalyzeConflictP, AssignmentP, BinaryClausesP, ClauseActivityP, ClauseDbP, Context, HintsP,
    ImplGraphP, ProofP, SolverConfigP, SolverStateP, TmpDataP, TrailP, VsidsP, WatchlistsP,
};
use crate::proof;
use crate::prop::{backtrack, enqueue_assignment, Assignment, ImplGraph, Reason};
use crate::state::Status;
use crate::tmp::TmpData;

/// Where an ingested clause left the trail.
enum Placement {
    /// No trail change needed.
    Keep,
    /// The clause is empty after normalization.
    Empty,
    /// The first literal has to be asserted after rewinding to the given level.
    Assert { backtrack_to: usize },
    /// The clause is conflicting at the given level.
    Analyze { backtrack_to: usize },
}

/// Sort key realizing the watch-preferred literal order: true literals first by increasing
/// level, unassigned literals next, false literals last by decreasing level.
fn watch_order_key(assignment: &Assignment, graph: &ImplGraph, lit: Lit) -> (u8, i64) {
    let value = assignment.lit_value(lit);
    if value.is_true() {
        (0, graph.level(lit.var()) as i64)
    } else if value.is_unknown() {
        (1, lit.index() as i64)
    } else {
        (2, -(graph.level(lit.var()) as i64))
    }
}

/// Adds a clause to the current formula.
///
/// Removes duplicate literals, discards tautological and root-satisfied clauses, drops root-false
/// literals (recording a resolution step per drop when proofs are on) and dispatches on the
/// placement contract above.
///
/// Returns `None` without touching any state when the clause is discarded or the solver is
/// already unsatisfiable, and `None` after entering the unsatisfiable state when the clause
/// normalizes to the empty clause.
///
/// Does not adjust the solver's variable count. If necessary that has to be done before calling
/// this.
pub fn load_clause(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseActivityP,
        mut ClauseDbP,
        mut HintsP,
        mut ImplGraphP,
        mut ProofP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
    lits: &[Lit],
    conflict: bool,
) -> Option<ClauseId> {
    if ctx.part(SolverStateP).status == Status::Unsat {
        return None;
    }

    let (cid, placement) = {
        let (tmp, mut ctx) = ctx.split_part_mut(TmpDataP);
        let TmpData {
            lits: staged,
            lits_2: kept,
        } = tmp;

        staged.clear();
        staged.extend_from_slice(lits);
        staged.sort_unstable();
        staged.dedup();

        // Tautologies and root-satisfied clauses are discarded as valid; this must not disturb
        // any state, a `Sat` status in particular stays.
        {
            let assignment = ctx.part(AssignmentP);
            let graph = ctx.part(ImplGraphP);
            let mut last = None;
            for &lit in staged.iter() {
                if last == Some(!lit) {
                    return None;
                }
                if assignment.lit_is_true(lit) && graph.level(lit.var()) == 0 {
                    return None;
                }
                last = Some(lit);
            }
        }

        if ctx.part(SolverStateP).status == Status::Sat {
            ctx.part_mut(SolverStateP).status = Status::Undef;
        }

        // Drop literals that are false at the root level. With proofs on, the chain starts from a
        // record of the full clause and resolves every dropped literal with its root reason.
        kept.clear();
        let mut chain_open = false;
        for read in 0..staged.len() {
            let lit = staged[read];
            let root_false = ctx.part(AssignmentP).lit_is_false(lit)
                && ctx.part(ImplGraphP).level(lit.var()) == 0;

            if !root_false {
                kept.push(lit);
                continue;
            }

            if ctx.part(ProofP).is_active() {
                if !chain_open {
                    let full = db::add_clause(ctx.borrow(), staged, false, false, conflict);
                    proof::begin_chain(ctx.borrow(), full);
                    chain_open = true;
                }
                let rcid = reason_clause(ctx.borrow(), !lit);
                proof::add_resolution(ctx.borrow(), lit, rcid);
            }
        }

        {
            let (assignment, mut ctx) = ctx.split_part(AssignmentP);
            let graph = ctx.part(ImplGraphP);
            kept.sort_unstable_by_key(|&lit| watch_order_key(assignment, graph, lit));
        }

        let cid = db::add_clause(ctx.borrow(), kept, false, true, conflict);
        if chain_open {
            proof::end_chain(ctx.borrow(), cid);
        }

        let placement = match kept.len() {
            0 => Placement::Empty,
            1 => Placement::Assert { backtrack_to: 0 },
            _ => {
                let assignment = ctx.part(AssignmentP);
                let graph = ctx.part(ImplGraphP);
                let lit_0 = kept[0];
                let lit_1 = kept[1];
                let level_0 = graph.level(lit_0.var());
                let level_1 = graph.level(lit_1.var());

                if !assignment.lit_is_false(lit_1) {
                    // two non-false watches, the clause cannot have been propagating
                    Placement::Keep
                } else if assignment.lit_is_true(lit_0) && level_0 <= level_1 {
                    // blocked by a true literal before the rest was falsified
                    Placement::Keep
                } else if !assignment.lit_is_false(lit_0) || level_0 != level_1 {
                    // the clause would have propagated lit_0 at lit_1's level
                    Placement::Assert {
                        backtrack_to: level_1,
                    }
                } else {
                    // all literals false with the highest level shared: conflicting there
                    Placement::Analyze {
                        backtrack_to: level_0,
                    }
                }
            }
        };

        (cid, placement)
    };

    match placement {
        Placement::Keep => {}
        Placement::Empty => {
            backtrack(ctx.borrow(), 0);
            let state = ctx.part_mut(SolverStateP);
            state.status = Status::Unsat;
            state.empty_clause = Some(cid);
            return None;
        }
        Placement::Assert { backtrack_to } => {
            backtrack(ctx.borrow(), backtrack_to);
            let lit_0 = ctx.part(ClauseDbP).clause(cid).lits()[0];
            debug_assert!(ctx.part(AssignmentP).lit_is_unknown(lit_0));
            enqueue_assignment(ctx.borrow(), lit_0, Reason::Clause(cid));
        }
        Placement::Analyze { backtrack_to } => {
            backtrack(ctx.borrow(), backtrack_to);
            // not the root level, the clause would have normalized to the empty clause
            debug_assert!(ctx.part(TrailP).current_level() > 0);
            cdcl::handle_conflict(ctx.borrow(), cid);
        }
    }

    Some(cid)
}

/// Adds a clause as the late explanation for a lazily propagated literal.
///
/// The buffer is reordered in place. The explanation contract is checked here: the explained
/// literal must be the single true literal, all others false, with no literal assigned above the
/// explained literal's level. Under these preconditions no trail repair is needed, so this is
/// safe to call while conflict analysis is walking the implication graph; the literal's reason is
/// patched in place.
pub fn load_lazy_clause(
    mut ctx: partial!(
        Context,
        mut BinaryClausesP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut ProofP,
        mut WatchlistsP,
        AssignmentP,
        SolverConfigP,
    ),
    lits: &mut Vec<Lit>,
) -> ClauseId {
    {
        let (assignment, mut ctx) = ctx.split_part(AssignmentP);
        let graph = ctx.part(ImplGraphP);
        lits.sort_unstable_by_key(|&lit| watch_order_key(assignment, graph, lit));
    }

    assert!(!lits.is_empty(), "lazy clause is empty");
    let lit_0 = lits[0];
    assert!(
        ctx.part(AssignmentP).lit_is_true(lit_0),
        "lazy clause has no true literal"
    );
    assert!(
        ctx.part(ImplGraphP).reason(lit_0.var()).is_lazy(),
        "lazy clause explains {:?} which was not lazily propagated",
        lit_0
    );
    let level_0 = ctx.part(ImplGraphP).level(lit_0.var());
    {
        let assignment = ctx.part(AssignmentP);
        let graph = ctx.part(ImplGraphP);
        for &lit in &lits[1..] {
            assert!(
                assignment.lit_is_false(lit),
                "lazy clause literal {:?} is not false",
                lit
            );
            assert!(
                graph.level(lit.var()) <= level_0,
                "lazy clause literal {:?} is assigned above the explained literal",
                lit
            );
        }
    }

    // Drop root-false literals just like ordinary ingestion. At the first drop the buffer is
    // still intact and provides the chain's starting record.
    let mut chain_open = false;
    let mut write = 1;
    for read in 1..lits.len() {
        let lit = lits[read];
        if ctx.part(ImplGraphP).level(lit.var()) != 0 {
            lits[write] = lit;
            write += 1;
            continue;
        }

        if ctx.part(ProofP).is_active() {
            if !chain_open {
                let full = db::add_clause(ctx.borrow(), lits, false, false, true);
                proof::begin_chain(ctx.borrow(), full);
                chain_open = true;
            }
            let rcid = match ctx.part(ImplGraphP).reason(lit.var()) {
                Reason::Clause(rcid) => rcid,
                reason => panic!(
                    "root level assignment of {:?} has no explicit reason clause ({:?})",
                    lit, reason
                ),
            };
            proof::add_resolution(ctx.borrow(), lit, rcid);
        }
    }
    lits.truncate(write);

    let cid = db::add_clause(ctx.borrow(), lits, false, true, true);
    if chain_open {
        proof::end_chain(ctx.borrow(), cid);
    }

    ctx.part_mut(ImplGraphP)
        .update_reason(lit_0.var(), Reason::Clause(cid));

    cid
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use ratel_formula::lits;

    use crate::context::set_var_count;

    #[test]
    fn unsat_on_empty_clause() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        assert_eq!(load_clause(ctx.borrow(), &[], false), None);

        assert_eq!(ctx.part(SolverStateP).status, Status::Unsat);
    }

    #[test]
    fn unit_clauses() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        assert!(load_clause(ctx.borrow(), &lits![1], false).is_some());
        assert_eq!(ctx.part(TrailP).trail().len(), 1);

        // a tautology leaves everything untouched
        assert_eq!(load_clause(ctx.borrow(), &lits![3, -3], false), None);
        assert_eq!(ctx.part(TrailP).trail().len(), 1);

        assert!(load_clause(ctx.borrow(), &lits![-2], false).is_some());
        assert_eq!(ctx.part(TrailP).trail().len(), 2);

        // already satisfied at the root level
        assert_eq!(load_clause(ctx.borrow(), &lits![1, 1], false), None);
        assert_eq!(ctx.part(TrailP).trail().len(), 2);

        assert_eq!(ctx.part(SolverStateP).status, Status::Undef);

        // the remaining literal of (2) is false at the root level
        assert_eq!(load_clause(ctx.borrow(), &lits![2], false), None);
        assert_eq!(ctx.part(SolverStateP).status, Status::Unsat);
    }

    #[test]
    fn duplicate_literals_are_merged() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        let cid = load_clause(ctx.borrow(), &lits![4, -5, 5, 2], false);
        // complementary literals make the clause valid
        assert_eq!(cid, None);

        let cid = load_clause(ctx.borrow(), &lits![-2, 3, 3, 4], false).unwrap();
        assert_eq!(ctx.part(ClauseDbP).clause(cid).lits().len(), 3);
    }

    #[test]
    fn conflict_flag_marks_purgeable() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        let plain = load_clause(ctx.borrow(), &lits![1, 2, 3], false).unwrap();
        let conflict = load_clause(ctx.borrow(), &lits![-1, -2, -3], true).unwrap();

        assert!(!ctx.part(ClauseDbP).clause(plain).header().conflict());
        assert!(ctx.part(ClauseDbP).clause(conflict).header().conflict());
        assert!(!ctx.part(ClauseDbP).purgeable().contains(&plain));
        assert!(ctx.part(ClauseDbP).purgeable().contains(&conflict));
    }
}
