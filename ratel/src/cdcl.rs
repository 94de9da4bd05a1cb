//! Conflict driven clause learning.
use partial_ref::{partial, PartialRef};

use crate::analyze_conflict::analyze_conflict;
use crate::clause::activity::decay_clause_activities;
use crate::clause::purge::purge_learnts;
use crate::clause::{db, ClauseId};
use crate::context::{
    AnalyzeConflictP, AssignmentP, BinaryClausesP, ClauseActivityP, ClauseDbP, Context, HintsP,
    ImplGraphP, ProofP, ScheduleP, SolverConfigP, SolverStateP, TrailP, VsidsP, WatchlistsP,
};
use crate::decision::{find_restart_level, make_decision};
use crate::proof;
use crate::prop::{backtrack, enqueue_assignment, propagate, Reason};
use crate::schedule;
use crate::simplify::simplify_root;
use crate::state::Status;

/// Analyze a conflict, backtrack and assert the learned clause.
pub fn handle_conflict(
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
        mut TrailP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
    conflict: ClauseId,
) {
    let backtrack_to = analyze_conflict(ctx.borrow(), conflict);
    backtrack(ctx.borrow(), backtrack_to);

    let (analyze, mut ctx) = ctx.split_part(AnalyzeConflictP);
    let clause = analyze.clause();

    if clause.is_empty() {
        // analysis always finds an asserting literal; kept for parity with the repair path
        ctx.part_mut(SolverStateP).status = Status::Unsat;
        return;
    }

    let cid = db::add_clause(ctx.borrow(), clause, true, true, false);
    enqueue_assignment(ctx.borrow(), clause[0], Reason::Clause(cid));
    proof::end_chain(ctx.borrow(), cid);
}

/// Propagate until a decision has to be made.
///
/// Conflicts are analyzed and learned from as they appear; restarts and purges run on their
/// schedule. Returns the resulting status: `Undef` means the caller can decide (or conclude
/// satisfiability when no decision is left).
pub fn propagate_step(
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
        mut ScheduleP,
        mut SolverStateP,
        mut TrailP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) -> Status {
    if ctx.part(SolverStateP).status != Status::Undef {
        return ctx.part(SolverStateP).status;
    }

    if !ctx.part(ScheduleP).initialized {
        initialize_schedule(ctx.borrow());
        if ctx.part(SolverStateP).status != Status::Undef {
            return ctx.part(SolverStateP).status;
        }
    }

    loop {
        let conflict = match propagate(ctx.borrow()) {
            Ok(()) => break,
            Err(conflict) => conflict,
        };

        if ctx.part(TrailP).current_level() == 0 {
            let proof_active = ctx.part(ProofP).is_active();
            let state = ctx.part_mut(SolverStateP);
            state.status = Status::Unsat;
            if proof_active {
                // with proofs on, the root conflict is the synthesized empty clause
                state.empty_clause = Some(conflict);
            }
            return Status::Unsat;
        }

        handle_conflict(ctx.borrow(), conflict);

        let restart_due = {
            let schedule = ctx.part_mut(ScheduleP);
            if schedule.restart_countdown == 0 {
                true
            } else {
                schedule.restart_countdown -= 1;
                false
            }
        };

        if restart_due {
            let level = if ctx.part(SolverConfigP).restart_trail_reuse {
                find_restart_level(ctx.borrow())
            } else {
                0
            };
            backtrack(ctx.borrow(), level);

            let restart_base = ctx.part(SolverConfigP).restart_interval_scale;
            let schedule = ctx.part_mut(ScheduleP);
            schedule.restarts += 1;
            schedule.restart_countdown = restart_base * schedule.luby.advance();
            schedule.pending_root_simplify = true;
        }

        {
            let adjust_growth = ctx.part(SolverConfigP).purge_adjust_growth;
            let threshold_growth = ctx.part(SolverConfigP).purge_threshold_growth;
            let schedule = ctx.part_mut(ScheduleP);

            schedule.adjust_countdown -= 1;
            if schedule.adjust_countdown == 0 {
                schedule.adjust_interval *= adjust_growth;
                schedule.adjust_countdown = (schedule.adjust_interval as u64).max(1);
                schedule.purge_threshold *= threshold_growth;
            }
            schedule.conflicts += 1;
        }

        ctx.part_mut(VsidsP).decay();
        decay_clause_activities(ctx.borrow());
        schedule::log_progress(ctx.borrow());
    }

    if ctx.part(TrailP).current_level() == 0 && ctx.part(ScheduleP).pending_root_simplify {
        if !ctx.part(ProofP).is_active() {
            simplify_root(ctx.borrow());
        }
        ctx.part_mut(ScheduleP).pending_root_simplify = false;
    }

    let purgeable = ctx.part(ClauseDbP).purgeable_count() as f64;
    let slack = ctx.part(TrailP).trail().len() as f64;
    if purgeable >= ctx.part(ScheduleP).purge_threshold + slack {
        purge_learnts(ctx.borrow());
    }

    Status::Undef
}

/// First propagation after loading clauses: derive the purge threshold and restart interval, run
/// the initial simplification.
fn initialize_schedule(
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
        mut ScheduleP,
        mut SolverStateP,
        mut TrailP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) {
    {
        let clause_count = ctx.part(ClauseDbP).highest_id_index();
        let config = ctx.part(SolverConfigP);
        let threshold = clause_count as f64 * config.purge_threshold_factor + 1.0;
        let adjust_interval = config.purge_adjust_interval;
        let restart_base = config.restart_interval_scale;

        let schedule = ctx.part_mut(ScheduleP);
        schedule.initialized = true;
        schedule.purge_threshold = threshold;
        schedule.adjust_interval = adjust_interval;
        schedule.adjust_countdown = (adjust_interval as u64).max(1);
        schedule.restart_countdown = restart_base * schedule.luby.advance();
    }

    if !ctx.part(ProofP).is_active() && ctx.part(TrailP).current_level() == 0 {
        if propagate(ctx.borrow()).is_err() {
            ctx.part_mut(SolverStateP).status = Status::Unsat;
            return;
        }
        simplify_root(ctx.borrow());
    }
}

/// Perform a decision.
///
/// Returns `false` iff there is nothing left to decide, which makes the assignment a model.
pub fn decide_step(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut SolverStateP,
        mut TrailP,
        mut VsidsP,
    ),
) -> bool {
    if make_decision(ctx.borrow()) {
        true
    } else {
        ctx.part_mut(SolverStateP).status = Status::Sat;
        false
    }
}

/// Force the solver back to the root level and re-propagate.
pub fn force_restart(
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
        mut ScheduleP,
        mut SolverStateP,
        mut TrailP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) {
    backtrack(ctx.borrow(), 0);
    if propagate_step(ctx.borrow()) == Status::Undef && !ctx.part(ProofP).is_active() {
        simplify_root(ctx.borrow());
    }
}

/// Run until a model is found or the formula is proven unsatisfiable.
pub fn solve(
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
        mut ScheduleP,
        mut SolverStateP,
        mut TrailP,
        mut VsidsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) -> Status {
    loop {
        let status = propagate_step(ctx.borrow());
        if status != Status::Undef {
            return status;
        }
        decide_step(ctx.borrow());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;
    use proptest::prelude::*;

    use ratel_formula::test::{sat_formula, sgen_unsat_formula};
    use ratel_formula::{cnf_formula, CnfFormula};

    use crate::clause::ClauseId;
    use crate::context::{set_var_count, TmpDataP};
    use crate::load::load_clause;

    /// The invariants that have to hold whenever propagation is at rest.
    fn check_invariants(
        mut ctx: partial!(Context, AssignmentP, ClauseDbP, ImplGraphP, TrailP, VsidsP),
    ) {
        let (trail, mut ctx) = ctx.split_part(TrailP);
        let (graph, mut ctx) = ctx.split_part(ImplGraphP);
        let (assignment, mut ctx) = ctx.split_part(AssignmentP);
        let (vsids, mut ctx) = ctx.split_part(VsidsP);
        let db = ctx.part(ClauseDbP);

        // every unassigned decidable variable is available for decisions
        for index in 1..assignment.var_count() + 1 {
            let var = ratel_formula::Var::from_index(index);
            if assignment.var_value(var).is_unknown() && vsids.is_decidable(var) {
                assert!(vsids.in_heap(var), "unassigned variable {:?} not queued", var);
            }
        }

        for &lit in trail.trail() {
            if let Reason::Clause(cid) = graph.reason(lit.var()) {
                let lits = db.clause(cid).lits();
                assert_eq!(lits[0], lit);
                for &other in &lits[1..] {
                    assert!(assignment.lit_is_false(other));
                    assert!(graph.level(other.var()) <= graph.level(lit.var()));
                }
            }
        }

        for index in 1..db.highest_id_index() + 1 {
            let clause = db.clause(ClauseId::from_index(index));
            let header = clause.header();
            if header.deleted() || !header.watched() {
                continue;
            }
            let lits = clause.lits();
            assert!(
                !assignment.lit_is_false(lits[0]) || !assignment.lit_is_false(lits[1]),
                "both watched literals of {:?} are false",
                lits
            );
        }
    }

    /// Drive the stepwise loop to a verdict, checking invariants as we go.
    fn drive(
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
            mut ScheduleP,
            mut SolverStateP,
            mut TrailP,
            mut VsidsP,
            mut WatchlistsP,
            SolverConfigP,
        ),
    ) -> Status {
        loop {
            let status = propagate_step(ctx.borrow());
            if status != Status::Undef {
                return status;
            }
            check_invariants(ctx.borrow());

            let level_before = ctx.part(TrailP).current_level();
            if !decide_step(ctx.borrow()) {
                return Status::Sat;
            }
            assert_eq!(ctx.part(TrailP).current_level(), level_before + 1);
            let decision = *ctx.part(TrailP).trail().last().unwrap();
            assert_eq!(graph_level(ctx.borrow(), decision), level_before + 1);
        }
    }

    fn graph_level(ctx: partial!(Context, ImplGraphP), lit: ratel_formula::Lit) -> usize {
        ctx.part(ImplGraphP).level(lit.var())
    }

    fn load_formula(
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
        formula: &CnfFormula,
    ) {
        set_var_count(ctx.borrow(), formula.var_count());
        for clause in formula.iter() {
            load_clause(ctx.borrow(), clause, false);
        }
    }

    #[test]
    fn level_0_unsat() {
        let mut ctx = Box::new(Context::default());
        let mut ctx = ctx.into_partial_ref_mut();

        let formula = cnf_formula![
            1, 2, 3;
            -1;
            1, -2;
            2, -3;
        ];
        load_formula(ctx.borrow(), &formula);

        assert_eq!(drive(ctx.borrow()), Status::Unsat);
    }

    proptest! {
        #[test]
        fn sgen_unsat(formula in sgen_unsat_formula(1..5usize)) {
            let mut ctx = Box::new(Context::default());
            let mut ctx = ctx.into_partial_ref_mut();

            load_formula(ctx.borrow(), &formula);

            prop_assert_eq!(drive(ctx.borrow()), Status::Unsat);
        }

        #[test]
        fn sat(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut ctx = Box::new(Context::default());
            let mut ctx = ctx.into_partial_ref_mut();

            load_formula(ctx.borrow(), &formula);

            prop_assert_eq!(drive(ctx.borrow()), Status::Sat);

            for clause in formula.iter() {
                prop_assert!(clause
                    .iter()
                    .any(|&lit| ctx.part(AssignmentP).lit_is_true(lit)));
            }
        }
    }
}
