//! Boolean satisfiability solver.
use std::io;

use partial_ref::{IntoPartialRef, IntoPartialRefMut, PartialRef};

use ratel_formula::{Lit, Value, Var};

use crate::cdcl;
use crate::clause::ClauseId;
use crate::config::SolverConfig;
use crate::context::{
    self, AssignmentP, Context, HintsP, ImplGraphP, ProofP, TrailP, VsidsP,
};
use crate::hints;
use crate::load;
use crate::model::{self, MinimalModelOptions};
use crate::state::Status;

/// A boolean satisfiability solver with incremental clause addition and theory hints.
///
/// The solver is strictly single threaded and non-reentrant; every method returns only when its
/// work is complete. Variables are numbered from 1 and literals use the `var << 1 | polarity`
/// code with polarity bit 1 denoting the positive literal.
///
/// A fresh solver is trivially satisfiable. Adding a clause moves it back to [`Status::Undef`];
/// once the empty clause is derived the solver stays unsatisfiable and further clauses are
/// absorbed silently.
pub struct Solver {
    ctx: Box<Context>,
}

impl Default for Solver {
    fn default() -> Solver {
        Solver::new()
    }
}

impl Solver {
    /// Create a new solver without variables or clauses.
    pub fn new() -> Solver {
        let mut solver = Solver {
            ctx: Box::new(Context::default()),
        };
        {
            let mut ctx = solver.ctx.into_partial_ref_mut();
            context::set_var_count(ctx.borrow(), 0);
        }
        solver
    }

    /// Release all state and return to the empty satisfiable state.
    ///
    /// The configuration is kept.
    pub fn reset(&mut self) {
        let config = self.ctx.solver_config.clone();
        *self = Solver::new();
        self.set_config(config);
    }

    /// The highest variable index in use.
    pub fn var_count(&self) -> usize {
        let mut ctx = self.ctx.into_partial_ref();
        let count = ctx.part(AssignmentP).var_count();
        count
    }

    /// Create a new variable.
    pub fn new_var(&mut self) -> Var {
        let mut ctx = self.ctx.into_partial_ref_mut();
        let count = ctx.part(AssignmentP).var_count() + 1;
        context::set_var_count(ctx.borrow(), count);
        Var::from_index(count)
    }

    /// Create all variables up to the given one.
    pub fn ensure_var(&mut self, var: Var) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        if var.index() > ctx.part(AssignmentP).var_count() {
            context::set_var_count(ctx.borrow(), var.index());
        }
    }

    fn ensure_lits(&mut self, lits: &[Lit]) {
        if let Some(max) = lits.iter().map(|lit| lit.var()).max() {
            self.ensure_var(max);
        }
    }

    /// Add a clause to the formula.
    ///
    /// Missing variables are created. Returns `None` when the clause is discarded as valid or the
    /// solver is (or becomes) unsatisfiable.
    pub fn add_clause(&mut self, lits: &[Lit]) -> Option<ClauseId> {
        self.ensure_lits(lits);
        let mut ctx = self.ctx.into_partial_ref_mut();
        load::load_clause(ctx.borrow(), lits, false)
    }

    /// Add a conflict clause supplied by an external reasoner.
    ///
    /// Same as [`add_clause`](Solver::add_clause), but the clause is flagged purgeable and
    /// participates in the tautology pass of minimal model extraction.
    pub fn add_conflict_clause(&mut self, lits: &[Lit]) -> Option<ClauseId> {
        self.ensure_lits(lits);
        let mut ctx = self.ctx.into_partial_ref_mut();
        load::load_clause(ctx.borrow(), lits, true)
    }

    /// Add the late explanation for a lazily propagated literal.
    ///
    /// The explained literal must be the single true literal of the clause, all other literals
    /// false and assigned no higher than it; violating this aborts. The literal's reason is
    /// patched to the new clause.
    pub fn add_lazy_clause(&mut self, lits: &[Lit]) -> ClauseId {
        let mut buffer = lits.to_vec();
        let mut ctx = self.ctx.into_partial_ref_mut();
        load::load_lazy_clause(ctx.borrow(), &mut buffer)
    }

    /// Assert an externally propagated literal with a lazily supplied reason.
    ///
    /// A literal that is already true is discarded; hinting a false literal aborts.
    pub fn hint(&mut self, lit: Lit) {
        self.ensure_var(lit.var());
        let mut ctx = self.ctx.into_partial_ref_mut();
        hints::add_hint(ctx.borrow(), lit);
    }

    /// Install the explainer invoked when a lazy reason is needed.
    ///
    /// The callback fills the buffer with the explaining clause, which is ingested through
    /// [`add_lazy_clause`](Solver::add_lazy_clause)'s path under the same contract.
    pub fn set_explainer(&mut self, explainer: impl FnMut(Lit, &mut Vec<Lit>) + 'static) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        ctx.part_mut(HintsP).set_explainer(Box::new(explainer));
    }

    /// Exclude a variable from decisions.
    ///
    /// May only be called at the root level.
    pub fn block_decide(&mut self, var: Var) {
        self.ensure_var(var);
        let mut ctx = self.ctx.into_partial_ref_mut();
        assert_eq!(
            ctx.part(TrailP).current_level(),
            0,
            "block_decide outside the root level"
        );
        ctx.part_mut(VsidsP).set_decidable(var, false);
    }

    /// Allow decisions on a previously blocked variable.
    ///
    /// May only be called at the root level.
    pub fn unblock_decide(&mut self, var: Var) {
        self.ensure_var(var);
        let mut ctx = self.ctx.into_partial_ref_mut();
        assert_eq!(
            ctx.part(TrailP).current_level(),
            0,
            "unblock_decide outside the root level"
        );
        ctx.part_mut(VsidsP).set_decidable(var, true);
        if ctx.part(AssignmentP).var_value(var).is_unknown() {
            ctx.part_mut(VsidsP).make_available(var);
        }
    }

    /// Propagate until a decision has to be made.
    pub fn propagate(&mut self) -> Status {
        let mut ctx = self.ctx.into_partial_ref_mut();
        cdcl::propagate_step(ctx.borrow())
    }

    /// Perform a decision.
    ///
    /// Must follow a [`propagate`](Solver::propagate) call that returned [`Status::Undef`].
    /// Returns `false` iff nothing is left to decide, in which case the status becomes
    /// [`Status::Sat`].
    pub fn decide(&mut self) -> bool {
        let mut ctx = self.ctx.into_partial_ref_mut();
        cdcl::decide_step(ctx.borrow())
    }

    /// Undo all decisions and re-propagate.
    pub fn restart(&mut self) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        cdcl::force_restart(ctx.borrow());
    }

    /// Run until a model is found or the formula is proven unsatisfiable.
    pub fn solve(&mut self) -> Status {
        let mut ctx = self.ctx.into_partial_ref_mut();
        cdcl::solve(ctx.borrow())
    }

    /// Current status of the solver.
    pub fn status(&self) -> Status {
        self.ctx.solver_state.status
    }

    /// Id of the derived empty clause when the solver is unsatisfiable with proofs enabled.
    pub fn empty_clause(&self) -> Option<ClauseId> {
        self.ctx.solver_state.empty_clause
    }

    /// Value currently assigned to a variable.
    pub fn var_value(&self, var: Var) -> Value {
        let mut ctx = self.ctx.into_partial_ref();
        let value = ctx.part(AssignmentP).var_value(var);
        value
    }

    /// Value of a literal under the current assignment.
    pub fn lit_value(&self, lit: Lit) -> Value {
        let mut ctx = self.ctx.into_partial_ref();
        let value = ctx.part(AssignmentP).lit_value(lit);
        value
    }

    /// Level at which a variable was assigned; 0 for unassigned variables.
    pub fn var_level(&self, var: Var) -> usize {
        let mut ctx = self.ctx.into_partial_ref();
        if ctx.part(AssignmentP).var_value(var).is_unknown() {
            0
        } else {
            let level = ctx.part(ImplGraphP).level(var);
            level
        }
    }

    /// Level at which a literal's variable was assigned; 0 for unassigned variables.
    pub fn lit_level(&self, lit: Lit) -> usize {
        self.var_level(lit.var())
    }

    /// The assigned literals in assignment order.
    pub fn trail(&self) -> &[Lit] {
        self.ctx.trail.trail()
    }

    /// Current decision level.
    pub fn current_level(&self) -> usize {
        self.ctx.trail.current_level()
    }

    /// Set of literals that satisfy the formula, when one is known.
    pub fn model(&self) -> Option<Vec<Lit>> {
        if self.status() == Status::Sat {
            Some(self.trail().to_vec())
        } else {
            None
        }
    }

    /// Compress the model to a subset that still satisfies every irredundant clause.
    pub fn minimal_model(&self, options: MinimalModelOptions) -> Option<Vec<Lit>> {
        if self.status() != Status::Sat {
            return None;
        }
        let mut ctx = self.ctx.into_partial_ref();
        let model = model::minimal_model(ctx.borrow(), options);
        Some(model)
    }

    /// The active configuration.
    pub fn config(&self) -> &SolverConfig {
        &self.ctx.solver_config
    }

    /// Replace the configuration.
    ///
    /// The binary index setting must not change after the first clause was added.
    pub fn set_config(&mut self, config: SolverConfig) {
        self.ctx.solver_config = config;
        let mut ctx = self.ctx.into_partial_ref_mut();
        context::config_changed(ctx.borrow());
    }

    /// Start recording resolution chains for derived clauses.
    ///
    /// Must be called before the first clause is added.
    pub fn enable_proof(&mut self) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        ctx.part_mut(ProofP).enable();
    }

    /// Install a callback receiving each derived clause with its resolution chain.
    pub fn set_proof_sink(
        &mut self,
        sink: impl FnMut(ClauseId, &[ClauseId], &[Lit]) + 'static,
    ) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        ctx.part_mut(ProofP).set_sink(Box::new(sink));
    }

    /// Append each derived clause's resolution chain to a byte sink.
    pub fn write_proof(&mut self, writer: impl io::Write + 'static) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        ctx.part_mut(ProofP).set_writer(Box::new(writer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use ratel_formula::test::{sat_formula, sgen_unsat_formula};
    use ratel_formula::{cnf_formula, lits, CnfFormula};

    fn load_formula(solver: &mut Solver, formula: &CnfFormula) {
        solver.ensure_var(Var::from_index(formula.var_count()));
        for clause in formula.iter() {
            solver.add_clause(clause);
        }
    }

    #[test]
    fn fresh_solver_is_sat() {
        let mut solver = Solver::new();
        assert_eq!(solver.status(), Status::Sat);
        assert_eq!(solver.solve(), Status::Sat);

        solver.new_var();
        assert_eq!(solver.solve(), Status::Sat);
    }

    #[test]
    fn forced_chain() {
        let mut solver = Solver::new();
        load_formula(
            &mut solver,
            &cnf_formula![
                1;
                -1, 2;
                -2, 3;
            ],
        );

        assert_eq!(solver.solve(), Status::Sat);
        for number in 1..4 {
            assert_eq!(solver.lit_value(Lit::from_dimacs(number)), Value::TRUE);
        }
    }

    #[test]
    fn conflicting_units() {
        let mut solver = Solver::new();

        assert!(solver.add_clause(&lits![1]).is_some());
        assert_eq!(solver.add_clause(&lits![-1]), None);
        assert_eq!(solver.status(), Status::Unsat);

        // further clauses are absorbed silently
        assert_eq!(solver.add_clause(&lits![2]), None);
        assert_eq!(solver.status(), Status::Unsat);
    }

    proptest! {
        #[test]
        fn sgen_unsat(formula in sgen_unsat_formula(1..7usize)) {
            let mut solver = Solver::new();
            load_formula(&mut solver, &formula);

            prop_assert_eq!(solver.solve(), Status::Unsat);
        }

        #[test]
        fn sat(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut solver = Solver::new();
            load_formula(&mut solver, &formula);

            prop_assert_eq!(solver.solve(), Status::Sat);

            let model = solver.model().unwrap();

            for clause in formula.iter() {
                prop_assert!(clause.iter().any(|lit| model.contains(lit)));
            }
        }

        #[test]
        fn sgen_unsat_incremental_clauses(formula in sgen_unsat_formula(1..7usize)) {
            let mut solver = Solver::new();

            let mut last_status = Status::Sat;

            for clause in formula.iter() {
                solver.add_clause(clause);

                let status = solver.solve();
                if status != last_status {
                    prop_assert_eq!(status, Status::Unsat);
                    prop_assert_eq!(last_status, Status::Sat);
                    last_status = status;
                }
            }

            prop_assert_eq!(last_status, Status::Unsat);
        }
    }
}
