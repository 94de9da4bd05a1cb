//! Partial assignment and backtracking.
use partial_ref::{partial, PartialRef};

use ratel_formula::{Lit, LitIdx, Value, Var};

use crate::context::{AssignmentP, Context, ImplGraphP, TrailP, VsidsP};
use crate::decision::make_available;

use super::Reason;

/// Current partial assignment.
#[derive(Default)]
pub struct Assignment {
    /// Value per variable, indexed by variable index. Slot 0 stays undefined.
    values: Vec<Value>,
    /// Last polarity assigned to each variable.
    phase: Vec<bool>,
}

impl Assignment {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.values.resize(count + 1, Value::UNDEF);
        self.phase.resize(count + 1, false);
    }

    /// The highest variable index.
    pub fn var_count(&self) -> usize {
        self.values.len().saturating_sub(1)
    }

    /// Value assigned to a variable.
    pub fn var_value(&self, var: Var) -> Value {
        self.values[var.index()]
    }

    /// Value of a literal under the current assignment.
    ///
    /// A single XOR with the inverted polarity bit covers the true, false and undefined cases.
    pub fn lit_value(&self, lit: Lit) -> Value {
        Value::from_code(self.values[lit.index()].code() ^ (lit.is_positive() as u8 ^ 1))
    }

    pub fn lit_is_true(&self, lit: Lit) -> bool {
        self.lit_value(lit).is_true()
    }

    pub fn lit_is_false(&self, lit: Lit) -> bool {
        self.lit_value(lit).is_false()
    }

    pub fn lit_is_unknown(&self, lit: Lit) -> bool {
        self.lit_value(lit).is_unknown()
    }

    /// Polarity a decision on this variable should use.
    ///
    /// This is the last value the variable was assigned, initially false.
    pub fn phase(&self, var: Var) -> bool {
        self.phase[var.index()]
    }

    /// Assign true to a literal.
    ///
    /// The phase cache is harvested here rather than on backtracking.
    pub fn assign_lit(&mut self, lit: Lit) {
        self.values[lit.index()] = Value::from_bool(lit.is_positive());
        self.phase[lit.index()] = lit.is_positive();
    }

    /// Unassign a variable.
    pub fn unassign(&mut self, var: Var) {
        self.values[var.index()] = Value::UNDEF;
    }
}

/// Decision and propagation history.
#[derive(Default)]
pub struct Trail {
    /// Stack of all assigned literals in assignment order.
    trail: Vec<Lit>,
    /// Next trail position to be examined by propagation.
    cursor: usize,
    /// Trail index of the first literal asserted at each decision level.
    ///
    /// `level_starts[l]` is the position of the decision literal of level `l + 1`; level 0 (the
    /// root level) owns the trail prefix before `level_starts[0]`.
    level_starts: Vec<LitIdx>,
}

impl Trail {
    /// Assigned literals in assignment order.
    pub fn trail(&self) -> &[Lit] {
        &self.trail
    }

    /// Current decision level.
    pub fn current_level(&self) -> usize {
        self.level_starts.len()
    }

    /// Position of the next literal to propagate.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The next assigned literal not yet examined by propagation.
    pub fn next_unpropagated(&self) -> Option<Lit> {
        self.trail.get(self.cursor).cloned()
    }

    /// Move the propagation cursor past the current literal.
    pub fn advance_cursor(&mut self) {
        debug_assert!(self.cursor < self.trail.len());
        self.cursor += 1;
    }

    /// Whether all assignments are processed.
    pub fn fully_propagated(&self) -> bool {
        self.cursor == self.trail.len()
    }

    /// Start a new decision level.
    ///
    /// Does not enqueue the decision itself.
    pub fn new_decision_level(&mut self) {
        self.level_starts.push(self.trail.len() as LitIdx)
    }

    /// Trail position of the first literal of the given level.
    pub fn level_start(&self, level: usize) -> usize {
        if level == 0 {
            0
        } else {
            self.level_starts[level - 1] as usize
        }
    }
}

/// Enqueues the assignment of true to a literal.
///
/// This updates the assignment and trail, but does not perform any propagation. The literal has to
/// be unassigned when calling this.
pub fn enqueue_assignment(
    mut ctx: partial!(Context, mut AssignmentP, mut ImplGraphP, mut TrailP),
    lit: Lit,
    reason: Reason,
) {
    let assignment = ctx.part_mut(AssignmentP);
    debug_assert!(assignment.lit_is_unknown(lit));

    assignment.assign_lit(lit);

    let (trail, mut ctx) = ctx.split_part_mut(TrailP);
    trail.trail.push(lit);

    ctx.part_mut(ImplGraphP)
        .assign(lit.var(), trail.current_level(), reason);
}

/// Undo all assignments in decision levels deeper than the given level.
///
/// Backtracking to the current level or deeper is a no-op, so forced restarts can pass a level
/// computed without clamping.
pub fn backtrack(
    mut ctx: partial!(Context, mut AssignmentP, mut TrailP, mut VsidsP),
    level: usize,
) {
    let (trail, mut ctx) = ctx.split_part_mut(TrailP);

    if level >= trail.level_starts.len() {
        return;
    }

    let new_len = trail.level_starts[level] as usize;
    debug_assert!(trail.cursor >= new_len);

    trail.level_starts.truncate(level);
    trail.cursor = new_len;

    let (assignment, mut ctx) = ctx.split_part_mut(AssignmentP);
    for &lit in &trail.trail[new_len..] {
        assignment.unassign(lit.var());
        make_available(ctx.borrow(), lit.var());
    }
    trail.trail.truncate(new_len);
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;
    use ratel_formula::{lit, lits, var};

    use crate::context::set_var_count;

    #[test]
    fn lit_evaluation() {
        let mut assignment = Assignment::default();
        assignment.set_var_count(2);

        assignment.assign_lit(lit!(1));
        assignment.assign_lit(lit!(-2));

        assert!(assignment.lit_is_true(lit!(1)));
        assert!(assignment.lit_is_false(lit!(-1)));
        assert!(assignment.lit_is_true(lit!(-2)));
        assert!(assignment.lit_is_false(lit!(2)));
        assert_eq!(assignment.var_value(var!(1)), Value::TRUE);
        assert_eq!(assignment.var_value(var!(2)), Value::FALSE);

        assignment.unassign(var!(1));
        assert!(assignment.lit_is_unknown(lit!(1)));
        assert!(assignment.lit_is_unknown(lit!(-1)));
        // the phase cache keeps the last assigned polarity
        assert!(assignment.phase(var!(1)));
        assert!(!assignment.phase(var!(2)));
    }

    #[test]
    fn trail_levels_and_backtracking() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 4);

        enqueue_assignment(ctx.borrow(), lit!(1), Reason::Decision);

        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(2), Reason::Decision);
        enqueue_assignment(ctx.borrow(), lit!(-3), Reason::Lazy);

        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(4), Reason::Decision);

        assert_eq!(ctx.part(TrailP).current_level(), 2);
        assert_eq!(ctx.part(TrailP).trail(), &lits![1, 2, -3, 4]);
        assert_eq!(ctx.part(TrailP).level_start(1), 1);
        assert_eq!(ctx.part(ImplGraphP).level(var!(3)), 1);
        assert_eq!(ctx.part(ImplGraphP).level(var!(1)), 0);

        backtrack(ctx.borrow(), 1);
        assert_eq!(ctx.part(TrailP).trail(), &lits![1, 2, -3]);
        assert_eq!(ctx.part(TrailP).current_level(), 1);
        assert!(ctx.part(AssignmentP).lit_is_unknown(lit!(4)));
        assert!(ctx.part(AssignmentP).lit_is_true(lit!(-3)));

        // backtracking to the current or a deeper level does nothing
        backtrack(ctx.borrow(), 5);
        assert_eq!(ctx.part(TrailP).trail(), &lits![1, 2, -3]);

        backtrack(ctx.borrow(), 0);
        assert_eq!(ctx.part(TrailP).trail(), &lits![1]);
        assert_eq!(ctx.part(TrailP).current_level(), 0);
        assert!(ctx.part(AssignmentP).lit_is_true(lit!(1)));
    }
}
