//! Decision heuristics.
pub mod vsids;

pub use vsids::Vsids;

use partial_ref::{partial, PartialRef};

use ratel_formula::{Lit, Var};

use crate::context::{AssignmentP, Context, ImplGraphP, TrailP, VsidsP};
use crate::prop::{enqueue_assignment, Reason};

/// Make a decision and enqueue it.
///
/// Picks the most active unassigned decidable variable, using the phase cache for the polarity.
///
/// Returns `false` if no decision was made because all decidable variables are assigned.
pub fn make_decision(
    mut ctx: partial!(Context, mut AssignmentP, mut ImplGraphP, mut TrailP, mut VsidsP),
) -> bool {
    let decision = {
        let (vsids, mut ctx) = ctx.split_part_mut(VsidsP);
        let assignment = ctx.part(AssignmentP);
        loop {
            match vsids.next() {
                None => return false,
                Some(var) => {
                    // assigned entries are stale and silently discarded
                    if assignment.var_value(var).is_unknown() && vsids.is_decidable(var) {
                        break Lit::from_var(var, assignment.phase(var));
                    }
                }
            }
        }
    };

    ctx.part_mut(TrailP).new_decision_level();
    enqueue_assignment(ctx.borrow(), decision, Reason::Decision);

    true
}

/// Put a variable back into the decision heap.
pub fn make_available(mut ctx: partial!(Context, mut VsidsP), var: Var) {
    ctx.part_mut(VsidsP).make_available(var);
}

/// The level to keep on a restart when trail reuse is enabled.
///
/// Walks the trail for a decision variable less active than the next decision candidate; the
/// trail up to (excluding) that decision can be kept since the search would rebuild it anyway.
/// Returns the current level when no such decision exists.
pub fn find_restart_level(
    mut ctx: partial!(Context, mut VsidsP, AssignmentP, ImplGraphP, TrailP),
) -> usize {
    let next_activity = {
        let (vsids, mut ctx) = ctx.split_part_mut(VsidsP);
        let assignment = ctx.part(AssignmentP);
        loop {
            match vsids.peek() {
                None => return 0,
                Some(var) => {
                    if assignment.var_value(var).is_unknown() && vsids.is_decidable(var) {
                        break vsids.activity(var);
                    }
                    // drop stale entries so peek converges on the real candidate
                    vsids.next();
                }
            }
        }
    };

    let (trail, mut ctx) = ctx.split_part(TrailP);
    let (graph, mut ctx) = ctx.split_part(ImplGraphP);
    let vsids = ctx.part(VsidsP);

    for &lit in trail.trail() {
        let var = lit.var();
        if graph.reason(var).is_decision() && vsids.activity(var) < next_activity {
            return graph.level(var) - 1;
        }
    }

    trail.current_level()
}
